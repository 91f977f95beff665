//! # Table Construction and Runtimes
//!
//! ## Available Backends
//!
//! - **LR(1)** ([`lr`]): item sets, guard ordering and parse tables
//! - **GLR** ([`glr`]): the graph-structured stack and the driver that runs
//!   parse tables, forking on overlapping actions
//! - **FSM** ([`fsm`]): guarded state transition tables and their runtime
//!
//! Runtimes call back into user code through [`Semantics`]. Tables of every
//! kind can be described with a [`TableDump`].

pub mod dump;
pub mod fsm;
pub mod glr;
pub mod lr;
pub mod traits;

pub use dump::{EntryDump, StateDump, TableDump};
pub use traits::Semantics;
