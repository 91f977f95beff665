//! # Guarded State Machines
//!
//! A state machine grammar lists, for every state, the transitions leaving
//! it:
//!
//! ```text
//! fsm(Red) {
//!     Red   : TIMER[isLong] Green { goGreen } | RESET Red ;
//!     Green : TIMER Red ;
//! }
//! ```
//!
//! [`FsmTable::build`] orders the transitions on each trigger by guard
//! priority, the same way parser tables are ordered. Transitions whose
//! guards may hold together are conflicts. [`FsmDriver`] runs the table.

mod machine;
mod table;

pub use machine::FsmDriver;
pub use table::{FsmState, FsmStateId, FsmTable};
