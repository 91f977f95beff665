//! # Parser Module
//!
//! The public entry points: build tables with a [`ParserFactory`], bind
//! callbacks by name with [`Bindings`], and run the resulting [`Parser`] or
//! [`StateMachine`] over [`ParseToken`]s.
//!
//! ## Callbacks
//!
//! - **Guards** decide for a token whether a guard predicate holds; guard
//!   expressions are evaluated over them
//! - **Actions** compute the value of a reduction. A production without an
//!   action passes the value of a single element through; `{ $N }` passes
//!   element `N`
//! - **Merges** choose among tokens that one rule derived over the same input
//!
//! Errors returned by callbacks abort the run and reach the caller unchanged.

mod bindings;
mod factory;
mod instance;
mod token;

pub use bindings::{ActionFn, Bindings, GuardFn, MergeFn};
pub use factory::{BuildOptions, ParserFactory};
pub use instance::{Instance, Parser, StateMachine};
pub use token::ParseToken;
