//! Trellis Tools - developer utilities for trellis grammars
//!
//! Backs the `trellis` command: grammar checking with readable diagnostics,
//! table dumps and Graphviz drawings.

pub mod cli;
pub mod report;
pub mod visualize;

pub use visualize::{rules_dot, table_dot};
