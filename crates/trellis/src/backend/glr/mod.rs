//! # GLR Runtime
//!
//! Executes a [`ParseTable`](crate::backend::lr::ParseTable) over a token
//! stream, forking wherever the table holds more than one applicable action.
//!
//! ## Overview
//!
//! The runtime keeps every live parse in one graph-structured stack, the
//! [`Trellis`]. A node records a parser state and links back to the nodes it
//! was pushed on; each link carries the token that was shifted or reduced.
//! Branches that reach the same state at the same position share a node, and
//! branches that share a prefix share the nodes below it.
//!
//! Each input token is processed in one round:
//!
//! 1. Nodes of the frontier are acted on in order of the latest position
//!    their links start from, so that every reduction that can still reach a
//!    node arrives before the node is used
//! 2. A node is sealed when it is taken; its links are final from then on
//! 3. Reductions push new nodes at the current position, shifts push nodes
//!    at the next position
//! 4. When reductions of a rule with a merge callback meet at one node, the
//!    callback chooses which token survives
//!
//! Nodes are reference counted. Branches that die are collected at the end
//! of the round.
//!
//! The same driver runs deterministic tables: they never fork, so exactly
//! one branch is kept.

mod driver;
mod stack;

pub use driver::{GlrDriver, ParseMetrics};
pub use stack::{NodeId, StackLink, StackNode, StackPath, Trellis};
