//! # Guard Expressions
//!
//! Boolean predicates attached to grammar elements and state transitions.
//!
//! ## Overview
//!
//! A guard is a boolean expression over named variables. Each variable is a
//! user predicate evaluated at parse time. While tables are built, guards are
//! only ever reasoned about through their truth tables:
//!
//! - [`BoolExpr::compare`] classifies two guards as equal, disjoint, nested,
//!   overlapping or independent
//! - [`BoolExpr::hamming_weight`] ranks guards by how much of the input space
//!   they accept
//! - [`BoolExpr::as_identifier`] gives every truth table one canonical name
//!
//! Tables are generated in 64-row blocks, so up to [`MAX_LEAVES`] variables can
//! be handled, although comparisons over many variables cost one block walk per
//! combination of the high variables involved.
//!
//! [`ExpressionCache`] interns guards by identifier and hands out [`GuardId`]
//! handles that the grammar and the tables store.

mod cache;
mod expr;
mod leaf;
pub(crate) mod truth;

pub use cache::{ExpressionCache, GuardId};
pub use expr::{BoolExpr, Comparison, ExprDisplay, ExprKind};
pub use leaf::LeafIndexProvider;
pub use truth::MAX_LEAVES;
