//! Auxiliary pattern rules used as chain extensions.
//!
//! Each rule implements [`RuleProducer`](crate::RuleProducer) and reports its
//! deductions together with the condition candidates a chain needs to splice
//! them into an implication graph.

pub use self::{fisherman::Fisherman, hidden_set::HiddenSet, locking::Locking, naked_set::NakedSet};

mod fisherman;
mod hidden_set;
mod locking;
mod naked_set;
