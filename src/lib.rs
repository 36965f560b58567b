pub mod interval_tree;
pub mod interval_set;
pub mod script;

pub use crate::interval_set::{IntervalSet, InvariantViolation};
pub use crate::interval_tree::Interval;
