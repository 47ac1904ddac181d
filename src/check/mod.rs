//! # Graph Validity Checks
//!
//! The forward compilers: transitions, operation pipelines, and data
//! policies. Each check reads the snapshot only and reports per-node
//! [`crate::report::ValidationResult`]s instead of throwing.

mod data_policy;
mod pipeline;
mod transition;

pub use data_policy::*;
pub use pipeline::*;
pub use transition::*;
