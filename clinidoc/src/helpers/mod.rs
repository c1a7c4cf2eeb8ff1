//! Helper modules for stage execution.

pub mod runtime;

pub use runtime::{run_isolated, run_stage, run_with_timeout, TimedResult};
