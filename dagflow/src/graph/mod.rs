//! Graph declaration and execution.
//!
//! This module provides:
//! - Step specifications and the graph builder
//! - Retry policies
//! - The wave-based executor with trigger-rule admission

mod builder;
mod executor;
mod retry;
mod spec;


pub use builder::GraphBuilder;
pub use executor::{Run, StepGraph, StepOutcome};
pub use retry::{Backoff, RetryPolicy};
pub use spec::StepSpec;
