//! # Dagflow
//!
//! A workflow-graph orchestration core: named steps with data
//! dependencies, per-step retry policies, data-dependent branching, and
//! trigger-rule admission of downstream steps.
//!
//! Dagflow deliberately stops at the orchestration boundary. Units of work
//! are opaque async callables that may do arbitrary I/O; the executor only
//! sees their success or failure and a JSON payload. There is no scheduler,
//! no distributed execution, and no state that outlives a single run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dagflow::prelude::*;
//!
//! let graph = GraphBuilder::new("etl")
//!     .step("extract", extract_step(), &[])
//!     .step("load", load_step(), &["extract"])
//!     .build();
//!
//! let run = graph.run(RunContext::new()).await?;
//! assert!(run.is_complete());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod graph;
pub mod step;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{RunContext, StepContext, StepInputs};
    pub use crate::core::{Admission, StepState, TriggerRule};
    pub use crate::errors::{
        CycleError, DagflowError, GraphValidationError, InvalidBranchSelection, QueryError,
        StepExhausted, UndeclaredDependencyError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::graph::{
        Backoff, GraphBuilder, RetryPolicy, Run, StepGraph, StepOutcome, StepSpec,
    };
    pub use crate::step::{FailureHook, FnHook, FnStep, NoOpStep, Step, WorkResult};
}
