//! Run-scoped execution contexts.
//!
//! A `RunContext` replaces global logger/sink state: it carries the run
//! identity, the event sink, and the cancellation flag, and lives exactly
//! as long as one run. Each step invocation receives a `StepContext`
//! scoped to that step.

mod inputs;

pub use inputs::StepInputs;

use crate::events::{EventSink, NoOpEventSink};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Shared context for one run of a graph.
pub struct RunContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    event_sink: Arc<dyn EventSink>,
    cancelled: AtomicBool,
    cancel_reason: parking_lot::RwLock<Option<String>>,
}

impl RunContext {
    /// Creates a context with a fresh run id and a no-op event sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            event_sink: Arc::new(NoOpEventSink),
            cancelled: AtomicBool::new(false),
            cancel_reason: parking_lot::RwLock::new(None),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns when this context was created.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Requests cancellation. Observed at wave boundaries only; a step
    /// mid-retry completes its attempts.
    pub fn cancel(&self, reason: impl Into<String>) {
        *self.cancel_reason.write() = Some(reason.into());
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the recorded cancellation reason, if any.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<String> {
        self.cancel_reason.read().clone()
    }

    /// Emits an event through the configured sink.
    pub async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.event_sink.emit(event_type, data).await;
    }

    /// Emits an event without blocking.
    pub fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.event_sink.try_emit(event_type, data);
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("started_at", &self.started_at)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Context handed to one step invocation.
#[derive(Debug, Clone)]
pub struct StepContext {
    run: Arc<RunContext>,
    step_name: String,
    inputs: StepInputs,
}

impl StepContext {
    /// Creates a step context.
    #[must_use]
    pub fn new(run: Arc<RunContext>, step_name: impl Into<String>, inputs: StepInputs) -> Self {
        Self {
            run,
            step_name: step_name.into(),
            inputs,
        }
    }

    /// Returns the owning run context.
    #[must_use]
    pub fn run(&self) -> &RunContext {
        &self.run
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run.run_id()
    }

    /// Returns the name of the executing step.
    #[must_use]
    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    /// Returns the predecessor outputs.
    #[must_use]
    pub fn inputs(&self) -> &StepInputs {
        &self.inputs
    }

    /// Emits an event on behalf of the step, without blocking.
    pub fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.run.try_emit(event_type, data);
    }
}
