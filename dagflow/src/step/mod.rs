//! Units of work and failure hooks.
//!
//! A `Step` is the opaque callable a graph node delegates to. It may
//! perform arbitrary side effects (write files, call services, send mail)
//! but reports success or failure back to the executor instead of
//! terminating the process.

use crate::context::StepContext;
use async_trait::async_trait;
use std::fmt::Debug;

/// The result of one unit-of-work invocation.
pub type WorkResult = Result<serde_json::Value, anyhow::Error>;

/// Trait for units of work.
///
/// The returned value is recorded as the step's output and exposed to
/// successors through their inputs. A branch step's value must be a JSON
/// string naming one of its declared candidates.
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Executes the unit of work.
    async fn execute(&self, ctx: &StepContext) -> WorkResult;
}

/// A closure-based step.
///
/// Tests use this to supply deterministic success/failure sequences
/// instead of injecting random faults into step bodies.
pub struct FnStep<F>
where
    F: Fn(&StepContext) -> WorkResult + Send + Sync,
{
    func: F,
}

impl<F> FnStep<F>
where
    F: Fn(&StepContext) -> WorkResult + Send + Sync,
{
    /// Creates a step from a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnStep<F>
where
    F: Fn(&StepContext) -> WorkResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStep").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&StepContext) -> WorkResult + Send + Sync,
{
    async fn execute(&self, ctx: &StepContext) -> WorkResult {
        (self.func)(ctx)
    }
}

/// A step that does nothing and succeeds with a null value.
///
/// Useful as a start/end marker around a graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStep;

impl NoOpStep {
    /// Creates a no-op step.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Step for NoOpStep {
    async fn execute(&self, _ctx: &StepContext) -> WorkResult {
        Ok(serde_json::Value::Null)
    }
}

/// Trait for per-step failure hooks.
///
/// Invoked synchronously by the executor once per failed attempt; the
/// final invocation (the one that exhausts the retry budget) receives the
/// `StepExhausted` error as its context. Errors returned by the hook are
/// logged and swallowed, never re-raised into the graph.
pub trait FailureHook: Send + Sync + Debug {
    /// Reacts to a failed attempt.
    ///
    /// # Errors
    ///
    /// May fail; the executor logs and ignores the error.
    fn on_failure(
        &self,
        step: &str,
        attempt: usize,
        error: &(dyn std::error::Error + 'static),
    ) -> Result<(), anyhow::Error>;
}

/// A closure-based failure hook.
pub struct FnHook<F>
where
    F: Fn(&str, usize, &(dyn std::error::Error + 'static)) -> Result<(), anyhow::Error>
        + Send
        + Sync,
{
    func: F,
}

impl<F> FnHook<F>
where
    F: Fn(&str, usize, &(dyn std::error::Error + 'static)) -> Result<(), anyhow::Error>
        + Send
        + Sync,
{
    /// Creates a hook from a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnHook<F>
where
    F: Fn(&str, usize, &(dyn std::error::Error + 'static)) -> Result<(), anyhow::Error>
        + Send
        + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHook").finish_non_exhaustive()
    }
}

impl<F> FailureHook for FnHook<F>
where
    F: Fn(&str, usize, &(dyn std::error::Error + 'static)) -> Result<(), anyhow::Error>
        + Send
        + Sync,
{
    fn on_failure(
        &self,
        step: &str,
        attempt: usize,
        error: &(dyn std::error::Error + 'static),
    ) -> Result<(), anyhow::Error> {
        (self.func)(step, attempt, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RunContext, StepInputs};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn test_ctx() -> StepContext {
        StepContext::new(
            Arc::new(RunContext::new()),
            "test",
            StepInputs::permissive(HashMap::new(), "test"),
        )
    }

    #[tokio::test]
    async fn test_fn_step_success() {
        let step = FnStep::new(|_ctx: &StepContext| Ok(serde_json::json!("done")));
        let value = step.execute(&test_ctx()).await.unwrap();
        assert_eq!(value, serde_json::json!("done"));
    }

    #[tokio::test]
    async fn test_fn_step_failure() {
        let step = FnStep::new(|_ctx: &StepContext| Err(anyhow::anyhow!("boom")));
        assert!(step.execute(&test_ctx()).await.is_err());
    }

    #[tokio::test]
    async fn test_noop_step() {
        let step = NoOpStep::new();
        let value = step.execute(&test_ctx()).await.unwrap();
        assert_eq!(value, serde_json::Value::Null);
    }

    #[test]
    fn test_fn_hook_invocation() {
        let hook = FnHook::new(
            |step: &str, attempt: usize, _error: &(dyn std::error::Error + 'static)| {
                assert_eq!(step, "extract");
                assert_eq!(attempt, 2);
                Ok(())
            },
        );
        let err = std::io::Error::other("disk gone");
        hook.on_failure("extract", 2, &err).unwrap();
    }
}
