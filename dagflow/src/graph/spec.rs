//! Step declarations.

use super::RetryPolicy;
use crate::core::TriggerRule;
use crate::errors::GraphValidationError;
use crate::step::{FailureHook, Step};
use std::collections::HashSet;
use std::sync::Arc;

/// Declaration of a single step: its unit of work, incoming edges, retry
/// policy, trigger rule, failure hook, and display label.
#[derive(Debug, Clone)]
pub struct StepSpec {
    /// Unique step name.
    pub name: String,
    /// The unit of work.
    pub runner: Arc<dyn Step>,
    /// Names of direct predecessors.
    pub predecessors: HashSet<String>,
    /// Admission predicate over predecessor states.
    pub trigger_rule: TriggerRule,
    /// Retry policy; the graph default applies when unset.
    pub retry: Option<RetryPolicy>,
    /// Invoked once per failed attempt.
    pub on_failure: Option<Arc<dyn FailureHook>>,
    /// Human-readable label for logs and UIs.
    pub display_name: Option<String>,
}

impl StepSpec {
    /// Creates a step specification with no predecessors and defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Step>) -> Self {
        Self {
            name: name.into(),
            runner,
            predecessors: HashSet::new(),
            trigger_rule: TriggerRule::default(),
            retry: None,
            on_failure: None,
            display_name: None,
        }
    }

    /// Sets the predecessor set.
    #[must_use]
    pub fn with_predecessors(
        mut self,
        predecessors: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.predecessors = predecessors.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a single predecessor.
    #[must_use]
    pub fn with_predecessor(mut self, predecessor: impl Into<String>) -> Self {
        self.predecessors.insert(predecessor.into());
        self
    }

    /// Sets the trigger rule.
    #[must_use]
    pub fn with_trigger_rule(mut self, rule: TriggerRule) -> Self {
        self.trigger_rule = rule;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Sets the failure hook.
    #[must_use]
    pub fn with_on_failure(mut self, hook: Arc<dyn FailureHook>) -> Self {
        self.on_failure = Some(hook);
        self
    }

    /// Sets the display label.
    #[must_use]
    pub fn with_display_name(mut self, label: impl Into<String>) -> Self {
        self.display_name = Some(label.into());
        self
    }

    /// Returns the display label, falling back to the step name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Validates the declaration in isolation.
    ///
    /// # Errors
    ///
    /// Returns an error if the step depends on itself.
    pub fn validate(&self) -> Result<(), GraphValidationError> {
        if self.predecessors.contains(&self.name) {
            return Err(GraphValidationError::SelfDependency(self.name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::NoOpStep;

    fn noop() -> Arc<dyn Step> {
        Arc::new(NoOpStep::new())
    }

    #[test]
    fn test_spec_defaults() {
        let spec = StepSpec::new("extract", noop());
        assert_eq!(spec.name, "extract");
        assert!(spec.predecessors.is_empty());
        assert_eq!(spec.trigger_rule, TriggerRule::AllSuccess);
        assert!(spec.retry.is_none());
        assert_eq!(spec.label(), "extract");
    }

    #[test]
    fn test_spec_builder() {
        let spec = StepSpec::new("report", noop())
            .with_predecessors(["extract", "analyze"])
            .with_trigger_rule(TriggerRule::NoneFailedMinOneSuccess)
            .with_retry(RetryPolicy::new().with_max_attempts(3))
            .with_display_name("Build the report");

        assert_eq!(spec.predecessors.len(), 2);
        assert_eq!(spec.trigger_rule, TriggerRule::NoneFailedMinOneSuccess);
        assert_eq!(spec.retry.as_ref().map(|r| r.max_attempts), Some(3));
        assert_eq!(spec.label(), "Build the report");
    }

    #[test]
    fn test_self_dependency_rejected() {
        let spec = StepSpec::new("loopy", noop()).with_predecessor("loopy");
        assert_eq!(
            spec.validate(),
            Err(GraphValidationError::SelfDependency("loopy".into()))
        );
    }
}
