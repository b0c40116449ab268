//! Graph builder.
//!
//! Registration is infallible; the graph is checked lazily when a run
//! starts, so declaration order does not matter and forward references
//! between steps are fine.

use super::{RetryPolicy, StepGraph, StepSpec};
use crate::step::Step;
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for a step graph.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    name: String,
    specs: HashMap<String, StepSpec>,
    order: Vec<String>,
    branches: HashMap<String, Vec<String>>,
    duplicates: Vec<String>,
    default_retry: RetryPolicy,
}

impl GraphBuilder {
    /// Creates a builder for a named graph.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the retry policy applied to steps that do not declare their own.
    #[must_use]
    pub fn with_default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Registers a step with its incoming edges.
    #[must_use]
    pub fn step(mut self, name: impl Into<String>, runner: Arc<dyn Step>, predecessors: &[&str]) -> Self {
        self.add_step(StepSpec::new(name, runner).with_predecessors(predecessors.iter().copied()));
        self
    }

    /// Registers a branch group with its incoming edges and candidate
    /// successors. The step's unit of work must return the name of exactly
    /// one candidate at run time.
    #[must_use]
    pub fn branch(
        mut self,
        name: impl Into<String>,
        runner: Arc<dyn Step>,
        predecessors: &[&str],
        candidates: &[&str],
    ) -> Self {
        self.add_branch(
            StepSpec::new(name, runner).with_predecessors(predecessors.iter().copied()),
            candidates.iter().copied(),
        );
        self
    }

    /// Registers a step from a full specification.
    pub fn add_step(&mut self, spec: StepSpec) {
        let name = spec.name.clone();
        if self.specs.contains_key(&name) {
            self.duplicates.push(name);
            return;
        }
        self.order.push(name.clone());
        self.specs.insert(name, spec);
    }

    /// Registers a step as a branch group over the given candidates.
    pub fn add_branch(
        &mut self,
        spec: StepSpec,
        candidates: impl IntoIterator<Item = impl Into<String>>,
    ) {
        let name = spec.name.clone();
        self.add_step(spec);
        self.branches
            .insert(name, candidates.into_iter().map(Into::into).collect());
    }

    /// Returns the graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of registered steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.specs.len()
    }

    /// Produces the immutable graph. Structural validation happens at run
    /// start, not here.
    #[must_use]
    pub fn build(self) -> StepGraph {
        StepGraph {
            name: self.name,
            specs: self.specs,
            order: self.order,
            branches: self.branches,
            duplicates: self.duplicates,
            default_retry: self.default_retry,
        }
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
    fn test_builder_registration() {
        let builder = GraphBuilder::new("etl")
            .step("extract", noop(), &[])
            .step("load", noop(), &["extract"]);

        assert_eq!(builder.name(), "etl");
        assert_eq!(builder.step_count(), 2);
    }

    #[test]
    fn test_forward_reference_allowed() {
        // "load" references "extract" before it is declared; checked at run
        // start, not at registration.
        let builder = GraphBuilder::new("etl")
            .step("load", noop(), &["extract"])
            .step("extract", noop(), &[]);

        assert_eq!(builder.step_count(), 2);
    }

    #[test]
    fn test_duplicate_recorded_first_wins() {
        let mut builder = GraphBuilder::new("etl");
        builder.add_step(StepSpec::new("extract", noop()));
        builder.add_step(StepSpec::new("extract", noop()).with_predecessor("other"));

        let graph = builder.build();
        assert_eq!(graph.step_count(), 1);
        assert!(graph
            .specs
            .get("extract")
            .is_some_and(|s| s.predecessors.is_empty()));
    }

    #[test]
    fn test_branch_registration() {
        let builder = GraphBuilder::new("etl")
            .step("decide_input", noop(), &[])
            .branch("route", noop(), &["decide_input"], &["fast", "slow"])
            .step("fast", noop(), &["route"])
            .step("slow", noop(), &["route"]);

        let graph = builder.build();
        assert_eq!(graph.branches.get("route").map(Vec::len), Some(2));
    }
}
