//! Wave-based graph execution.
//!
//! Each wave collects every pending step whose predecessors are terminal,
//! evaluates trigger rules, runs the admitted steps concurrently on their
//! own tasks, then joins the wave before scanning again. Only the executor
//! mutates the state table; worker tasks report outcomes through their
//! join handles.

use super::{RetryPolicy, StepSpec};
use crate::context::{RunContext, StepContext, StepInputs};
use crate::core::{Admission, StepState};
use crate::errors::{
    CycleError, DagflowError, GraphValidationError, InvalidBranchSelection, QueryError,
    StepExhausted,
};
use crate::step::{FailureHook, Step};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// An immutable, executable graph of steps.
///
/// Built by [`super::GraphBuilder`]; holds no per-run state. Each call to
/// [`StepGraph::begin`] or [`StepGraph::run`] validates the structure and
/// produces an independent [`Run`].
#[derive(Debug, Clone)]
pub struct StepGraph {
    pub(super) name: String,
    pub(super) specs: HashMap<String, StepSpec>,
    pub(super) order: Vec<String>,
    pub(super) branches: HashMap<String, Vec<String>>,
    pub(super) duplicates: Vec<String>,
    pub(super) default_retry: RetryPolicy,
}

impl StepGraph {
    /// Returns the graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of declared steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.specs.len()
    }

    /// Returns true if a step with this name was declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Validates the graph and prepares a run with every step pending.
    ///
    /// # Errors
    ///
    /// Returns a validation error for structural problems and `CycleError`
    /// when the dependency graph is not acyclic.
    pub fn begin(&self, ctx: RunContext) -> Result<Run<'_>, DagflowError> {
        self.validate()?;
        Ok(Run::new(self, Arc::new(ctx)))
    }

    /// Validates, executes, and returns the completed run.
    ///
    /// # Errors
    ///
    /// Returns validation and cycle errors before any step runs, and
    /// `InvalidBranchSelection` or `Cancelled` if the run aborts.
    pub async fn run(&self, ctx: RunContext) -> Result<Run<'_>, DagflowError> {
        let mut run = self.begin(ctx)?;
        run.execute().await?;
        Ok(run)
    }

    fn validate(&self) -> Result<(), DagflowError> {
        if self.specs.is_empty() {
            return Err(GraphValidationError::EmptyGraph.into());
        }
        if let Some(dup) = self.duplicates.first() {
            return Err(GraphValidationError::DuplicateStep(dup.clone()).into());
        }
        for name in &self.order {
            let Some(spec) = self.specs.get(name) else {
                continue;
            };
            spec.validate()?;
            for pred in &spec.predecessors {
                if !self.specs.contains_key(pred) {
                    return Err(GraphValidationError::UnknownPredecessor {
                        step: name.clone(),
                        predecessor: pred.clone(),
                    }
                    .into());
                }
            }
        }
        for (branch, candidates) in &self.branches {
            for candidate in candidates {
                match self.specs.get(candidate) {
                    None => {
                        return Err(GraphValidationError::UnknownBranchCandidate {
                            step: branch.clone(),
                            candidate: candidate.clone(),
                        }
                        .into());
                    }
                    Some(spec) if !spec.predecessors.contains(branch) => {
                        return Err(GraphValidationError::CandidateNotSuccessor {
                            step: branch.clone(),
                            candidate: candidate.clone(),
                        }
                        .into());
                    }
                    Some(_) => {}
                }
            }
        }
        if let Some(path) = self.find_cycle() {
            return Err(CycleError::new(path).into());
        }
        Ok(())
    }

    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        let mut path = Vec::new();

        for name in &self.order {
            if !visited.contains(name) {
                if let Some(cycle) =
                    self.visit(name, &mut visited, &mut stack, &mut path)
                {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn visit(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(spec) = self.specs.get(node) {
            for pred in &spec.predecessors {
                if !self.specs.contains_key(pred) {
                    continue;
                }
                if stack.contains(pred) {
                    let start = path.iter().position(|n| n == pred).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].to_vec();
                    cycle.push(pred.clone());
                    return Some(cycle);
                }
                if !visited.contains(pred) {
                    if let Some(cycle) = self.visit(pred, visited, stack, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        path.pop();
        stack.remove(node);
        None
    }
}

/// The terminal outcome of one step, as recorded by a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The step succeeded and produced this value.
    Succeeded(serde_json::Value),
    /// The step exhausted its attempts.
    Failed {
        /// Rendered error, retaining the last underlying cause.
        error: String,
    },
    /// The step never ran: trigger rejection or branch cut-off.
    Skipped,
    /// The step never ran because a predecessor failed.
    UpstreamFailed,
}

/// One execution of a graph, owning the mutable per-step state table.
///
/// Outcomes stay queryable after `execute` returns, including after a
/// fatal abort (`InvalidBranchSelection`, cancellation): every step that
/// reached a terminal state before the abort keeps it.
#[derive(Debug)]
pub struct Run<'g> {
    graph: &'g StepGraph,
    ctx: Arc<RunContext>,
    states: HashMap<String, StepState>,
    values: HashMap<String, serde_json::Value>,
    failures: HashMap<String, String>,
    /// Branch edges left not-taken, keyed by branch step.
    unchosen: HashMap<String, HashSet<String>>,
    chosen: HashMap<String, String>,
    finished_at: Option<DateTime<Utc>>,
}

impl<'g> Run<'g> {
    fn new(graph: &'g StepGraph, ctx: Arc<RunContext>) -> Self {
        let states = graph
            .specs
            .keys()
            .map(|name| (name.clone(), StepState::Pending))
            .collect();
        Self {
            graph,
            ctx,
            states,
            values: HashMap::new(),
            failures: HashMap::new(),
            unchosen: HashMap::new(),
            chosen: HashMap::new(),
            finished_at: None,
        }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> uuid::Uuid {
        self.ctx.run_id()
    }

    /// Returns the current state of a step, if declared.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<StepState> {
        self.states.get(name).copied()
    }

    /// Returns the full state table.
    #[must_use]
    pub fn states(&self) -> &HashMap<String, StepState> {
        &self.states
    }

    /// Returns the target a branch step selected, if it has run.
    #[must_use]
    pub fn chosen_target(&self, branch: &str) -> Option<&str> {
        self.chosen.get(branch).map(String::as_str)
    }

    /// Returns true once every declared step is terminal.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.states.values().all(|s| s.is_terminal())
    }

    /// Returns the wall-clock duration of the run, once finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<f64> {
        self.finished_at.map(|end| {
            (end - self.ctx.started_at()).num_milliseconds() as f64
        })
    }

    /// Returns the terminal outcome of a step.
    ///
    /// # Errors
    ///
    /// `UnknownStep` if the name was never declared, `NotYetTerminal` if
    /// the run has not reached that step.
    pub fn result(&self, name: &str) -> Result<StepOutcome, QueryError> {
        let state = self
            .states
            .get(name)
            .ok_or_else(|| QueryError::UnknownStep(name.to_string()))?;
        match state {
            StepState::Succeeded => Ok(StepOutcome::Succeeded(
                self.values.get(name).cloned().unwrap_or(serde_json::Value::Null),
            )),
            StepState::Failed => Ok(StepOutcome::Failed {
                error: self.failures.get(name).cloned().unwrap_or_default(),
            }),
            StepState::Skipped => Ok(StepOutcome::Skipped),
            StepState::UpstreamFailed => Ok(StepOutcome::UpstreamFailed),
            StepState::Pending | StepState::Running => {
                Err(QueryError::NotYetTerminal(name.to_string()))
            }
        }
    }

    /// Drives the graph until no step is pending.
    ///
    /// # Errors
    ///
    /// `InvalidBranchSelection` aborts the run immediately; `Cancelled` is
    /// returned when cancellation was requested at a wave boundary. Step
    /// failures never surface here: they become `Failed` states.
    pub async fn execute(&mut self) -> Result<(), DagflowError> {
        let graph = self.graph;
        self.ctx
            .emit(
                "run.started",
                Some(json!({
                    "graph": graph.name,
                    "run_id": self.ctx.run_id().to_string(),
                    "steps": graph.step_count(),
                })),
            )
            .await;

        loop {
            if self.ctx.is_cancelled() {
                let reason = self
                    .ctx
                    .cancel_reason()
                    .unwrap_or_else(|| "cancelled".to_string());
                return Err(DagflowError::Cancelled { reason });
            }

            let ready = self.ready_steps();
            if ready.is_empty() {
                let stuck: Vec<&String> = self
                    .states
                    .iter()
                    .filter(|(_, s)| !s.is_terminal())
                    .map(|(n, _)| n)
                    .collect();
                if !stuck.is_empty() {
                    return Err(DagflowError::Internal(format!(
                        "no runnable steps but {stuck:?} never became ready"
                    )));
                }
                break;
            }

            let mut handles: Vec<JoinHandle<(String, Result<serde_json::Value, StepExhausted>)>> =
                Vec::new();

            for name in ready {
                let Some(spec) = graph.specs.get(&name) else {
                    continue;
                };
                let pred_states = self.effective_predecessor_states(spec);
                match spec.trigger_rule.evaluate(&pred_states) {
                    Admission::Skip => {
                        self.transition(&name, StepState::Skipped);
                        self.ctx
                            .emit("step.skipped", Some(json!({"step": name, "label": spec.label()})))
                            .await;
                    }
                    Admission::UpstreamFailed => {
                        self.transition(&name, StepState::UpstreamFailed);
                        self.ctx
                            .emit(
                                "step.upstream_failed",
                                Some(json!({"step": name, "label": spec.label()})),
                            )
                            .await;
                    }
                    Admission::Run => {
                        self.transition(&name, StepState::Running);
                        self.ctx
                            .emit("step.started", Some(json!({"step": name, "label": spec.label()})))
                            .await;

                        let step_ctx =
                            StepContext::new(self.ctx.clone(), name.clone(), self.collect_inputs(spec));
                        let runner = Arc::clone(&spec.runner);
                        let policy = spec
                            .retry
                            .clone()
                            .unwrap_or_else(|| graph.default_retry.clone());
                        let hook = spec.on_failure.clone();
                        let step_name = name.clone();

                        handles.push(tokio::spawn(async move {
                            let outcome =
                                drive_step(&step_name, runner.as_ref(), &policy, hook.as_deref(), &step_ctx)
                                    .await;
                            (step_name, outcome)
                        }));
                    }
                }
            }

            // Fan-in barrier: the wave completes before the next scan.
            for joined in join_all(handles).await {
                let (name, outcome) = joined
                    .map_err(|e| DagflowError::Internal(format!("worker task failed: {e}")))?;
                match outcome {
                    Ok(value) => self.complete_success(&name, value).await?,
                    Err(exhausted) => {
                        let message = format!("{exhausted}: {}", exhausted.source);
                        self.transition(&name, StepState::Failed);
                        self.failures.insert(name.clone(), message.clone());
                        self.ctx
                            .emit(
                                "step.failed",
                                Some(json!({
                                    "step": name,
                                    "attempts": exhausted.attempts,
                                    "error": message,
                                })),
                            )
                            .await;
                    }
                }
            }
        }

        self.finished_at = Some(Utc::now());
        let mut counts: HashMap<String, usize> = HashMap::new();
        for state in self.states.values() {
            *counts.entry(state.to_string()).or_default() += 1;
        }
        self.ctx
            .emit(
                "run.completed",
                Some(json!({
                    "graph": graph.name,
                    "run_id": self.ctx.run_id().to_string(),
                    "duration_ms": self.duration_ms(),
                    "states": counts,
                })),
            )
            .await;
        Ok(())
    }

    /// Pending steps whose direct predecessors are all terminal, in
    /// declaration order.
    fn ready_steps(&self) -> Vec<String> {
        self.graph
            .order
            .iter()
            .filter(|name| self.states.get(*name) == Some(&StepState::Pending))
            .filter(|name| {
                self.graph.specs.get(*name).is_some_and(|spec| {
                    spec.predecessors.iter().all(|p| {
                        self.states.get(p).copied().unwrap_or_default().is_terminal()
                    })
                })
            })
            .cloned()
            .collect()
    }

    /// The states a trigger rule sees: a not-taken branch edge reads as
    /// `Skipped` regardless of the producer's actual state.
    fn effective_predecessor_states(&self, spec: &StepSpec) -> Vec<StepState> {
        spec.predecessors
            .iter()
            .map(|p| {
                if self.edge_unchosen(p, &spec.name) {
                    StepState::Skipped
                } else {
                    self.states.get(p).copied().unwrap_or_default()
                }
            })
            .collect()
    }

    fn edge_unchosen(&self, producer: &str, consumer: &str) -> bool {
        self.unchosen
            .get(producer)
            .is_some_and(|targets| targets.contains(consumer))
    }

    /// Values of every predecessor that succeeded along a taken edge.
    fn collect_inputs(&self, spec: &StepSpec) -> StepInputs {
        let mut outputs = HashMap::new();
        for pred in &spec.predecessors {
            if self.edge_unchosen(pred, &spec.name) {
                continue;
            }
            if self.states.get(pred).copied() == Some(StepState::Succeeded) {
                if let Some(value) = self.values.get(pred) {
                    outputs.insert(pred.clone(), value.clone());
                }
            }
        }
        StepInputs::new(outputs, spec.predecessors.clone(), &spec.name, true)
    }

    async fn complete_success(
        &mut self,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), DagflowError> {
        if let Some(candidates) = self.graph.branches.get(name) {
            let Some(selected) = value.as_str().map(str::to_string) else {
                self.transition(name, StepState::Failed);
                self.failures
                    .insert(name.to_string(), format!("branch returned non-string selection {value}"));
                return Err(InvalidBranchSelection {
                    step: name.to_string(),
                    selected: value.to_string(),
                    candidates: candidates.clone(),
                }
                .into());
            };
            if !candidates.iter().any(|c| *c == selected) {
                self.transition(name, StepState::Failed);
                self.failures
                    .insert(name.to_string(), format!("branch selected undeclared target '{selected}'"));
                return Err(InvalidBranchSelection {
                    step: name.to_string(),
                    selected,
                    candidates: candidates.clone(),
                }
                .into());
            }
            let not_taken: HashSet<String> = candidates
                .iter()
                .filter(|c| **c != selected)
                .cloned()
                .collect();
            debug!(branch = %name, target = %selected, "branch selected target");
            self.unchosen.insert(name.to_string(), not_taken);
            self.chosen.insert(name.to_string(), selected);
        }

        self.values.insert(name.to_string(), value);
        self.transition(name, StepState::Succeeded);
        self.ctx
            .emit("step.succeeded", Some(json!({"step": name})))
            .await;
        Ok(())
    }

    /// Assigns the next state. Terminal states are never overwritten.
    fn transition(&mut self, name: &str, next: StepState) {
        if let Some(slot) = self.states.get_mut(name) {
            debug_assert!(!slot.is_terminal(), "step '{name}' already terminal");
            *slot = next;
            debug!(step = %name, state = %next, "step transition");
        }
    }
}

/// Runs one step's retry loop to completion on its worker task.
async fn drive_step(
    name: &str,
    runner: &dyn Step,
    policy: &RetryPolicy,
    hook: Option<&dyn FailureHook>,
    ctx: &StepContext,
) -> Result<serde_json::Value, StepExhausted> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match runner.execute(ctx).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if policy.is_exhausted(attempt) {
                    let exhausted = StepExhausted {
                        step: name.to_string(),
                        attempts: attempt,
                        source: error,
                    };
                    invoke_hook(hook, name, attempt, &exhausted);
                    return Err(exhausted);
                }
                let cause: &(dyn std::error::Error + 'static) = error.as_ref();
                invoke_hook(hook, name, attempt, cause);

                let delay = policy.delay_after(attempt);
                ctx.try_emit(
                    "step.retrying",
                    Some(json!({
                        "step": name,
                        "attempt": attempt,
                        "delay_ms": delay.as_millis() as u64,
                        "error": error.to_string(),
                    })),
                );
                debug!(step = %name, attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Hook errors are logged and swallowed, never re-raised into the graph.
fn invoke_hook(
    hook: Option<&dyn FailureHook>,
    step: &str,
    attempt: usize,
    error: &(dyn std::error::Error + 'static),
) {
    if let Some(hook) = hook {
        if let Err(hook_err) = hook.on_failure(step, attempt, error) {
            warn!(step = %step, attempt, error = %hook_err, "failure hook raised; ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::step::NoOpStep;

    fn noop() -> Arc<dyn Step> {
        Arc::new(NoOpStep::new())
    }

    #[test]
    fn test_empty_graph_rejected() {
        let graph = GraphBuilder::new("empty").build();
        let err = graph.begin(RunContext::new()).unwrap_err();
        assert!(matches!(
            err,
            DagflowError::Validation(GraphValidationError::EmptyGraph)
        ));
    }

    #[test]
    fn test_unknown_predecessor_rejected() {
        let graph = GraphBuilder::new("bad")
            .step("load", noop(), &["extract"])
            .build();
        let err = graph.begin(RunContext::new()).unwrap_err();
        assert!(matches!(
            err,
            DagflowError::Validation(GraphValidationError::UnknownPredecessor { .. })
        ));
    }

    #[test]
    fn test_cycle_detected_at_run_start() {
        let graph = GraphBuilder::new("cyclic")
            .step("a", noop(), &["c"])
            .step("b", noop(), &["a"])
            .step("c", noop(), &["b"])
            .build();
        let err = graph.begin(RunContext::new()).unwrap_err();
        assert!(matches!(err, DagflowError::Cycle(_)));
    }

    #[test]
    fn test_branch_candidate_must_be_successor() {
        let graph = GraphBuilder::new("bad_branch")
            .branch("route", noop(), &[], &["detached"])
            .step("detached", noop(), &[])
            .build();
        let err = graph.begin(RunContext::new()).unwrap_err();
        assert!(matches!(
            err,
            DagflowError::Validation(GraphValidationError::CandidateNotSuccessor { .. })
        ));
    }

    #[tokio::test]
    async fn test_single_step_run() {
        let graph = GraphBuilder::new("one").step("only", noop(), &[]).build();
        let run = graph.run(RunContext::new()).await.unwrap();
        assert!(run.is_complete());
        assert_eq!(run.state("only"), Some(StepState::Succeeded));
        assert!(run.duration_ms().is_some());
    }

    #[tokio::test]
    async fn test_query_before_execute() {
        let graph = GraphBuilder::new("one").step("only", noop(), &[]).build();
        let run = graph.begin(RunContext::new()).unwrap();

        assert_eq!(
            run.result("only"),
            Err(QueryError::NotYetTerminal("only".into()))
        );
        assert_eq!(
            run.result("ghost"),
            Err(QueryError::UnknownStep("ghost".into()))
        );
    }

    #[tokio::test]
    async fn test_cancellation_before_first_wave() {
        let graph = GraphBuilder::new("one").step("only", noop(), &[]).build();
        let ctx = RunContext::new();
        ctx.cancel("shutting down");

        let mut run = graph.begin(ctx).unwrap();
        let err = run.execute().await.unwrap_err();
        assert!(matches!(err, DagflowError::Cancelled { reason } if reason == "shutting down"));
        assert_eq!(run.state("only"), Some(StepState::Pending));
    }
}
