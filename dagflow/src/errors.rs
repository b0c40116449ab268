//! Error types for graph construction, execution, and queries.

use thiserror::Error;

/// The main error type for graph-level operations.
///
/// Step-level failures are not represented here: a step that exhausts its
/// retries transitions to the `Failed` state and the run keeps going. Only
/// malformed graphs and aborted runs surface through this type.
#[derive(Debug, Error)]
pub enum DagflowError {
    /// The declared graph is structurally invalid.
    #[error(transparent)]
    Validation(#[from] GraphValidationError),

    /// The dependency graph is not acyclic.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A branch step selected a target outside its candidate set.
    #[error(transparent)]
    InvalidBranchSelection(#[from] InvalidBranchSelection),

    /// The run was cancelled at a wave boundary.
    #[error("run cancelled: {reason}")]
    Cancelled {
        /// The reason recorded when cancellation was requested.
        reason: String,
    },

    /// An invariant of the executor was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error raised when the declared graph fails structural validation.
///
/// Registration through the builder is infallible; every check runs lazily
/// at run start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphValidationError {
    /// The graph has no steps at all.
    #[error("graph has no steps")]
    EmptyGraph,

    /// The same step name was registered more than once.
    #[error("step '{0}' declared more than once")]
    DuplicateStep(String),

    /// A step lists a predecessor that was never declared.
    #[error("step '{step}' depends on unknown step '{predecessor}'")]
    UnknownPredecessor {
        /// The step declaring the edge.
        step: String,
        /// The missing predecessor name.
        predecessor: String,
    },

    /// A step lists itself as a predecessor.
    #[error("step '{0}' cannot depend on itself")]
    SelfDependency(String),

    /// A branch group lists a candidate that was never declared.
    #[error("branch '{step}' lists unknown candidate '{candidate}'")]
    UnknownBranchCandidate {
        /// The branch step.
        step: String,
        /// The missing candidate name.
        candidate: String,
    },

    /// A branch candidate exists but has no edge from the branch step.
    #[error("branch candidate '{candidate}' does not declare '{step}' as a predecessor")]
    CandidateNotSuccessor {
        /// The branch step.
        step: String,
        /// The candidate missing the edge.
        candidate: String,
    },
}

/// Error raised when the dependency graph contains a cycle.
///
/// The path lists the steps along the cycle, first step repeated at the end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle: {}", .path.join(" -> "))]
pub struct CycleError {
    /// The steps forming the cycle.
    pub path: Vec<String>,
}

impl CycleError {
    /// Creates a new cycle error from the offending path.
    #[must_use]
    pub fn new(path: Vec<String>) -> Self {
        Self { path }
    }
}

/// Error raised when a branch step selects an undeclared target.
///
/// This indicates a malformed graph rather than a runtime condition, so it
/// aborts the run immediately instead of transitioning into graph state.
#[derive(Debug, Error)]
#[error("branch '{step}' selected '{selected}', expected one of: {}", .candidates.join(", "))]
pub struct InvalidBranchSelection {
    /// The branch step that made the selection.
    pub step: String,
    /// What the branch work actually returned.
    pub selected: String,
    /// The declared candidate successors.
    pub candidates: Vec<String>,
}

/// Error produced when a step exhausts its retry budget.
///
/// Never returned from `run()`: the executor converts it into the `Failed`
/// state so independent branches keep executing. It is passed to the
/// failure hook as the final error context and its message is preserved in
/// the step's recorded outcome.
#[derive(Debug, Error)]
#[error("step '{step}' failed after {attempts} attempt(s)")]
pub struct StepExhausted {
    /// The step that ran out of attempts.
    pub step: String,
    /// How many times the unit of work was invoked.
    pub attempts: usize,
    /// The error from the last attempt.
    #[source]
    pub source: anyhow::Error,
}

/// Error raised by result queries against a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The queried step was never declared.
    #[error("unknown step '{0}'")]
    UnknownStep(String),

    /// The run has not reached a terminal state for the queried step.
    #[error("step '{0}' has not reached a terminal state")]
    NotYetTerminal(String),
}

/// Error raised when a step reads an output it never declared a dependency on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step '{step}' read output of '{dependency}' without declaring it as a predecessor")]
pub struct UndeclaredDependencyError {
    /// The step doing the read.
    pub step: String,
    /// The undeclared producer.
    pub dependency: String,
}

impl UndeclaredDependencyError {
    /// Creates a new undeclared dependency error.
    #[must_use]
    pub fn new(step: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            dependency: dependency.into(),
        }
    }
}
