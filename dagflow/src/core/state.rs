//! Step lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of a step within one run.
///
/// A step transitions `Pending -> Running -> {Succeeded, Failed}` when its
/// trigger rule admits it, or straight from `Pending` to `Skipped` or
/// `UpstreamFailed` when it does not. Terminal states are assigned exactly
/// once and never revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Declared but not yet considered for execution.
    Pending,
    /// The unit of work is executing (possibly retrying).
    Running,
    /// The unit of work returned a value.
    Succeeded,
    /// Every attempt failed; retries are exhausted.
    Failed,
    /// Rejected by the trigger rule or cut off by a branch decision.
    Skipped,
    /// Rejected because a predecessor genuinely failed.
    UpstreamFailed,
}

impl Default for StepState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::UpstreamFailed => write!(f, "upstream_failed"),
        }
    }
}

impl StepState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::UpstreamFailed
        )
    }

    /// Returns true if the step produced a value.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if the step counts as failed for trigger-rule purposes.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::UpstreamFailed)
    }

    /// Returns true if the step never ran and did not fail.
    #[must_use]
    pub fn is_skipped(self) -> bool {
        matches!(self, Self::Skipped)
    }
}
