//! Trigger rules: admission predicates over predecessor states.

use super::StepState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decides whether a step may run once all its predecessors are terminal.
///
/// Rules are evaluated against *effective* predecessor states: an edge left
/// not-taken by a branch decision reads as `Skipped` regardless of what the
/// branch step itself did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    /// Admitted only if every predecessor succeeded.
    #[default]
    AllSuccess,
    /// Admitted if at least one predecessor failed.
    OneFailed,
    /// Admitted if no predecessor failed and at least one succeeded.
    NoneFailedMinOneSuccess,
}

impl fmt::Display for TriggerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllSuccess => write!(f, "all_success"),
            Self::OneFailed => write!(f, "one_failed"),
            Self::NoneFailedMinOneSuccess => write!(f, "none_failed_min_one_success"),
        }
    }
}

/// The outcome of a trigger-rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The step is admitted and its unit of work executes.
    Run,
    /// The step is rejected; it becomes `Skipped` without running.
    Skip,
    /// The step is rejected because a predecessor failed; it becomes
    /// `UpstreamFailed` without running.
    UpstreamFailed,
}

impl TriggerRule {
    /// Evaluates the rule against the given predecessor states.
    ///
    /// All predecessors must already be terminal. A step with no
    /// predecessors is always admitted.
    #[must_use]
    pub fn evaluate(self, predecessors: &[StepState]) -> Admission {
        if predecessors.is_empty() {
            return Admission::Run;
        }
        debug_assert!(predecessors.iter().all(|s| s.is_terminal()));

        let any_failed = predecessors.iter().any(|s| s.is_failure());
        let any_success = predecessors.iter().any(|s| s.is_success());

        match self {
            Self::AllSuccess => {
                if predecessors.iter().all(|s| s.is_success()) {
                    Admission::Run
                } else {
                    Admission::Skip
                }
            }
            Self::OneFailed => {
                if any_failed {
                    Admission::Run
                } else {
                    Admission::Skip
                }
            }
            Self::NoneFailedMinOneSuccess => {
                if any_failed {
                    Admission::UpstreamFailed
                } else if any_success {
                    Admission::Run
                } else {
                    Admission::Skip
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StepState::{Failed, Skipped, Succeeded, UpstreamFailed as Upstream};

    #[test]
    fn test_no_predecessors_always_admitted() {
        assert_eq!(TriggerRule::AllSuccess.evaluate(&[]), Admission::Run);
        assert_eq!(TriggerRule::OneFailed.evaluate(&[]), Admission::Run);
        assert_eq!(
            TriggerRule::NoneFailedMinOneSuccess.evaluate(&[]),
            Admission::Run
        );
    }

    #[test]
    fn test_all_success() {
        let rule = TriggerRule::AllSuccess;
        assert_eq!(rule.evaluate(&[Succeeded, Succeeded]), Admission::Run);
        assert_eq!(rule.evaluate(&[Succeeded, Skipped]), Admission::Skip);
        assert_eq!(rule.evaluate(&[Succeeded, Failed]), Admission::Skip);
        assert_eq!(rule.evaluate(&[Upstream]), Admission::Skip);
    }

    #[test]
    fn test_one_failed() {
        let rule = TriggerRule::OneFailed;
        assert_eq!(rule.evaluate(&[Succeeded, Failed]), Admission::Run);
        assert_eq!(rule.evaluate(&[Skipped, Upstream]), Admission::Run);
        assert_eq!(rule.evaluate(&[Succeeded, Skipped]), Admission::Skip);
        assert_eq!(rule.evaluate(&[Succeeded]), Admission::Skip);
    }

    #[test]
    fn test_none_failed_min_one_success_truth_table() {
        let rule = TriggerRule::NoneFailedMinOneSuccess;

        // No failures, at least one success: admitted.
        assert_eq!(rule.evaluate(&[Succeeded, Skipped]), Admission::Run);
        assert_eq!(rule.evaluate(&[Skipped, Succeeded]), Admission::Run);
        assert_eq!(rule.evaluate(&[Succeeded, Succeeded]), Admission::Run);
        assert_eq!(rule.evaluate(&[Succeeded]), Admission::Run);

        // Any failure rejects as upstream-failed, regardless of successes.
        assert_eq!(rule.evaluate(&[Failed, Skipped]), Admission::UpstreamFailed);
        assert_eq!(
            rule.evaluate(&[Succeeded, Failed]),
            Admission::UpstreamFailed
        );
        assert_eq!(rule.evaluate(&[Upstream, Skipped]), Admission::UpstreamFailed);

        // All skipped: nothing succeeded, nothing failed.
        assert_eq!(rule.evaluate(&[Skipped, Skipped]), Admission::Skip);
    }

    #[test]
    fn test_display() {
        assert_eq!(TriggerRule::AllSuccess.to_string(), "all_success");
        assert_eq!(
            TriggerRule::NoneFailedMinOneSuccess.to_string(),
            "none_failed_min_one_success"
        );
    }
}
