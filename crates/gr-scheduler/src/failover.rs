//! Per-endpoint failover decisions.

use gr_core::ErrorKind;
use serde::Serialize;

/// What the orchestrator does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailoverAction {
    /// Attempt the same endpoint again immediately.
    RetrySame,
    /// Give up on this endpoint and continue with the next in the chain.
    Advance,
    /// Put this endpoint into cooldown, then continue with the next.
    CoolDownAndAdvance,
    /// Stop the whole walk. Only produced for cancellation.
    Abort,
}

/// Remaining in-place retries for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    transient: u32,
    malformed: u32,
}

impl RetryBudget {
    pub fn new(transient: u32, malformed: u32) -> Self {
        Self {
            transient,
            malformed,
        }
    }
}

/// Decide the next step for a failure classified as `kind`, consuming
/// retry budget when a retry is granted.
pub fn decide_action(kind: ErrorKind, budget: &mut RetryBudget) -> FailoverAction {
    match kind {
        ErrorKind::RateLimited => FailoverAction::CoolDownAndAdvance,
        ErrorKind::TransientUnavailable => spend(&mut budget.transient),
        ErrorKind::MalformedResponse => spend(&mut budget.malformed),
        // Exhaustion is a walk-level outcome; reported per endpoint it just moves on.
        ErrorKind::Rejected | ErrorKind::ExhaustedAllEndpoints => FailoverAction::Advance,
        ErrorKind::Cancelled => FailoverAction::Abort,
    }
}

fn spend(remaining: &mut u32) -> FailoverAction {
    if *remaining > 0 {
        *remaining -= 1;
        FailoverAction::RetrySame
    } else {
        FailoverAction::Advance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_never_retries() {
        let mut budget = RetryBudget::new(1, 1);
        assert_eq!(
            decide_action(ErrorKind::RateLimited, &mut budget),
            FailoverAction::CoolDownAndAdvance
        );
        assert_eq!(budget, RetryBudget::new(1, 1));
    }

    #[test]
    fn test_transient_retries_once_then_advances() {
        let mut budget = RetryBudget::new(1, 1);
        assert_eq!(
            decide_action(ErrorKind::TransientUnavailable, &mut budget),
            FailoverAction::RetrySame
        );
        assert_eq!(
            decide_action(ErrorKind::TransientUnavailable, &mut budget),
            FailoverAction::Advance
        );
    }

    #[test]
    fn test_malformed_budget_is_independent() {
        let mut budget = RetryBudget::new(1, 1);
        assert_eq!(
            decide_action(ErrorKind::TransientUnavailable, &mut budget),
            FailoverAction::RetrySame
        );
        assert_eq!(
            decide_action(ErrorKind::MalformedResponse, &mut budget),
            FailoverAction::RetrySame
        );
        assert_eq!(
            decide_action(ErrorKind::MalformedResponse, &mut budget),
            FailoverAction::Advance
        );
    }

    #[test]
    fn test_zero_budget_advances_immediately() {
        let mut budget = RetryBudget::new(0, 0);
        assert_eq!(
            decide_action(ErrorKind::TransientUnavailable, &mut budget),
            FailoverAction::Advance
        );
        assert_eq!(
            decide_action(ErrorKind::MalformedResponse, &mut budget),
            FailoverAction::Advance
        );
    }

    #[test]
    fn test_rejected_advances_without_retry() {
        let mut budget = RetryBudget::new(1, 1);
        assert_eq!(
            decide_action(ErrorKind::Rejected, &mut budget),
            FailoverAction::Advance
        );
    }

    #[test]
    fn test_only_cancellation_aborts() {
        let kinds = [
            ErrorKind::RateLimited,
            ErrorKind::TransientUnavailable,
            ErrorKind::MalformedResponse,
            ErrorKind::Rejected,
            ErrorKind::ExhaustedAllEndpoints,
        ];
        for kind in kinds {
            let mut budget = RetryBudget::new(0, 0);
            assert_ne!(decide_action(kind, &mut budget), FailoverAction::Abort, "{kind}");
        }
        let mut budget = RetryBudget::new(1, 1);
        assert_eq!(
            decide_action(ErrorKind::ExhaustedAllEndpoints, &mut budget),
            FailoverAction::Advance
        );
    }

    #[test]
    fn test_cancelled_aborts() {
        let mut budget = RetryBudget::new(1, 1);
        assert_eq!(
            decide_action(ErrorKind::Cancelled, &mut budget),
            FailoverAction::Abort
        );
    }
}
