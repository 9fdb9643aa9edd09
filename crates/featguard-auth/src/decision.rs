//! Decision strategies and vote aggregation.
//!
//! The same [`DecisionStrategy`] enum drives two distinct aggregations:
//!
//! - inside a [`Permission`](crate::Permission), combining its policies;
//! - inside the [`SecurityManager`](crate::SecurityManager), combining the
//!   permissions that match one resource.
//!
//! Both go through a fresh [`DecisionEvaluator`].

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::AuthzError;

/// How multiple boolean votes are combined into one decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStrategy {
    /// Every voter must grant.
    #[default]
    Unanimous,
    /// At least one voter must grant.
    Affirmative,
}

impl DecisionStrategy {
    fn as_u8(self) -> u8 {
        match self {
            Self::Unanimous => 0,
            Self::Affirmative => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Affirmative,
            _ => Self::Unanimous,
        }
    }
}

impl fmt::Display for DecisionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unanimous => write!(f, "unanimous"),
            Self::Affirmative => write!(f, "affirmative"),
        }
    }
}

impl FromStr for DecisionStrategy {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unanimous" => Ok(Self::Unanimous),
            "affirmative" => Ok(Self::Affirmative),
            other => Err(AuthzError::invalid_configuration(format!(
                "The 'decision_strategy' must be one of the allowed values, got '{other}'"
            ))),
        }
    }
}

// =============================================================================
// Global Decision Strategy
// =============================================================================

static GLOBAL_DECISION_STRATEGY: AtomicU8 = AtomicU8::new(0);

/// Process-wide strategy applied when several permissions match one resource.
///
/// Defaults to [`DecisionStrategy::Unanimous`].
#[must_use]
pub fn global_decision_strategy() -> DecisionStrategy {
    DecisionStrategy::from_u8(GLOBAL_DECISION_STRATEGY.load(Ordering::Acquire))
}

/// Replace the process-wide strategy. Meant for startup or admin actions.
pub fn set_global_decision_strategy(strategy: DecisionStrategy) {
    tracing::info!(strategy = %strategy, "Setting global decision strategy");
    GLOBAL_DECISION_STRATEGY.store(strategy.as_u8(), Ordering::Release);
}

// =============================================================================
// Decision Evaluator
// =============================================================================

/// Counts grant/deny votes until the strategy's quorum is reached.
#[derive(Debug)]
pub struct DecisionEvaluator {
    strategy: DecisionStrategy,
    grant_quorum: usize,
    deny_quorum: usize,
    grant_count: usize,
    deny_count: usize,
    decision: Option<bool>,
    explanations: Vec<String>,
}

impl DecisionEvaluator {
    /// Create an evaluator expecting `voters` votes.
    #[must_use]
    pub fn new(strategy: DecisionStrategy, voters: usize) -> Self {
        let (grant_quorum, deny_quorum) = match strategy {
            DecisionStrategy::Unanimous => (voters, 1),
            DecisionStrategy::Affirmative => (1, voters),
        };
        Self {
            strategy,
            grant_quorum,
            deny_quorum,
            grant_count: 0,
            deny_count: 0,
            decision: None,
            explanations: Vec::new(),
        }
    }

    #[must_use]
    pub fn strategy(&self) -> DecisionStrategy {
        self.strategy
    }

    /// Returns `true` once a quorum has been reached.
    #[must_use]
    pub fn is_decided(&self) -> bool {
        self.decision.is_some()
    }

    /// Record one vote. Votes cast after the decision are discarded.
    pub fn add_grant(&mut self, granted: bool, explanation: Option<String>) {
        if self.is_decided() {
            tracing::warn!("Grant decision already taken, discarding vote");
            return;
        }

        if granted {
            self.grant_count += 1;
        } else {
            self.deny_count += 1;
            if let Some(explanation) = explanation {
                self.explanations.push(explanation);
            }
        }

        if self.grant_count >= self.grant_quorum && self.grant_count > 0 {
            self.decision = Some(true);
        }
        if self.deny_count >= self.deny_quorum && self.deny_count > 0 {
            self.decision = Some(false);
        }
    }

    /// Final decision and collected denial explanations.
    ///
    /// An evaluator that never reached a quorum (no voters) denies.
    #[must_use]
    pub fn decision(self) -> (bool, Vec<String>) {
        (self.decision.unwrap_or(false), self.explanations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(strategy: DecisionStrategy, votes: &[bool]) -> (bool, Vec<String>) {
        let mut evaluator = DecisionEvaluator::new(strategy, votes.len());
        for (i, vote) in votes.iter().enumerate() {
            evaluator.add_grant(*vote, Some(format!("voter {i}")));
            if evaluator.is_decided() {
                break;
            }
        }
        evaluator.decision()
    }

    #[test]
    fn test_unanimous() {
        assert!(run(DecisionStrategy::Unanimous, &[true, true, true]).0);

        let (granted, explanations) = run(DecisionStrategy::Unanimous, &[true, false, true]);
        assert!(!granted);
        assert_eq!(explanations, vec!["voter 1".to_string()]);
    }

    #[test]
    fn test_affirmative() {
        assert!(run(DecisionStrategy::Affirmative, &[false, true]).0);

        let (granted, explanations) = run(DecisionStrategy::Affirmative, &[false, false]);
        assert!(!granted);
        assert_eq!(explanations.len(), 2);
    }

    #[test]
    fn test_zero_voters_denies() {
        assert!(!run(DecisionStrategy::Unanimous, &[]).0);
        assert!(!run(DecisionStrategy::Affirmative, &[]).0);
    }

    #[test]
    fn test_short_circuit_and_late_votes_ignored() {
        let mut evaluator = DecisionEvaluator::new(DecisionStrategy::Unanimous, 3);
        evaluator.add_grant(false, Some("first".into()));
        assert!(evaluator.is_decided());

        evaluator.add_grant(true, None);
        evaluator.add_grant(true, None);
        assert_eq!(evaluator.decision(), (false, vec!["first".to_string()]));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            DecisionStrategy::from_str("AFFIRMATIVE").unwrap(),
            DecisionStrategy::Affirmative
        );
        let err = DecisionStrategy::from_str("consensus").unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_strategy_default_and_serde() {
        assert_eq!(DecisionStrategy::default(), DecisionStrategy::Unanimous);
        let json = serde_json::to_string(&DecisionStrategy::Affirmative).unwrap();
        assert_eq!(json, "\"affirmative\"");
    }
}
