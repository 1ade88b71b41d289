use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::{time::Millis, NodeId, RoundId};

/// Lifecycle of a consensus round. Transitions only ever leave `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundState {
    Open,
    Finalized,
    TimedOut,
}

impl RoundState {
    pub fn is_closed(self) -> bool {
        !matches!(self, RoundState::Open)
    }
}

impl Default for RoundState {
    fn default() -> Self {
        Self::Open
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoundState::Open => "Open",
            RoundState::Finalized => "Finalized",
            RoundState::TimedOut => "TimedOut",
        };
        write!(f, "{}", s)
    }
}

/// Public view of a round, handed to nodes during the round handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub round_id: RoundId,
    pub opened_at: Millis,
    pub deadline: Millis,
    pub state: RoundState,
    /// When the round left `Open`, if it has.
    pub closed_at: Option<Millis>,
}

impl RoundInfo {
    pub fn is_open(&self) -> bool {
        self.state == RoundState::Open
    }
}

/// Agreed BTC/USD price for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusPrice {
    pub round_id: RoundId,
    pub price: Decimal,
    pub contributing_nodes: BTreeSet<NodeId>,
    /// Cluster size divided by the number of reports received in the round.
    pub agreement_ratio: f64,
}

/// How a round closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Finalized(ConsensusPrice),
    /// Quorum was not reached by the deadline; consumers see "no price this round".
    TimedOut {
        round_id: RoundId,
        reports_received: usize,
        largest_cluster: usize,
        quorum_threshold: usize,
    },
}

impl RoundOutcome {
    pub fn round_id(&self) -> RoundId {
        match self {
            RoundOutcome::Finalized(price) => price.round_id,
            RoundOutcome::TimedOut { round_id, .. } => *round_id,
        }
    }

    pub fn state(&self) -> RoundState {
        match self {
            RoundOutcome::Finalized(_) => RoundState::Finalized,
            RoundOutcome::TimedOut { .. } => RoundState::TimedOut,
        }
    }

    pub fn consensus_price(&self) -> Option<&ConsensusPrice> {
        match self {
            RoundOutcome::Finalized(price) => Some(price),
            RoundOutcome::TimedOut { .. } => None,
        }
    }
}

/// Fraction of registered nodes that must agree, kept as an exact ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumPolicy {
    pub numerator: usize,
    pub denominator: usize,
    /// Lower bound on the threshold regardless of roster size.
    pub min_reports: usize,
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self { numerator: 2, denominator: 3, min_reports: 1 }
    }
}

impl QuorumPolicy {
    /// `max(min_reports, ceil(registered * numerator / denominator))`.
    pub fn threshold(&self, registered: usize) -> usize {
        let denominator = self.denominator.max(1);
        let scaled = registered * self.numerator;
        let ceil = (scaled + denominator - 1) / denominator;
        ceil.max(self.min_reports)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.denominator == 0 {
            return Err("quorum denominator must be non-zero".into());
        }
        if self.numerator == 0 || self.numerator > self.denominator {
            return Err(format!(
                "quorum fraction {}/{} must be in (0, 1]",
                self.numerator, self.denominator
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_thirds_threshold() {
        let policy = QuorumPolicy::default();
        assert_eq!(policy.threshold(5), 4);
        assert_eq!(policy.threshold(3), 2);
        assert_eq!(policy.threshold(4), 3);
        assert_eq!(policy.threshold(6), 4);
        assert_eq!(policy.threshold(9), 6);
        assert_eq!(policy.threshold(1), 1);
    }

    #[test]
    fn test_min_reports_floor() {
        let policy = QuorumPolicy { numerator: 2, denominator: 3, min_reports: 3 };
        assert_eq!(policy.threshold(2), 3);
        assert_eq!(policy.threshold(0), 3);
    }

    #[test]
    fn test_policy_validation() {
        assert!(QuorumPolicy::default().validate().is_ok());
        assert!(QuorumPolicy { numerator: 1, denominator: 0, min_reports: 1 }.validate().is_err());
        assert!(QuorumPolicy { numerator: 4, denominator: 3, min_reports: 1 }.validate().is_err());
        assert!(QuorumPolicy { numerator: 0, denominator: 3, min_reports: 1 }.validate().is_err());
    }

    #[test]
    fn test_round_state_transitions_are_closed() {
        assert!(!RoundState::Open.is_closed());
        assert!(RoundState::Finalized.is_closed());
        assert!(RoundState::TimedOut.is_closed());
    }
}
