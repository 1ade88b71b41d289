use std::time::Duration;

use oracle_common::{utils::time::Millis, QuorumPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::validator::ValidationPolicy;

/// Tunables for the aggregator side of consensus. Fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Relative tolerance two prices may differ by and still agree (0.005 = 0.5%).
    pub tolerance: Decimal,
    pub quorum: QuorumPolicy,
    pub round_duration_ms: u64,
    /// How long a closed round id stays recognised for late reports.
    pub grace_period_ms: u64,
    /// How far before round open an observation may have been taken.
    pub staleness_window_ms: u64,
    /// How far ahead of the aggregator clock an observation may claim to be.
    pub max_clock_skew_ms: u64,
    /// Number of rounds kept in memory.
    pub round_history: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(5, 3),
            quorum: QuorumPolicy::default(),
            round_duration_ms: 30_000,
            grace_period_ms: 30_000,
            staleness_window_ms: 60_000,
            max_clock_skew_ms: 2_000,
            round_history: 256,
        }
    }
}

impl ConsensusConfig {
    pub fn round_duration(&self) -> Duration {
        Duration::from_millis(self.round_duration_ms)
    }

    pub fn round_duration_millis(&self) -> Millis {
        Millis::try_from(self.round_duration_ms).unwrap_or(Millis::MAX)
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            staleness_window_ms: self.staleness_window_ms,
            max_clock_skew_ms: self.max_clock_skew_ms,
            grace_period_ms: self.grace_period_ms,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.quorum.validate()?;
        if self.tolerance < Decimal::ZERO || self.tolerance >= Decimal::ONE {
            return Err(format!("tolerance {} must be in [0, 1)", self.tolerance));
        }
        if self.round_duration_ms == 0 {
            return Err("round_duration_ms must be positive".into());
        }
        if self.round_history == 0 {
            return Err("round_history must keep at least one round".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConsensusConfig::default();
        assert_eq!(config.tolerance, dec!(0.005));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ConsensusConfig = serde_json::from_str(r#"{"tolerance": "0.01", "round_duration_ms": 5000}"#).unwrap();
        assert_eq!(config.tolerance, dec!(0.01));
        assert_eq!(config.round_duration_ms, 5000);
        assert_eq!(config.quorum, QuorumPolicy::default());
    }

    #[test]
    fn test_rejects_bad_tolerance() {
        let config = ConsensusConfig { tolerance: dec!(1.5), ..Default::default() };
        assert!(config.validate().is_err());
    }
}
