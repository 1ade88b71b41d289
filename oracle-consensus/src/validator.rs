use std::sync::Arc;

use serde::{Deserialize, Serialize};

use oracle_common::{
    auth::ed25519::verify_with_key,
    utils::time::Millis,
    NodeRoster, PriceReport, RejectReason, RoundInfo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    pub staleness_window_ms: u64,
    pub max_clock_skew_ms: u64,
    pub grace_period_ms: u64,
}

fn ms(v: u64) -> Millis {
    Millis::try_from(v).unwrap_or(Millis::MAX)
}

/// Gatekeeper in front of the consensus engine.
///
/// Checks run in a fixed order: identity, signature, freshness, round. The first
/// failing check decides the rejection reason.
#[derive(Debug, Clone)]
pub struct ReportValidator {
    roster: Arc<NodeRoster>,
    policy: ValidationPolicy,
}

impl ReportValidator {
    pub fn new(roster: Arc<NodeRoster>, policy: ValidationPolicy) -> Self {
        Self { roster, policy }
    }

    /// `round` is the aggregator's current view of `report.round_id`, if it tracks it.
    pub fn validate(
        &self,
        report: PriceReport,
        round: Option<&RoundInfo>,
        now: Millis,
    ) -> Result<PriceReport, RejectReason> {
        let public_key = self
            .roster
            .public_key(&report.node_id)
            .ok_or(RejectReason::UnknownNode)?;

        let message = report
            .signing_bytes()
            .map_err(|e| RejectReason::Malformed(e.to_string()))?;
        if !verify_with_key(&message, &report.signature, public_key) {
            return Err(RejectReason::InvalidSignature);
        }

        if let Some(round) = round {
            self.check_freshness(&report, round, now)?;
        }

        self.check_round(round, now)?;

        Ok(report)
    }

    fn check_freshness(&self, report: &PriceReport, round: &RoundInfo, now: Millis) -> Result<(), RejectReason> {
        let oldest = round.opened_at.saturating_sub(ms(self.policy.staleness_window_ms));
        if report.observed_at < oldest {
            return Err(RejectReason::StaleTimestamp);
        }

        let newest = now.saturating_add(ms(self.policy.max_clock_skew_ms));
        if report.observed_at > newest {
            return Err(RejectReason::FutureTimestamp);
        }
        Ok(())
    }

    /// Open rounds pass. Closed rounds pass inside the grace period and the engine
    /// refuses them; past it they are refused here. Either way a round that is still
    /// tracked answers `StaleRound`, and only untracked ids are `UnknownRound`.
    fn check_round(&self, round: Option<&RoundInfo>, now: Millis) -> Result<(), RejectReason> {
        let round = round.ok_or(RejectReason::UnknownRound)?;
        if round.is_open() {
            return Ok(());
        }

        let closed_at = round.closed_at.unwrap_or(round.deadline);
        if now.saturating_sub(closed_at) > ms(self.policy.grace_period_ms) {
            return Err(RejectReason::StaleRound);
        }
        Ok(())
    }
}
