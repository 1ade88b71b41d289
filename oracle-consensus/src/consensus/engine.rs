use std::sync::Arc;

use tracing::{debug, info, warn};

use oracle_common::{
    logging::AUDIT_TARGET,
    utils::time::Millis,
    ConsensusPrice, NodeRoster, PriceReport, RejectReason, RoundId, RoundInfo, RoundOutcome,
    RoundState,
};

use crate::validator::ReportValidator;

use super::{
    config::ConsensusConfig,
    evaluator::ClusterEvaluator,
    registry::{RoundHandle, RoundRegistry},
};

/// Receipt for an accepted report.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitAck {
    pub round_id: RoundId,
    /// An earlier report from the same node in this round was overwritten.
    pub replaced: bool,
    pub reports_in_round: usize,
    /// Set when this report completed the roster and the round finalized on it.
    pub finalized: Option<ConsensusPrice>,
}

/// When a close attempt is allowed to commit a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseMode {
    /// Every registered node reported; only a finalization is committed.
    EarlyFinalize,
    /// Deadline reached; whatever the evaluator says is committed.
    Deadline,
}

/// Aggregator-side consensus: owns the round registry, validates reports, and
/// closes rounds.
///
/// Safe to share across tasks behind an `Arc`. Evaluation runs on a snapshot
/// taken under the round lock; the result is committed only if the round did not
/// change in the meantime, so a report landing mid-evaluation is never lost.
#[derive(Debug)]
pub struct ConsensusEngine {
    roster: Arc<NodeRoster>,
    config: ConsensusConfig,
    validator: ReportValidator,
    evaluator: ClusterEvaluator,
    registry: RoundRegistry,
}

impl ConsensusEngine {
    pub fn new(roster: Arc<NodeRoster>, config: ConsensusConfig) -> Self {
        let validator = ReportValidator::new(roster.clone(), config.validation_policy());
        let evaluator = ClusterEvaluator::new(config.tolerance, config.quorum);
        let registry = RoundRegistry::new(config.round_history);
        Self {
            roster,
            config,
            validator,
            evaluator,
            registry,
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn registered_nodes(&self) -> usize {
        self.roster.len()
    }

    pub fn quorum_threshold(&self) -> usize {
        self.config.quorum.threshold(self.roster.len())
    }

    /// Opens the next round. Ids are strictly increasing, starting at 1.
    pub async fn open_round(&self, opened_at: Millis, deadline: Millis) -> RoundInfo {
        let info = self.registry.open(opened_at, deadline).await;
        info!(
            target: AUDIT_TARGET,
            "EVENT:OPEN round={} opened_at={} deadline={} quorum={}",
            info.round_id.0,
            info.opened_at,
            info.deadline,
            self.quorum_threshold()
        );
        info
    }

    /// The round nodes should currently report into, if any.
    pub async fn active_round(&self, now: Millis) -> Option<RoundInfo> {
        self.registry.active(now).await
    }

    pub async fn round_info(&self, round_id: RoundId) -> Option<RoundInfo> {
        self.registry.info(round_id).await
    }

    pub async fn round_state(&self, round_id: RoundId) -> Option<RoundState> {
        self.round_info(round_id).await.map(|info| info.state)
    }

    /// Validates and records a report.
    ///
    /// A node's second report in the same round replaces its first. When the
    /// report completes the roster and a quorum agrees, the round finalizes
    /// immediately; otherwise it stays open until its deadline.
    pub async fn submit(&self, report: PriceReport, now: Millis) -> Result<SubmitAck, RejectReason> {
        let node_id = report.node_id.clone();
        let round_id = report.round_id;

        match self.accept(report, now).await {
            Ok(ack) => Ok(ack),
            Err(reason) => {
                info!(
                    target: AUDIT_TARGET,
                    "EVENT:REJECT round={} node={} reason={}",
                    round_id.0,
                    node_id,
                    reason.code()
                );
                warn!("🚫 Report from [{}] for round {} rejected: {}", node_id, round_id, reason);
                Err(reason)
            }
        }
    }

    async fn accept(&self, report: PriceReport, now: Millis) -> Result<SubmitAck, RejectReason> {
        let info = self.registry.info(report.round_id).await;
        let report = self.validator.validate(report, info.as_ref(), now)?;

        let handle = self
            .registry
            .get(report.round_id)
            .await
            .ok_or(RejectReason::UnknownRound)?;

        let round_id = report.round_id;
        let node_id = report.node_id.clone();
        let price = report.price;
        let observed_at = report.observed_at;

        let (replaced, reports_in_round) = {
            let mut round = handle.lock().await;
            let replaced = round.upsert(report, now)?;
            (replaced, round.report_count())
        };

        info!(
            target: AUDIT_TARGET,
            "EVENT:REPORT round={} node={} price={} observed_at={} replaced={}",
            round_id.0,
            node_id,
            price.normalize(),
            observed_at,
            replaced
        );

        let mut ack = SubmitAck {
            round_id,
            replaced,
            reports_in_round,
            finalized: None,
        };

        if reports_in_round >= self.roster.len() {
            debug!("📬 Round {} has a report from every registered node", ack.round_id);
            if let Some(RoundOutcome::Finalized(price)) =
                self.try_close(&handle, now, CloseMode::EarlyFinalize).await
            {
                ack.finalized = Some(price);
            }
        }

        Ok(ack)
    }

    /// Closes a round with whatever it holds: `Finalized` on quorum, otherwise
    /// `TimedOut`.
    ///
    /// Idempotent. Closing an already closed round returns its existing outcome
    /// and changes nothing. `None` means the round is not tracked.
    pub async fn close_round(&self, round_id: RoundId, now: Millis) -> Option<RoundOutcome> {
        let handle = self.registry.get(round_id).await?;
        self.try_close(&handle, now, CloseMode::Deadline).await
    }

    /// Closes every open round whose deadline has passed, oldest first.
    pub async fn close_expired(&self, now: Millis) -> Vec<RoundOutcome> {
        let mut outcomes = Vec::new();
        for round_id in self.registry.expired(now).await {
            if let Some(outcome) = self.close_round(round_id, now).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    async fn try_close(&self, handle: &RoundHandle, now: Millis, mode: CloseMode) -> Option<RoundOutcome> {
        let registered = self.roster.len();
        loop {
            let (round_id, snapshot) = {
                let round = handle.lock().await;
                if round.state().is_closed() {
                    return round.outcome().cloned();
                }
                (round.round_id, round.snapshot())
            };

            let outcome = self.evaluator.evaluate(round_id, &snapshot.reports, registered);
            if mode == CloseMode::EarlyFinalize && outcome.consensus_price().is_none() {
                return None;
            }

            let mut round = handle.lock().await;
            if round.state().is_closed() {
                return round.outcome().cloned();
            }
            if round.version() != snapshot.version {
                debug!("🔁 Round {} changed during evaluation, re-evaluating", round_id);
                continue;
            }

            round.close(outcome.clone(), now);
            drop(round);
            self.audit_close(&outcome);
            return Some(outcome);
        }
    }

    fn audit_close(&self, outcome: &RoundOutcome) {
        match outcome {
            RoundOutcome::Finalized(price) => {
                let nodes: Vec<&str> = price.contributing_nodes.iter().map(|n| n.0.as_str()).collect();
                info!(
                    target: AUDIT_TARGET,
                    "EVENT:FINALIZE round={} price={} nodes={} agreement={:.3}",
                    price.round_id.0,
                    price.price.normalize(),
                    nodes.join(","),
                    price.agreement_ratio
                );
                info!(
                    "✅ Round {} finalized at {} ({} nodes agree)",
                    price.round_id,
                    price.price.normalize(),
                    price.contributing_nodes.len()
                );
            }
            RoundOutcome::TimedOut {
                round_id,
                reports_received,
                largest_cluster,
                quorum_threshold,
            } => {
                info!(
                    target: AUDIT_TARGET,
                    "EVENT:TIMEOUT round={} reports={} largest_cluster={} quorum={}",
                    round_id.0,
                    reports_received,
                    largest_cluster,
                    quorum_threshold
                );
                warn!(
                    "⌛ Round {} timed out without quorum ({}/{} agreeing)",
                    round_id, largest_cluster, quorum_threshold
                );
            }
        }
    }

    pub async fn outcome(&self, round_id: RoundId) -> Option<RoundOutcome> {
        let handle = self.registry.get(round_id).await?;
        let round = handle.lock().await;
        round.outcome().cloned()
    }

    /// Published price for a round. `None` while open, after a timeout, or once
    /// the round has left history.
    pub async fn consensus_price(&self, round_id: RoundId) -> Option<ConsensusPrice> {
        self.outcome(round_id)
            .await
            .and_then(|o| o.consensus_price().cloned())
    }

    /// Most recent finalized price still in history.
    pub async fn latest_consensus(&self) -> Option<ConsensusPrice> {
        self.registry.latest_finalized().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use oracle_common::{
        auth::{ed25519::Ed25519Authenticator, Authenticator},
        env::report::report_signing_bytes,
        NodeId,
    };
    use rand::rngs::OsRng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn engine(nodes: usize) -> (ConsensusEngine, Vec<(NodeId, Ed25519Authenticator)>) {
        let signers: Vec<_> = (1..=nodes)
            .map(|i| (NodeId(format!("node-{}", i)), Ed25519Authenticator::new(SigningKey::generate(&mut OsRng))))
            .collect();
        let roster = NodeRoster::from_keys(
            signers
                .iter()
                .map(|(id, auth)| (id.clone(), ed25519_dalek::VerifyingKey::from_bytes(&auth.public_key()).unwrap())),
        );
        (ConsensusEngine::new(Arc::new(roster), ConsensusConfig::default()), signers)
    }

    fn report(signer: &(NodeId, Ed25519Authenticator), round_id: RoundId, price: Decimal, at: Millis) -> PriceReport {
        let bytes = report_signing_bytes(&signer.0, round_id, price, at).unwrap();
        PriceReport {
            node_id: signer.0.clone(),
            round_id,
            price,
            observed_at: at,
            signature: signer.1.sign(&bytes).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_full_roster_finalizes_early() {
        let (engine, signers) = engine(3);
        let round = engine.open_round(1_000, 31_000).await;

        for (i, signer) in signers.iter().enumerate() {
            let ack = engine
                .submit(report(signer, round.round_id, dec!(50000) + Decimal::from(i), 1_100), 1_200)
                .await
                .unwrap();
            assert_eq!(ack.finalized.is_some(), i == 2);
        }

        assert_eq!(engine.round_state(round.round_id).await, Some(RoundState::Finalized));
        assert_eq!(engine.round_state(RoundId(7)).await, None);
        assert_eq!(engine.consensus_price(round.round_id).await.unwrap().price, dec!(50001));
    }

    #[tokio::test]
    async fn test_full_roster_without_quorum_stays_open() {
        let (engine, signers) = engine(3);
        let round = engine.open_round(1_000, 31_000).await;
        for (signer, price) in signers.iter().zip([dec!(50000), dec!(52000), dec!(54000)]) {
            let ack = engine.submit(report(signer, round.round_id, price, 1_100), 1_200).await.unwrap();
            assert!(ack.finalized.is_none());
        }
        assert!(engine.round_info(round.round_id).await.unwrap().is_open());

        let outcome = engine.close_round(round.round_id, 31_000).await.unwrap();
        assert_eq!(outcome.state(), RoundState::TimedOut);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (engine, signers) = engine(3);
        let round = engine.open_round(1_000, 31_000).await;
        for signer in signers.iter().take(2) {
            engine.submit(report(signer, round.round_id, dec!(50000), 1_100), 1_200).await.unwrap();
        }

        let first = engine.close_round(round.round_id, 31_000).await.unwrap();
        let second = engine.close_round(round.round_id, 32_000).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.round_info(round.round_id).await.unwrap().closed_at, Some(31_000));
        assert!(engine.close_round(RoundId(99), 31_000).await.is_none());
    }

    #[tokio::test]
    async fn test_latest_consensus_skips_timeouts() {
        let (engine, signers) = engine(1);
        let first = engine.open_round(0, 10_000).await;
        engine.submit(report(&signers[0], first.round_id, dec!(50000), 100), 200).await.unwrap();

        let second = engine.open_round(10_000, 20_000).await;
        engine.close_round(second.round_id, 20_000).await;

        let latest = engine.latest_consensus().await.unwrap();
        assert_eq!(latest.round_id, first.round_id);
        assert!(engine.consensus_price(second.round_id).await.is_none());
    }

    #[tokio::test]
    async fn test_close_expired_only_touches_past_deadlines() {
        let (engine, _) = engine(3);
        let old = engine.open_round(0, 10_000).await;
        let current = engine.open_round(10_000, 40_000).await;

        let closed = engine.close_expired(20_000).await;
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].round_id(), old.round_id);
        assert!(engine.round_info(current.round_id).await.unwrap().is_open());
    }
}
