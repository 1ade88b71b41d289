use std::collections::HashMap;

use oracle_common::{
    utils::time::Millis, NodeId, PriceReport, RejectReason, RoundId, RoundInfo, RoundOutcome,
    RoundState,
};

/// One bounded collection window. Only the engine mutates it, always under the
/// round's own lock.
#[derive(Debug, Clone)]
pub struct ConsensusRound {
    pub round_id: RoundId,
    pub opened_at: Millis,
    pub deadline: Millis,
    state: RoundState,
    closed_at: Option<Millis>,
    reports: HashMap<NodeId, PriceReport>,
    /// Bumped on every accepted upsert so a stale snapshot cannot be committed.
    version: u64,
    outcome: Option<RoundOutcome>,
}

/// Reports captured under the round lock for lock-free evaluation.
#[derive(Debug, Clone)]
pub(crate) struct RoundSnapshot {
    pub version: u64,
    pub reports: Vec<PriceReport>,
}

impl ConsensusRound {
    pub fn new(round_id: RoundId, opened_at: Millis, deadline: Millis) -> Self {
        Self {
            round_id,
            opened_at,
            deadline,
            state: RoundState::Open,
            closed_at: None,
            reports: HashMap::new(),
            version: 0,
            outcome: None,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.outcome.as_ref()
    }

    pub fn info(&self) -> RoundInfo {
        RoundInfo {
            round_id: self.round_id,
            opened_at: self.opened_at,
            deadline: self.deadline,
            state: self.state,
            closed_at: self.closed_at,
        }
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    pub fn report_from(&self, node_id: &NodeId) -> Option<&PriceReport> {
        self.reports.get(node_id)
    }

    /// Inserts or replaces the node's report. Returns `true` when an earlier
    /// report from the same node was replaced.
    pub fn upsert(&mut self, report: PriceReport, now: Millis) -> Result<bool, RejectReason> {
        if self.state.is_closed() || now >= self.deadline {
            return Err(RejectReason::StaleRound);
        }
        if report.round_id != self.round_id {
            return Err(RejectReason::UnknownRound);
        }

        let replaced = self.reports.insert(report.node_id.clone(), report).is_some();
        self.version += 1;
        Ok(replaced)
    }

    pub(crate) fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            version: self.version,
            reports: self.reports.values().cloned().collect(),
        }
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    /// Moves the round out of `Open`. The first call wins; later calls are no-ops
    /// and return `false`.
    pub fn close(&mut self, outcome: RoundOutcome, now: Millis) -> bool {
        if self.state.is_closed() {
            return false;
        }
        self.state = outcome.state();
        self.closed_at = Some(now);
        self.outcome = Some(outcome);
        true
    }
}
