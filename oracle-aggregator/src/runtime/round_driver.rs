use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use oracle_common::{
    utils::time::{format_millis, now_millis, until, Millis},
    RoundOutcome,
};
use oracle_consensus::ConsensusEngine;

/// Opens a round, waits out its deadline, closes it, repeats.
pub struct RoundDriver {
    engine: Arc<ConsensusEngine>,
    round_duration: Millis,
}

impl RoundDriver {
    pub fn new(engine: Arc<ConsensusEngine>) -> Self {
        let round_duration = engine.config().round_duration_millis();
        Self { engine, round_duration }
    }

    /// Runs one full round and returns how it closed, or `None` if shutdown
    /// arrived first. The round stays open in that case.
    pub async fn drive_round(&self, shutdown: &mut watch::Receiver<bool>) -> Option<RoundOutcome> {
        let now = now_millis();
        for stale in self.engine.close_expired(now).await {
            warn!("Round {} was still open past its deadline, closed late", stale.round_id());
        }

        let round = self
            .engine
            .open_round(now, now.saturating_add(self.round_duration))
            .await;
        info!(
            "🕐 Round {} open until {}",
            round.round_id,
            format_millis(round.deadline)
        );

        let wake = Instant::now() + until(round.deadline, now_millis());
        tokio::select! {
            _ = sleep_until(wake) => {}
            _ = shutdown.changed() => return None,
        }

        let closed_at = now_millis().max(round.deadline);
        self.engine.close_round(round.round_id, closed_at).await
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("▶️ Round driver started ({} ms rounds)", self.round_duration);
        loop {
            let stop = *shutdown.borrow();
            if stop || self.drive_round(&mut shutdown).await.is_none() {
                break;
            }
        }
        info!("🛑 Round driver stopped");
    }
}
