use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use oracle_common::{
    error::{DropCause, FetchError},
    utils::time::{now_millis, until, Millis},
    OracleError,
};

use crate::{exchange::ExchangeAdapter, report::SignedReportBuilder, rpc::client::AggregatorClient};

use super::RoundJob;

/// Periodic fetch-and-sign loop. Produces at most one job per tick.
pub struct Sampler {
    adapter: Arc<dyn ExchangeAdapter>,
    builder: SignedReportBuilder,
    client: Arc<dyn AggregatorClient>,
    interval: Duration,
    fetch_timeout: Duration,
    safety_margin: Millis,
}

impl Sampler {
    pub fn new(
        adapter: Arc<dyn ExchangeAdapter>,
        builder: SignedReportBuilder,
        client: Arc<dyn AggregatorClient>,
        interval: Duration,
        fetch_timeout: Duration,
        safety_margin: Millis,
    ) -> Self {
        Self {
            adapter,
            builder,
            client,
            interval,
            fetch_timeout,
            safety_margin,
        }
    }

    /// One sampling pass.
    ///
    /// `Ok(None)` means there was nothing to do this tick (no open round, or too
    /// close to its deadline). Fetch and round-query failures come back as
    /// non-fatal errors; only signing failures are fatal.
    pub async fn sample_once(&self) -> Result<Option<RoundJob>, OracleError> {
        let node_id = self.builder.node_id();
        let round = match self.client.active_round(node_id).await? {
            Some(round) => round,
            None => {
                debug!("💤 No open round, skipping tick");
                return Ok(None);
            }
        };

        let work_deadline = round.deadline.saturating_sub(self.safety_margin);
        let now = now_millis();
        if now >= work_deadline {
            debug!("⏱️ Round {} is inside the safety margin, skipping", round.round_id);
            return Ok(None);
        }

        let budget = self.fetch_timeout.min(until(work_deadline, now));
        let tick = time::timeout(budget, self.adapter.fetch_price())
            .await
            .map_err(|_| FetchError::Timeout)??;

        debug!(
            "📈 {} tick #{}: {} for round {}",
            tick.exchange_id, tick.source_sequence, tick.price, round.round_id
        );

        let report = self.builder.build(&tick, round.round_id)?;
        Ok(Some(RoundJob { report, work_deadline }))
    }

    /// Runs until shutdown or until the submitter goes away.
    pub async fn run(self, jobs: mpsc::Sender<RoundJob>, mut shutdown: watch::Receiver<bool>) -> Result<(), OracleError> {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "🛰️ Sampling {} every {:?} as [{}]",
            self.adapter.exchange_id(),
            self.interval,
            self.builder.node_id()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sample_once().await {
                        Ok(Some(job)) => {
                            if jobs.send(job).await.is_err() {
                                warn!("Submitter is gone, stopping sampler");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) if e.is_fatal() => {
                            error!("❌ Fatal signing failure, stopping sampler: {}", e);
                            return Err(e);
                        }
                        Err(e) => {
                            let cause = match &e {
                                OracleError::Fetch(_) => DropCause::Fetch,
                                _ => DropCause::Submission,
                            };
                            warn!("⏭️ Skipping tick ({}): {}", cause, e);
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("🛑 Sampler shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}
