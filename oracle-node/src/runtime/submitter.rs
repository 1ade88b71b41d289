use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, info, warn};

use oracle_common::{
    error::{DropCause, SubmissionError},
    utils::time::now_millis,
    OracleError,
};

use crate::{
    config::RetryPolicy,
    rpc::client::{AggregatorClient, SubmitOutcome},
};

use super::{tokio_deadline, RoundJob};

/// Delivers signed reports with bounded retries inside each round's work deadline.
pub struct Submitter {
    client: Arc<dyn AggregatorClient>,
    retry: RetryPolicy,
}

impl Submitter {
    pub fn new(client: Arc<dyn AggregatorClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// `Ok` once the aggregator accepts. A rejection is returned immediately and
    /// never retried; transport failures are retried until attempts or time run out.
    pub async fn deliver(&self, job: &RoundJob) -> Result<(), OracleError> {
        if now_millis() >= job.work_deadline {
            return Err(SubmissionError::DeadlineExceeded.into());
        }

        match time::timeout_at(tokio_deadline(job.work_deadline), self.attempt_all(job)).await {
            Ok(result) => result,
            Err(_) => Err(SubmissionError::DeadlineExceeded.into()),
        }
    }

    async fn attempt_all(&self, job: &RoundJob) -> Result<(), OracleError> {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 0..max_attempts {
            match self.client.submit(&job.report).await {
                Ok(SubmitOutcome::Accepted) => return Ok(()),
                Ok(SubmitOutcome::Rejected(reason)) => return Err(reason.into()),
                Err(e) => {
                    if attempt + 1 == max_attempts {
                        warn!("📡 Submission attempt {}/{} failed: {}", attempt + 1, max_attempts, e);
                        break;
                    }
                    let backoff = self.retry.backoff(attempt);
                    debug!(
                        "📡 Submission attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt + 1,
                        max_attempts,
                        e,
                        backoff
                    );
                    time::sleep(backoff).await;
                }
            }
        }
        Err(SubmissionError::AttemptsExhausted(max_attempts).into())
    }

    /// Drains jobs until the channel closes or shutdown is signalled. An in-flight
    /// delivery is abandoned on shutdown.
    pub async fn run(self, mut jobs: mpsc::Receiver<RoundJob>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let job = tokio::select! {
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                _ = shutdown.changed() => break,
            };

            let round_id = job.report.round_id;
            tokio::select! {
                result = self.deliver(&job) => match result {
                    Ok(()) => info!("📤 Report for round {} accepted ({})", round_id, job.report.price),
                    Err(OracleError::Rejected(reason)) => {
                        warn!("🚫 Report for round {} dropped ({}): {}", round_id, DropCause::Rejected, reason)
                    }
                    Err(e) => warn!("🗑️ Report for round {} dropped ({}): {}", round_id, DropCause::Submission, e),
                },
                _ = shutdown.changed() => {
                    info!("🛑 Abandoning in-flight report for round {}", round_id);
                    break;
                }
            }
        }
        debug!("Submitter stopped");
    }
}
