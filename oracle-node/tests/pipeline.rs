use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;
use rust_decimal_macros::dec;
use tokio::sync::watch;

use oracle_common::{
    auth::{
        ed25519::{verify_with_key, Ed25519Authenticator},
        key_manager::write_signing_key,
    },
    error::{FetchError, SigningError, SubmissionError},
    utils::time::now_millis,
    ExchangeId, NodeId, OracleError, PriceReport, PriceTick, RejectReason, RoundId, RoundInfo,
    RoundState,
};
use oracle_node::{
    build_runtime_with,
    config::RetryPolicy,
    runtime::{sampler::Sampler, submitter::Submitter, RoundJob},
    AggregatorClient, ExchangeAdapter, NodeConfig, SignedReportBuilder, SubmitOutcome,
};

struct FixedAdapter {
    delay: Duration,
    fail: bool,
}

#[async_trait]
impl ExchangeAdapter for FixedAdapter {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::Coinbase
    }

    async fn fetch_price(&self) -> Result<PriceTick, FetchError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(FetchError::Status { status: 503, message: "coinbase server error".into() });
        }
        Ok(PriceTick::new(ExchangeId::Coinbase, dec!(50000.5), now_millis(), 1))
    }
}

/// Scripted aggregator: fails the first `transport_failures` submissions, then
/// answers with `answer`.
struct MockAggregator {
    round: Option<RoundInfo>,
    transport_failures: usize,
    answer: SubmitOutcome,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<PriceReport>>,
}

impl MockAggregator {
    fn new(round: Option<RoundInfo>) -> Self {
        Self {
            round,
            transport_failures: 0,
            answer: SubmitOutcome::Accepted,
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn delivered(&self) -> Vec<PriceReport> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl AggregatorClient for MockAggregator {
    async fn active_round(&self, _node_id: &NodeId) -> Result<Option<RoundInfo>, SubmissionError> {
        Ok(self.round)
    }

    async fn submit(&self, report: &PriceReport) -> Result<SubmitOutcome, SubmissionError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.transport_failures {
            return Err(SubmissionError::Transport("connection refused".into()));
        }
        if self.answer == SubmitOutcome::Accepted {
            self.delivered.lock().unwrap().push(report.clone());
        }
        Ok(self.answer.clone())
    }
}

fn open_round(deadline_in_ms: i64) -> RoundInfo {
    let now = now_millis();
    RoundInfo {
        round_id: RoundId(3),
        opened_at: now,
        deadline: now + deadline_in_ms,
        state: RoundState::Open,
        closed_at: None,
    }
}

fn job(deadline_in_ms: i64) -> RoundJob {
    RoundJob {
        report: PriceReport {
            node_id: "node-1".into(),
            round_id: RoundId(3),
            price: dec!(50000),
            observed_at: now_millis(),
            signature: [0u8; 64],
        },
        work_deadline: now_millis() + deadline_in_ms,
    }
}

fn retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff_ms: 5,
        max_backoff_ms: 20,
    }
}

#[tokio::test]
async fn test_missing_key_prevents_start_and_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig::new(
        "node-1".into(),
        "http://127.0.0.1:1",
        ExchangeId::Coinbase,
        dir.path().join("missing.key"),
    );
    let aggregator = Arc::new(MockAggregator::new(Some(open_round(30_000))));
    let adapter = Arc::new(FixedAdapter { delay: Duration::ZERO, fail: false });

    let result = build_runtime_with(&config, adapter, aggregator.clone());
    assert!(matches!(result, Err(OracleError::Signing(SigningError::KeyUnavailable(_)))));
    assert_eq!(aggregator.attempts(), 0);
}

#[tokio::test]
async fn test_pipeline_delivers_signed_reports() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("node-1.key");
    let key = write_signing_key(&key_path).unwrap();
    let public = VerifyingKey::from(&key);

    let mut config = NodeConfig::new("node-1".into(), "http://127.0.0.1:1", ExchangeId::Coinbase, key_path);
    config.sampling_interval_ms = 20;
    config.retry = retry(3);

    let aggregator = Arc::new(MockAggregator::new(Some(open_round(30_000))));
    let adapter = Arc::new(FixedAdapter { delay: Duration::ZERO, fail: false });
    let runtime = build_runtime_with(&config, adapter, aggregator.clone()).unwrap();
    assert_eq!(runtime.public_key_hex(), hex::encode(public.to_bytes()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(runtime.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let delivered = aggregator.delivered();
    assert!(!delivered.is_empty());
    for report in delivered {
        assert_eq!(report.round_id, RoundId(3));
        assert_eq!(report.price, dec!(50000.5));
        assert!(verify_with_key(&report.signing_bytes().unwrap(), &report.signature, &public));
    }
}

#[tokio::test]
async fn test_no_open_round_skips_tick() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_signing_key(&dir.path().join("k")).unwrap();
    let builder = SignedReportBuilder::new(
        "node-1".into(),
        Arc::new(Ed25519Authenticator::new(key)),
    );
    let sampler = Sampler::new(
        Arc::new(FixedAdapter { delay: Duration::ZERO, fail: false }),
        builder,
        Arc::new(MockAggregator::new(None)),
        Duration::from_millis(10),
        Duration::from_millis(100),
        1_000,
    );
    assert!(sampler.sample_once().await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_failure_and_timeout_are_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_signing_key(&dir.path().join("k")).unwrap();
    let auth = Arc::new(Ed25519Authenticator::new(key));

    let failing = Sampler::new(
        Arc::new(FixedAdapter { delay: Duration::ZERO, fail: true }),
        SignedReportBuilder::new("node-1".into(), auth.clone()),
        Arc::new(MockAggregator::new(Some(open_round(30_000)))),
        Duration::from_millis(10),
        Duration::from_millis(100),
        1_000,
    );
    let err = failing.sample_once().await.unwrap_err();
    assert!(matches!(err, OracleError::Fetch(FetchError::Status { status: 503, .. })));
    assert!(!err.is_fatal());

    let slow = Sampler::new(
        Arc::new(FixedAdapter { delay: Duration::from_secs(5), fail: false }),
        SignedReportBuilder::new("node-1".into(), auth),
        Arc::new(MockAggregator::new(Some(open_round(30_000)))),
        Duration::from_millis(10),
        Duration::from_millis(50),
        1_000,
    );
    assert!(matches!(slow.sample_once().await, Err(OracleError::Fetch(FetchError::Timeout))));
}

#[tokio::test]
async fn test_round_inside_safety_margin_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_signing_key(&dir.path().join("k")).unwrap();
    let sampler = Sampler::new(
        Arc::new(FixedAdapter { delay: Duration::ZERO, fail: false }),
        SignedReportBuilder::new(
            "node-1".into(),
            Arc::new(Ed25519Authenticator::new(key)),
        ),
        Arc::new(MockAggregator::new(Some(open_round(500)))),
        Duration::from_millis(10),
        Duration::from_millis(100),
        1_000,
    );
    assert!(sampler.sample_once().await.unwrap().is_none());
}

#[tokio::test]
async fn test_transport_errors_are_retried() {
    let mut aggregator = MockAggregator::new(None);
    aggregator.transport_failures = 2;
    let aggregator = Arc::new(aggregator);

    let submitter = Submitter::new(aggregator.clone(), retry(5));
    submitter.deliver(&job(10_000)).await.unwrap();
    assert_eq!(aggregator.attempts(), 3);
    assert_eq!(aggregator.delivered().len(), 1);
}

#[tokio::test]
async fn test_rejection_is_final() {
    let mut aggregator = MockAggregator::new(None);
    aggregator.answer = SubmitOutcome::Rejected(RejectReason::StaleRound);
    let aggregator = Arc::new(aggregator);

    let submitter = Submitter::new(aggregator.clone(), retry(5));
    let result = submitter.deliver(&job(10_000)).await;
    assert!(matches!(result, Err(OracleError::Rejected(RejectReason::StaleRound))));
    assert_eq!(aggregator.attempts(), 1);
}

#[tokio::test]
async fn test_attempts_are_bounded() {
    let mut aggregator = MockAggregator::new(None);
    aggregator.transport_failures = usize::MAX;
    let aggregator = Arc::new(aggregator);

    let submitter = Submitter::new(aggregator.clone(), retry(3));
    let result = submitter.deliver(&job(10_000)).await;
    assert!(matches!(
        result,
        Err(OracleError::Submission(SubmissionError::AttemptsExhausted(3)))
    ));
    assert_eq!(aggregator.attempts(), 3);
}

#[tokio::test]
async fn test_deadline_cuts_retries_short() {
    let mut aggregator = MockAggregator::new(None);
    aggregator.transport_failures = usize::MAX;
    let aggregator = Arc::new(aggregator);

    let slow_retry = RetryPolicy {
        max_attempts: 100,
        initial_backoff_ms: 50,
        max_backoff_ms: 50,
    };
    let submitter = Submitter::new(aggregator.clone(), slow_retry);
    let result = submitter.deliver(&job(120)).await;
    assert!(matches!(
        result,
        Err(OracleError::Submission(SubmissionError::DeadlineExceeded))
    ));
    assert!(aggregator.attempts() < 100);

    let expired = Submitter::new(aggregator.clone(), retry(3));
    let before = aggregator.attempts();
    assert!(expired.deliver(&job(-1)).await.is_err());
    assert_eq!(aggregator.attempts(), before);
}
