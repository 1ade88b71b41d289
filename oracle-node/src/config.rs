use std::{fs, io, path::{Path, PathBuf}, time::Duration};

use serde::{Deserialize, Serialize};

use oracle_common::{utils::time::Millis, ExchangeId, NodeId, OracleError};

/// Bounded exponential backoff for report submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 3_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (0-based): `initial * 2^attempt`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub aggregator_endpoint: String,
    pub exchange: ExchangeId,
    pub signing_key_path: PathBuf,
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval_ms: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
    /// Work on a round stops this long before its deadline.
    #[serde(default = "default_safety_margin")]
    pub safety_margin_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_sampling_interval() -> u64 {
    10_000
}

fn default_fetch_timeout() -> u64 {
    5_000
}

fn default_safety_margin() -> u64 {
    1_000
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl NodeConfig {
    pub fn new(node_id: NodeId, aggregator_endpoint: &str, exchange: ExchangeId, signing_key_path: PathBuf) -> Self {
        Self {
            node_id,
            aggregator_endpoint: aggregator_endpoint.to_string(),
            exchange,
            signing_key_path,
            sampling_interval_ms: default_sampling_interval(),
            fetch_timeout_ms: default_fetch_timeout(),
            safety_margin_ms: default_safety_margin(),
            retry: RetryPolicy::default(),
            log_dir: default_log_dir(),
        }
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn safety_margin(&self) -> Millis {
        Millis::try_from(self.safety_margin_ms).unwrap_or(Millis::MAX)
    }

    pub fn validate(&self) -> Result<(), OracleError> {
        if self.node_id.0.is_empty() {
            return Err(OracleError::Config("node_id must not be empty".into()));
        }
        if self.sampling_interval_ms == 0 {
            return Err(OracleError::Config("sampling_interval_ms must be positive".into()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(OracleError::Config("fetch_timeout_ms must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(OracleError::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path, json)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        let parsed = serde_json::from_str::<NodeConfig>(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(parsed)
    }
}
