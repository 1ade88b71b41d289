use std::fmt;

use thiserror::Error;

/// Failure to obtain a usable observation from an exchange.
///
/// Recovered by the node skipping the current round.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("http {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("no data returned")]
    Empty,

    #[error("fetch timed out")]
    Timeout,
}

/// Key material missing or unusable. Fatal to the node process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SigningError {
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("signing failed: {0}")]
    Signature(String),

    #[error("canonical encoding failed: {0}")]
    Encoding(String),
}

/// Network or RPC failure while delivering a report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error ({code}): {message}")]
    Rpc { code: String, message: String },

    #[error("round deadline passed before the report was delivered")]
    DeadlineExceeded,

    #[error("gave up after {0} attempts")]
    AttemptsExhausted(u32),
}

/// Why the aggregator discarded a single report.
///
/// Rejections are local to the offending report and never abort processing of others.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("node is not registered")]
    UnknownNode,

    #[error("signature does not verify")]
    InvalidSignature,

    #[error("observation is older than the staleness window")]
    StaleTimestamp,

    #[error("observation is ahead of the aggregator clock")]
    FutureTimestamp,

    #[error("round is unknown or no longer tracked")]
    UnknownRound,

    #[error("round is already closed")]
    StaleRound,

    #[error("malformed report: {0}")]
    Malformed(String),
}

impl RejectReason {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::UnknownNode => "unknown_node",
            RejectReason::InvalidSignature => "invalid_signature",
            RejectReason::StaleTimestamp => "stale_timestamp",
            RejectReason::FutureTimestamp => "future_timestamp",
            RejectReason::UnknownRound => "unknown_round",
            RejectReason::StaleRound => "stale_round",
            RejectReason::Malformed(_) => "malformed",
        }
    }

    pub fn from_code(code: &str, detail: &str) -> Option<Self> {
        let reason = match code {
            "unknown_node" => RejectReason::UnknownNode,
            "invalid_signature" => RejectReason::InvalidSignature,
            "stale_timestamp" => RejectReason::StaleTimestamp,
            "future_timestamp" => RejectReason::FutureTimestamp,
            "unknown_round" => RejectReason::UnknownRound,
            "stale_round" => RejectReason::StaleRound,
            "malformed" => RejectReason::Malformed(detail.to_string()),
            _ => return None,
        };
        Some(reason)
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Report rejected: {0}")]
    Rejected(#[from] RejectReason),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other: {0}")]
    Other(String),
}

impl OracleError {
    /// Only missing key material takes a node down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OracleError::Signing(_))
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// Human-readable tag for log lines about a report that never made it into a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropCause {
    Fetch,
    Submission,
    Rejected,
}

impl fmt::Display for DropCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropCause::Fetch => "fetch",
            DropCause::Submission => "submission",
            DropCause::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}
