pub mod builder;
pub mod sampler;
pub mod submitter;

use oracle_common::{
    utils::time::{now_millis, until, Millis},
    PriceReport,
};

/// A signed report plus the wall-clock instant after which delivering it is pointless.
#[derive(Debug, Clone)]
pub struct RoundJob {
    pub report: PriceReport,
    /// Round deadline minus the node's safety margin.
    pub work_deadline: Millis,
}

/// Maps a wall-clock deadline onto the tokio clock.
pub(crate) fn tokio_deadline(at: Millis) -> tokio::time::Instant {
    tokio::time::Instant::now() + until(at, now_millis())
}
