use std::collections::HashMap;

use tokio::sync::RwLock;

use oracle_common::{utils::time::Millis, NodeId};

/// Last time each registered node delivered an accepted report.
#[derive(Debug, Default)]
pub struct NodeActivity {
    last_seen: RwLock<HashMap<NodeId, Millis>>,
}

impl NodeActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn touch(&self, node_id: &NodeId, now: Millis) {
        let mut last_seen = self.last_seen.write().await;
        let entry = last_seen.entry(node_id.clone()).or_insert(now);
        *entry = (*entry).max(now);
    }

    /// Nodes seen within `window` of `now`.
    pub async fn active_count(&self, now: Millis, window: Millis) -> usize {
        let last_seen = self.last_seen.read().await;
        last_seen
            .values()
            .filter(|seen| now.saturating_sub(**seen) < window)
            .count()
    }
}
