use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use oracle_common::{utils::time::Millis, ConsensusPrice, RoundId, RoundInfo};

use super::round::ConsensusRound;

pub(crate) type RoundHandle = Arc<Mutex<ConsensusRound>>;

/// Every round the aggregator still remembers, keyed by id.
///
/// The map lock is held only long enough to find or insert a round; each round
/// carries its own lock so reports for different rounds never contend.
#[derive(Debug)]
pub(crate) struct RoundRegistry {
    rounds: RwLock<BTreeMap<RoundId, RoundHandle>>,
    history: usize,
}

impl RoundRegistry {
    pub fn new(history: usize) -> Self {
        Self {
            rounds: RwLock::new(BTreeMap::new()),
            history: history.max(1),
        }
    }

    /// Allocates the next sequential round id and starts tracking it.
    pub async fn open(&self, opened_at: Millis, deadline: Millis) -> RoundInfo {
        let mut rounds = self.rounds.write().await;
        let round_id = rounds
            .keys()
            .next_back()
            .map(|id| id.next())
            .unwrap_or(RoundId(1));

        let round = ConsensusRound::new(round_id, opened_at, deadline);
        let info = round.info();
        rounds.insert(round_id, Arc::new(Mutex::new(round)));

        self.evict(&mut rounds).await;
        info
    }

    /// Drops the oldest closed rounds beyond the history bound. Open rounds are
    /// never evicted.
    async fn evict(&self, rounds: &mut BTreeMap<RoundId, RoundHandle>) {
        let mut excess = rounds.len().saturating_sub(self.history);
        if excess == 0 {
            return;
        }

        let mut victims = Vec::new();
        for (id, handle) in rounds.iter() {
            if excess == 0 {
                break;
            }
            if handle.lock().await.state().is_closed() {
                victims.push(*id);
                excess -= 1;
            }
        }

        for id in victims {
            rounds.remove(&id);
            debug!("🧹 Round {} evicted from history", id);
        }
    }

    pub async fn get(&self, round_id: RoundId) -> Option<RoundHandle> {
        self.rounds.read().await.get(&round_id).cloned()
    }

    pub async fn info(&self, round_id: RoundId) -> Option<RoundInfo> {
        let handle = self.get(round_id).await?;
        let info = handle.lock().await.info();
        Some(info)
    }

    /// Newest round that is still open and whose deadline has not passed.
    pub async fn active(&self, now: Millis) -> Option<RoundInfo> {
        let rounds = self.rounds.read().await;
        for handle in rounds.values().rev() {
            let info = handle.lock().await.info();
            if info.is_open() && now < info.deadline {
                return Some(info);
            }
        }
        None
    }

    /// Open rounds whose deadline has passed, oldest first.
    pub async fn expired(&self, now: Millis) -> Vec<RoundId> {
        let rounds = self.rounds.read().await;
        let mut expired = Vec::new();
        for (id, handle) in rounds.iter() {
            let info = handle.lock().await.info();
            if info.is_open() && now >= info.deadline {
                expired.push(*id);
            }
        }
        expired
    }

    pub async fn latest_finalized(&self) -> Option<ConsensusPrice> {
        let rounds = self.rounds.read().await;
        for handle in rounds.values().rev() {
            let round = handle.lock().await;
            if let Some(price) = round.outcome().and_then(|o| o.consensus_price()) {
                return Some(price.clone());
            }
        }
        None
    }

    pub async fn len(&self) -> usize {
        self.rounds.read().await.len()
    }
}
