use std::collections::HashMap;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::{
    auth::ed25519::decode_public_key,
    error::OracleError,
    utils::NodeId,
};

/// One registered node as written in the aggregator config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub node_id: NodeId,
    /// Hex-encoded 32-byte ed25519 public key.
    pub public_key: String,
}

/// Immutable snapshot of registered node identities.
///
/// Built once at process start and shared behind an `Arc`; there is no way to
/// mutate it while rounds are in flight.
#[derive(Debug, Clone, Default)]
pub struct NodeRoster {
    keys: HashMap<NodeId, VerifyingKey>,
}

impl NodeRoster {
    pub fn from_entries(entries: &[RosterEntry]) -> Result<Self, OracleError> {
        let mut keys = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = decode_public_key(&entry.public_key)
                .map_err(|e| OracleError::Config(format!("roster entry {}: {}", entry.node_id, e)))?;
            if keys.insert(entry.node_id.clone(), key).is_some() {
                return Err(OracleError::Config(format!("duplicate roster entry {}", entry.node_id)));
            }
        }
        Ok(Self { keys })
    }

    pub fn from_keys(keys: impl IntoIterator<Item = (NodeId, VerifyingKey)>) -> Self {
        Self { keys: keys.into_iter().collect() }
    }

    pub fn public_key(&self, node_id: &NodeId) -> Option<&VerifyingKey> {
        self.keys.get(node_id)
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.keys.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.keys.keys()
    }
}
