use std::{fs, io, net::SocketAddr, path::{Path, PathBuf}, time::Duration};

use serde::{Deserialize, Serialize};

use oracle_common::{utils::time::Millis, NodeRoster, OracleError, RosterEntry};
use oracle_consensus::ConsensusConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub listen_addr: SocketAddr,
    pub roster: Vec<RosterEntry>,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    /// A registered node counts as active if it delivered an accepted report this recently.
    #[serde(default = "default_activity_window")]
    pub node_activity_window_ms: u64,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_activity_window() -> u64 {
    120_000
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl AggregatorConfig {
    pub fn new(listen_addr: SocketAddr, roster: Vec<RosterEntry>) -> Self {
        Self {
            listen_addr,
            roster,
            consensus: ConsensusConfig::default(),
            node_activity_window_ms: default_activity_window(),
            log_dir: default_log_dir(),
        }
    }

    pub fn node_activity_window(&self) -> Millis {
        Millis::try_from(self.node_activity_window_ms).unwrap_or(Millis::MAX)
    }

    pub fn round_duration(&self) -> Duration {
        self.consensus.round_duration()
    }

    /// Builds the immutable roster snapshot; duplicates and bad keys are rejected.
    pub fn build_roster(&self) -> Result<NodeRoster, OracleError> {
        if self.roster.is_empty() {
            return Err(OracleError::Config("roster must list at least one node".into()));
        }
        NodeRoster::from_entries(&self.roster)
    }

    pub fn validate(&self) -> Result<(), OracleError> {
        self.consensus.validate().map_err(OracleError::Config)?;
        self.build_roster().map(|_| ())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path, json)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        let parsed = serde_json::from_str::<AggregatorConfig>(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn entry(id: &str) -> RosterEntry {
        let key = SigningKey::generate(&mut OsRng);
        RosterEntry {
            node_id: id.into(),
            public_key: hex::encode(key.verifying_key().to_bytes()),
        }
    }

    #[test]
    fn test_load_fills_consensus_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregator.json");
        let json = format!(
            r#"{{"listen_addr": "127.0.0.1:50051", "roster": [{{"node_id": "node-1", "public_key": "{}"}}]}}"#,
            entry("node-1").public_key
        );
        fs::write(&path, json).unwrap();

        let config = AggregatorConfig::load_from_file(&path).unwrap();
        assert_eq!(config.consensus, ConsensusConfig::default());
        assert_eq!(config.node_activity_window_ms, 120_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_roster_entry_is_config_error() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = AggregatorConfig::new(addr, vec![entry("a"), entry("a")]);
        assert!(matches!(config.validate(), Err(OracleError::Config(_))));

        let empty = AggregatorConfig::new(addr, vec![]);
        assert!(matches!(empty.build_roster(), Err(OracleError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregator.json");
        let config = AggregatorConfig::new("0.0.0.0:50051".parse().unwrap(), vec![entry("a"), entry("b")]);
        config.save_to_file(&path).unwrap();

        let loaded = AggregatorConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.roster, config.roster);
        assert_eq!(loaded.listen_addr, config.listen_addr);
    }
}
