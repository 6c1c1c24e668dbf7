//! Node configuration: `Default`-backed, optionally overlaid with a JSON
//! file passed via `--config`, mirroring the teacher's genesis-params
//! file-loading pattern rather than pulling in a config-layering crate.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory for the card store's sled database.
    pub data_dir: PathBuf,
    /// Overlay network listen multiaddr.
    pub p2p_listen: String,
    /// Bootstrap peer multiaddresses.
    pub bootstrap: Vec<String>,
    /// Address the Prometheus `/metrics` endpoint binds to.
    pub metrics_addr: SocketAddr,
    /// Number of orchestrator worker loops.
    pub worker_count: usize,
    /// Minimum reputation samples before a peer score leaves the gated default.
    pub min_tasks_for_score: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: expand_tilde(Path::new("~/.agoria/data")),
            p2p_listen: "/ip4/0.0.0.0/tcp/7070".into(),
            bootstrap: Vec::new(),
            metrics_addr: "127.0.0.1:9100".parse().expect("valid default metrics addr"),
            worker_count: 5,
            min_tasks_for_score: agoria_reputation::DEFAULT_MIN_TASKS_FOR_SCORE,
        }
    }
}

impl NodeConfig {
    /// Loads overrides from a JSON file on top of `Default::default()`.
    /// Fields omitted from the file keep their default value.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading node config {}: {e}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing node config {}: {e}", path.display()))?;
        Ok(config)
    }
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = NodeConfig::default();
        assert_eq!(config.worker_count, 5);
        assert!(config.bootstrap.is_empty());
    }

    #[test]
    fn load_without_path_returns_default() {
        let config = NodeConfig::load(None).unwrap();
        assert_eq!(config.p2p_listen, NodeConfig::default().p2p_listen);
    }

    #[test]
    fn load_overlays_file_contents_onto_default_fields() {
        let dir = std::env::temp_dir().join("agoria-node-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"data_dir":"/tmp/agoria","p2p_listen":"/ip4/0.0.0.0/tcp/9999","bootstrap":[],"metrics_addr":"127.0.0.1:9200","worker_count":2,"min_tasks_for_score":5}"#).unwrap();

        let config = NodeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.p2p_listen, "/ip4/0.0.0.0/tcp/9999");

        let _ = std::fs::remove_file(&path);
    }
}
