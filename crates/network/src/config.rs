use std::path::PathBuf;
use std::time::Duration;

/// Distributed node configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Identity announced to the discovery service.
    pub node_id: String,
    /// URL other nodes use to reach this server.
    pub public_endpoint: String,
    /// Base URL of the discovery service.
    pub discovery_url: String,
    /// When false the node is standalone: no discovery, broadcast or peer
    /// queries.
    pub enable_p2p: bool,
    /// Timeout for every peer and discovery request.
    pub request_timeout: Duration,
    /// Directory holding `media_registry.json` and `peers.json`.
    pub data_dir: PathBuf,
}

impl NodeConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env var             | Default                 |
    /// |---------------------|-------------------------|
    /// | `NODE_ID`           | random UUID v4          |
    /// | `PUBLIC_ENDPOINT`   | `http://localhost:5000` |
    /// | `DISCOVERY_SERVICE` | `http://localhost:5001` |
    /// | `ENABLE_P2P`        | `true`                  |
    /// | `REQUEST_TIMEOUT`   | `30` (seconds)          |
    /// | `DATA_DIR`          | `node_data`             |
    pub fn from_env() -> Self {
        let node_id = std::env::var("NODE_ID").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());
        let public_endpoint =
            std::env::var("PUBLIC_ENDPOINT").unwrap_or_else(|_| "http://localhost:5000".into());
        let discovery_url =
            std::env::var("DISCOVERY_SERVICE").unwrap_or_else(|_| "http://localhost:5001".into());
        let enable_p2p = std::env::var("ENABLE_P2P")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT must be a valid u64");

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "node_data".into());

        Self {
            node_id,
            public_endpoint: public_endpoint.trim_end_matches('/').to_string(),
            discovery_url: discovery_url.trim_end_matches('/').to_string(),
            enable_p2p,
            request_timeout: Duration::from_secs(request_timeout_secs),
            data_dir: PathBuf::from(data_dir),
        }
    }

    /// Standalone node storing its files under `data_dir`.
    pub fn standalone(node_id: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            node_id: node_id.into(),
            public_endpoint: "http://localhost:5000".into(),
            discovery_url: "http://localhost:5001".into(),
            enable_p2p: false,
            request_timeout: Duration::from_secs(30),
            data_dir: data_dir.into(),
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("media_registry.json")
    }

    pub fn peers_path(&self) -> PathBuf {
        self.data_dir.join("peers.json")
    }
}
