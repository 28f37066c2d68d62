//! Known peer nodes, persisted as JSON.

use std::collections::HashMap;
use std::path::PathBuf;

use blocksnap_core::types::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::NodeError;
use crate::json_store;

/// What a node is willing to do for others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub verify: bool,
    #[serde(default)]
    pub broadcast: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            verify: true,
            broadcast: true,
        }
    }
}

/// A node as listed by the discovery service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub node_id: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub last_seen: Option<Timestamp>,
}

impl Peer {
    /// Endpoint without a trailing slash, if the peer advertised one.
    pub fn base_url(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/'))
            .filter(|e| !e.is_empty())
    }
}

/// Peer table guarded by an async lock.
pub struct PeerTable {
    path: PathBuf,
    peers: RwLock<HashMap<String, Peer>>,
}

impl PeerTable {
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let peers: HashMap<String, Peer> = json_store::load_or_default(&path).await;
        Self {
            path,
            peers: RwLock::new(peers),
        }
    }

    /// Add or refresh the listed nodes, skipping `self_id`, and persist.
    ///
    /// Returns the table size afterwards.
    pub async fn upsert_all(&self, nodes: Vec<Peer>, self_id: &str) -> Result<usize, NodeError> {
        let mut peers = self.peers.write().await;
        let now = Utc::now();
        for mut node in nodes {
            if node.node_id.is_empty() || node.node_id == self_id {
                continue;
            }
            node.last_seen = Some(now);
            peers.insert(node.node_id.clone(), node);
        }
        json_store::save(&self.path, &*peers).await?;
        Ok(peers.len())
    }

    /// Peers advertising the capability selected by `wanted` and an endpoint,
    /// ordered by node id.
    pub async fn with_capability(&self, wanted: impl Fn(&Capabilities) -> bool) -> Vec<Peer> {
        let peers = self.peers.read().await;
        let mut selected: Vec<Peer> = peers
            .values()
            .filter(|p| wanted(&p.capabilities) && p.base_url().is_some())
            .cloned()
            .collect();
        selected.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        selected
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
