//! The distributed verification node.
//!
//! Lookup order for [`DistributedNode::verify_across_network`]:
//!
//! 1. this node's media registry
//! 2. this node's chain resolver
//! 3. each peer advertising the `verify` capability, in node-id order
//!
//! A positive peer answer is cached in the registry so the next lookup is
//! local. Broadcasts are fire-and-forget: a peer that is down simply misses
//! the entry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blocksnap_chain::resolver::TransactionResolver;
use blocksnap_chain::ChainError;
use blocksnap_core::verification::{VerificationResult, VerificationSource};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::NodeConfig;
use crate::discovery::{DiscoveryClient, NodeAnnouncement};
use crate::error::NodeError;
use crate::peers::{Capabilities, PeerTable};
use crate::registry::{MediaEntry, MediaRegistry};

/// How often the peer list is refreshed from the discovery service.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(60);

/// How often this node reports itself alive.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(300);

const P2P_DISABLED_MESSAGE: &str = "P2P is disabled, cannot verify across network";
const NOT_ON_ANY_PEER_MESSAGE: &str = "Transaction not found on any peer";

// ---------------------------------------------------------------------------
// Local verification seam
// ---------------------------------------------------------------------------

/// Verifies a transaction against this node's own chain connection.
#[async_trait]
pub trait TransactionVerifier: Send + Sync {
    async fn verify_transaction(&self, tx_hash: &str) -> Result<VerificationResult, ChainError>;
}

#[async_trait]
impl TransactionVerifier for TransactionResolver {
    async fn verify_transaction(&self, tx_hash: &str) -> Result<VerificationResult, ChainError> {
        self.verify(tx_hash).await
    }
}

/// Outcome of a network-wide lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkVerification {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_info: Option<VerificationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<VerificationSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NetworkVerification {
    fn found(result: VerificationResult, source: VerificationSource) -> Self {
        Self {
            verified: true,
            media_info: Some(result.with_source(source.clone())),
            source: Some(source),
            message: None,
        }
    }

    fn not_found(message: &str) -> Self {
        Self {
            verified: false,
            media_info: None,
            source: None,
            message: Some(message.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// DistributedNode
// ---------------------------------------------------------------------------

pub struct DistributedNode {
    config: NodeConfig,
    registry: MediaRegistry,
    peers: PeerTable,
    discovery: DiscoveryClient,
    verifier: Option<Arc<dyn TransactionVerifier>>,
}

impl DistributedNode {
    /// Load the registry and peer table from `config.data_dir`.
    pub async fn new(
        config: NodeConfig,
        verifier: Option<Arc<dyn TransactionVerifier>>,
    ) -> Result<Self, NodeError> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        let registry = MediaRegistry::load(config.registry_path()).await;
        let peers = PeerTable::load(config.peers_path()).await;
        let discovery = DiscoveryClient::new(config.discovery_url.clone(), config.request_timeout)?;

        if config.enable_p2p {
            tracing::info!(node_id = %config.node_id, "Distributed node initialized");
        } else {
            tracing::info!(node_id = %config.node_id, "Distributed node initialized in standalone mode");
        }

        Ok(Self {
            config,
            registry,
            peers,
            discovery,
            verifier,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn p2p_enabled(&self) -> bool {
        self.config.enable_p2p
    }

    pub fn registry(&self) -> &MediaRegistry {
        &self.registry
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Store media produced by this node and, with P2P enabled, broadcast
    /// it to peers in the background.
    pub async fn register_media(&self, entry: MediaEntry) -> Result<MediaEntry, NodeError> {
        let entry = MediaRegistry::stamp(entry, &self.config.node_id);
        self.registry.insert(entry.clone()).await?;
        tracing::info!(
            tx_hash = %entry.tx_hash,
            media_type = %entry.media_type,
            "Registered media"
        );

        if self.config.enable_p2p {
            let targets = self.peers.with_capability(|c| c.broadcast).await;
            let discovery = self.discovery.clone();
            let payload = entry.clone();
            tokio::spawn(async move {
                broadcast_to(&discovery, &targets, &payload).await;
            });
        }
        Ok(entry)
    }

    /// Store an entry pushed by a peer. Never rebroadcast.
    pub async fn accept_broadcast(&self, mut entry: MediaEntry) -> Result<MediaEntry, NodeError> {
        if entry.registered_at.is_none() {
            entry.registered_at = Some(chrono::Utc::now());
        }
        self.registry.insert(entry.clone()).await?;
        tracing::info!(
            tx_hash = %entry.tx_hash,
            from = entry.registered_by.as_deref().unwrap_or("unknown"),
            "Accepted broadcast media"
        );
        Ok(entry)
    }

    /// Push an entry to every broadcast-capable peer now. Returns how many
    /// peers accepted it.
    pub async fn broadcast_media(&self, entry: &MediaEntry) -> usize {
        let targets = self.peers.with_capability(|c| c.broadcast).await;
        broadcast_to(&self.discovery, &targets, entry).await
    }

    pub async fn verify_across_network(&self, tx_hash: &str) -> NetworkVerification {
        if let Some(entry) = self.registry.get(tx_hash).await {
            tracing::info!(tx_hash, "Found transaction in local registry");
            return NetworkVerification::found(
                entry.to_verification(),
                VerificationSource::LocalRegistry,
            );
        }

        if let Some(verifier) = &self.verifier {
            match verifier.verify_transaction(tx_hash).await {
                Ok(result) if result.exists_on_blockchain => {
                    return NetworkVerification::found(result, VerificationSource::Blockchain);
                }
                Ok(_) => tracing::debug!(tx_hash, "Not found on local chain"),
                Err(e) => tracing::warn!(tx_hash, error = %e, "Local chain verification failed"),
            }
        }

        if !self.config.enable_p2p {
            tracing::warn!(tx_hash, "P2P is disabled, cannot verify across network");
            return NetworkVerification::not_found(P2P_DISABLED_MESSAGE);
        }

        let verifiers = self.peers.with_capability(|c| c.verify).await;
        tracing::info!(tx_hash, peers = verifiers.len(), "Querying peers");
        for peer in verifiers {
            let Some(base) = peer.base_url() else {
                continue;
            };
            let result = match self.discovery.verify_on_peer(base, tx_hash).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(peer = %peer.node_id, error = %e, "Peer verification failed");
                    continue;
                }
            };
            if !result.exists_on_blockchain {
                continue;
            }

            tracing::info!(tx_hash, peer = %peer.node_id, "Peer verified transaction");
            let entry = MediaRegistry::stamp(
                MediaEntry::from_verification(&result),
                &self.config.node_id,
            );
            if let Err(e) = self.registry.insert(entry).await {
                tracing::warn!(tx_hash, error = %e, "Failed to cache peer answer");
            }
            return NetworkVerification::found(result, VerificationSource::Peer(peer.node_id));
        }

        tracing::warn!(tx_hash, "Transaction not found on any peer");
        NetworkVerification::not_found(NOT_ON_ANY_PEER_MESSAGE)
    }

    // ---- discovery ----

    /// Announce this node to the discovery service.
    pub async fn announce(&self) -> Result<(), NodeError> {
        let announcement = NodeAnnouncement {
            node_id: self.config.node_id.clone(),
            endpoint: self.config.public_endpoint.clone(),
            capabilities: Capabilities::all(),
        };
        self.discovery.register(&announcement).await?;
        tracing::info!(discovery = %self.config.discovery_url, "Registered with discovery service");
        Ok(())
    }

    /// Pull the node list and merge it into the peer table.
    pub async fn refresh_peers(&self) -> Result<usize, NodeError> {
        let nodes = self.discovery.nodes().await?;
        let listed = nodes.len();
        let known = self.peers.upsert_all(nodes, &self.config.node_id).await?;
        tracing::info!(listed, known, "Refreshed peers");
        Ok(known)
    }

    /// Send a heartbeat, re-announcing when it is rejected.
    pub async fn heartbeat(&self) {
        match self.discovery.heartbeat(&self.config.node_id).await {
            Ok(()) => tracing::debug!("Sent heartbeat to discovery service"),
            Err(e) => {
                tracing::warn!(error = %e, "Heartbeat failed, re-registering");
                if let Err(e) = self.announce().await {
                    tracing::error!(error = %e, "Re-registration failed");
                }
            }
        }
    }

    /// Background discovery loop: announce, then refresh peers every
    /// [`DISCOVERY_INTERVAL`] and heartbeat every [`HEARTBEAT_INTERVAL`]
    /// until `cancel` fires. Returns immediately in standalone mode.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if !self.config.enable_p2p {
            return;
        }

        if let Err(e) = self.announce().await {
            tracing::error!(error = %e, "Failed to register with discovery service");
        }

        let mut discover = tokio::time::interval(DISCOVERY_INTERVAL);
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        // Both intervals fire immediately on the first tick.
        discover.tick().await;
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Discovery loop shutting down");
                    break;
                }
                _ = discover.tick() => {
                    if let Err(e) = self.refresh_peers().await {
                        tracing::error!(error = %e, "Peer discovery failed");
                    }
                }
                _ = heartbeat.tick() => self.heartbeat().await,
            }
        }
    }
}

async fn broadcast_to(
    discovery: &DiscoveryClient,
    targets: &[crate::peers::Peer],
    entry: &MediaEntry,
) -> usize {
    let sends = targets.iter().filter_map(|peer| {
        let base = peer.base_url()?;
        Some(async move {
            match discovery.broadcast_to_peer(base, entry).await {
                Ok(()) => {
                    tracing::info!(peer = %peer.node_id, tx_hash = %entry.tx_hash, "Broadcast media");
                    true
                }
                Err(e) => {
                    tracing::warn!(peer = %peer.node_id, error = %e, "Broadcast to peer failed");
                    false
                }
            }
        })
    });
    futures::future::join_all(sends)
        .await
        .into_iter()
        .filter(|delivered| *delivered)
        .count()
}
