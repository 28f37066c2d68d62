use std::sync::Arc;

use blocksnap_chain::inventory::Inventory;
use blocksnap_chain::resolver::TransactionResolver;
use blocksnap_chain::{ChainClient, ContractWriter};
use blocksnap_events::EventBus;
use blocksnap_ipfs::ContentStore;
use blocksnap_network::DistributedNode;

use crate::cache::MediaCache;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Read access to the BlockSnap contract.
    pub chain: Arc<dyn ChainClient>,
    /// Signed writes (mints and session transactions).
    pub writer: Arc<dyn ContractWriter>,
    /// IPFS node or Pinata.
    pub store: Arc<dyn ContentStore>,
    /// Transaction classification.
    pub resolver: Arc<TransactionResolver>,
    /// Owner-centric chain scans.
    pub inventory: Arc<Inventory>,
    /// Media registry and peer network.
    pub node: Arc<DistributedNode>,
    /// Local NFT and video session caches.
    pub cache: Arc<MediaCache>,
    /// Media events consumed by the registration listener.
    pub event_bus: Arc<EventBus>,
}
