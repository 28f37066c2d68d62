use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the chain RPC answers `eth_blockNumber`.
    pub chain_healthy: bool,
    /// Whether the IPFS node answers `version`.
    pub ipfs_healthy: bool,
    /// This node's id in the verification network.
    pub node_id: String,
    pub p2p_enabled: bool,
}

/// GET /health -- returns service, chain and storage health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (chain, ipfs) = tokio::join!(state.chain.block_number(), state.store.version());
    let chain_healthy = chain.is_ok();
    let ipfs_healthy = ipfs.is_ok();

    let status = if chain_healthy && ipfs_healthy {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        chain_healthy,
        ipfs_healthy,
        node_id: state.node.node_id().to_string(),
        p2p_enabled: state.node.p2p_enabled(),
    })
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
