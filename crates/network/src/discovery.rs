//! REST client for the discovery service and for peer nodes.
//!
//! Discovery: `POST /register`, `GET /nodes`, `POST /heartbeat/{node_id}`.
//! Peers: `GET /api/verify/tx/{hash}` and `POST /api/media/broadcast`.

use std::time::Duration;

use blocksnap_core::verification::VerificationResult;
use serde::Serialize;

use crate::error::NodeError;
use crate::peers::{Capabilities, Peer};
use crate::registry::MediaEntry;

/// Body sent to `POST /register`.
#[derive(Debug, Clone, Serialize)]
pub struct NodeAnnouncement {
    pub node_id: String,
    pub endpoint: String,
    pub capabilities: Capabilities,
}

/// HTTP client for the discovery service and peer endpoints.
#[derive(Clone)]
pub struct DiscoveryClient {
    client: reqwest::Client,
    discovery_url: String,
}

impl DiscoveryClient {
    pub fn new(discovery_url: String, timeout: Duration) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            discovery_url,
        })
    }

    /// Announce this node.
    pub async fn register(&self, announcement: &NodeAnnouncement) -> Result<(), NodeError> {
        let response = self
            .client
            .post(format!("{}/register", self.discovery_url))
            .json(announcement)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Nodes currently known to the discovery service.
    pub async fn nodes(&self) -> Result<Vec<Peer>, NodeError> {
        let response = self
            .client
            .get(format!("{}/nodes", self.discovery_url))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Refresh this node's `last_seen` at the discovery service.
    pub async fn heartbeat(&self, node_id: &str) -> Result<(), NodeError> {
        let response = self
            .client
            .post(format!("{}/heartbeat/{node_id}", self.discovery_url))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Ask a peer to verify a transaction.
    pub async fn verify_on_peer(
        &self,
        base_url: &str,
        tx_hash: &str,
    ) -> Result<VerificationResult, NodeError> {
        let response = self
            .client
            .get(format!("{base_url}/api/verify/tx/{tx_hash}"))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Push a media entry to a peer.
    pub async fn broadcast_to_peer(
        &self,
        base_url: &str,
        entry: &MediaEntry,
    ) -> Result<(), NodeError> {
        let response = self
            .client
            .post(format!("{base_url}/api/media/broadcast"))
            .json(entry)
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`NodeError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, NodeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NodeError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, NodeError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), NodeError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
