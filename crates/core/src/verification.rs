//! Normalized verification answers.
//!
//! A [`VerificationResult`] is computed on demand from chain data and is
//! never the source of truth. The distributed registry keeps copies of
//! results received from peers, tagged with their [`VerificationSource`].

use serde::{Deserialize, Serialize};

use crate::media::MediaType;
use crate::types::ChainId;

/// Where a verification answer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum VerificationSource {
    /// Resolved directly from this node's chain RPC.
    Blockchain,
    /// Served from this node's media registry.
    LocalRegistry,
    /// Answered by the peer with the given node id.
    Peer(String),
}

impl From<VerificationSource> for String {
    fn from(source: VerificationSource) -> Self {
        match source {
            VerificationSource::Blockchain => "blockchain".to_string(),
            VerificationSource::LocalRegistry => "local_registry".to_string(),
            VerificationSource::Peer(id) => format!("peer_{id}"),
        }
    }
}

impl From<String> for VerificationSource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "local_registry" => Self::LocalRegistry,
            _ => match value.strip_prefix("peer_") {
                Some(id) => Self::Peer(id.to_string()),
                None => Self::Blockchain,
            },
        }
    }
}

/// Display-ready answer to "is this transaction BlockSnap media?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub tx_hash: String,
    pub exists_on_blockchain: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists_on_ipfs: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<ChainId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<ChainId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<ChainId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipfs_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub source: VerificationSource,
}

impl VerificationResult {
    /// A confirmed match; callers fill the classification fields.
    pub fn found(tx_hash: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            media_type: Some(media_type),
            exists_on_blockchain: true,
            ..Self::missing(tx_hash)
        }
    }

    /// Definitive "this transaction does not exist".
    pub fn missing(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            exists_on_blockchain: false,
            exists_on_ipfs: None,
            media_type: None,
            owner: None,
            token_id: None,
            session_id: None,
            sequence_number: None,
            content_id: None,
            metadata_uri: None,
            ipfs_url: None,
            function_name: None,
            message: None,
            source: VerificationSource::Blockchain,
        }
    }

    /// "Not found" with an explanation, e.g. a transaction to another contract.
    pub fn not_found(tx_hash: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::missing(tx_hash)
        }
    }

    pub fn with_source(mut self, source: VerificationSource) -> Self {
        self.source = source;
        self
    }
}
