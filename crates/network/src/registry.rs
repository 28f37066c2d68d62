//! Media registry keyed by transaction hash.
//!
//! Entries come from media this node minted or recorded, from peers'
//! broadcasts, and from positive peer verification answers. The registry
//! is a cache of chain facts: it is never consulted to decide ownership.

use std::collections::HashMap;
use std::path::PathBuf;

use blocksnap_core::media::MediaType;
use blocksnap_core::types::{ChainId, Timestamp};
use blocksnap_core::verification::{VerificationResult, VerificationSource};
use blocksnap_events::MediaEvent;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::NodeError;
use crate::json_store;

/// A registered piece of media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub tx_hash: String,
    #[serde(alias = "type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default, alias = "cid")]
    pub content_id: Option<String>,
    #[serde(default)]
    pub token_id: Option<ChainId>,
    #[serde(default)]
    pub session_id: Option<ChainId>,
    #[serde(default)]
    pub sequence_number: Option<ChainId>,
    #[serde(default)]
    pub metadata_uri: Option<String>,
    /// Full answer from the peer that verified it, when cached from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
    #[serde(default)]
    pub registered_by: Option<String>,
    #[serde(default)]
    pub registered_at: Option<Timestamp>,
}

impl MediaEntry {
    pub fn new(tx_hash: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            media_type,
            owner: None,
            content_id: None,
            token_id: None,
            session_id: None,
            sequence_number: None,
            metadata_uri: None,
            verification: None,
            registered_by: None,
            registered_at: None,
        }
    }

    pub fn from_event(event: &MediaEvent) -> Self {
        Self {
            owner: event.owner.clone(),
            content_id: event.content_id.clone(),
            token_id: event.token_id,
            session_id: event.session_id,
            sequence_number: event.sequence_number,
            metadata_uri: event.metadata_uri.clone(),
            ..Self::new(event.tx_hash.clone(), event.media_type)
        }
    }

    pub fn from_verification(result: &VerificationResult) -> Self {
        Self {
            owner: result.owner.clone(),
            content_id: result.content_id.clone(),
            token_id: result.token_id,
            session_id: result.session_id,
            sequence_number: result.sequence_number,
            metadata_uri: result.metadata_uri.clone(),
            verification: Some(result.clone()),
            ..Self::new(
                result.tx_hash.clone(),
                result.media_type.unwrap_or(MediaType::Unknown),
            )
        }
    }

    /// Answer served for this entry: the cached peer answer if there is
    /// one, otherwise a result rebuilt from the entry's fields.
    pub fn to_verification(&self) -> VerificationResult {
        let result = match &self.verification {
            Some(cached) => cached.clone(),
            None => VerificationResult {
                owner: self.owner.clone(),
                content_id: self.content_id.clone(),
                token_id: self.token_id,
                session_id: self.session_id,
                sequence_number: self.sequence_number,
                metadata_uri: self.metadata_uri.clone(),
                ..VerificationResult::found(self.tx_hash.clone(), self.media_type)
            },
        };
        result.with_source(VerificationSource::LocalRegistry)
    }

    fn owned_by(&self, owner: &str) -> bool {
        self.owner
            .as_deref()
            .is_some_and(|o| o.eq_ignore_ascii_case(owner))
    }
}

fn key(tx_hash: &str) -> String {
    tx_hash.trim().to_lowercase()
}

/// JSON-file backed registry guarded by an async lock.
pub struct MediaRegistry {
    path: PathBuf,
    entries: RwLock<HashMap<String, MediaEntry>>,
}

impl MediaRegistry {
    /// Load the registry from `path`, starting empty if it does not exist.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries: HashMap<String, MediaEntry> = json_store::load_or_default(&path).await;
        tracing::info!(path = %path.display(), count = entries.len(), "Loaded media registry");
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Insert or replace an entry and persist the registry.
    ///
    /// Entries without a transaction hash are rejected.
    pub async fn insert(&self, entry: MediaEntry) -> Result<(), NodeError> {
        if entry.tx_hash.trim().is_empty() {
            return Err(NodeError::Validation("missing transaction hash".into()));
        }
        let mut entries = self.entries.write().await;
        entries.insert(key(&entry.tx_hash), entry);
        json_store::save(&self.path, &*entries).await
    }

    pub async fn get(&self, tx_hash: &str) -> Option<MediaEntry> {
        self.entries.read().await.get(&key(tx_hash)).cloned()
    }

    pub async fn contains(&self, tx_hash: &str) -> bool {
        self.entries.read().await.contains_key(&key(tx_hash))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Entries matching the optional filters, most recently registered first.
    pub async fn query(
        &self,
        media_type: Option<MediaType>,
        owner: Option<&str>,
        limit: usize,
    ) -> Vec<MediaEntry> {
        let entries = self.entries.read().await;
        let mut matched: Vec<MediaEntry> = entries
            .values()
            .filter(|e| media_type.is_none_or(|t| e.media_type == t))
            .filter(|e| owner.is_none_or(|o| e.owned_by(o)))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.registered_at
                .unwrap_or_default()
                .cmp(&a.registered_at.unwrap_or_default())
                .then_with(|| a.tx_hash.cmp(&b.tx_hash))
        });
        matched.truncate(limit);
        matched
    }

    /// Most recently registered entries.
    pub async fn recent(&self, limit: usize) -> Vec<MediaEntry> {
        self.query(None, None, limit).await
    }

    /// Stamp an entry with this node's id and the current time.
    pub fn stamp(mut entry: MediaEntry, node_id: &str) -> MediaEntry {
        entry.registered_by = Some(node_id.to_string());
        entry.registered_at = Some(Utc::now());
        entry
    }
}
