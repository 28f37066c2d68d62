//! Owner-centric lookups built on the block-range scanner.
//!
//! Lists the photo tokens and video sessions belonging to an address, and
//! finds the owner of a session. Individual token or session failures are
//! logged and skipped; a scan the provider cannot serve is reported through
//! the `unavailable` field instead of an error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::sol_types::SolEvent;
use blocksnap_core::session::{VideoChunk, VideoSession};
use blocksnap_core::types::{ChainId, Timestamp};
use chrono::{DateTime, Utc};

use crate::abi::{PhotoMinted, VideoChunkAdded, VideoSessionEnded, VideoSessionStarted};
use crate::client::{id_topic, to_chain_id, ChainClient, ChainLog};
use crate::scanner::{BlockRangeScanner, ScanFilter, ScanPolicy};

/// A photo token currently held by the queried owner.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedToken {
    pub token_id: ChainId,
    pub owner: Address,
    pub image_cid: String,
    pub metadata_uri: String,
    pub tx_hash: Option<String>,
    pub minted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenListing {
    pub tokens: Vec<OwnedToken>,
    /// Set when the provider could not serve the scan.
    pub unavailable: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionListing {
    pub sessions: Vec<VideoSession>,
    pub unavailable: Option<String>,
}

#[derive(Clone)]
pub struct Inventory {
    client: Arc<dyn ChainClient>,
    policy: ScanPolicy,
}

impl Inventory {
    pub fn new(client: Arc<dyn ChainClient>, policy: ScanPolicy) -> Self {
        Self { client, policy }
    }

    fn scanner(&self) -> BlockRangeScanner<'_> {
        BlockRangeScanner::new(self.client.as_ref(), self.policy)
    }

    /// Photo tokens minted within the lookback span that `owner` still holds.
    pub async fn owned_tokens(&self, owner: Address) -> TokenListing {
        let outcome = self
            .scanner()
            .scan(ScanFilter::event(PhotoMinted::SIGNATURE_HASH))
            .await;
        let unavailable = outcome.unavailable_reason().map(str::to_string);

        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        for log in outcome.into_logs() {
            let event = match log.decode::<PhotoMinted>() {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Skipping undecodable PhotoMinted log");
                    continue;
                }
                None => continue,
            };
            let Ok(token_id) = to_chain_id(event.tokenId) else {
                continue;
            };
            if !seen.insert(token_id) {
                continue;
            }

            match self.client.owner_of(token_id).await {
                Ok(current) if current == owner => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(token_id, error = %e, "ownerOf failed, skipping token");
                    continue;
                }
            }

            let metadata_uri = self
                .client
                .token_uri(token_id)
                .await
                .unwrap_or_else(|e| {
                    tracing::debug!(token_id, error = %e, "tokenURI failed, using event value");
                    event.metadataURI.clone()
                });
            let image_cid = self
                .client
                .image_cid(token_id)
                .await
                .unwrap_or_else(|e| {
                    tracing::debug!(token_id, error = %e, "getImageCID failed, using event value");
                    event.ipfsCID.clone()
                });

            tokens.push(OwnedToken {
                token_id,
                owner,
                image_cid,
                metadata_uri,
                tx_hash: log.tx_hash_hex(),
                minted_at: self.log_time(&log).await,
            });
        }

        tracing::info!(%owner, count = tokens.len(), "Listed owned tokens from chain");
        TokenListing {
            tokens,
            unavailable,
        }
    }

    /// Video sessions opened for `owner` within the lookback span, with
    /// their chunks and per-chunk transaction hashes.
    pub async fn video_sessions(&self, owner: Address) -> SessionListing {
        let outcome = self
            .scanner()
            .scan(ScanFilter::event(VideoSessionStarted::SIGNATURE_HASH).topic2(owner.into_word()))
            .await;
        let unavailable = outcome.unavailable_reason().map(str::to_string);
        let started = outcome.into_logs();
        if started.is_empty() {
            return SessionListing {
                sessions: Vec::new(),
                unavailable,
            };
        }

        let chunk_hashes = self.chunk_tx_hashes().await;
        let ended = self.ended_sessions().await;

        let mut sessions = Vec::new();
        for log in started {
            let event = match log.decode::<VideoSessionStarted>() {
                Some(Ok(event)) => event,
                _ => continue,
            };
            let Ok(session_id) = to_chain_id(event.sessionId) else {
                continue;
            };
            if event.owner != owner {
                continue;
            }

            let chain_chunks = match self.client.session_chunks(session_id).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "Failed to read session chunks");
                    Vec::new()
                }
            };

            let owner_hex = owner.to_string();
            let last_seq = chain_chunks.iter().map(|c| c.sequence_number).max();
            let chunks: Vec<VideoChunk> = chain_chunks
                .into_iter()
                .map(|c| VideoChunk {
                    sequence_number: c.sequence_number,
                    tx_hash: chunk_hashes.get(&(session_id, c.sequence_number)).cloned(),
                    is_last_chunk: ended.contains(&session_id)
                        && Some(c.sequence_number) == last_seq,
                    video_cid: c.video_cid,
                    metadata_cid: c.metadata_cid,
                    timestamp: unix_to_timestamp(c.timestamp),
                    owner: owner_hex.clone(),
                })
                .collect();

            let start_time = match self.log_time(&log).await {
                Some(t) => t,
                None => chunks
                    .first()
                    .map(|c| c.timestamp)
                    .unwrap_or_else(|| unix_to_timestamp(0)),
            };

            sessions.push(VideoSession::from_chain(
                session_id,
                owner_hex,
                start_time,
                log.tx_hash_hex(),
                chunks,
            ));
        }

        tracing::info!(%owner, count = sessions.len(), "Listed video sessions from chain");
        SessionListing {
            sessions,
            unavailable,
        }
    }

    /// Owner recorded when the session was opened, if its log is within the
    /// lookback span.
    pub async fn session_owner(&self, session_id: ChainId) -> Option<Address> {
        let outcome = self
            .scanner()
            .scan(ScanFilter::event(VideoSessionStarted::SIGNATURE_HASH).topic1(id_topic(session_id)))
            .await;
        outcome
            .into_logs()
            .iter()
            .filter_map(|log| log.decode::<VideoSessionStarted>()?.ok())
            .find(|event| to_chain_id(event.sessionId).ok() == Some(session_id))
            .map(|event| event.owner)
    }

    async fn chunk_tx_hashes(&self) -> HashMap<(ChainId, ChainId), String> {
        let outcome = self
            .scanner()
            .scan(ScanFilter::event(VideoChunkAdded::SIGNATURE_HASH))
            .await;
        let mut hashes = HashMap::new();
        for log in outcome.into_logs() {
            let Some(Ok(event)) = log.decode::<VideoChunkAdded>() else {
                continue;
            };
            let (Ok(session), Ok(seq)) = (
                to_chain_id(event.sessionId),
                to_chain_id(event.sequenceNumber),
            ) else {
                continue;
            };
            if let Some(hash) = log.tx_hash_hex() {
                hashes.entry((session, seq)).or_insert(hash);
            }
        }
        hashes
    }

    async fn ended_sessions(&self) -> HashSet<ChainId> {
        self.scanner()
            .scan(ScanFilter::event(VideoSessionEnded::SIGNATURE_HASH))
            .await
            .into_logs()
            .iter()
            .filter_map(|log| log.decode::<VideoSessionEnded>()?.ok())
            .filter_map(|event| to_chain_id(event.sessionId).ok())
            .collect()
    }

    async fn log_time(&self, log: &ChainLog) -> Option<Timestamp> {
        let block = log.block_number?;
        match self.client.block_timestamp(block).await {
            Ok(Some(secs)) => Some(unix_to_timestamp(secs)),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(block, error = %e, "Block timestamp unavailable");
                None
            }
        }
    }
}

fn unix_to_timestamp(secs: u64) -> Timestamp {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .unwrap_or_default()
}

