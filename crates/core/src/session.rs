//! Segmented video sessions.
//!
//! A session is opened by its first chunk and grows one chunk at a time.
//! [`VideoSession::append`] is the only way to add a locally uploaded chunk
//! and enforces the session invariants:
//!
//! - sequence numbers are unique and contiguous starting at 0,
//! - every chunk belongs to the session owner, fixed by the first chunk.
//!   Placeholder chunks are accepted in any session; a session opened by the
//!   placeholder keeps it as owner and accepts wallet chunks with a warning,
//! - once a chunk flagged `is_last_chunk` is accepted the session is
//!   complete and rejects further chunks.

use serde::{Deserialize, Serialize};

use crate::address::{is_placeholder, normalize};
use crate::error::CoreError;
use crate::types::{ChainId, Timestamp};

/// One uploaded slice of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoChunk {
    pub sequence_number: ChainId,
    pub video_cid: String,
    pub metadata_cid: String,
    pub timestamp: Timestamp,
    pub owner: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub is_last_chunk: bool,
}

/// A dashcam recording session and its ordered chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSession {
    pub session_id: ChainId,
    pub owner: String,
    pub start_time: Timestamp,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub blockchain_verified: bool,
    #[serde(default)]
    complete: bool,
    #[serde(default)]
    chunks: Vec<VideoChunk>,
}

impl VideoSession {
    pub fn new(
        session_id: ChainId,
        owner: impl Into<String>,
        start_time: Timestamp,
        tx_hash: Option<String>,
    ) -> Self {
        Self {
            session_id,
            owner: owner.into(),
            start_time,
            tx_hash,
            blockchain_verified: false,
            complete: false,
            chunks: Vec::new(),
        }
    }

    /// Whether a closing chunk has been accepted.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Chunks ordered by sequence number.
    pub fn chunks(&self) -> &[VideoChunk] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Sequence number the next appended chunk must carry.
    pub fn next_sequence(&self) -> ChainId {
        self.chunks.len() as ChainId
    }

    /// Whether the chunks form the gap-free sequence `0..n`.
    pub fn is_contiguous(&self) -> bool {
        self.chunks
            .iter()
            .enumerate()
            .all(|(i, c)| c.sequence_number == i as ChainId)
    }

    /// Append a locally uploaded chunk, enforcing the session invariants.
    pub fn append(&mut self, chunk: VideoChunk) -> Result<(), CoreError> {
        if self.complete {
            return Err(CoreError::Conflict(format!(
                "Video session {} is already complete",
                self.session_id
            )));
        }

        let expected = self.next_sequence();
        if chunk.sequence_number < expected {
            return Err(CoreError::Conflict(format!(
                "Chunk {} already recorded for session {}",
                chunk.sequence_number, self.session_id
            )));
        }
        if chunk.sequence_number > expected {
            return Err(CoreError::Conflict(format!(
                "Chunk {} is out of order for session {} (expected {expected})",
                chunk.sequence_number, self.session_id
            )));
        }

        // The owner is fixed by the first chunk, placeholder included.
        if !is_placeholder(&chunk.owner) {
            if is_placeholder(&self.owner) {
                tracing::warn!(
                    session_id = self.session_id,
                    chunk_owner = %chunk.owner,
                    "Wallet chunk in a session opened without a wallet, owner stays placeholder"
                );
            } else if normalize(&chunk.owner) != normalize(&self.owner) {
                return Err(CoreError::Conflict(format!(
                    "Chunk owner {} does not match session owner {}",
                    chunk.owner, self.owner
                )));
            }
        }

        self.complete = chunk.is_last_chunk;
        self.chunks.push(chunk);
        Ok(())
    }

    /// Fold the on-chain view of the same session into this one.
    ///
    /// Chunks are unioned by sequence number with local entries winning,
    /// the session is marked chain-verified and a missing transaction hash
    /// is filled in. On-chain data is taken as observed, so the merged list
    /// is ordered but not guaranteed to be gap-free.
    pub fn merge_chain(&mut self, chain: VideoSession) {
        self.blockchain_verified = true;
        if self.tx_hash.is_none() {
            self.tx_hash = chain.tx_hash;
        }
        self.complete |= chain.complete;
        for chunk in chain.chunks {
            match self
                .chunks
                .binary_search_by_key(&chunk.sequence_number, |c| c.sequence_number)
            {
                Ok(i) => {
                    if self.chunks[i].tx_hash.is_none() {
                        self.chunks[i].tx_hash = chunk.tx_hash;
                    }
                }
                Err(i) => self.chunks.insert(i, chunk),
            }
        }
    }

    /// Build a session from chunks read back from the chain.
    pub fn from_chain(
        session_id: ChainId,
        owner: impl Into<String>,
        start_time: Timestamp,
        tx_hash: Option<String>,
        mut chunks: Vec<VideoChunk>,
    ) -> Self {
        chunks.sort_by_key(|c| c.sequence_number);
        chunks.dedup_by_key(|c| c.sequence_number);
        let complete = chunks.last().is_some_and(|c| c.is_last_chunk);
        Self {
            session_id,
            owner: owner.into(),
            start_time,
            tx_hash,
            blockchain_verified: true,
            complete,
            chunks,
        }
    }
}

/// Merge locally cached sessions with sessions read from the chain.
///
/// Sessions are matched by id; the result is ordered by start time,
/// newest first.
pub fn merge_sessions(cached: Vec<VideoSession>, chain: Vec<VideoSession>) -> Vec<VideoSession> {
    let mut merged = cached;
    for chain_session in chain {
        match merged
            .iter_mut()
            .find(|s| s.session_id == chain_session.session_id)
        {
            Some(local) => local.merge_chain(chain_session),
            None => merged.push(chain_session),
        }
    }
    merged.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    merged
}
