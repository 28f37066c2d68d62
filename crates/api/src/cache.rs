//! Local NFT and video session caches.
//!
//! Minted photos are cached per wallet (`nft_cache/{wallet}.json`, wallet
//! lowercased) and dashcam sessions per session id
//! (`video_cache/session_{id}.json`). Galleries merge these with chain
//! scans so fresh uploads show up before the provider indexes them.
//!
//! Chunk appends go through [`VideoSession::append`], so the cached copy of
//! a session always satisfies the ordering and owner invariants.

use std::path::{Path, PathBuf};

use blocksnap_core::error::CoreError;
use blocksnap_core::media::MediaRecord;
use blocksnap_core::session::{VideoChunk, VideoSession};
use blocksnap_core::types::{ChainId, Timestamp};
use blocksnap_network::json_store;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AppResult;

pub const NFT_CACHE_DIR: &str = "nft_cache";
pub const VIDEO_CACHE_DIR: &str = "video_cache";

// ---------------------------------------------------------------------------
// Gallery entries
// ---------------------------------------------------------------------------

/// Where a gallery entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NftSource {
    LocalCache,
    Blockchain,
    Demo,
}

/// A display-ready NFT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftView {
    #[serde(flatten)]
    pub record: MediaRecord,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Gateway URL of the image.
    #[serde(default)]
    pub image: String,
    /// Full metadata document, when it could be fetched.
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub source: NftSource,
}

impl AsRef<MediaRecord> for NftView {
    fn as_ref(&self) -> &MediaRecord {
        &self.record
    }
}

/// How a chunk upload relates to its session.
#[derive(Debug, Clone)]
pub enum SessionOpening {
    /// First chunk: create the session if the cache has never seen it.
    First {
        owner: String,
        started_at: Timestamp,
        tx_hash: Option<String>,
    },
    /// Later chunk: the session must already be cached.
    Continuation,
}

// ---------------------------------------------------------------------------
// MediaCache
// ---------------------------------------------------------------------------

pub struct MediaCache {
    root: PathBuf,
    /// Serializes read-modify-write cycles on cache files.
    write_lock: Mutex<()>,
}

impl MediaCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn nft_path(&self, wallet: &str) -> PathBuf {
        self.root
            .join(NFT_CACHE_DIR)
            .join(format!("{}.json", wallet.to_lowercase()))
    }

    fn session_path(&self, session_id: ChainId) -> PathBuf {
        self.root
            .join(VIDEO_CACHE_DIR)
            .join(format!("session_{session_id}.json"))
    }

    // ---- NFTs ----

    /// Cached NFTs minted for `wallet`, in insertion order.
    pub async fn nfts(&self, wallet: &str) -> Vec<NftView> {
        json_store::load_or_default(&self.nft_path(wallet)).await
    }

    pub async fn add_nft(&self, wallet: &str, nft: NftView) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.nft_path(wallet);
        let mut nfts: Vec<NftView> = json_store::load_or_default(&path).await;
        nfts.push(nft);
        json_store::save(&path, &nfts).await?;
        tracing::info!(wallet, count = nfts.len(), "Cached minted NFT");
        Ok(())
    }

    // ---- video sessions ----

    pub async fn session(&self, session_id: ChainId) -> Option<VideoSession> {
        json_store::load_or_default::<Option<VideoSession>>(&self.session_path(session_id)).await
    }

    /// Cached sessions owned by `owner` (case-insensitive).
    pub async fn sessions_for(&self, owner: &str) -> Vec<VideoSession> {
        let dir = self.root.join(VIDEO_CACHE_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "Failed to read session cache");
                return Vec::new();
            }
        };

        let mut sessions = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to list session cache");
                    break;
                }
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("session_") && name.ends_with(".json")) {
                continue;
            }
            let cached: Option<VideoSession> = json_store::load_or_default(&entry.path()).await;
            if let Some(session) = cached.filter(|s| s.owner.eq_ignore_ascii_case(owner)) {
                sessions.push(session);
            }
        }
        tracing::debug!(owner, count = sessions.len(), "Loaded cached video sessions");
        sessions
    }

    /// Check that `chunk` could be appended, without writing anything.
    pub async fn check_chunk(
        &self,
        session_id: ChainId,
        opening: &SessionOpening,
        chunk: &VideoChunk,
    ) -> AppResult<()> {
        let mut session = self.open(session_id, opening).await?;
        session.append(chunk.clone())?;
        Ok(())
    }

    /// Append `chunk` to the cached session and persist it.
    pub async fn record_chunk(
        &self,
        session_id: ChainId,
        opening: &SessionOpening,
        chunk: VideoChunk,
    ) -> AppResult<VideoSession> {
        let _guard = self.write_lock.lock().await;
        let mut session = self.open(session_id, opening).await?;
        let sequence_number = chunk.sequence_number;
        session.append(chunk)?;
        json_store::save(&self.session_path(session_id), &session).await?;
        tracing::info!(
            session_id,
            sequence_number,
            complete = session.is_complete(),
            "Cached video chunk"
        );
        Ok(session)
    }

    async fn open(
        &self,
        session_id: ChainId,
        opening: &SessionOpening,
    ) -> Result<VideoSession, CoreError> {
        match (self.session(session_id).await, opening) {
            (Some(_), SessionOpening::First { .. }) => Err(CoreError::Conflict(format!(
                "Video session {session_id} already exists"
            ))),
            (Some(session), SessionOpening::Continuation) => Ok(session),
            (
                None,
                SessionOpening::First {
                    owner,
                    started_at,
                    tx_hash,
                },
            ) => Ok(VideoSession::new(
                session_id,
                owner.clone(),
                *started_at,
                tx_hash.clone(),
            )),
            (None, SessionOpening::Continuation) => Err(CoreError::NotFound {
                entity: "VideoSession",
                id: session_id.to_string(),
            }),
        }
    }
}
