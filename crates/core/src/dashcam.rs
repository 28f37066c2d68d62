//! Dashcam chunk/session coordinator.
//!
//! Slices a continuous recording into fixed-duration chunks and uploads them
//! one at a time. The server assigns the session id in its answer to the
//! first chunk; every later chunk carries it. The final chunk, emitted on
//! [`stop`](DashcamCoordinator::stop), closes the session.
//!
//! Uploads are never retried. A failed upload is recorded as an
//! [`UploadNotice`] and the same sequence number is reused for the next
//! chunk, so the session stays gap-free. Losing the wallet connection does
//! not halt recording: chunks are then attributed to the placeholder owner.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::types::{ChainId, Timestamp};
use crate::wallet::WalletState;

/// Default length of one recorded chunk.
pub const DEFAULT_CHUNK_DURATION: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Upload seam
// ---------------------------------------------------------------------------

/// One chunk ready for upload.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub data: Vec<u8>,
    pub wallet_address: String,
    pub sequence_number: ChainId,
    pub session_id: Option<ChainId>,
    pub is_first_chunk: bool,
    pub is_last_chunk: bool,
}

/// Server acknowledgement of an uploaded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAck {
    pub session_id: ChainId,
    pub sequence_number: ChainId,
    pub video_cid: String,
    #[serde(default)]
    pub metadata_cid: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Upload transport failed: {0}")]
    Transport(String),

    #[error("Upload rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Transport that delivers chunks to the server.
#[async_trait]
pub trait ChunkUploader: Send + Sync {
    async fn upload(&self, chunk: ChunkUpload) -> Result<ChunkAck, UploadError>;
}

#[async_trait]
impl<T: ChunkUploader + ?Sized> ChunkUploader for std::sync::Arc<T> {
    async fn upload(&self, chunk: ChunkUpload) -> Result<ChunkAck, UploadError> {
        (**self).upload(chunk).await
    }
}

/// Recorder buffer drained once per chunk interval.
pub trait ChunkSource: Send {
    /// Take everything recorded since the previous call.
    fn take_chunk(&mut self) -> Vec<u8>;
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
    Stopping,
}

/// A surfaced, non-retried upload failure.
#[derive(Debug, Clone, Serialize)]
pub struct UploadNotice {
    pub sequence_number: ChainId,
    pub message: String,
    pub at: Timestamp,
}

/// Outcome of a finished recording.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSummary {
    pub session_id: Option<ChainId>,
    pub chunks_uploaded: ChainId,
    pub completed: bool,
}

pub struct DashcamCoordinator<U> {
    uploader: U,
    wallet: watch::Receiver<WalletState>,
    state: RecorderState,
    session_id: Option<ChainId>,
    next_sequence: ChainId,
    notices: Vec<UploadNotice>,
}

impl<U: ChunkUploader> DashcamCoordinator<U> {
    pub fn new(uploader: U, wallet: watch::Receiver<WalletState>) -> Self {
        Self {
            uploader,
            wallet,
            state: RecorderState::Idle,
            session_id: None,
            next_sequence: 0,
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn session_id(&self) -> Option<ChainId> {
        self.session_id
    }

    pub fn next_sequence(&self) -> ChainId {
        self.next_sequence
    }

    /// Failures surfaced so far in the current recording.
    pub fn notices(&self) -> &[UploadNotice] {
        &self.notices
    }

    /// `Idle -> Recording`.
    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.state != RecorderState::Idle {
            return Err(CoreError::Conflict(format!(
                "Cannot start recording while {:?}",
                self.state
            )));
        }
        self.state = RecorderState::Recording;
        self.session_id = None;
        self.next_sequence = 0;
        self.notices.clear();
        tracing::info!("Dashcam recording started");
        Ok(())
    }

    /// Upload one intermediate chunk.
    ///
    /// Returns the acknowledgement, or `None` when the upload failed and
    /// was recorded as a notice.
    pub async fn emit_chunk(&mut self, data: Vec<u8>) -> Result<Option<ChunkAck>, CoreError> {
        if self.state != RecorderState::Recording {
            return Err(CoreError::Conflict(format!(
                "Cannot emit a chunk while {:?}",
                self.state
            )));
        }
        Ok(self.upload(data, false).await)
    }

    /// `Recording -> Stopping -> Idle`, uploading `final_chunk` as the
    /// session-closing chunk.
    pub async fn stop(&mut self, final_chunk: Vec<u8>) -> Result<RecordingSummary, CoreError> {
        if self.state != RecorderState::Recording {
            return Err(CoreError::Conflict(format!(
                "Cannot stop recording while {:?}",
                self.state
            )));
        }
        self.state = RecorderState::Stopping;
        let completed = self.upload(final_chunk, true).await.is_some();
        self.state = RecorderState::Idle;

        let summary = RecordingSummary {
            session_id: self.session_id,
            chunks_uploaded: self.next_sequence,
            completed,
        };
        tracing::info!(
            session_id = ?summary.session_id,
            chunks = summary.chunks_uploaded,
            completed,
            "Dashcam recording stopped"
        );
        Ok(summary)
    }

    /// Drive a recording: emit a chunk every `interval` until `cancel`
    /// fires, then stop with whatever the source still holds.
    pub async fn run<S: ChunkSource>(
        &mut self,
        source: &mut S,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Result<RecordingSummary, CoreError> {
        self.start()?;
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return self.stop(source.take_chunk()).await;
                }
                _ = ticker.tick() => {
                    self.emit_chunk(source.take_chunk()).await?;
                }
            }
        }
    }

    async fn upload(&mut self, data: Vec<u8>, is_last_chunk: bool) -> Option<ChunkAck> {
        let wallet_address = self.wallet.borrow().owner().to_string();
        let chunk = ChunkUpload {
            data,
            wallet_address,
            sequence_number: self.next_sequence,
            session_id: self.session_id,
            is_first_chunk: self.session_id.is_none(),
            is_last_chunk,
        };
        let sequence_number = chunk.sequence_number;

        match self.uploader.upload(chunk).await {
            Ok(ack) => {
                if self.session_id.is_none() {
                    tracing::info!(session_id = ack.session_id, "Dashcam session opened");
                    self.session_id = Some(ack.session_id);
                }
                self.next_sequence += 1;
                Some(ack)
            }
            Err(e) => {
                tracing::warn!(sequence_number, error = %e, "Chunk upload failed");
                self.notices.push(UploadNotice {
                    sequence_number,
                    message: e.to_string(),
                    at: chrono::Utc::now(),
                });
                None
            }
        }
    }
}
