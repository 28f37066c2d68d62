//! HTTP transport for dashcam chunks.
//!
//! [`HttpChunkUploader`] posts each chunk as a multipart form to
//! `POST /api/dashcam/upload` on a BlockSnap server and turns the JSON
//! answer into a [`ChunkAck`]. It never retries; the coordinator decides
//! what a failure means.

use std::time::Duration;

use async_trait::async_trait;
use blocksnap_core::dashcam::{ChunkAck, ChunkUpload, ChunkUploader, UploadError};
use reqwest::multipart::{Form, Part};

/// Default timeout for one chunk upload (30 s of webm plus pinning and
/// three chain transactions).
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

pub struct HttpChunkUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChunkUploader {
    /// Build an uploader for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/dashcam/upload", base_url.trim_end_matches('/')),
        }
    }

    fn form(chunk: ChunkUpload) -> Result<Form, UploadError> {
        let filename = format!("chunk_{}.webm", chunk.sequence_number);
        let video = Part::bytes(chunk.data)
            .file_name(filename)
            .mime_str("video/webm")
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let mut form = Form::new()
            .part("video", video)
            .text("wallet_address", chunk.wallet_address)
            .text("sequence_number", chunk.sequence_number.to_string())
            .text("is_first_chunk", chunk.is_first_chunk.to_string())
            .text("is_last_chunk", chunk.is_last_chunk.to_string());
        if let Some(session_id) = chunk.session_id {
            form = form.text("session_id", session_id.to_string());
        }
        Ok(form)
    }
}

#[async_trait]
impl ChunkUploader for HttpChunkUploader {
    async fn upload(&self, chunk: ChunkUpload) -> Result<ChunkAck, UploadError> {
        let sequence_number = chunk.sequence_number;
        let form = Self::form(chunk)?;

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let ack: ChunkAck = response
            .json()
            .await
            .map_err(|e| UploadError::Transport(format!("Invalid upload response: {e}")))?;
        tracing::debug!(
            sequence_number,
            session_id = ack.session_id,
            video_cid = %ack.video_cid,
            "Chunk uploaded"
        );
        Ok(ack)
    }
}
