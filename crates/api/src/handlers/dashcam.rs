//! Server side of dashcam chunk uploads.
//!
//! Each request carries one chunk. The first chunk of a recording opens a
//! session on chain and the response tells the client its id; later chunks
//! name that id. A first chunk must carry sequence number 0 and is rejected
//! before the session is started otherwise. Nothing is pinned or published
//! until the chunk passes the session checks. Chain writes after the session
//! start are best effort: a failed `addVideoChunk` or `endVideoSession` is
//! logged and the chunk is still pinned and cached.

use axum::extract::{Multipart, State};
use axum::Json;
use blocksnap_chain::client::{parse_address, session_id_from_clock};
use blocksnap_core::address::owner_or_placeholder;
use blocksnap_core::error::CoreError;
use blocksnap_core::media::MediaType;
use blocksnap_core::metadata::{ChunkMetadata, CHUNK_CONTENT_TYPE};
use blocksnap_core::session::VideoChunk;
use blocksnap_core::types::ChainId;
use blocksnap_events::{MediaEvent, MediaEventKind};
use chrono::Utc;
use serde::Serialize;

use crate::cache::SessionOpening;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Form fields of one chunk upload.
#[derive(Debug, Default)]
struct ChunkForm {
    video: Option<Vec<u8>>,
    wallet_address: Option<String>,
    sequence_number: Option<String>,
    session_id: Option<String>,
    is_first_chunk: bool,
    is_last_chunk: bool,
}

impl ChunkForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "video" {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.video = Some(data.to_vec());
                continue;
            }
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            match name.as_str() {
                "wallet_address" => form.wallet_address = Some(text),
                "sequence_number" => form.sequence_number = Some(text),
                "session_id" => form.session_id = Some(text),
                "is_first_chunk" => form.is_first_chunk = text == "true",
                "is_last_chunk" => form.is_last_chunk = text == "true",
                _ => {} // ignore unknown fields
            }
        }
        Ok(form)
    }
}

#[derive(Debug, Serialize)]
pub struct ChunkUploadResponse {
    pub success: bool,
    pub session_id: ChainId,
    pub sequence_number: ChainId,
    pub video_cid: String,
    pub metadata_cid: String,
    /// Hash of the last chain write that succeeded for this chunk.
    pub tx_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /api/dashcam/upload
// ---------------------------------------------------------------------------

pub async fn upload_chunk(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<ChunkUploadResponse>> {
    let form = ChunkForm::read(multipart).await?;

    let video = form
        .video
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("No video file provided".into()))?;
    let (owner, placeholder) = owner_or_placeholder(form.wallet_address.as_deref())?;
    let sequence_number: ChainId = match form.sequence_number.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Invalid sequence_number: {raw}")))?,
    };
    let received_at = Utc::now();

    // ---- session ----
    let mut tx_hash: Option<String> = None;
    let (session_id, opening) = if form.is_first_chunk {
        if sequence_number != 0 {
            return Err(CoreError::Conflict(format!(
                "First chunk must have sequence number 0, got {sequence_number}"
            ))
            .into());
        }
        let (session_id, start_tx) = start_session(&state, &owner).await?;
        tx_hash = start_tx.clone();
        let opening = SessionOpening::First {
            owner: owner.clone(),
            started_at: received_at,
            tx_hash: start_tx,
        };
        (session_id, opening)
    } else {
        let raw = form
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "null" && *s != "undefined")
            .ok_or_else(|| AppError::BadRequest("Missing session_id for non-first chunk".into()))?;
        let session_id: ChainId = raw
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid session_id format".into()))?;
        match state.chain.is_session_active(session_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(session_id, "Session is not active on chain, proceeding anyway");
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Failed to check session state");
            }
        }
        (session_id, SessionOpening::Continuation)
    };

    let mut chunk = VideoChunk {
        sequence_number,
        video_cid: String::new(),
        metadata_cid: String::new(),
        timestamp: received_at,
        owner: owner.clone(),
        tx_hash: None,
        is_last_chunk: form.is_last_chunk,
    };
    state.cache.check_chunk(session_id, &opening, &chunk).await?;

    if let SessionOpening::First {
        tx_hash: Some(start_tx),
        ..
    } = &opening
    {
        state.event_bus.publish(
            MediaEvent::new(MediaEventKind::SessionStarted, start_tx, MediaType::VideoSession)
                .with_owner(&owner)
                .with_session(session_id, None),
        );
    }

    // ---- storage ----
    let video_cid = state
        .store
        .add_bytes(
            video,
            &format!("dashcam_{}.webm", received_at.timestamp()),
            CHUNK_CONTENT_TYPE,
        )
        .await?;
    let metadata = ChunkMetadata::new(session_id, sequence_number, &video_cid, received_at);
    let metadata_json =
        serde_json::to_value(&metadata).map_err(|e| AppError::InternalError(e.to_string()))?;
    let metadata_cid = state
        .store
        .add_json(
            &metadata_json,
            &format!("chunk_{session_id}_{sequence_number}.json"),
        )
        .await?;

    // ---- chain ----
    let timestamp = u64::try_from(received_at.timestamp()).unwrap_or_default();
    match state
        .writer
        .add_video_chunk(session_id, sequence_number, &video_cid, &metadata_cid, timestamp)
        .await
    {
        Ok(hash) => {
            tracing::info!(session_id, sequence_number, tx_hash = %hash, "Recorded chunk on chain");
            chunk.tx_hash = Some(hash.clone());
            tx_hash = Some(hash);
        }
        Err(e) => tracing::warn!(
            session_id,
            sequence_number,
            error = %e,
            "Failed to record chunk on chain, continuing with local processing"
        ),
    }

    if form.is_last_chunk {
        match state.writer.end_video_session(session_id).await {
            Ok(hash) => {
                tracing::info!(session_id, tx_hash = %hash, "Ended video session");
                tx_hash = Some(hash);
            }
            Err(e) => tracing::warn!(
                session_id,
                error = %e,
                "Failed to end session on chain, continuing with local processing"
            ),
        }
    }

    // ---- cache and events ----
    chunk.video_cid = video_cid.clone();
    chunk.metadata_cid = metadata_cid.clone();
    let chunk_tx = chunk.tx_hash.clone();
    state.cache.record_chunk(session_id, &opening, chunk).await?;

    if let Some(hash) = chunk_tx {
        let mut event = MediaEvent::new(MediaEventKind::ChunkRecorded, hash, MediaType::VideoChunk)
            .with_content(&video_cid)
            .with_session(session_id, Some(sequence_number))
            .with_metadata_uri(state.store.gateway_url(&metadata_cid));
        if !placeholder {
            event = event.with_owner(&owner);
        }
        state.event_bus.publish(event);
    }

    Ok(Json(ChunkUploadResponse {
        success: true,
        session_id,
        sequence_number,
        video_cid,
        metadata_cid,
        tx_hash,
    }))
}

/// Open a session on chain for `owner`.
///
/// The id comes from the `VideoSessionStarted` event, else from the
/// transaction hash. When the transaction itself fails the id is derived
/// from the clock so recording can go on locally.
async fn start_session(state: &AppState, owner: &str) -> AppResult<(ChainId, Option<String>)> {
    let owner_address = parse_address(owner)?;
    match state.writer.start_video_session(owner_address).await {
        Ok(start) => {
            if start.derived {
                tracing::warn!(
                    session_id = start.session_id,
                    tx_hash = %start.tx_hash,
                    "No session event in receipt, derived session id from tx hash"
                );
            }
            tracing::info!(session_id = start.session_id, tx_hash = %start.tx_hash, "Started video session");
            Ok((start.session_id, Some(start.tx_hash)))
        }
        Err(e) => {
            let session_id =
                session_id_from_clock(u64::try_from(Utc::now().timestamp()).unwrap_or_default());
            tracing::warn!(
                session_id,
                error = %e,
                "Failed to start session on chain, using clock-derived session id"
            );
            Ok((session_id, None))
        }
    }
}
