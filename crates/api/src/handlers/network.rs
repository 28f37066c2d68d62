//! Media registry endpoints shared with peer nodes.

use axum::extract::{Query, State};
use axum::Json;
use blocksnap_core::error::CoreError;
use blocksnap_core::media::MediaType;
use blocksnap_network::MediaEntry;
use chrono::{Duration, Utc};
use serde_json::json;

use crate::error::AppResult;
use crate::query::{clamp_limit, LimitParams, MediaQueryParams};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/recent-transactions
// ---------------------------------------------------------------------------

/// Registry entries, newest first.
///
/// With `DEMO_FALLBACK` enabled an empty registry answers with sample
/// entries instead of an empty list.
pub async fn recent_transactions(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<DataResponse<Vec<MediaEntry>>> {
    let limit = clamp_limit(params.limit);
    let mut entries = state.node.registry().recent(limit).await;
    if entries.is_empty() && state.config.demo_fallback {
        tracing::debug!("Registry empty, serving demo transactions");
        entries = demo_entries();
        entries.truncate(limit);
    }
    Json(DataResponse { data: entries })
}

fn demo_entries() -> Vec<MediaEntry> {
    let now = Utc::now();
    let entry = |n: u8, media_type: MediaType, age_minutes: i64| MediaEntry {
        owner: Some(format!("0x{}", "d3".repeat(20))),
        content_id: Some(format!("QmDemo{n}")),
        registered_by: Some("demo".into()),
        registered_at: Some(now - Duration::minutes(age_minutes)),
        ..MediaEntry::new(format!("0x{}", format!("{n:02x}").repeat(32)), media_type)
    };
    vec![
        entry(1, MediaType::Photo, 5),
        entry(2, MediaType::VideoChunk, 30),
        entry(3, MediaType::Photo, 120),
    ]
}

// ---------------------------------------------------------------------------
// GET /api/query-media
// ---------------------------------------------------------------------------

pub async fn query_media(
    State(state): State<AppState>,
    Query(params): Query<MediaQueryParams>,
) -> AppResult<Json<DataResponse<Vec<MediaEntry>>>> {
    let media_type = match params.media_type.as_deref().filter(|t| !t.is_empty()) {
        None => None,
        Some(raw) => Some(
            MediaType::parse(raw)
                .ok_or_else(|| CoreError::Validation(format!("Unknown media_type: {raw}")))?,
        ),
    };
    let owner = params.owner.as_deref().filter(|o| !o.is_empty());
    let entries = state
        .node
        .registry()
        .query(media_type, owner, clamp_limit(params.limit))
        .await;
    Ok(Json(DataResponse { data: entries }))
}

// ---------------------------------------------------------------------------
// POST /api/media/broadcast
// ---------------------------------------------------------------------------

/// Accept a media entry pushed by a peer. Never rebroadcast.
pub async fn accept_broadcast(
    State(state): State<AppState>,
    Json(entry): Json<MediaEntry>,
) -> AppResult<Json<serde_json::Value>> {
    let stored = state.node.accept_broadcast(entry).await?;
    Ok(Json(json!({
        "success": true,
        "tx_hash": stored.tx_hash,
    })))
}
