//! Content proxy through the local node and the public gateways.

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;

use crate::error::AppResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /ipfs/{cid}
// ---------------------------------------------------------------------------

pub async fn get_content(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> AppResult<impl IntoResponse> {
    let bytes = state.store.fetch_content(&cid).await?;
    tracing::debug!(cid = %cid, size = bytes.len(), "Proxied IPFS content");
    Ok((
        [
            (CONTENT_TYPE, sniff_content_type(&bytes)),
            // Content-addressed, so the bytes for a CID never change.
            (CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    ))
}

/// Best-effort content type from magic bytes.
fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "video/webm",
        [b'{', ..] => "application/json",
        _ => "application/octet-stream",
    }
}
