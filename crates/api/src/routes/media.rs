//! Capture, gallery, dashcam and content routes.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{capture, dashcam, gallery, ipfs};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/capture", post(capture::capture_photo))
        .route("/token/{token_id}", get(gallery::get_token))
        .route("/nfts/{address}", get(gallery::list_nfts))
        .route("/video-sessions/{address}", get(gallery::list_video_sessions))
        .route("/ipfs/{cid}", get(ipfs::get_content))
        .route("/api/dashcam/upload", post(dashcam::upload_chunk))
}
