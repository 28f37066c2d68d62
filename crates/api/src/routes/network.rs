use axum::routing::{get, post};
use axum::Router;

use crate::handlers::network;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/recent-transactions", get(network::recent_transactions))
        .route("/api/query-media", get(network::query_media))
        .route("/api/media/broadcast", post(network::accept_broadcast))
}
