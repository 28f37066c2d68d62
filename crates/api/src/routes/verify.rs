use axum::routing::{get, post};
use axum::Router;

use crate::handlers::verify;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verify/file", post(verify::verify_file))
        .route("/verify/tx/{hash}", get(verify::verify_transaction))
        .route("/verify/{cid}", get(verify::verify_cid))
        .route("/api/verify/tx/{hash}", get(verify::verify_transaction))
        .route(
            "/api/distributed/verify/tx/{hash}",
            get(verify::verify_distributed),
        )
}
