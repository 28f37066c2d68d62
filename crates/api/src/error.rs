use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use blocksnap_chain::ChainError;
use blocksnap_core::error::CoreError;
use blocksnap_ipfs::IpfsError;
use blocksnap_network::NodeError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the error of every layer the handlers call into and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `blocksnap_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A chain read or write failed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// IPFS or Pinata failed.
    #[error(transparent)]
    Storage(#[from] IpfsError),

    /// The media registry or a peer call failed.
    #[error(transparent)]
    Node(#[from] NodeError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            // --- Chain errors ---
            AppError::Chain(err) => classify_chain_error(err),

            // --- Storage errors ---
            AppError::Storage(err) => classify_storage_error(err),

            // --- Registry / peer errors ---
            AppError::Node(NodeError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Node(err) => internal(&err.to_string()),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal(msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a chain error into an HTTP status, error code, and message.
///
/// - Malformed caller input maps to 400.
/// - Local misconfiguration (bad contract address, no signing key) maps to
///   500 with a sanitized message.
/// - Node, contract and transaction failures map to 502.
fn classify_chain_error(err: &ChainError) -> (StatusCode, &'static str, String) {
    match err {
        ChainError::InvalidInput(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        err if err.is_configuration_error() => internal(&err.to_string()),
        other => {
            tracing::warn!(error = %other, "Chain unavailable");
            (
                StatusCode::BAD_GATEWAY,
                "CHAIN_UNAVAILABLE",
                other.to_string(),
            )
        }
    }
}

/// Classify a storage error into an HTTP status, error code, and message.
fn classify_storage_error(err: &IpfsError) -> (StatusCode, &'static str, String) {
    match err {
        IpfsError::NotFound(cid) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Content {cid} not found"),
        ),
        IpfsError::Configuration(_) | IpfsError::Serialization(_) => internal(&err.to_string()),
        other => {
            tracing::warn!(error = %other, "Storage unavailable");
            (
                StatusCode::BAD_GATEWAY,
                "STORAGE_UNAVAILABLE",
                other.to_string(),
            )
        }
    }
}
