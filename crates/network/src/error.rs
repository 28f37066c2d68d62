/// Errors from the node's registry, peer table and network calls.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A peer or the discovery service returned a non-2xx status code.
    #[error("Remote node error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Invalid media entry: {0}")]
    Validation(String),
}
