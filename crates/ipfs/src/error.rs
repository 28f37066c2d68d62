/// Errors from the IPFS storage layer.
#[derive(Debug, thiserror::Error)]
pub enum IpfsError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The node, Pinata or a gateway returned a non-2xx status code.
    #[error("IPFS API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response did not carry the expected fields.
    #[error("Unexpected IPFS response: {0}")]
    UnexpectedResponse(String),

    /// No source could serve the requested content.
    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("IPFS configuration error: {0}")]
    Configuration(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IpfsError {
    /// Whether the failure is the storage backend being unreachable or
    /// failing, as opposed to bad input or missing content.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::ApiError { status, .. } => *status >= 500,
            Self::UnexpectedResponse(_) => true,
            Self::NotFound(_) | Self::Configuration(_) | Self::Serialization(_) => false,
        }
    }
}
