//! Error types for the chain access layer.

/// Errors raised while talking to the BlockSnap contract.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Invalid RPC URL, contract address or key.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or node failure on a JSON-RPC request.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// A read-only contract call reverted or failed.
    #[error("Contract call failed: {0}")]
    ContractCall(String),

    /// Sending or confirming a transaction failed.
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// A write was requested but no private key is configured.
    #[error("No private key configured - write operations require PRIVATE_KEY")]
    NoSigner,

    /// A log carried the right signature but could not be decoded.
    #[error("Failed to decode {event} event: {message}")]
    EventDecode {
        event: &'static str,
        message: String,
    },

    /// Caller-supplied value is malformed (address, hash, id).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ChainError {
    /// Whether the node rejected a log query because of its block span or
    /// result size, as opposed to being unreachable.
    pub fn is_range_limit(&self) -> bool {
        let Self::Rpc(message) = self else {
            return false;
        };
        let message = message.to_ascii_lowercase();
        ["block range", "range", "limit", "too many", "exceed", "10000"]
            .iter()
            .any(|needle| message.contains(needle))
    }

    /// Whether the failure is worth retrying later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Rpc(_) | Self::ContractCall(_) | Self::Transaction(_)
        )
    }

    /// Whether the failure comes from local configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::NoSigner)
    }
}
