//! Wallet address and transaction hash validation.
//!
//! Addresses are `0x` followed by 40 hex digits, transaction hashes `0x`
//! followed by 64. The zero address doubles as the placeholder owner used
//! when no wallet is connected.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Owner recorded for media uploaded without a connected wallet.
pub const PLACEHOLDER_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"));

static TX_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("valid regex"));

/// Whether `value` is a well-formed `0x`-prefixed 20-byte address.
pub fn is_valid_address(value: &str) -> bool {
    ADDRESS_RE.is_match(value)
}

/// Whether `value` is a well-formed `0x`-prefixed 32-byte transaction hash.
pub fn is_valid_tx_hash(value: &str) -> bool {
    TX_HASH_RE.is_match(value)
}

/// Whether `value` is the placeholder zero address (case-insensitive).
pub fn is_placeholder(value: &str) -> bool {
    value.eq_ignore_ascii_case(PLACEHOLDER_ADDRESS)
}

/// Validate a wallet address supplied by a caller.
pub fn validate_address(value: &str) -> Result<(), CoreError> {
    if is_valid_address(value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid wallet address: {value}"
        )))
    }
}

/// Resolve the owner of an upload, falling back to the placeholder.
///
/// Browsers serialize a missing wallet as `""`, `"null"` or `"undefined"`;
/// all three count as "no wallet". Returns the owner and whether the
/// placeholder was substituted. A value that is present but malformed is a
/// validation error rather than a silent substitution.
pub fn owner_or_placeholder(value: Option<&str>) -> Result<(String, bool), CoreError> {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
        tracing::warn!("No wallet connected, recording placeholder owner");
        return Ok((PLACEHOLDER_ADDRESS.to_string(), true));
    }
    validate_address(trimmed)?;
    Ok((trimmed.to_string(), false))
}

/// Lowercase comparison key for addresses.
pub fn normalize(value: &str) -> String {
    value.to_ascii_lowercase()
}
