//! Shared query-string parameters.

use serde::Deserialize;

/// Default number of registry entries returned by listing endpoints.
pub const DEFAULT_LIMIT: usize = 10;

/// Upper bound on `limit`.
pub const MAX_LIMIT: usize = 100;

/// `?limit=` for the recent-transactions feed.
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

/// Filters for `GET /api/query-media`.
#[derive(Debug, Default, Deserialize)]
pub struct MediaQueryParams {
    pub media_type: Option<String>,
    pub owner: Option<String>,
    pub limit: Option<usize>,
}

/// Clamp a caller-supplied limit into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
