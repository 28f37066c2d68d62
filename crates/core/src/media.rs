//! Media classification and minted media records.

use serde::{Deserialize, Serialize};

use crate::types::{ChainId, Timestamp};

/// Kind of media (or contract activity) a transaction or token represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Photo,
    Video,
    VideoChunk,
    VideoSession,
    ContractInteraction,
    Unknown,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::VideoChunk => "video_chunk",
            Self::VideoSession => "video_session",
            Self::ContractInteraction => "contract_interaction",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the snake_case wire name. Unrecognised names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "photo" => Some(Self::Photo),
            "video" => Some(Self::Video),
            "video_chunk" => Some(Self::VideoChunk),
            "video_session" => Some(Self::VideoSession),
            "contract_interaction" => Some(Self::ContractInteraction),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of media that has been pinned and minted.
///
/// Records are immutable once the mint transaction is confirmed; the only
/// operations on them are lookups, merges (by token id) and ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub content_id: String,
    pub owner: String,
    pub media_type: MediaType,
    pub timestamp: Timestamp,
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<ChainId>,
    pub metadata_uri: String,
}

impl AsRef<MediaRecord> for MediaRecord {
    fn as_ref(&self) -> &MediaRecord {
        self
    }
}

/// Merge two record lists keyed by token id, keeping the first occurrence,
/// and order the result newest first.
///
/// Works on anything that carries a [`MediaRecord`], so gallery views that
/// wrap a record merge the same way. Records without a token id are never
/// deduplicated.
pub fn merge_records<T: AsRef<MediaRecord>>(primary: Vec<T>, secondary: Vec<T>) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    let mut merged: Vec<T> = primary
        .into_iter()
        .chain(secondary)
        .filter(|item| match item.as_ref().token_id {
            Some(id) => seen.insert(id),
            None => true,
        })
        .collect();
    merged.sort_by(|a, b| b.as_ref().timestamp.cmp(&a.as_ref().timestamp));
    merged
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn record(token_id: u64, secs: i64, cid: &str) -> MediaRecord {
        MediaRecord {
            content_id: cid.to_string(),
            owner: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_string(),
            media_type: MediaType::Photo,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            transaction_hash: None,
            token_id: Some(token_id),
            metadata_uri: format!("ipfs://meta-{cid}"),
        }
    }

    #[test]
    fn media_type_wire_names_round_trip() {
        for ty in [
            MediaType::Photo,
            MediaType::Video,
            MediaType::VideoChunk,
            MediaType::VideoSession,
            MediaType::ContractInteraction,
            MediaType::Unknown,
        ] {
            assert_eq!(MediaType::parse(ty.as_str()), Some(ty));
            assert_eq!(
                serde_json::to_value(ty).unwrap(),
                serde_json::json!(ty.as_str())
            );
        }
        assert_eq!(MediaType::parse("audio"), None);
    }

    #[test]
    fn merge_dedupes_by_token_and_orders_newest_first() {
        let cached = vec![record(1, 100, "QmCachedOne"), record(2, 300, "QmTwo")];
        let chain = vec![record(1, 100, "QmChainOne"), record(3, 200, "QmThree")];

        let merged = merge_records(cached, chain);

        let ids: Vec<_> = merged.iter().map(|r| r.token_id.unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(merged[2].content_id, "QmCachedOne");
    }
}
