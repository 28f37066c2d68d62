//! NFT and chunk metadata documents pinned alongside media.

use serde::{Deserialize, Serialize};

use crate::types::{ChainId, Timestamp};

/// Trait name marking a gallery entry as video.
pub const CONTENT_TYPE_TRAIT: &str = "Content Type";

/// Default description for photos minted through `/capture`.
pub const PHOTO_DESCRIPTION: &str = "A photo captured and authenticated using BlockSnap";

/// MIME type of dashcam chunks.
pub const CHUNK_CONTENT_TYPE: &str = "video/webm";

// ---------------------------------------------------------------------------
// NFT metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

/// ERC-721 style metadata document referenced by `tokenURI`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl NftMetadata {
    /// Metadata for a freshly captured photo.
    ///
    /// `image_url` is the gateway URL of the image; the name is stamped
    /// with the capture time.
    pub fn for_photo(
        image_cid: &str,
        image_url: String,
        platform: &str,
        source: &str,
        captured_at: Timestamp,
    ) -> Self {
        Self {
            name: format!("BlockSnap #{}", captured_at.format("%Y%m%d%H%M%S")),
            description: PHOTO_DESCRIPTION.to_string(),
            image: format!("ipfs://{image_cid}"),
            image_url: Some(image_url),
            attributes: vec![
                attribute("Platform", platform),
                attribute("Source", source),
                attribute("Timestamp", captured_at.to_rfc3339()),
            ],
        }
    }

    /// Placeholder used when a token's metadata cannot be fetched.
    pub fn fallback(token_id: ChainId) -> Self {
        Self {
            name: format!("BlockSnap #{token_id}"),
            description: "A photo captured using BlockSnap".to_string(),
            image: String::new(),
            image_url: None,
            attributes: Vec::new(),
        }
    }

    /// Whether the metadata tags this entry as a video.
    pub fn is_video(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| a.trait_type == CONTENT_TYPE_TRAIT && a.value == "video")
    }
}

fn attribute(trait_type: &str, value: impl Into<serde_json::Value>) -> Attribute {
    Attribute {
        trait_type: trait_type.to_string(),
        value: value.into(),
    }
}

// ---------------------------------------------------------------------------
// Chunk metadata
// ---------------------------------------------------------------------------

/// Metadata pinned for each dashcam chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub timestamp: Timestamp,
    pub sequence_number: ChainId,
    pub source: String,
    pub content_type: String,
    pub video_url: String,
    pub session_id: ChainId,
}

impl ChunkMetadata {
    pub fn new(
        session_id: ChainId,
        sequence_number: ChainId,
        video_cid: &str,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            timestamp,
            sequence_number,
            source: "dashcam".to_string(),
            content_type: CHUNK_CONTENT_TYPE.to_string(),
            video_url: format!("ipfs://{video_cid}"),
            session_id,
        }
    }
}

// ---------------------------------------------------------------------------
// CID helpers
// ---------------------------------------------------------------------------

/// Extract a bare CID from `ipfs://<cid>`, a gateway URL or a bare CID.
pub fn extract_cid(uri: &str) -> &str {
    let uri = uri.trim();
    if let Some(rest) = uri.strip_prefix("ipfs://") {
        return rest.trim_start_matches("ipfs/");
    }
    match uri.rsplit_once("/ipfs/") {
        Some((_, cid)) => cid,
        None => uri,
    }
}
