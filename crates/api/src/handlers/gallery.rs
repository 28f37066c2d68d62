//! Gallery handlers: single token lookup, NFTs and video sessions of a
//! wallet.
//!
//! The two listing endpoints merge the local cache with a chain scan and
//! never fail on chain or storage trouble: they answer with whatever they
//! have plus an `error` note.

use alloy::primitives::Address;
use axum::extract::{Path, State};
use axum::Json;
use blocksnap_chain::client::parse_address;
use blocksnap_chain::inventory::OwnedToken;
use blocksnap_chain::ChainError;
use blocksnap_core::address::validate_address;
use blocksnap_core::error::CoreError;
use blocksnap_core::media::{merge_records, MediaRecord, MediaType};
use blocksnap_core::metadata::NftMetadata;
use blocksnap_core::session::{merge_sessions, VideoChunk, VideoSession};
use blocksnap_core::types::{ChainId, Timestamp};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{NftSource, NftView};
use crate::error::AppResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /token/{token_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub token_id: ChainId,
    pub metadata_uri: String,
    pub image_cid: String,
    pub image_url: String,
}

pub async fn get_token(
    State(state): State<AppState>,
    Path(token_id): Path<ChainId>,
) -> AppResult<Json<TokenInfo>> {
    let metadata_uri = state
        .chain
        .token_uri(token_id)
        .await
        .map_err(|e| token_error(token_id, e))?;
    let image_cid = state
        .chain
        .image_cid(token_id)
        .await
        .map_err(|e| token_error(token_id, e))?;

    Ok(Json(TokenInfo {
        token_id,
        metadata_uri,
        image_url: state.store.gateway_url(&image_cid),
        image_cid,
    }))
}

/// A reverted view call on a token id means the token does not exist.
fn token_error(token_id: ChainId, err: ChainError) -> crate::error::AppError {
    match err {
        ChainError::ContractCall(_) => CoreError::NotFound {
            entity: "Token",
            id: token_id.to_string(),
        }
        .into(),
        other => other.into(),
    }
}

// ---------------------------------------------------------------------------
// GET /nfts/{address}
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct NftListing {
    pub nfts: Vec<NftView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// NFTs of a wallet: cache entries first, then chain tokens not already
/// cached, newest first.
pub async fn list_nfts(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> AppResult<Json<NftListing>> {
    validate_address(&address)?;
    let owner = parse_address(&address)?;

    let cached = state.cache.nfts(&address).await;
    let listing = state.inventory.owned_tokens(owner).await;

    let mut from_chain = Vec::with_capacity(listing.tokens.len());
    for token in listing.tokens {
        from_chain.push(chain_nft(&state, &address, token).await);
    }

    let nfts = merge_records(cached, from_chain);
    tracing::info!(wallet = %address, count = nfts.len(), "Listed NFTs");

    Ok(Json(NftListing {
        nfts,
        error: listing
            .unavailable
            .map(|reason| format!("Error retrieving NFTs from blockchain: {reason}")),
    }))
}

async fn chain_nft(state: &AppState, wallet: &str, token: OwnedToken) -> NftView {
    let fetched = state.store.get_json(&token.metadata_uri).await;
    let (metadata, document) = match fetched {
        Ok(document) => match serde_json::from_value::<NftMetadata>(document.clone()) {
            Ok(metadata) => (metadata, document),
            Err(e) => {
                tracing::debug!(token_id = token.token_id, error = %e, "Unreadable NFT metadata");
                (NftMetadata::fallback(token.token_id), document)
            }
        },
        Err(e) => {
            tracing::debug!(token_id = token.token_id, error = %e, "NFT metadata unavailable");
            let metadata = NftMetadata::fallback(token.token_id);
            let document = serde_json::to_value(&metadata).unwrap_or_default();
            (metadata, document)
        }
    };

    let media_type = if metadata.is_video() {
        MediaType::Video
    } else {
        MediaType::Photo
    };
    let timestamp = token
        .minted_at
        .or_else(|| metadata_timestamp(&metadata))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    NftView {
        record: MediaRecord {
            content_id: token.image_cid.clone(),
            owner: wallet.to_string(),
            media_type,
            timestamp,
            transaction_hash: token.tx_hash,
            token_id: Some(token.token_id),
            metadata_uri: token.metadata_uri,
        },
        name: metadata.name,
        description: metadata.description,
        image: state.store.gateway_url(&token.image_cid),
        metadata: document,
        source: NftSource::Blockchain,
    }
}

/// The `Timestamp` attribute written into photo metadata at capture.
fn metadata_timestamp(metadata: &NftMetadata) -> Option<Timestamp> {
    metadata
        .attributes
        .iter()
        .find(|a| a.trait_type == "Timestamp")
        .and_then(|a| a.value.as_str())
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// GET /video-sessions/{address}
// ---------------------------------------------------------------------------

/// A chunk with its playback URL and, when reachable, its metadata
/// document.
#[derive(Debug, Serialize)]
pub struct ChunkView {
    #[serde(flatten)]
    pub chunk: VideoChunk,
    pub video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: ChainId,
    pub owner: String,
    pub start_time: Timestamp,
    pub tx_hash: Option<String>,
    pub blockchain_verified: bool,
    pub complete: bool,
    pub chunks: Vec<ChunkView>,
}

#[derive(Debug, Serialize)]
pub struct SessionListing {
    pub success: bool,
    pub sessions: Vec<SessionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn list_video_sessions(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> AppResult<Json<SessionListing>> {
    validate_address(&address)?;
    let owner: Address = parse_address(&address)?;

    let cached = state.cache.sessions_for(&address).await;
    let listing = state.inventory.video_sessions(owner).await;
    let merged = merge_sessions(cached, listing.sessions);

    let mut sessions = Vec::with_capacity(merged.len());
    for session in merged {
        sessions.push(session_view(&state, session).await);
    }
    tracing::info!(wallet = %address, count = sessions.len(), "Listed video sessions");

    Ok(Json(SessionListing {
        success: true,
        sessions,
        error: listing
            .unavailable
            .map(|reason| format!("Error retrieving sessions from blockchain: {reason}")),
    }))
}

async fn session_view(state: &AppState, session: VideoSession) -> SessionView {
    let mut chunks = Vec::with_capacity(session.chunk_count());
    for chunk in session.chunks() {
        let metadata = if chunk.metadata_cid.is_empty() {
            None
        } else {
            match state.store.get_json(&chunk.metadata_cid).await {
                Ok(document) => Some(document),
                Err(e) => {
                    tracing::warn!(
                        session_id = session.session_id,
                        sequence_number = chunk.sequence_number,
                        error = %e,
                        "Failed to get chunk metadata"
                    );
                    None
                }
            }
        };
        chunks.push(ChunkView {
            video_url: state.store.gateway_url(&chunk.video_cid),
            chunk: chunk.clone(),
            metadata,
        });
    }

    SessionView {
        session_id: session.session_id,
        complete: session.is_complete(),
        owner: session.owner,
        start_time: session.start_time,
        tx_hash: session.tx_hash,
        blockchain_verified: session.blockchain_verified,
        chunks,
    }
}
