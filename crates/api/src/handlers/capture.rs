//! Handler for web captures: pin the photo and its metadata, then mint.

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blocksnap_chain::client::parse_address;
use blocksnap_core::address::validate_address;
use blocksnap_core::error::CoreError;
use blocksnap_core::media::{MediaRecord, MediaType};
use blocksnap_core::metadata::NftMetadata;
use blocksnap_core::types::ChainId;
use blocksnap_events::{MediaEvent, MediaEventKind};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cache::{NftSource, NftView};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Value of the metadata `Source` attribute for browser captures.
pub const WEB_CAPTURE_SOURCE: &str = "web_capture";

#[derive(Debug, Deserialize, Validate)]
pub struct CaptureRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "wallet_address is required"))]
    pub wallet_address: String,
    /// Base64 image, optionally as a `data:image/...;base64,` URL.
    #[serde(default)]
    #[validate(length(min = 1, message = "image_data is required"))]
    pub image_data: String,
}

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub file_cid: String,
    pub metadata_cid: String,
    pub token_id: Option<ChainId>,
    pub transaction_hash: String,
    pub metadata_uri: String,
    pub image_url: String,
}

/// Strip a `data:` URL prefix and decode the base64 payload.
pub fn decode_image(image_data: &str) -> Result<Vec<u8>, CoreError> {
    let payload = match image_data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => image_data,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| CoreError::Validation(format!("image_data is not valid base64: {e}")))
}

// ---------------------------------------------------------------------------
// POST /capture
// ---------------------------------------------------------------------------

pub async fn capture_photo(
    State(state): State<AppState>,
    Json(input): Json<CaptureRequest>,
) -> AppResult<Json<DataResponse<CaptureResponse>>> {
    input
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    validate_address(&input.wallet_address)?;
    let owner = parse_address(&input.wallet_address)?;
    let image = decode_image(&input.image_data)?;
    if image.is_empty() {
        return Err(AppError::BadRequest("image_data is empty".into()));
    }

    let captured_at = Utc::now();
    let file_cid = state
        .store
        .add_bytes(
            image,
            &format!("capture_{}.jpg", captured_at.timestamp()),
            "image/jpeg",
        )
        .await?;
    let image_url = state.store.gateway_url(&file_cid);

    let metadata = NftMetadata::for_photo(
        &file_cid,
        image_url.clone(),
        std::env::consts::OS,
        WEB_CAPTURE_SOURCE,
        captured_at,
    );
    let metadata_json =
        serde_json::to_value(&metadata).map_err(|e| AppError::InternalError(e.to_string()))?;
    let metadata_cid = state.store.add_json(&metadata_json, "metadata.json").await?;
    let metadata_uri = state.store.gateway_url(&metadata_cid);

    let receipt = state
        .writer
        .mint_photo(owner, &file_cid, &metadata_uri)
        .await?;
    tracing::info!(
        tx_hash = %receipt.tx_hash,
        token_id = ?receipt.token_id,
        cid = %file_cid,
        "Minted photo NFT"
    );

    let nft = NftView {
        record: MediaRecord {
            content_id: file_cid.clone(),
            owner: input.wallet_address.clone(),
            media_type: MediaType::Photo,
            timestamp: captured_at,
            transaction_hash: Some(receipt.tx_hash.clone()),
            token_id: receipt.token_id,
            metadata_uri: metadata_uri.clone(),
        },
        name: metadata.name.clone(),
        description: metadata.description.clone(),
        image: image_url.clone(),
        metadata: metadata_json,
        source: NftSource::LocalCache,
    };
    // The NFT exists on chain; a cache failure only delays it in the gallery.
    if let Err(e) = state.cache.add_nft(&input.wallet_address, nft).await {
        tracing::error!(error = %e, wallet = %input.wallet_address, "Failed to cache minted NFT");
    }

    state.event_bus.publish(
        MediaEvent::new(MediaEventKind::PhotoMinted, &receipt.tx_hash, MediaType::Photo)
            .with_owner(&input.wallet_address)
            .with_content(&file_cid)
            .with_token(receipt.token_id)
            .with_metadata_uri(&metadata_uri),
    );

    Ok(Json(DataResponse {
        data: CaptureResponse {
            file_cid,
            metadata_cid,
            token_id: receipt.token_id,
            transaction_hash: receipt.tx_hash,
            metadata_uri,
            image_url,
        },
    }))
}
