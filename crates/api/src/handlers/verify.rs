//! Verification handlers: by CID, by uploaded file and by transaction hash.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use blocksnap_core::address::is_placeholder;
use blocksnap_core::verification::VerificationResult;
use blocksnap_events::MediaEvent;
use blocksnap_network::NetworkVerification;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Message for a hash the chain has never seen.
pub const TX_NOT_FOUND_MESSAGE: &str = "Transaction not found on blockchain";

/// Answer for a CID lookup.
#[derive(Debug, Serialize)]
pub struct ContentVerification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    pub exists_on_ipfs: bool,
    pub exists_on_blockchain: bool,
    pub owner: Option<String>,
    pub ipfs_url: Option<String>,
}

/// Check IPFS and `verifyPhoto` for one CID.
async fn verify_content(state: &AppState, cid: &str) -> AppResult<ContentVerification> {
    let exists_on_ipfs = state.store.exists(cid).await;
    let (exists_on_blockchain, owner) = state.chain.verify_photo(cid).await?;

    let owner = owner.to_string();
    Ok(ContentVerification {
        cid: None,
        exists_on_ipfs,
        exists_on_blockchain,
        owner: (exists_on_blockchain && !is_placeholder(&owner)).then_some(owner),
        ipfs_url: exists_on_ipfs.then(|| state.store.gateway_url(cid)),
    })
}

// ---------------------------------------------------------------------------
// GET /verify/{cid}
// ---------------------------------------------------------------------------

pub async fn verify_cid(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> AppResult<Json<ContentVerification>> {
    let result = verify_content(&state, &cid).await?;
    tracing::info!(
        cid = %cid,
        on_ipfs = result.exists_on_ipfs,
        on_chain = result.exists_on_blockchain,
        "Verified content"
    );
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// POST /verify/file
// ---------------------------------------------------------------------------

/// Accepts a multipart form with a required `file` field, computes the CID
/// it would get on IPFS and verifies that.
pub async fn verify_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ContentVerification>> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        file = Some((filename, data.to_vec()));
    }

    let (filename, data) = file.ok_or_else(|| AppError::BadRequest("No file uploaded".into()))?;
    if filename.is_empty() {
        return Err(AppError::BadRequest("No file selected".into()));
    }

    let cid = state.store.calculate_cid(data, &filename).await?;
    let mut result = verify_content(&state, &cid).await?;
    result.cid = Some(cid);
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// GET /verify/tx/{hash}, GET /api/verify/tx/{hash}
// ---------------------------------------------------------------------------

/// Resolve a transaction and check its content on IPFS.
///
/// Peers call the `/api` form of this route during network verification,
/// so the body is always a plain [`VerificationResult`].
pub async fn verify_transaction(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> AppResult<Json<VerificationResult>> {
    let mut result = state.resolver.verify(&tx_hash).await?;

    if !result.exists_on_blockchain {
        result.exists_on_ipfs = Some(false);
        if result.message.is_none() {
            result.message = Some(TX_NOT_FOUND_MESSAGE.to_string());
        }
        return Ok(Json(result));
    }

    let mut on_ipfs = false;
    if let Some(cid) = result.content_id.as_deref().filter(|c| !c.is_empty()) {
        on_ipfs = state.store.exists(cid).await;
        if on_ipfs {
            result.ipfs_url = Some(state.store.gateway_url(cid));
        }
    }
    result.exists_on_ipfs = Some(on_ipfs);

    state.event_bus.publish(MediaEvent::verified(&result));
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// GET /api/distributed/verify/tx/{hash}
// ---------------------------------------------------------------------------

pub async fn verify_distributed(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Json<NetworkVerification> {
    Json(state.node.verify_across_network(&tx_hash).await)
}
