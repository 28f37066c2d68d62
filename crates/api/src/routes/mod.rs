pub mod health;
pub mod media;
pub mod network;
pub mod verify;

use axum::Router;

use crate::state::AppState;

/// Build the application route tree (everything except `/health`).
///
/// Route hierarchy:
///
/// ```text
/// /capture                                  POST capture, pin and mint a photo
/// /token/{token_id}                         GET token URI and image CID
/// /nfts/{address}                           GET cached + on-chain NFTs
/// /video-sessions/{address}                 GET cached + on-chain sessions
/// /ipfs/{cid}                               GET content proxy
/// /api/dashcam/upload                       POST one dashcam chunk
///
/// /verify/{cid}                             GET verify content by CID
/// /verify/file                              POST verify an uploaded file
/// /verify/tx/{hash}                         GET verify a transaction
/// /api/verify/tx/{hash}                     GET same, called by peers
/// /api/distributed/verify/tx/{hash}         GET registry, chain, then peers
///
/// /api/recent-transactions                  GET registry feed
/// /api/query-media                          GET registry query
/// /api/media/broadcast                      POST media pushed by a peer
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(media::router())
        .merge(verify::router())
        .merge(network::router())
}
