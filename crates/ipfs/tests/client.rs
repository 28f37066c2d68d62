//! Integration tests for [`IpfsClient`] against an in-process fake node.
//!
//! The fake serves the subset of the node RPC API the client uses plus a
//! `/ipfs/{cid}` gateway route, and derives CIDs from a hash of the bytes so
//! `add` and `add?only-hash=true` agree.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use blocksnap_ipfs::{ContentStore, IpfsClient, IpfsConfig, IpfsError};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct FakeNode {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pins: Arc<Mutex<Vec<String>>>,
}

fn fake_cid(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("Qm{:016x}", hasher.finish())
}

async fn add(
    State(node): State<FakeNode>,
    Query(params): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let Ok(Some(field)) = multipart.next_field().await else {
        return (StatusCode::BAD_REQUEST, "missing file").into_response();
    };
    let name = field.file_name().unwrap_or("file").to_string();
    let Ok(data) = field.bytes().await else {
        return (StatusCode::BAD_REQUEST, "unreadable file").into_response();
    };
    let cid = fake_cid(&data);
    if params.get("only-hash").map(String::as_str) != Some("true") {
        node.blobs.lock().unwrap().insert(cid.clone(), data.to_vec());
    }
    Json(serde_json::json!({ "Name": name, "Hash": cid, "Size": data.len().to_string() }))
        .into_response()
}

async fn pin(
    State(node): State<FakeNode>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let cid = params.get("arg").cloned().unwrap_or_default();
    if !node.blobs.lock().unwrap().contains_key(&cid) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "not found").into_response();
    }
    node.pins.lock().unwrap().push(cid.clone());
    Json(serde_json::json!({ "Pins": [cid] })).into_response()
}

async fn cat(
    State(node): State<FakeNode>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let cid = params.get("arg").cloned().unwrap_or_default();
    match node.blobs.lock().unwrap().get(&cid) {
        Some(data) => data.clone().into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "merkledag: not found").into_response(),
    }
}

async fn version() -> impl IntoResponse {
    Json(serde_json::json!({ "Version": "0.29.0", "Commit": "" }))
}

async fn gateway(State(node): State<FakeNode>, Path(cid): Path<String>) -> impl IntoResponse {
    match node.blobs.lock().unwrap().get(&cid) {
        Some(data) => data.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the fake node and return a client pointed at it.
async fn start_fake() -> (FakeNode, IpfsClient) {
    let node = FakeNode::default();
    let app = Router::new()
        .route("/api/v0/add", post(add))
        .route("/api/v0/pin/add", post(pin))
        .route("/api/v0/cat", post(cat))
        .route("/api/v0/version", post(version))
        .route("/ipfs/{cid}", get(gateway))
        .with_state(node.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = IpfsClient::new(IpfsConfig::local(base.clone(), base)).unwrap();
    (node, client)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_bytes_stores_and_pins() {
    let (node, client) = start_fake().await;

    let cid = client
        .add_bytes(b"jpeg bytes".to_vec(), "photo.jpg", "image/jpeg")
        .await
        .unwrap();

    assert_eq!(cid, fake_cid(b"jpeg bytes"));
    assert!(node.pins.lock().unwrap().contains(&cid));
    assert!(client.exists(&cid).await);
}

#[tokio::test]
async fn calculated_cid_matches_stored_cid_without_storing() {
    let (node, client) = start_fake().await;

    let calculated = client
        .calculate_cid(b"frame".to_vec(), "upload.jpg")
        .await
        .unwrap();
    assert!(node.blobs.lock().unwrap().is_empty());
    assert!(!client.exists(&calculated).await);

    let stored = client
        .add_bytes(b"frame".to_vec(), "photo.jpg", "image/jpeg")
        .await
        .unwrap();
    assert_eq!(calculated, stored);
}

#[tokio::test]
async fn json_round_trips_through_gateway() {
    let (_node, client) = start_fake().await;
    let doc = serde_json::json!({ "name": "BlockSnap #20250101000000", "attributes": [] });

    let cid = client.add_json(&doc, "metadata.json").await.unwrap();

    assert_eq!(client.get_json(&cid).await.unwrap(), doc);
    assert_eq!(client.get_json(&format!("ipfs://{cid}")).await.unwrap(), doc);
    assert_eq!(
        client.get_json(&client.gateway_url(&cid)).await.unwrap(),
        doc
    );
}

#[tokio::test]
async fn fetch_content_prefers_local_node() {
    let (_node, client) = start_fake().await;
    let cid = client
        .add_bytes(b"video chunk".to_vec(), "chunk_0.webm", "video/webm")
        .await
        .unwrap();

    assert_eq!(client.fetch_content(&cid).await.unwrap(), b"video chunk");
}

#[tokio::test]
async fn missing_json_is_api_error() {
    let (_node, client) = start_fake().await;
    assert_matches!(
        client.get_json("ipfs://QmMissing").await,
        Err(IpfsError::ApiError { status: 404, .. })
    );
    assert_matches!(client.get_json("").await, Err(IpfsError::NotFound(_)));
}

#[tokio::test]
async fn ready_probe_reports_version() {
    let (_node, client) = start_fake().await;
    let version = client
        .wait_until_ready(&CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version, "0.29.0");
}

#[tokio::test]
async fn unreachable_node_is_unavailable() {
    let mut config = IpfsConfig::local("http://127.0.0.1:9", "http://127.0.0.1:9");
    config.max_retries = 1;
    let client = IpfsClient::new(config).unwrap();

    let err = client.version().await.unwrap_err();
    assert!(err.is_unavailable());
    assert!(!client.exists("QmAnything").await);
}
