//! Shared harness for the API integration tests.
//!
//! [`TestChain`] is an in-memory contract that records every write as a
//! confirmed transaction with real ABI-encoded logs, so the resolver and
//! the inventory scans work against it unchanged. [`TestStore`] keeps
//! pinned content in a map under CIDs derived from the bytes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, LogData, TxHash, B256, U256};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use blocksnap_api::cache::MediaCache;
use blocksnap_api::config::ServerConfig;
use blocksnap_api::router::build_app_router;
use blocksnap_api::state::AppState;
use blocksnap_chain::abi::{
    BlockSnapNFT, PhotoMinted, VideoChunkAdded, VideoSessionEnded, VideoSessionStarted,
};
use blocksnap_chain::client::{
    format_tx_hash, ChainChunk, ChainLog, LogQuery, MintReceipt, ReceiptSummary, SessionStart,
    TransactionSummary,
};
use blocksnap_chain::inventory::Inventory;
use blocksnap_chain::resolver::TransactionResolver;
use blocksnap_chain::scanner::ScanPolicy;
use blocksnap_chain::{ChainClient, ChainError, ContractWriter};
use blocksnap_core::metadata::extract_cid;
use blocksnap_core::types::ChainId;
use blocksnap_events::EventBus;
use blocksnap_ipfs::{ContentStore, IpfsError};
use blocksnap_network::{DistributedNode, NodeConfig, TransactionVerifier};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

pub const CONTRACT: Address = Address::repeat_byte(0xC0);
pub const SERVER: Address = Address::repeat_byte(0x5E);

/// Wallets as a browser sends them.
pub const ALICE: &str = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";
pub const BOB: &str = "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0";

pub const GATEWAY: &str = "https://gateway.test/ipfs";

// ---------------------------------------------------------------------------
// In-memory chain
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChainState {
    head: u64,
    next_tx: u64,
    next_token: u64,
    next_session: u64,
    logs: Vec<ChainLog>,
    receipts: HashMap<TxHash, ReceiptSummary>,
    transactions: HashMap<TxHash, TransactionSummary>,
    owners: HashMap<u64, Address>,
    token_uris: HashMap<u64, String>,
    image_cids: HashMap<u64, String>,
    chunks: HashMap<u64, Vec<ChainChunk>>,
    ended: Vec<u64>,
}

impl ChainState {
    /// Mine one block holding a single successful call to the contract.
    fn push_tx(&mut self, input: Vec<u8>, events: Vec<LogData>) -> TxHash {
        self.next_tx += 1;
        self.head += 1;
        let hash = B256::left_padding_from(&self.next_tx.to_be_bytes());
        let block = self.head;
        let logs: Vec<ChainLog> = events
            .into_iter()
            .map(|data| ChainLog {
                address: CONTRACT,
                data,
                block_number: Some(block),
                transaction_hash: Some(hash),
            })
            .collect();
        self.logs.extend(logs.iter().cloned());
        self.receipts.insert(
            hash,
            ReceiptSummary {
                from: SERVER,
                to: Some(CONTRACT),
                status: true,
                block_number: Some(block),
                logs,
            },
        );
        self.transactions.insert(
            hash,
            TransactionSummary {
                from: SERVER,
                to: Some(CONTRACT),
                input: Bytes::from(input),
            },
        );
        hash
    }
}

/// Contract double implementing both the read and the write side.
pub struct TestChain {
    state: Mutex<ChainState>,
    /// Every RPC call fails, as if the node were down.
    pub offline: AtomicBool,
    /// Only writes fail, as if the server had no signing key.
    pub read_only: AtomicBool,
}

impl Default for TestChain {
    fn default() -> Self {
        Self {
            state: Mutex::new(ChainState {
                head: 100,
                next_token: 1,
                next_session: 1,
                ..Default::default()
            }),
            offline: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
        }
    }
}

impl TestChain {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn chunk_count(&self, session_id: u64) -> usize {
        self.state
            .lock()
            .unwrap()
            .chunks
            .get(&session_id)
            .map_or(0, Vec::len)
    }

    /// Number of `startVideoSession` calls that went through.
    pub fn sessions_started(&self) -> u64 {
        self.state.lock().unwrap().next_session - 1
    }

    pub fn is_ended(&self, session_id: u64) -> bool {
        self.state.lock().unwrap().ended.contains(&session_id)
    }

    fn check_online(&self) -> Result<(), ChainError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("connection refused".into()));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), ChainError> {
        self.check_online()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(ChainError::NoSigner);
        }
        Ok(())
    }
}

fn nonexistent() -> ChainError {
    ChainError::ContractCall("execution reverted: nonexistent token".into())
}

#[async_trait]
impl ChainClient for TestChain {
    fn contract_address(&self) -> Address {
        CONTRACT
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.check_online()?;
        Ok(self.state.lock().unwrap().head)
    }

    async fn block_timestamp(&self, block: u64) -> Result<Option<u64>, ChainError> {
        self.check_online()?;
        let head = self.state.lock().unwrap().head;
        Ok((block <= head).then(|| 1_700_000_000 + block * 12))
    }

    async fn transaction(&self, hash: TxHash) -> Result<Option<TransactionSummary>, ChainError> {
        self.check_online()?;
        Ok(self.state.lock().unwrap().transactions.get(&hash).cloned())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, ChainError> {
        self.check_online()?;
        Ok(self.state.lock().unwrap().receipts.get(&hash).cloned())
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ChainError> {
        self.check_online()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .logs
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                let topics = log.data.topics();
                block >= query.from_block
                    && block <= query.to_block
                    && topics.first() == Some(&query.event)
                    && query.topic1.is_none_or(|t| topics.get(1) == Some(&t))
                    && query.topic2.is_none_or(|t| topics.get(2) == Some(&t))
            })
            .cloned()
            .collect())
    }

    async fn verify_photo(&self, cid: &str) -> Result<(bool, Address), ChainError> {
        self.check_online()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .image_cids
            .iter()
            .find(|(_, c)| c.as_str() == cid)
            .and_then(|(id, _)| state.owners.get(id))
            .map(|owner| (true, *owner))
            .unwrap_or((false, Address::ZERO)))
    }

    async fn token_uri(&self, token_id: u64) -> Result<String, ChainError> {
        self.check_online()?;
        self.state
            .lock()
            .unwrap()
            .token_uris
            .get(&token_id)
            .cloned()
            .ok_or_else(nonexistent)
    }

    async fn image_cid(&self, token_id: u64) -> Result<String, ChainError> {
        self.check_online()?;
        self.state
            .lock()
            .unwrap()
            .image_cids
            .get(&token_id)
            .cloned()
            .ok_or_else(nonexistent)
    }

    async fn owner_of(&self, token_id: u64) -> Result<Address, ChainError> {
        self.check_online()?;
        self.state
            .lock()
            .unwrap()
            .owners
            .get(&token_id)
            .copied()
            .ok_or_else(nonexistent)
    }

    async fn session_chunks(&self, session_id: u64) -> Result<Vec<ChainChunk>, ChainError> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .chunks
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn is_session_active(&self, session_id: u64) -> Result<bool, ChainError> {
        self.check_online()?;
        let state = self.state.lock().unwrap();
        Ok(state.chunks.contains_key(&session_id) && !state.ended.contains(&session_id))
    }
}

#[async_trait]
impl ContractWriter for TestChain {
    async fn mint_photo(
        &self,
        to: Address,
        image_cid: &str,
        metadata_uri: &str,
    ) -> Result<MintReceipt, ChainError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let token_id = state.next_token;
        state.next_token += 1;

        let event = PhotoMinted {
            tokenId: U256::from(token_id),
            owner: to,
            ipfsCID: image_cid.into(),
            metadataURI: metadata_uri.into(),
        };
        let input = BlockSnapNFT::mintPhotoCall {
            to,
            imageCID: image_cid.into(),
            metadataURI: metadata_uri.into(),
        }
        .abi_encode();
        state.owners.insert(token_id, to);
        state.token_uris.insert(token_id, metadata_uri.to_string());
        state.image_cids.insert(token_id, image_cid.to_string());
        let hash = state.push_tx(input, vec![event.encode_log_data()]);

        Ok(MintReceipt {
            tx_hash: format_tx_hash(hash),
            token_id: Some(token_id),
        })
    }

    async fn start_video_session(&self, owner: Address) -> Result<SessionStart, ChainError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let session_id = state.next_session;
        state.next_session += 1;

        let event = VideoSessionStarted {
            sessionId: U256::from(session_id),
            owner,
        };
        let input = BlockSnapNFT::startVideoSessionCall { owner }.abi_encode();
        state.chunks.entry(session_id).or_default();
        let hash = state.push_tx(input, vec![event.encode_log_data()]);

        Ok(SessionStart {
            tx_hash: format_tx_hash(hash),
            session_id,
            derived: false,
        })
    }

    async fn add_video_chunk(
        &self,
        session_id: ChainId,
        sequence_number: ChainId,
        video_cid: &str,
        metadata_cid: &str,
        timestamp: u64,
    ) -> Result<String, ChainError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let event = VideoChunkAdded {
            sessionId: U256::from(session_id),
            sequenceNumber: U256::from(sequence_number),
            videoCID: video_cid.into(),
            metadataCID: metadata_cid.into(),
            timestamp: U256::from(timestamp),
        };
        let input = BlockSnapNFT::addVideoChunkCall {
            sessionId: U256::from(session_id),
            sequenceNumber: U256::from(sequence_number),
            videoCID: video_cid.into(),
            metadataCID: metadata_cid.into(),
            timestamp: U256::from(timestamp),
        }
        .abi_encode();
        state.chunks.entry(session_id).or_default().push(ChainChunk {
            session_id,
            sequence_number,
            video_cid: video_cid.to_string(),
            metadata_cid: metadata_cid.to_string(),
            timestamp,
        });
        let hash = state.push_tx(input, vec![event.encode_log_data()]);
        Ok(format_tx_hash(hash))
    }

    async fn end_video_session(&self, session_id: ChainId) -> Result<String, ChainError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let event = VideoSessionEnded {
            sessionId: U256::from(session_id),
        };
        let input = BlockSnapNFT::endVideoSessionCall {
            sessionId: U256::from(session_id),
        }
        .abi_encode();
        state.ended.push(session_id);
        let hash = state.push_tx(input, vec![event.encode_log_data()]);
        Ok(format_tx_hash(hash))
    }
}

// ---------------------------------------------------------------------------
// In-memory content store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TestStore {
    content: Mutex<HashMap<String, Vec<u8>>>,
    pub offline: AtomicBool,
}

impl TestStore {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn get(&self, cid: &str) -> Option<Vec<u8>> {
        self.content.lock().unwrap().get(cid).cloned()
    }

    pub fn len(&self) -> usize {
        self.content.lock().unwrap().len()
    }

    /// Fake CID derived from the content, so equal bytes share a CID.
    fn cid_for(data: &[u8]) -> String {
        let digest = data
            .iter()
            .fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| {
                (acc ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
            });
        format!("QmTest{digest:016x}")
    }

    fn check_online(&self) -> Result<(), IpfsError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(IpfsError::UnexpectedResponse("node unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for TestStore {
    async fn add_bytes(
        &self,
        data: Vec<u8>,
        _filename: &str,
        _content_type: &str,
    ) -> Result<String, IpfsError> {
        self.check_online()?;
        let cid = Self::cid_for(&data);
        self.content.lock().unwrap().insert(cid.clone(), data);
        Ok(cid)
    }

    async fn add_json(
        &self,
        value: &serde_json::Value,
        filename: &str,
    ) -> Result<String, IpfsError> {
        let data = serde_json::to_vec(value).map_err(IpfsError::Serialization)?;
        self.add_bytes(data, filename, "application/json").await
    }

    async fn calculate_cid(&self, data: Vec<u8>, _filename: &str) -> Result<String, IpfsError> {
        self.check_online()?;
        Ok(Self::cid_for(&data))
    }

    async fn exists(&self, cid: &str) -> bool {
        !self.offline.load(Ordering::SeqCst) && self.content.lock().unwrap().contains_key(cid)
    }

    async fn get_json(&self, uri: &str) -> Result<serde_json::Value, IpfsError> {
        let data = self.fetch_content(extract_cid(uri)).await?;
        serde_json::from_slice(&data).map_err(IpfsError::Serialization)
    }

    async fn fetch_content(&self, cid: &str) -> Result<Vec<u8>, IpfsError> {
        self.check_online()?;
        self.get(cid)
            .ok_or_else(|| IpfsError::NotFound(cid.to_string()))
    }

    async fn version(&self) -> Result<String, IpfsError> {
        self.check_online()?;
        Ok("0.29.0-test".into())
    }

    fn gateway_url(&self, cid: &str) -> String {
        format!("{GATEWAY}/{cid}")
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(cache_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        cache_dir: cache_dir.to_path_buf(),
        demo_fallback: false,
    }
}

/// A router wired to in-memory backends, plus handles on those backends.
pub struct TestApp {
    pub router: Router,
    pub chain: Arc<TestChain>,
    pub store: Arc<TestStore>,
    pub node: Arc<DistributedNode>,
    pub event_bus: Arc<EventBus>,
    // Owns the cache and registry directories for the test's lifetime.
    _dir: TempDir,
}

impl TestApp {
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

pub async fn build_test_app() -> TestApp {
    build_test_app_with(|_| {}).await
}

/// Build the full application router with all middleware layers, the same
/// way `main.rs` does, after letting the caller adjust the config.
pub async fn build_test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir.path().join("captures"));
    configure(&mut config);

    let chain = Arc::new(TestChain::default());
    let store = Arc::new(TestStore::default());
    let policy = ScanPolicy::default();

    let chain_client: Arc<dyn ChainClient> = chain.clone();
    let resolver = Arc::new(TransactionResolver::new(chain_client.clone(), policy, GATEWAY));
    let inventory = Arc::new(Inventory::new(chain_client.clone(), policy));
    let verifier: Arc<dyn TransactionVerifier> = resolver.clone();
    let node = Arc::new(
        DistributedNode::new(
            NodeConfig::standalone("test-node", dir.path().join("network")),
            Some(verifier),
        )
        .await
        .unwrap(),
    );
    let event_bus = Arc::new(EventBus::default());

    let state = AppState {
        config: Arc::new(config.clone()),
        chain: chain_client,
        writer: chain.clone(),
        store: store.clone(),
        resolver,
        inventory,
        node: node.clone(),
        cache: Arc::new(MediaCache::new(config.cache_dir.clone())),
        event_bus: event_bus.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        chain,
        store,
        node,
        event_bus,
        _dir: dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Assert the status and return the parsed body.
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "blocksnap-test-boundary";

/// One part of a `multipart/form-data` body.
pub enum Part<'a> {
    Text(&'a str, String),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: Vec<u8>,
    },
}

pub fn multipart_body(parts: Vec<Part<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: Router, uri: &str, parts: Vec<Part<'_>>) -> Response<Body> {
    app.oneshot(
        Request::post(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Form fields of one dashcam chunk upload.
pub fn chunk_parts<'a>(
    data: &[u8],
    wallet: Option<&str>,
    sequence: u64,
    session_id: Option<u64>,
    first: bool,
    last: bool,
) -> Vec<Part<'a>> {
    let mut parts = vec![
        Part::File {
            name: "video",
            filename: "chunk.webm",
            content_type: "video/webm",
            data: data.to_vec(),
        },
        Part::Text("sequence_number", sequence.to_string()),
        Part::Text("is_first_chunk", first.to_string()),
        Part::Text("is_last_chunk", last.to_string()),
    ];
    if let Some(wallet) = wallet {
        parts.push(Part::Text("wallet_address", wallet.to_string()));
    }
    if let Some(session_id) = session_id {
        parts.push(Part::Text("session_id", session_id.to_string()));
    }
    parts
}
