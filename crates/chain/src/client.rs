//! Chain access seams.
//!
//! [`ChainClient`] covers every read the verification paths need and
//! [`ContractWriter`] the signed writes used by uploads. Both speak plain
//! alloy primitives so in-memory implementations can be built from
//! `SolEvent::encode_log_data` without a node.

use alloy::primitives::{Address, Bytes, LogData, TxHash, B256, U256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use blocksnap_core::types::ChainId;

use crate::error::ChainError;

// ---------------------------------------------------------------------------
// Data carried across the seam
// ---------------------------------------------------------------------------

/// The parts of a transaction body the resolver inspects.
#[derive(Debug, Clone)]
pub struct TransactionSummary {
    pub from: Address,
    pub to: Option<Address>,
    pub input: Bytes,
}

/// The parts of a receipt the resolver inspects.
#[derive(Debug, Clone)]
pub struct ReceiptSummary {
    pub from: Address,
    /// `None` for contract creations.
    pub to: Option<Address>,
    pub status: bool,
    pub block_number: Option<u64>,
    pub logs: Vec<ChainLog>,
}

/// An emitted event log with its position in the chain.
#[derive(Debug, Clone)]
pub struct ChainLog {
    pub address: Address,
    pub data: LogData,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<TxHash>,
}

impl ChainLog {
    /// Whether this log is an `E` event (by topic 0).
    pub fn is<E: SolEvent>(&self) -> bool {
        self.data.topics().first() == Some(&E::SIGNATURE_HASH)
    }

    /// Decode the log as `E`, or `None` if the signature does not match.
    pub fn decode<E: SolEvent>(&self) -> Option<Result<E, ChainError>> {
        if !self.is::<E>() {
            return None;
        }
        Some(
            E::decode_log_data(&self.data).map_err(|e| ChainError::EventDecode {
                event: E::SIGNATURE,
                message: e.to_string(),
            }),
        )
    }

    /// `0x`-prefixed hash of the emitting transaction.
    pub fn tx_hash_hex(&self) -> Option<String> {
        self.transaction_hash.map(format_tx_hash)
    }
}

/// An `eth_getLogs` request against the contract over a closed block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub event: B256,
    pub topic1: Option<B256>,
    pub topic2: Option<B256>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogQuery {
    /// Number of blocks the query spans (inclusive).
    pub fn span(&self) -> u64 {
        self.to_block.saturating_sub(self.from_block) + 1
    }
}

/// One chunk as stored by `getSessionChunks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainChunk {
    pub session_id: ChainId,
    pub sequence_number: ChainId,
    pub video_cid: String,
    pub metadata_cid: String,
    /// Unix seconds.
    pub timestamp: u64,
}

/// Result of a confirmed `mintPhoto`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintReceipt {
    pub tx_hash: String,
    /// `None` when the receipt carried no decodable `PhotoMinted` log.
    pub token_id: Option<ChainId>,
}

/// Result of a confirmed `startVideoSession`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    pub tx_hash: String,
    pub session_id: ChainId,
    /// Whether the id was derived from the transaction hash because the
    /// receipt carried no `VideoSessionStarted` log.
    pub derived: bool,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read access to the chain and the BlockSnap contract.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the BlockSnap contract this client targets.
    fn contract_address(&self) -> Address;

    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Unix timestamp of a block, `None` if the block is unknown.
    async fn block_timestamp(&self, block: u64) -> Result<Option<u64>, ChainError>;

    async fn transaction(&self, hash: TxHash) -> Result<Option<TransactionSummary>, ChainError>;

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, ChainError>;

    /// Logs emitted by the contract matching `query`.
    async fn logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ChainError>;

    /// `verifyPhoto(cid)`: whether a token references the CID, and its owner.
    async fn verify_photo(&self, cid: &str) -> Result<(bool, Address), ChainError>;

    async fn token_uri(&self, token_id: ChainId) -> Result<String, ChainError>;

    async fn image_cid(&self, token_id: ChainId) -> Result<String, ChainError>;

    async fn owner_of(&self, token_id: ChainId) -> Result<Address, ChainError>;

    async fn session_chunks(&self, session_id: ChainId) -> Result<Vec<ChainChunk>, ChainError>;

    async fn is_session_active(&self, session_id: ChainId) -> Result<bool, ChainError>;
}

/// Signed writes against the BlockSnap contract.
#[async_trait]
pub trait ContractWriter: Send + Sync {
    async fn mint_photo(
        &self,
        to: Address,
        image_cid: &str,
        metadata_uri: &str,
    ) -> Result<MintReceipt, ChainError>;

    async fn start_video_session(&self, owner: Address) -> Result<SessionStart, ChainError>;

    /// Record a chunk; returns the transaction hash.
    async fn add_video_chunk(
        &self,
        session_id: ChainId,
        sequence_number: ChainId,
        video_cid: &str,
        metadata_cid: &str,
        timestamp: u64,
    ) -> Result<String, ChainError>;

    /// Close a session; returns the transaction hash.
    async fn end_video_session(&self, session_id: ChainId) -> Result<String, ChainError>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Format a transaction hash as `0x`-prefixed lowercase hex.
pub fn format_tx_hash(hash: TxHash) -> String {
    format!("0x{hash:x}")
}

/// Parse a `0x`-prefixed 32-byte transaction hash.
pub fn parse_tx_hash(value: &str) -> Result<TxHash, ChainError> {
    if !blocksnap_core::address::is_valid_tx_hash(value) {
        return Err(ChainError::InvalidInput(format!(
            "Invalid transaction hash format: {value}"
        )));
    }
    value
        .parse()
        .map_err(|e| ChainError::InvalidInput(format!("Invalid transaction hash: {e}")))
}

/// Parse a `0x`-prefixed address.
pub fn parse_address(value: &str) -> Result<Address, ChainError> {
    value
        .parse()
        .map_err(|e| ChainError::InvalidInput(format!("Invalid address {value}: {e}")))
}

/// Narrow a contract `uint256` to the id width used throughout the server.
pub fn to_chain_id(value: U256) -> Result<ChainId, ChainError> {
    value
        .try_into()
        .map_err(|_| ChainError::InvalidInput(format!("Value {value} does not fit in u64")))
}

/// Indexed `uint256` topic for an id.
pub fn id_topic(id: ChainId) -> B256 {
    B256::from(U256::from(id).to_be_bytes::<32>())
}

/// Session id derived from a transaction hash when the receipt carries no
/// `VideoSessionStarted` log: the last 8 hex digits modulo one million.
pub fn session_id_from_tx_hash(tx_hash: &str) -> ChainId {
    let tail = &tx_hash[tx_hash.len().saturating_sub(8)..];
    u64::from_str_radix(tail, 16).unwrap_or(0) % 1_000_000
}

/// Session id derived from the clock when no transaction could be sent.
pub fn session_id_from_clock(unix_secs: u64) -> ChainId {
    unix_secs % 1_000_000
}
