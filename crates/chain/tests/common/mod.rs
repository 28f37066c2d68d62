//! In-memory chain used by the integration tests.
//!
//! Holds contract logs, receipts and contract state, answers
//! `eth_getLogs` by filtering in memory and can be told to reject any
//! query spanning more than `max_range` blocks, like hosted RPC providers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use blocksnap_chain::abi::{
    BlockSnapNFT, PhotoMinted, VideoChunkAdded, VideoSessionEnded, VideoSessionStarted,
};
use blocksnap_chain::client::{
    ChainChunk, ChainClient, ChainLog, LogQuery, ReceiptSummary, TransactionSummary,
};
use blocksnap_chain::ChainError;

pub const CONTRACT: Address = Address::repeat_byte(0xC0);
pub const SERVER: Address = Address::repeat_byte(0x5E);
pub const ALICE: Address = Address::repeat_byte(0xA1);
pub const BOB: Address = Address::repeat_byte(0xB0);

#[derive(Default)]
pub struct MockChain {
    pub head: u64,
    pub max_range: Option<u64>,
    pub fail_head: bool,
    pub fail_receipts: bool,
    pub logs: Vec<ChainLog>,
    pub receipts: HashMap<TxHash, ReceiptSummary>,
    pub transactions: HashMap<TxHash, TransactionSummary>,
    pub owners: HashMap<u64, Address>,
    pub token_uris: HashMap<u64, String>,
    pub image_cids: HashMap<u64, String>,
    pub chunks: HashMap<u64, Vec<ChainChunk>>,
    pub queries: Mutex<Vec<LogQuery>>,
    next_tx: u64,
}

impl MockChain {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            ..Default::default()
        }
    }

    pub fn with_max_range(mut self, max_range: u64) -> Self {
        self.max_range = Some(max_range);
        self
    }

    pub fn query_spans(&self) -> Vec<u64> {
        self.queries.lock().unwrap().iter().map(LogQuery::span).collect()
    }

    fn next_hash(&mut self) -> TxHash {
        self.next_tx += 1;
        B256::left_padding_from(&self.next_tx.to_be_bytes())
    }

    /// Record a confirmed transaction with the given input and events.
    pub fn push_tx(
        &mut self,
        to: Option<Address>,
        input: Vec<u8>,
        events: Vec<(Address, alloy::primitives::LogData)>,
        block: u64,
    ) -> TxHash {
        let hash = self.next_hash();
        let logs: Vec<ChainLog> = events
            .into_iter()
            .map(|(address, data)| ChainLog {
                address,
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
                to,
                status: true,
                block_number: Some(block),
                logs,
            },
        );
        self.transactions.insert(
            hash,
            TransactionSummary {
                from: SERVER,
                to,
                input: Bytes::from(input),
            },
        );
        hash
    }

    pub fn mint(&mut self, token_id: u64, owner: Address, cid: &str, block: u64) -> TxHash {
        let uri = format!("ipfs://meta-{cid}");
        let event = PhotoMinted {
            tokenId: U256::from(token_id),
            owner,
            ipfsCID: cid.into(),
            metadataURI: uri.clone(),
        };
        let input = BlockSnapNFT::mintPhotoCall {
            to: owner,
            imageCID: cid.into(),
            metadataURI: uri.clone(),
        }
        .abi_encode();
        self.owners.insert(token_id, owner);
        self.token_uris.insert(token_id, uri);
        self.image_cids.insert(token_id, cid.to_string());
        self.push_tx(
            Some(CONTRACT),
            input,
            vec![(CONTRACT, event.encode_log_data())],
            block,
        )
    }

    pub fn start_session(&mut self, session_id: u64, owner: Address, block: u64) -> TxHash {
        let event = VideoSessionStarted {
            sessionId: U256::from(session_id),
            owner,
        };
        let input = BlockSnapNFT::startVideoSessionCall { owner }.abi_encode();
        self.chunks.entry(session_id).or_default();
        self.push_tx(
            Some(CONTRACT),
            input,
            vec![(CONTRACT, event.encode_log_data())],
            block,
        )
    }

    pub fn add_chunk(&mut self, session_id: u64, seq: u64, cid: &str, block: u64) -> TxHash {
        let meta = format!("QmMeta{seq}");
        let event = VideoChunkAdded {
            sessionId: U256::from(session_id),
            sequenceNumber: U256::from(seq),
            videoCID: cid.into(),
            metadataCID: meta.clone(),
            timestamp: U256::from(1_700_000_000 + seq * 30),
        };
        let input = BlockSnapNFT::addVideoChunkCall {
            sessionId: U256::from(session_id),
            sequenceNumber: U256::from(seq),
            videoCID: cid.into(),
            metadataCID: meta.clone(),
            timestamp: U256::from(1_700_000_000 + seq * 30),
        }
        .abi_encode();
        self.chunks.entry(session_id).or_default().push(ChainChunk {
            session_id,
            sequence_number: seq,
            video_cid: cid.to_string(),
            metadata_cid: meta,
            timestamp: 1_700_000_000 + seq * 30,
        });
        self.push_tx(
            Some(CONTRACT),
            input,
            vec![(CONTRACT, event.encode_log_data())],
            block,
        )
    }

    pub fn end_session(&mut self, session_id: u64, block: u64) -> TxHash {
        let event = VideoSessionEnded {
            sessionId: U256::from(session_id),
        };
        let input = BlockSnapNFT::endVideoSessionCall {
            sessionId: U256::from(session_id),
        }
        .abi_encode();
        self.push_tx(
            Some(CONTRACT),
            input,
            vec![(CONTRACT, event.encode_log_data())],
            block,
        )
    }

    pub fn hex(hash: TxHash) -> String {
        format!("0x{hash:x}")
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn contract_address(&self) -> Address {
        CONTRACT
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        if self.fail_head {
            return Err(ChainError::Rpc("connection refused".into()));
        }
        Ok(self.head)
    }

    async fn block_timestamp(&self, block: u64) -> Result<Option<u64>, ChainError> {
        Ok((block <= self.head).then(|| 1_700_000_000 + block * 12))
    }

    async fn transaction(&self, hash: TxHash) -> Result<Option<TransactionSummary>, ChainError> {
        Ok(self.transactions.get(&hash).cloned())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, ChainError> {
        if self.fail_receipts {
            return Err(ChainError::Rpc("upstream timeout".into()));
        }
        Ok(self.receipts.get(&hash).cloned())
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ChainError> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(max) = self.max_range {
            if query.span() > max {
                return Err(ChainError::Rpc(format!(
                    "query exceeds max block range {max}"
                )));
            }
        }
        Ok(self
            .logs
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                let topics = log.data.topics();
                log.address == CONTRACT
                    && block >= query.from_block
                    && block <= query.to_block
                    && topics.first() == Some(&query.event)
                    && query.topic1.is_none_or(|t| topics.get(1) == Some(&t))
                    && query.topic2.is_none_or(|t| topics.get(2) == Some(&t))
            })
            .cloned()
            .collect())
    }

    async fn verify_photo(&self, cid: &str) -> Result<(bool, Address), ChainError> {
        Ok(self
            .image_cids
            .iter()
            .find(|(_, c)| c.as_str() == cid)
            .and_then(|(id, _)| self.owners.get(id))
            .map(|owner| (true, *owner))
            .unwrap_or((false, Address::ZERO)))
    }

    async fn token_uri(&self, token_id: u64) -> Result<String, ChainError> {
        self.token_uris
            .get(&token_id)
            .cloned()
            .ok_or_else(|| ChainError::ContractCall("nonexistent token".into()))
    }

    async fn image_cid(&self, token_id: u64) -> Result<String, ChainError> {
        self.image_cids
            .get(&token_id)
            .cloned()
            .ok_or_else(|| ChainError::ContractCall("nonexistent token".into()))
    }

    async fn owner_of(&self, token_id: u64) -> Result<Address, ChainError> {
        self.owners
            .get(&token_id)
            .copied()
            .ok_or_else(|| ChainError::ContractCall("nonexistent token".into()))
    }

    async fn session_chunks(&self, session_id: u64) -> Result<Vec<ChainChunk>, ChainError> {
        Ok(self.chunks.get(&session_id).cloned().unwrap_or_default())
    }

    async fn is_session_active(&self, session_id: u64) -> Result<bool, ChainError> {
        Ok(self.chunks.contains_key(&session_id))
    }
}
