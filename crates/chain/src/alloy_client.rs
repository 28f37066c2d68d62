//! JSON-RPC implementation of the chain seams.
//!
//! A fresh HTTP provider is built per call; the signer-backed provider is
//! only built for writes and fails with [`ChainError::NoSigner`] when no key
//! is configured.

use alloy::network::{EthereumWallet, ReceiptResponse as _};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter, TransactionReceipt};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use blocksnap_core::types::ChainId;

use crate::abi::{BlockSnapNFT, PhotoMinted, VideoSessionStarted};
use crate::client::{
    format_tx_hash, session_id_from_tx_hash, to_chain_id, ChainChunk, ChainClient, ChainLog,
    ContractWriter, LogQuery, MintReceipt, ReceiptSummary, SessionStart, TransactionSummary,
};
use crate::config::ChainConfig;
use crate::error::ChainError;

pub struct AlloyChainClient {
    rpc_url: String,
    contract: Address,
    private_key: Option<String>,
}

impl AlloyChainClient {
    /// Validate the configuration and build a client.
    pub fn new(config: &ChainConfig) -> Result<Self, ChainError> {
        config.validate()?;
        let contract = config
            .contract_address
            .parse()
            .map_err(|e| ChainError::Configuration(format!("Invalid contract address: {e}")))?;
        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            contract,
            private_key: config.private_key.clone(),
        })
    }

    /// Whether writes are possible.
    pub fn can_sign(&self) -> bool {
        self.private_key.is_some()
    }

    fn provider(&self) -> Result<impl Provider, ChainError> {
        let url = self
            .rpc_url
            .parse()
            .map_err(|e| ChainError::Configuration(format!("Invalid RPC URL: {e}")))?;
        Ok(ProviderBuilder::new().connect_http(url))
    }

    fn signer_provider(&self) -> Result<impl Provider, ChainError> {
        let key = self.private_key.as_ref().ok_or(ChainError::NoSigner)?;
        let signer = key
            .parse::<PrivateKeySigner>()
            .map_err(|e| ChainError::Configuration(format!("Invalid private key: {e}")))?;
        let wallet = EthereumWallet::from(signer);
        let url = self
            .rpc_url
            .parse()
            .map_err(|e| ChainError::Configuration(format!("Invalid RPC URL: {e}")))?;
        Ok(ProviderBuilder::new().wallet(wallet).connect_http(url))
    }
}

fn rpc_err(e: impl std::fmt::Display) -> ChainError {
    ChainError::Rpc(e.to_string())
}

fn call_err(e: impl std::fmt::Display) -> ChainError {
    ChainError::ContractCall(e.to_string())
}

fn tx_err(e: impl std::fmt::Display) -> ChainError {
    ChainError::Transaction(e.to_string())
}

fn summarize_receipt(receipt: &TransactionReceipt) -> ReceiptSummary {
    ReceiptSummary {
        from: receipt.from,
        to: receipt.to,
        status: receipt.status(),
        block_number: receipt.block_number,
        logs: receipt
            .inner
            .logs()
            .iter()
            .map(|log| ChainLog {
                address: log.inner.address,
                data: log.inner.data.clone(),
                block_number: log.block_number,
                transaction_hash: log.transaction_hash,
            })
            .collect(),
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    fn contract_address(&self) -> Address {
        self.contract
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider()?.get_block_number().await.map_err(rpc_err)
    }

    async fn block_timestamp(&self, block: u64) -> Result<Option<u64>, ChainError> {
        let block = self
            .provider()?
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await
            .map_err(rpc_err)?;
        Ok(block.map(|b| b.header.timestamp))
    }

    async fn transaction(&self, hash: TxHash) -> Result<Option<TransactionSummary>, ChainError> {
        let tx = self
            .provider()?
            .get_transaction_by_hash(hash)
            .await
            .map_err(rpc_err)?;
        Ok(tx.map(|tx| TransactionSummary {
            from: alloy::network::TransactionResponse::from(&tx),
            to: alloy::consensus::Transaction::to(&tx),
            input: alloy::consensus::Transaction::input(&tx).clone(),
        }))
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, ChainError> {
        let receipt = self
            .provider()?
            .get_transaction_receipt(hash)
            .await
            .map_err(rpc_err)?;
        Ok(receipt.as_ref().map(summarize_receipt))
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ChainError> {
        let mut filter = Filter::new()
            .address(self.contract)
            .event_signature(query.event)
            .from_block(BlockNumberOrTag::Number(query.from_block))
            .to_block(BlockNumberOrTag::Number(query.to_block));
        if let Some(topic) = query.topic1 {
            filter = filter.topic1(topic);
        }
        if let Some(topic) = query.topic2 {
            filter = filter.topic2(topic);
        }

        let logs = self.provider()?.get_logs(&filter).await.map_err(rpc_err)?;
        Ok(logs
            .into_iter()
            .map(|log| ChainLog {
                address: log.inner.address,
                data: log.inner.data,
                block_number: log.block_number,
                transaction_hash: log.transaction_hash,
            })
            .collect())
    }

    async fn verify_photo(&self, cid: &str) -> Result<(bool, Address), ChainError> {
        let provider = self.provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);
        let result = contract
            .verifyPhoto(cid.to_string())
            .call()
            .await
            .map_err(call_err)?;
        Ok((result.exists, result.owner))
    }

    async fn token_uri(&self, token_id: ChainId) -> Result<String, ChainError> {
        let provider = self.provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);
        contract
            .tokenURI(U256::from(token_id))
            .call()
            .await
            .map_err(call_err)
    }

    async fn image_cid(&self, token_id: ChainId) -> Result<String, ChainError> {
        let provider = self.provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);
        contract
            .getImageCID(U256::from(token_id))
            .call()
            .await
            .map_err(call_err)
    }

    async fn owner_of(&self, token_id: ChainId) -> Result<Address, ChainError> {
        let provider = self.provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);
        contract
            .ownerOf(U256::from(token_id))
            .call()
            .await
            .map_err(call_err)
    }

    async fn session_chunks(&self, session_id: ChainId) -> Result<Vec<ChainChunk>, ChainError> {
        let provider = self.provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);
        let chunks = contract
            .getSessionChunks(U256::from(session_id))
            .call()
            .await
            .map_err(call_err)?;
        chunks
            .into_iter()
            .map(|c| {
                Ok(ChainChunk {
                    session_id: to_chain_id(c.sessionId)?,
                    sequence_number: to_chain_id(c.sequenceNumber)?,
                    video_cid: c.videoCID,
                    metadata_cid: c.metadataCID,
                    timestamp: to_chain_id(c.timestamp)?,
                })
            })
            .collect()
    }

    async fn is_session_active(&self, session_id: ChainId) -> Result<bool, ChainError> {
        let provider = self.provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);
        contract
            .isSessionActive(U256::from(session_id))
            .call()
            .await
            .map_err(call_err)
    }
}

#[async_trait]
impl ContractWriter for AlloyChainClient {
    async fn mint_photo(
        &self,
        to: Address,
        image_cid: &str,
        metadata_uri: &str,
    ) -> Result<MintReceipt, ChainError> {
        tracing::debug!(%to, image_cid, "Minting photo");
        let provider = self.signer_provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);

        let receipt = contract
            .mintPhoto(to, image_cid.to_string(), metadata_uri.to_string())
            .send()
            .await
            .map_err(tx_err)?
            .get_receipt()
            .await
            .map_err(tx_err)?;
        let tx_hash = format_tx_hash(receipt.transaction_hash);
        if !receipt.status() {
            return Err(ChainError::Transaction(format!("mintPhoto {tx_hash} reverted")));
        }

        let token_id = summarize_receipt(&receipt)
            .logs
            .iter()
            .find_map(|log| log.decode::<PhotoMinted>()?.ok())
            .and_then(|event| to_chain_id(event.tokenId).ok());
        if token_id.is_none() {
            tracing::warn!(%tx_hash, "Mint receipt carried no PhotoMinted event");
        }

        tracing::info!(%tx_hash, ?token_id, "Photo minted");
        Ok(MintReceipt { tx_hash, token_id })
    }

    async fn start_video_session(&self, owner: Address) -> Result<SessionStart, ChainError> {
        let provider = self.signer_provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);

        let receipt = contract
            .startVideoSession(owner)
            .send()
            .await
            .map_err(tx_err)?
            .get_receipt()
            .await
            .map_err(tx_err)?;
        let tx_hash = format_tx_hash(receipt.transaction_hash);
        if !receipt.status() {
            return Err(ChainError::Transaction(format!(
                "startVideoSession {tx_hash} reverted"
            )));
        }

        let from_event = summarize_receipt(&receipt)
            .logs
            .iter()
            .find_map(|log| log.decode::<VideoSessionStarted>()?.ok())
            .and_then(|event| to_chain_id(event.sessionId).ok());

        let start = match from_event {
            Some(session_id) => SessionStart {
                tx_hash,
                session_id,
                derived: false,
            },
            None => {
                let session_id = session_id_from_tx_hash(&tx_hash);
                tracing::warn!(%tx_hash, session_id, "No VideoSessionStarted event, deriving id");
                SessionStart {
                    tx_hash,
                    session_id,
                    derived: true,
                }
            }
        };
        tracing::info!(session_id = start.session_id, tx_hash = %start.tx_hash, "Video session started");
        Ok(start)
    }

    async fn add_video_chunk(
        &self,
        session_id: ChainId,
        sequence_number: ChainId,
        video_cid: &str,
        metadata_cid: &str,
        timestamp: u64,
    ) -> Result<String, ChainError> {
        let provider = self.signer_provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);

        let receipt = contract
            .addVideoChunk(
                U256::from(session_id),
                U256::from(sequence_number),
                video_cid.to_string(),
                metadata_cid.to_string(),
                U256::from(timestamp),
            )
            .send()
            .await
            .map_err(tx_err)?
            .get_receipt()
            .await
            .map_err(tx_err)?;
        let tx_hash = format_tx_hash(receipt.transaction_hash);
        if !receipt.status() {
            return Err(ChainError::Transaction(format!(
                "addVideoChunk {tx_hash} reverted"
            )));
        }
        tracing::info!(session_id, sequence_number, %tx_hash, "Video chunk recorded");
        Ok(tx_hash)
    }

    async fn end_video_session(&self, session_id: ChainId) -> Result<String, ChainError> {
        let provider = self.signer_provider()?;
        let contract = BlockSnapNFT::new(self.contract, &provider);

        let receipt = contract
            .endVideoSession(U256::from(session_id))
            .send()
            .await
            .map_err(tx_err)?
            .get_receipt()
            .await
            .map_err(tx_err)?;
        let tx_hash = format_tx_hash(receipt.transaction_hash);
        if !receipt.status() {
            return Err(ChainError::Transaction(format!(
                "endVideoSession {tx_hash} reverted"
            )));
        }
        tracing::info!(session_id, %tx_hash, "Video session ended");
        Ok(tx_hash)
    }
}
