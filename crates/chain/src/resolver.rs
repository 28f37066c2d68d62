//! Transaction resolver.
//!
//! Given a transaction hash, decide whether it is BlockSnap media and, if so,
//! which kind. The receipt's logs are authoritative: a `PhotoMinted` log
//! classifies the transaction as a photo mint no matter which function was
//! called. Only when no known log is present does the resolver fall back to
//! the function selector in the transaction input.
//!
//! Resolution never fails for a confirmed transaction to the contract; the
//! weakest answer is [`Resolution::Unknown`]. Metadata locations in the
//! normalized answer are always gateway URLs.

use std::sync::Arc;

use alloy::primitives::Address;
use blocksnap_core::media::MediaType;
use blocksnap_core::types::ChainId;
use blocksnap_core::verification::VerificationResult;
use blocksnap_ipfs::gateway::gateway_url;

use crate::abi::{PhotoMinted, VideoChunkAdded, VideoSessionEnded, VideoSessionStarted};
use crate::client::{parse_tx_hash, to_chain_id, ChainClient, ChainLog};
use crate::error::ChainError;
use crate::inventory::Inventory;
use crate::scanner::ScanPolicy;
use crate::selectors;

/// Message attached to transactions sent to a different contract.
pub const FOREIGN_CONTRACT_MESSAGE: &str = "Transaction is not for BlockSnap contract";

/// Message attached when a contract transaction matches no known shape.
pub const UNDETERMINED_MESSAGE: &str = "Transaction exists but media type could not be determined";

/// Classification of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Malformed hash, or no receipt on chain.
    Missing,
    /// Confirmed, but not a call to the BlockSnap contract.
    Foreign,
    Photo {
        token_id: ChainId,
        owner: Address,
        cid: String,
        metadata_uri: String,
    },
    VideoChunk {
        session_id: ChainId,
        sequence_number: ChainId,
        cid: String,
        metadata_cid: String,
        owner: Option<Address>,
    },
    VideoSession {
        session_id: ChainId,
        owner: Option<Address>,
        ended: bool,
    },
    ContractInteraction {
        function: &'static str,
        owner: Option<Address>,
    },
    Unknown {
        owner: Option<Address>,
    },
}

impl Resolution {
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing | Self::Foreign)
    }

    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            Self::Missing | Self::Foreign => None,
            Self::Photo { .. } => Some(MediaType::Photo),
            Self::VideoChunk { .. } => Some(MediaType::VideoChunk),
            Self::VideoSession { .. } => Some(MediaType::VideoSession),
            Self::ContractInteraction { .. } => Some(MediaType::ContractInteraction),
            Self::Unknown { .. } => Some(MediaType::Unknown),
        }
    }

    /// Normalize into the display-ready verification answer, with metadata
    /// served from `gateway`.
    pub fn into_verification(self, tx_hash: &str, gateway: &str) -> VerificationResult {
        let addr = |a: Option<Address>| a.map(|a| a.to_string());
        match self {
            Self::Missing => VerificationResult::missing(tx_hash),
            Self::Foreign => VerificationResult::not_found(tx_hash, FOREIGN_CONTRACT_MESSAGE),
            Self::Photo {
                token_id,
                owner,
                cid,
                metadata_uri,
            } => VerificationResult {
                token_id: Some(token_id),
                owner: Some(owner.to_string()),
                content_id: Some(cid),
                metadata_uri: Some(metadata_location(gateway, metadata_uri)),
                ..VerificationResult::found(tx_hash, MediaType::Photo)
            },
            Self::VideoChunk {
                session_id,
                sequence_number,
                cid,
                metadata_cid,
                owner,
            } => VerificationResult {
                session_id: Some(session_id),
                sequence_number: Some(sequence_number),
                content_id: Some(cid),
                metadata_uri: Some(gateway_url(gateway, &metadata_cid)),
                owner: addr(owner),
                ..VerificationResult::found(tx_hash, MediaType::VideoChunk)
            },
            Self::VideoSession {
                session_id,
                owner,
                ended,
            } => VerificationResult {
                session_id: Some(session_id),
                owner: addr(owner),
                message: ended.then(|| "Video session ended".to_string()),
                ..VerificationResult::found(tx_hash, MediaType::VideoSession)
            },
            Self::ContractInteraction { function, owner } => VerificationResult {
                function_name: Some(function.to_string()),
                owner: addr(owner),
                message: Some(format!("Transaction calls {function} function")),
                ..VerificationResult::found(tx_hash, MediaType::ContractInteraction)
            },
            Self::Unknown { owner } => VerificationResult {
                owner: addr(owner),
                message: Some(UNDETERMINED_MESSAGE.to_string()),
                ..VerificationResult::found(tx_hash, MediaType::Unknown)
            },
        }
    }
}

/// Rewrite an `ipfs://` URI onto the gateway; anything else is kept as
/// recorded on chain.
fn metadata_location(gateway: &str, uri: String) -> String {
    match uri.strip_prefix("ipfs://") {
        Some(cid) => gateway_url(gateway, cid),
        None => uri,
    }
}

#[derive(Clone)]
pub struct TransactionResolver {
    client: Arc<dyn ChainClient>,
    inventory: Inventory,
    gateway: String,
}

impl TransactionResolver {
    pub fn new(
        client: Arc<dyn ChainClient>,
        policy: ScanPolicy,
        gateway: impl Into<String>,
    ) -> Self {
        let inventory = Inventory::new(Arc::clone(&client), policy);
        Self {
            client,
            inventory,
            gateway: gateway.into(),
        }
    }

    /// Resolve and normalize in one step.
    pub async fn verify(&self, tx_hash: &str) -> Result<VerificationResult, ChainError> {
        let resolution = self.resolve(tx_hash).await?;
        tracing::info!(
            tx_hash,
            exists = resolution.exists(),
            media_type = ?resolution.media_type(),
            "Resolved transaction"
        );
        Ok(resolution.into_verification(tx_hash, &self.gateway))
    }

    /// Classify a transaction.
    ///
    /// Errors only when the receipt itself cannot be fetched; a malformed
    /// hash is simply [`Resolution::Missing`].
    pub async fn resolve(&self, tx_hash: &str) -> Result<Resolution, ChainError> {
        let Ok(hash) = parse_tx_hash(tx_hash) else {
            tracing::debug!(tx_hash, "Malformed transaction hash");
            return Ok(Resolution::Missing);
        };

        let Some(receipt) = self.client.receipt(hash).await? else {
            tracing::debug!(tx_hash, "No receipt for transaction");
            return Ok(Resolution::Missing);
        };

        let contract = self.client.contract_address();
        if receipt.to != Some(contract) {
            tracing::debug!(tx_hash, to = ?receipt.to, "Transaction is for another contract");
            return Ok(Resolution::Foreign);
        }

        // The body is optional: it only supplies the selector fallback.
        let transaction = match self.client.transaction(hash).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(tx_hash, error = %e, "Could not fetch transaction body");
                None
            }
        };
        let sender = transaction.as_ref().map(|tx| tx.from).or(Some(receipt.from));

        let logs: Vec<&ChainLog> = receipt
            .logs
            .iter()
            .filter(|log| log.address == contract)
            .collect();

        match self.from_logs(&logs, sender).await {
            Ok(Some(resolution)) => return Ok(resolution),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(tx_hash, error = %e, "Contract event carries an out-of-range id");
                return Ok(Resolution::Unknown { owner: sender });
            }
        }

        Ok(match transaction {
            Some(tx) if tx.input.len() >= 4 => Resolution::ContractInteraction {
                function: selectors::function_name(&tx.input).unwrap_or("unknown"),
                owner: sender,
            },
            _ => Resolution::Unknown { owner: sender },
        })
    }

    /// Classify by the first known contract event, if any.
    async fn from_logs(
        &self,
        logs: &[&ChainLog],
        sender: Option<Address>,
    ) -> Result<Option<Resolution>, ChainError> {
        if let Some(event) = first_decoded::<PhotoMinted>(logs) {
            return Ok(Some(Resolution::Photo {
                token_id: to_chain_id(event.tokenId)?,
                owner: event.owner,
                cid: event.ipfsCID,
                metadata_uri: event.metadataURI,
            }));
        }

        if let Some(event) = first_decoded::<VideoChunkAdded>(logs) {
            let session_id = to_chain_id(event.sessionId)?;
            let sequence_number = to_chain_id(event.sequenceNumber)?;
            let owner = self.session_owner_or(session_id, sender).await;
            return Ok(Some(Resolution::VideoChunk {
                session_id,
                sequence_number,
                cid: event.videoCID,
                metadata_cid: event.metadataCID,
                owner,
            }));
        }

        if let Some(event) = first_decoded::<VideoSessionStarted>(logs) {
            return Ok(Some(Resolution::VideoSession {
                session_id: to_chain_id(event.sessionId)?,
                owner: Some(event.owner),
                ended: false,
            }));
        }

        if let Some(event) = first_decoded::<VideoSessionEnded>(logs) {
            let session_id = to_chain_id(event.sessionId)?;
            let owner = self.session_owner_or(session_id, sender).await;
            return Ok(Some(Resolution::VideoSession {
                session_id,
                owner,
                ended: true,
            }));
        }

        Ok(None)
    }

    async fn session_owner_or(
        &self,
        session_id: ChainId,
        fallback: Option<Address>,
    ) -> Option<Address> {
        match self.inventory.session_owner(session_id).await {
            Some(owner) => Some(owner),
            None => {
                tracing::info!(session_id, "Session owner not found, using transaction sender");
                fallback
            }
        }
    }
}

/// First log of type `E` that decodes cleanly.
fn first_decoded<E: alloy::sol_types::SolEvent>(logs: &[&ChainLog]) -> Option<E> {
    logs.iter().find_map(|log| match log.decode::<E>()? {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring undecodable log");
            None
        }
    })
}
