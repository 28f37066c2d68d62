//! Integration tests for transaction resolution.

mod common;

use std::sync::Arc;

use alloy::primitives::U256;
use alloy::sol_types::{SolCall, SolEvent};
use assert_matches::assert_matches;
use blocksnap_chain::abi::{BlockSnapNFT, PhotoMinted};
use blocksnap_chain::resolver::{Resolution, TransactionResolver, FOREIGN_CONTRACT_MESSAGE};
use blocksnap_chain::scanner::ScanPolicy;
use blocksnap_chain::ChainError;
use blocksnap_core::media::MediaType;
use common::{MockChain, ALICE, BOB, CONTRACT, SERVER};

const GATEWAY: &str = "http://127.0.0.1:8080";

fn resolver(chain: MockChain) -> TransactionResolver {
    TransactionResolver::new(Arc::new(chain), ScanPolicy::default(), GATEWAY)
}

// ---------------------------------------------------------------------------
// Test: mint then verify returns the minted CID
// ---------------------------------------------------------------------------

#[tokio::test]
async fn minted_photo_verifies_by_tx_hash() {
    let mut chain = MockChain::new(500);
    let tx = chain.mint(7, ALICE, "QmTest123", 480);

    let result = resolver(chain).verify(&MockChain::hex(tx)).await.unwrap();

    assert!(result.exists_on_blockchain);
    assert_eq!(result.media_type, Some(MediaType::Photo));
    assert_eq!(result.content_id.as_deref(), Some("QmTest123"));
    assert_eq!(result.token_id, Some(7));
    assert_eq!(result.owner, Some(ALICE.to_string()));
    assert_eq!(
        result.metadata_uri.as_deref(),
        Some("http://127.0.0.1:8080/ipfs/meta-QmTest123")
    );
}

#[tokio::test]
async fn gateway_metadata_uri_is_kept_as_minted() {
    let mut chain = MockChain::new(100);
    let event = PhotoMinted {
        tokenId: U256::from(2),
        owner: ALICE,
        ipfsCID: "QmImage".into(),
        metadataURI: "https://ipfs.io/ipfs/QmMeta".into(),
    };
    let tx = chain.push_tx(
        Some(CONTRACT),
        vec![],
        vec![(CONTRACT, event.encode_log_data())],
        60,
    );

    let result = resolver(chain).verify(&MockChain::hex(tx)).await.unwrap();
    assert_eq!(result.metadata_uri.as_deref(), Some("https://ipfs.io/ipfs/QmMeta"));
}

// ---------------------------------------------------------------------------
// Test: unknown and malformed hashes do not exist
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_hash_does_not_exist() {
    let hash = format!("0x{}", "ee".repeat(32));
    let result = resolver(MockChain::new(10)).verify(&hash).await.unwrap();

    assert!(!result.exists_on_blockchain);
    assert_eq!(result.media_type, None);
    assert_eq!(result.owner, None);
}

#[tokio::test]
async fn malformed_hash_is_missing_without_rpc() {
    let mut chain = MockChain::new(10);
    chain.fail_receipts = true;
    let resolution = resolver(chain).resolve("0xnot-a-hash").await.unwrap();
    assert_eq!(resolution, Resolution::Missing);
}

#[tokio::test]
async fn receipt_rpc_failure_propagates() {
    let mut chain = MockChain::new(10);
    chain.fail_receipts = true;
    let hash = format!("0x{}", "ab".repeat(32));
    assert_matches!(
        resolver(chain).resolve(&hash).await,
        Err(ChainError::Rpc(_))
    );
}

// ---------------------------------------------------------------------------
// Test: transactions to other contracts are reported as not found
// ---------------------------------------------------------------------------

#[tokio::test]
async fn foreign_contract_is_not_found() {
    let mut chain = MockChain::new(10);
    let other = alloy::primitives::Address::repeat_byte(0x99);
    let tx = chain.push_tx(Some(other), vec![1, 2, 3, 4], vec![], 5);
    let creation = chain.push_tx(None, vec![], vec![], 6);
    let resolver = resolver(chain);

    let result = resolver.verify(&MockChain::hex(tx)).await.unwrap();
    assert!(!result.exists_on_blockchain);
    assert_eq!(result.message.as_deref(), Some(FOREIGN_CONTRACT_MESSAGE));

    let resolution = resolver.resolve(&MockChain::hex(creation)).await.unwrap();
    assert_eq!(resolution, Resolution::Foreign);
}

// ---------------------------------------------------------------------------
// Test: logs win over the function selector
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logs_are_authoritative_over_selector() {
    let mut chain = MockChain::new(100);
    let event = PhotoMinted {
        tokenId: U256::from(11),
        owner: BOB,
        ipfsCID: "QmFromLog".into(),
        metadataURI: "ipfs://meta-log".into(),
    };
    // Input claims addVideoChunk, the log says a photo was minted.
    let input = BlockSnapNFT::addVideoChunkCall {
        sessionId: U256::from(1),
        sequenceNumber: U256::from(0),
        videoCID: "QmDecoy".into(),
        metadataCID: "QmDecoyMeta".into(),
        timestamp: U256::from(0),
    }
    .abi_encode();
    let tx = chain.push_tx(
        Some(CONTRACT),
        input,
        vec![(CONTRACT, event.encode_log_data())],
        90,
    );

    let resolution = resolver(chain).resolve(&MockChain::hex(tx)).await.unwrap();
    assert_eq!(
        resolution,
        Resolution::Photo {
            token_id: 11,
            owner: BOB,
            cid: "QmFromLog".into(),
            metadata_uri: "ipfs://meta-log".into(),
        }
    );
}

#[tokio::test]
async fn logs_from_other_addresses_are_ignored() {
    let mut chain = MockChain::new(100);
    let event = PhotoMinted {
        tokenId: U256::from(1),
        owner: BOB,
        ipfsCID: "QmSpoofed".into(),
        metadataURI: String::new(),
    };
    let spoofer = alloy::primitives::Address::repeat_byte(0x66);
    let tx = chain.push_tx(
        Some(CONTRACT),
        vec![],
        vec![(spoofer, event.encode_log_data())],
        50,
    );

    let resolution = resolver(chain).resolve(&MockChain::hex(tx)).await.unwrap();
    assert_eq!(resolution, Resolution::Unknown { owner: Some(SERVER) });
}

// ---------------------------------------------------------------------------
// Test: video chunks resolve their owner through the session log
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chunk_owner_comes_from_session_log() {
    let mut chain = MockChain::new(2_000).with_max_range(100);
    chain.start_session(3, ALICE, 1_950);
    let tx = chain.add_chunk(3, 0, "QmChunk0", 1_960);

    let result = resolver(chain).verify(&MockChain::hex(tx)).await.unwrap();

    assert_eq!(result.media_type, Some(MediaType::VideoChunk));
    assert_eq!(result.session_id, Some(3));
    assert_eq!(result.sequence_number, Some(0));
    assert_eq!(result.content_id.as_deref(), Some("QmChunk0"));
    assert_eq!(result.owner, Some(ALICE.to_string()));
    assert_eq!(
        result.metadata_uri.as_deref(),
        Some("http://127.0.0.1:8080/ipfs/QmMeta0")
    );
}

#[tokio::test]
async fn chunk_owner_falls_back_to_sender() {
    let mut chain = MockChain::new(10_000);
    // Session opened long before the lookback span.
    chain.start_session(4, ALICE, 10);
    let tx = chain.add_chunk(4, 1, "QmLate", 9_990);

    let resolution = resolver(chain).resolve(&MockChain::hex(tx)).await.unwrap();
    assert_matches!(
        resolution,
        Resolution::VideoChunk { owner: Some(owner), .. } if owner == SERVER
    );
}

#[tokio::test]
async fn session_start_and_end_classify_as_session() {
    let mut chain = MockChain::new(300);
    let start = chain.start_session(9, BOB, 200);
    let end = chain.end_session(9, 250);
    let resolver = resolver(chain);

    assert_eq!(
        resolver.resolve(&MockChain::hex(start)).await.unwrap(),
        Resolution::VideoSession {
            session_id: 9,
            owner: Some(BOB),
            ended: false
        }
    );
    assert_eq!(
        resolver.resolve(&MockChain::hex(end)).await.unwrap(),
        Resolution::VideoSession {
            session_id: 9,
            owner: Some(BOB),
            ended: true
        }
    );
}

// ---------------------------------------------------------------------------
// Test: selector and unknown fallbacks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn known_selector_without_logs_is_contract_interaction() {
    let mut chain = MockChain::new(100);
    let input = BlockSnapNFT::mintPhotoCall {
        to: ALICE,
        imageCID: "QmReverted".into(),
        metadataURI: String::new(),
    }
    .abi_encode();
    let tx = chain.push_tx(Some(CONTRACT), input, vec![], 40);

    let result = resolver(chain).verify(&MockChain::hex(tx)).await.unwrap();
    assert!(result.exists_on_blockchain);
    assert_eq!(result.media_type, Some(MediaType::ContractInteraction));
    assert_eq!(result.function_name.as_deref(), Some("mintPhoto"));
    assert_eq!(result.owner, Some(SERVER.to_string()));
}

#[tokio::test]
async fn unrecognised_selector_is_unknown_function() {
    let mut chain = MockChain::new(100);
    let tx = chain.push_tx(Some(CONTRACT), vec![0xde, 0xad, 0xbe, 0xef], vec![], 40);

    let resolution = resolver(chain).resolve(&MockChain::hex(tx)).await.unwrap();
    assert_eq!(
        resolution,
        Resolution::ContractInteraction {
            function: "unknown",
            owner: Some(SERVER)
        }
    );
}

#[tokio::test]
async fn empty_input_is_unknown_but_exists() {
    let mut chain = MockChain::new(100);
    let tx = chain.push_tx(Some(CONTRACT), vec![], vec![], 40);

    let result = resolver(chain).verify(&MockChain::hex(tx)).await.unwrap();
    assert!(result.exists_on_blockchain);
    assert_eq!(result.media_type, Some(MediaType::Unknown));
    assert!(result.message.is_some());
}

// ---------------------------------------------------------------------------
// Test: ids beyond u64 degrade to unknown instead of failing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_token_id_resolves_as_unknown() {
    let mut chain = MockChain::new(100);
    let event = PhotoMinted {
        tokenId: U256::MAX,
        owner: ALICE,
        ipfsCID: "QmHuge".into(),
        metadataURI: String::new(),
    };
    let tx = chain.push_tx(
        Some(CONTRACT),
        vec![],
        vec![(CONTRACT, event.encode_log_data())],
        70,
    );

    let result = resolver(chain).verify(&MockChain::hex(tx)).await.unwrap();
    assert!(result.exists_on_blockchain);
    assert_eq!(result.media_type, Some(MediaType::Unknown));
    assert_eq!(result.owner, Some(SERVER.to_string()));
}
