//! Function selector table for classifying raw contract calls.

use alloy::sol_types::SolCall;

use crate::abi::BlockSnapNFT;

/// Known state-changing entry points, keyed by 4-byte selector.
const KNOWN_FUNCTIONS: [([u8; 4], &str); 4] = [
    (BlockSnapNFT::mintPhotoCall::SELECTOR, BlockSnapNFT::mintPhotoCall::SIGNATURE),
    (
        BlockSnapNFT::addVideoChunkCall::SELECTOR,
        BlockSnapNFT::addVideoChunkCall::SIGNATURE,
    ),
    (
        BlockSnapNFT::startVideoSessionCall::SELECTOR,
        BlockSnapNFT::startVideoSessionCall::SIGNATURE,
    ),
    (
        BlockSnapNFT::endVideoSessionCall::SELECTOR,
        BlockSnapNFT::endVideoSessionCall::SIGNATURE,
    ),
];

/// Name of the contract function `input` calls, if it is a known one.
pub fn function_name(input: &[u8]) -> Option<&'static str> {
    let selector: [u8; 4] = input.get(..4)?.try_into().ok()?;
    KNOWN_FUNCTIONS
        .iter()
        .find(|(known, _)| *known == selector)
        .map(|(_, signature)| signature.split('(').next().unwrap_or(signature))
}
