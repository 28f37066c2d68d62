//! BlockSnap NFT contract bindings.

use alloy::sol;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract BlockSnapNFT {
        struct VideoChunk {
            uint256 sessionId;
            uint256 sequenceNumber;
            string videoCID;
            string metadataCID;
            uint256 timestamp;
        }

        event PhotoMinted(uint256 indexed tokenId, address indexed owner, string ipfsCID, string metadataURI);
        event VideoSessionStarted(uint256 indexed sessionId, address indexed owner);
        event VideoChunkAdded(uint256 indexed sessionId, uint256 sequenceNumber, string videoCID, string metadataCID, uint256 timestamp);
        event VideoSessionEnded(uint256 indexed sessionId);

        function mintPhoto(address to, string memory imageCID, string memory metadataURI) external returns (uint256);
        function startVideoSession(address owner) external returns (uint256);
        function addVideoChunk(uint256 sessionId, uint256 sequenceNumber, string memory videoCID, string memory metadataCID, uint256 timestamp) external;
        function endVideoSession(uint256 sessionId) external;

        function verifyPhoto(string memory imageCID) external view returns (bool exists, address owner);
        function tokenURI(uint256 tokenId) external view returns (string memory);
        function getImageCID(uint256 tokenId) external view returns (string memory);
        function ownerOf(uint256 tokenId) external view returns (address);
        function getSessionChunks(uint256 sessionId) external view returns (VideoChunk[] memory);
        function isSessionActive(uint256 sessionId) external view returns (bool);
    }
}

pub use BlockSnapNFT::{PhotoMinted, VideoChunkAdded, VideoSessionEnded, VideoSessionStarted};
