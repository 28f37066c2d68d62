//! Distributed verification network for BlockSnap nodes.
//!
//! - [`MediaRegistry`] is the node's JSON-persisted record of known media,
//!   keyed by transaction hash.
//! - [`PeerTable`] and [`DiscoveryClient`] track other nodes through the
//!   discovery service.
//! - [`DistributedNode`] ties them together: it registers and broadcasts
//!   media, answers verification across the network and runs the discovery
//!   and heartbeat loop.
//! - [`RegistrationListener`] registers media events published on the
//!   [`EventBus`](blocksnap_events::EventBus).

pub mod config;
pub mod discovery;
pub mod error;
pub mod json_store;
pub mod listener;
pub mod node;
pub mod peers;
pub mod registry;

pub use config::NodeConfig;
pub use discovery::DiscoveryClient;
pub use error::NodeError;
pub use listener::RegistrationListener;
pub use node::{DistributedNode, NetworkVerification, TransactionVerifier};
pub use peers::{Capabilities, Peer, PeerTable};
pub use registry::{MediaEntry, MediaRegistry};
