//! IPFS storage for BlockSnap.
//!
//! - [`ContentStore`] is the seam the server talks to: pin bytes and JSON,
//!   calculate CIDs, check existence, and fetch content back.
//! - [`IpfsClient`] implements it against a local node's HTTP API, with
//!   optional Pinata pinning.
//! - [`backoff`] holds the exponential-backoff used to probe the node at
//!   startup.

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;

pub use client::{ContentStore, IpfsClient};
pub use config::IpfsConfig;
pub use error::IpfsError;
