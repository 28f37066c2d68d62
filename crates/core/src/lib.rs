//! Domain types shared by every BlockSnap crate.
//!
//! Media classification, video sessions and their invariants, verification
//! results, metadata documents, the wallet connection state machine and the
//! dashcam chunk coordinator. Nothing here performs I/O beyond the
//! [`dashcam::ChunkUploader`] seam.

pub mod address;
pub mod dashcam;
pub mod error;
pub mod media;
pub mod metadata;
pub mod session;
pub mod types;
pub mod verification;
pub mod wallet;
