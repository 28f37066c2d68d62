//! BlockSnap API server library.
//!
//! Exposes the building blocks of the server (config, state, error
//! handling, caches, routes) so integration tests and the binary entrypoint
//! can both access them, plus the HTTP chunk uploader used by dashcam
//! clients.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
