//! Chain access for BlockSnap.
//!
//! Contract bindings, the [`ChainClient`] / [`ContractWriter`] seams and
//! their alloy implementation, the progressive block-range scanner, the
//! owner inventory and the transaction resolver.

pub mod abi;
pub mod alloy_client;
pub mod client;
pub mod config;
pub mod error;
pub mod inventory;
pub mod resolver;
pub mod scanner;
pub mod selectors;

pub use client::{ChainClient, ContractWriter};
pub use error::ChainError;
