//! BlockSnap media event bus.
//!
//! - [`EventBus`] is the in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`MediaEvent`] is the envelope published whenever a photo is minted,
//!   a dashcam chunk is recorded or a transaction is verified.

pub mod bus;

pub use bus::{EventBus, MediaEvent, MediaEventKind};
