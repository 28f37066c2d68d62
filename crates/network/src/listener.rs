//! Registers media events in the node's registry.
//!
//! [`RegistrationListener`] subscribes to the
//! [`EventBus`](blocksnap_events::EventBus) and registers every media event
//! it receives through [`DistributedNode::register_media`], which also
//! broadcasts to peers. It runs as a long-lived background task and stops
//! when the bus is dropped.

use std::sync::Arc;

use blocksnap_core::media::MediaType;
use blocksnap_events::MediaEvent;
use tokio::sync::broadcast;

use crate::node::DistributedNode;
use crate::registry::MediaEntry;

pub struct RegistrationListener;

impl RegistrationListener {
    /// Run the registration loop until the channel closes.
    pub async fn run(node: Arc<DistributedNode>, mut receiver: broadcast::Receiver<MediaEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::handle(&node, &event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Registration listener lagged, some media was not registered"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, registration listener shutting down");
                    break;
                }
            }
        }
    }

    async fn handle(node: &DistributedNode, event: &MediaEvent) {
        if !is_registrable(event.media_type) {
            tracing::debug!(tx_hash = %event.tx_hash, media_type = %event.media_type, "Not media, skipping");
            return;
        }
        // A verification of media we already know adds nothing.
        if node.registry().contains(&event.tx_hash).await {
            return;
        }
        if let Err(e) = node.register_media(MediaEntry::from_event(event)).await {
            tracing::error!(
                error = %e,
                tx_hash = %event.tx_hash,
                "Failed to register media event"
            );
        }
    }
}

fn is_registrable(media_type: MediaType) -> bool {
    matches!(
        media_type,
        MediaType::Photo | MediaType::Video | MediaType::VideoChunk | MediaType::VideoSession
    )
}
