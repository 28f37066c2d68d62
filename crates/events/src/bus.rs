//! Media events and the broadcast channel that carries them.
//!
//! [`EventBus`] is the publish/subscribe hub for [`MediaEvent`]s. It is
//! shared via `Arc<EventBus>` between the request handlers that publish and
//! the background listeners that consume.

use blocksnap_core::media::MediaType;
use blocksnap_core::types::{ChainId, Timestamp};
use blocksnap_core::verification::VerificationResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// MediaEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEventKind {
    PhotoMinted,
    SessionStarted,
    ChunkRecorded,
    TransactionVerified,
}

/// Something that happened to a piece of media on chain.
///
/// Constructed via [`MediaEvent::new`] and enriched with the builder
/// methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaEvent {
    pub kind: MediaEventKind,

    /// Transaction that recorded the media.
    pub tx_hash: String,

    pub media_type: MediaType,

    /// Owner address, checksummed or lowercase as received.
    pub owner: Option<String>,

    /// Image or video CID.
    pub content_id: Option<String>,

    pub token_id: Option<ChainId>,

    pub session_id: Option<ChainId>,

    pub sequence_number: Option<ChainId>,

    pub metadata_uri: Option<String>,

    /// When the event was created (UTC).
    pub timestamp: Timestamp,
}

impl MediaEvent {
    /// Create an event with only the required fields.
    pub fn new(kind: MediaEventKind, tx_hash: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            kind,
            tx_hash: tx_hash.into(),
            media_type,
            owner: None,
            content_id: None,
            token_id: None,
            session_id: None,
            sequence_number: None,
            metadata_uri: None,
            timestamp: Utc::now(),
        }
    }

    /// Event for a verified transaction, carrying what the resolver found.
    pub fn verified(result: &VerificationResult) -> Self {
        Self {
            owner: result.owner.clone(),
            content_id: result.content_id.clone(),
            token_id: result.token_id,
            session_id: result.session_id,
            sequence_number: result.sequence_number,
            metadata_uri: result.metadata_uri.clone(),
            ..Self::new(
                MediaEventKind::TransactionVerified,
                result.tx_hash.clone(),
                result.media_type.unwrap_or(MediaType::Unknown),
            )
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_content(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    pub fn with_token(mut self, token_id: Option<ChainId>) -> Self {
        self.token_id = token_id;
        self
    }

    /// Attach the session, and the chunk position when there is one.
    pub fn with_session(mut self, session_id: ChainId, sequence_number: Option<ChainId>) -> Self {
        self.session_id = Some(session_id);
        self.sequence_number = sequence_number;
        self
    }

    pub fn with_metadata_uri(mut self, uri: impl Into<String>) -> Self {
        self.metadata_uri = Some(uri.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Events buffered per receiver before the slowest one starts lagging.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of [`MediaEvent`]s from handlers to background listeners.
///
/// Every subscriber sees every event published after it subscribed.
///
/// # Usage
///
/// ```rust
/// use blocksnap_core::media::MediaType;
/// use blocksnap_events::bus::{EventBus, MediaEvent, MediaEventKind};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(MediaEvent::new(MediaEventKind::PhotoMinted, "0xabc", MediaType::Photo));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<MediaEvent>,
}

impl EventBus {
    /// A receiver that falls `capacity` events behind loses the oldest ones
    /// and gets `RecvError::Lagged` on its next `recv`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send to every current subscriber; dropped when there are none.
    pub fn publish(&self, event: MediaEvent) {
        tracing::debug!(kind = ?event.kind, tx_hash = %event.tx_hash, "Publishing media event");
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
