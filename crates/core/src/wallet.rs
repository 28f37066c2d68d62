//! Wallet connection context.
//!
//! The connection lifecycle is an explicit state machine:
//!
//! ```text
//! Disconnected --begin_connect--> Connecting --connected--> Connected
//!      ^                              |                        |
//!      +-----------failed-------------+                        |
//!      +-------------------------disconnect--------------------+
//! ```
//!
//! The current state is published on a `tokio::sync::watch` channel so
//! long-running consumers (the dashcam coordinator) always read the latest
//! owner without holding a lock across awaits.

use serde::Serialize;
use tokio::sync::watch;

use crate::address::{validate_address, PLACEHOLDER_ADDRESS};
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WalletState {
    Disconnected,
    Connecting,
    Connected { address: String },
}

impl WalletState {
    /// Connected address, if any.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Connected { address } => Some(address),
            _ => None,
        }
    }

    /// Owner to attribute new media to; the placeholder when not connected.
    pub fn owner(&self) -> &str {
        self.address().unwrap_or(PLACEHOLDER_ADDRESS)
    }
}

/// Owner of the wallet state machine.
pub struct WalletContext {
    state: watch::Sender<WalletState>,
}

impl WalletContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(WalletState::Disconnected);
        Self { state }
    }

    pub fn state(&self) -> WalletState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state.subscribe()
    }

    /// `Disconnected -> Connecting`.
    pub fn begin_connect(&self) -> Result<(), CoreError> {
        self.transition("begin_connect", |s| match s {
            WalletState::Disconnected => Some(WalletState::Connecting),
            _ => None,
        })
    }

    /// `Connecting -> Connected`. The address must be well formed.
    pub fn connected(&self, address: &str) -> Result<(), CoreError> {
        validate_address(address)?;
        self.transition("connected", |s| match s {
            WalletState::Connecting => Some(WalletState::Connected {
                address: address.to_string(),
            }),
            _ => None,
        })
    }

    /// `Connecting -> Disconnected` after a rejected or failed request.
    pub fn failed(&self) -> Result<(), CoreError> {
        self.transition("failed", |s| match s {
            WalletState::Connecting => Some(WalletState::Disconnected),
            _ => None,
        })
    }

    /// `Connected -> Disconnected`. Disconnecting while already
    /// disconnected is a no-op.
    pub fn disconnect(&self) {
        self.state.send_if_modified(|s| {
            if *s == WalletState::Disconnected {
                return false;
            }
            tracing::info!(from = ?s, "Wallet disconnected");
            *s = WalletState::Disconnected;
            true
        });
    }

    /// The provider switched accounts while connected.
    pub fn account_changed(&self, address: &str) -> Result<(), CoreError> {
        validate_address(address)?;
        self.transition("account_changed", |s| match s {
            WalletState::Connected { .. } => Some(WalletState::Connected {
                address: address.to_string(),
            }),
            _ => None,
        })
    }

    fn transition(
        &self,
        name: &str,
        next: impl FnOnce(&WalletState) -> Option<WalletState>,
    ) -> Result<(), CoreError> {
        let mut result = Ok(());
        self.state.send_if_modified(|s| match next(s) {
            Some(state) => {
                tracing::debug!(from = ?s, to = ?state, "Wallet {name}");
                *s = state;
                true
            }
            None => {
                result = Err(CoreError::Conflict(format!(
                    "Cannot {name} while wallet is {s:?}"
                )));
                false
            }
        });
        result
    }
}

impl Default for WalletContext {
    fn default() -> Self {
        Self::new()
    }
}
