use blocksnap_core::address::is_valid_address;

use crate::error::ChainError;
use crate::scanner::ScanPolicy;

/// Chain access configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the node.
    pub rpc_url: String,
    /// Deployed BlockSnap NFT contract.
    pub contract_address: String,
    /// Signing key for mint and session transactions. Read-only when unset.
    pub private_key: Option<String>,
    /// Block-range scanning limits.
    pub scan: ScanPolicy,
}

impl ChainConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                   |
    /// |------------------------|---------------------------|
    /// | `ETH_RPC_URL`          | `http://127.0.0.1:8545`   |
    /// | `CONTRACT_ADDRESS`     | (empty, fails validation) |
    /// | `PRIVATE_KEY`          | (unset, read-only)        |
    /// | `SCAN_LOOKBACK_BLOCKS` | `1000`                    |
    /// | `SCAN_INITIAL_WINDOW`  | `1000`                    |
    /// | `SCAN_MIN_WINDOW`      | `10`                      |
    pub fn from_env() -> Self {
        let rpc_url =
            std::env::var("ETH_RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".into());
        let contract_address = std::env::var("CONTRACT_ADDRESS").unwrap_or_default();
        let private_key = std::env::var("PRIVATE_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let defaults = ScanPolicy::default();
        let scan = ScanPolicy {
            lookback: env_u64("SCAN_LOOKBACK_BLOCKS", defaults.lookback),
            initial_window: env_u64("SCAN_INITIAL_WINDOW", defaults.initial_window),
            min_window: env_u64("SCAN_MIN_WINDOW", defaults.min_window),
            shrink_factor: defaults.shrink_factor,
        };

        Self {
            rpc_url,
            contract_address,
            private_key,
            scan,
        }
    }

    /// Check addresses, key format and scan limits.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ChainError::Configuration("ETH_RPC_URL is empty".into()));
        }
        if !is_valid_address(&self.contract_address) {
            return Err(ChainError::Configuration(format!(
                "CONTRACT_ADDRESS must be 0x followed by 40 hex digits, got '{}'",
                self.contract_address
            )));
        }
        if let Some(key) = &self.private_key {
            let hex = key.strip_prefix("0x").unwrap_or(key);
            if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ChainError::Configuration(
                    "PRIVATE_KEY must be 64 hex digits".into(),
                ));
            }
        }
        if self.scan.min_window == 0 || self.scan.initial_window < self.scan.min_window {
            return Err(ChainError::Configuration(format!(
                "Scan window {} must be at least the minimum {} (and non-zero)",
                self.scan.initial_window, self.scan.min_window
            )));
        }
        Ok(())
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .map(|v| {
            v.parse()
                .unwrap_or_else(|_| panic!("{name} must be a valid u64"))
        })
        .unwrap_or(default)
}
