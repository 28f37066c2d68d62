use std::time::Duration;

/// Pinata API credentials.
#[derive(Debug, Clone)]
pub struct PinataCredentials {
    pub api_key: String,
    pub secret_key: String,
}

/// IPFS storage configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct IpfsConfig {
    /// Base URL of the local node's HTTP API.
    pub api_url: String,
    /// Base URL of the gateway used to build public links.
    pub gateway_url: String,
    /// Set when uploads go through Pinata instead of the local node.
    pub pinata: Option<PinataCredentials>,
    /// Connection probe attempts at startup.
    pub max_retries: u32,
    /// Base delay of the startup probe backoff.
    pub retry_delay: Duration,
}

impl IpfsConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env var             | Default                  |
    /// |---------------------|--------------------------|
    /// | `IPFS_HOST`         | `http://127.0.0.1:5001`  |
    /// | `IPFS_GATEWAY`      | `http://127.0.0.1:8080`  |
    /// | `USE_PINATA`        | `false`                  |
    /// | `PINATA_API_KEY`    | (none)                   |
    /// | `PINATA_SECRET_KEY` | (none)                   |
    /// | `MAX_RETRIES`       | `5`                      |
    /// | `RETRY_DELAY`       | `2` (seconds)            |
    ///
    /// Pinata is only enabled when `USE_PINATA=true` and both keys are set.
    pub fn from_env() -> Self {
        let api_url = std::env::var("IPFS_HOST").unwrap_or_else(|_| "http://127.0.0.1:5001".into());
        let gateway_url =
            std::env::var("IPFS_GATEWAY").unwrap_or_else(|_| "http://127.0.0.1:8080".into());

        let use_pinata = std::env::var("USE_PINATA")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let pinata = if use_pinata {
            match (
                std::env::var("PINATA_API_KEY"),
                std::env::var("PINATA_SECRET_KEY"),
            ) {
                (Ok(api_key), Ok(secret_key)) => Some(PinataCredentials {
                    api_key,
                    secret_key,
                }),
                _ => {
                    tracing::warn!("USE_PINATA is set but Pinata keys are missing, using local node");
                    None
                }
            }
        } else {
            None
        };

        let max_retries: u32 = std::env::var("MAX_RETRIES")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("MAX_RETRIES must be a valid u32");

        let retry_delay_secs: u64 = std::env::var("RETRY_DELAY")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("RETRY_DELAY must be a valid u64");

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            pinata,
            max_retries,
            retry_delay: Duration::from_secs(retry_delay_secs),
        }
    }

    /// Local-node configuration with default retry settings.
    pub fn local(api_url: impl Into<String>, gateway_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            gateway_url: gateway_url.into(),
            pinata: None,
            max_retries: 5,
            retry_delay: Duration::from_secs(2),
        }
    }
}
