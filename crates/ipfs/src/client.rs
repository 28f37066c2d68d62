//! HTTP client for an IPFS node's RPC API and the Pinata pinning service.
//!
//! Uploads go to the local node (`/api/v0/add` followed by `/api/v0/pin/add`)
//! unless Pinata credentials are configured, in which case they go to
//! `pinFileToIPFS`. Reads try the local node first and fall back to public
//! gateways.

use std::time::Duration;

use async_trait::async_trait;
use blocksnap_core::metadata::extract_cid;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::backoff::{self, BackoffConfig};
use crate::config::{IpfsConfig, PinataCredentials};
use crate::error::IpfsError;
use crate::gateway;

/// Default Pinata API base URL.
pub const PINATA_API_URL: &str = "https://api.pinata.cloud";

/// Timeout for node and Pinata requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single gateway fetch.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// ContentStore
// ---------------------------------------------------------------------------

/// Content-addressed storage used by the server.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload and pin raw bytes, returning the CID.
    async fn add_bytes(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, IpfsError>;

    /// Upload and pin a JSON document, returning the CID.
    async fn add_json(&self, value: &serde_json::Value, filename: &str)
        -> Result<String, IpfsError>;

    /// CID the bytes would get, without storing them.
    async fn calculate_cid(&self, data: Vec<u8>, filename: &str) -> Result<String, IpfsError>;

    /// Whether the node can serve the CID.
    async fn exists(&self, cid: &str) -> bool;

    /// Fetch a JSON document by CID, `ipfs://` URI or gateway URL.
    async fn get_json(&self, uri: &str) -> Result<serde_json::Value, IpfsError>;

    /// Fetch raw content, trying the node and then every gateway.
    async fn fetch_content(&self, cid: &str) -> Result<Vec<u8>, IpfsError>;

    /// Node version; doubles as a reachability probe.
    async fn version(&self) -> Result<String, IpfsError>;

    /// Public gateway URL for a CID.
    fn gateway_url(&self, cid: &str) -> String;
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct PinataPinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(rename = "Version")]
    version: String,
}

// ---------------------------------------------------------------------------
// IpfsClient
// ---------------------------------------------------------------------------

/// [`ContentStore`] backed by an IPFS node and, optionally, Pinata.
pub struct IpfsClient {
    client: reqwest::Client,
    config: IpfsConfig,
    pinata_url: String,
}

impl IpfsClient {
    pub fn new(config: IpfsConfig) -> Result<Self, IpfsError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Build a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: IpfsConfig) -> Self {
        Self {
            client,
            config,
            pinata_url: PINATA_API_URL.to_string(),
        }
    }

    /// Point Pinata calls at a different base URL.
    pub fn with_pinata_url(mut self, url: impl Into<String>) -> Self {
        self.pinata_url = url.into();
        self
    }

    pub fn config(&self) -> &IpfsConfig {
        &self.config
    }

    /// Probe the node with exponential backoff until it answers, the
    /// configured attempts run out, or `cancel` fires (`None`).
    pub async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
    ) -> Option<Result<String, IpfsError>> {
        tracing::info!(api_url = %self.config.api_url, "Connecting to IPFS node");
        let config = BackoffConfig::starting_at(self.config.retry_delay);
        let result =
            backoff::retry("ipfs-version", self.config.max_retries, &config, cancel, || {
                self.version()
            })
            .await;
        if let Some(Ok(version)) = &result {
            tracing::info!(%version, "Connected to IPFS node");
        }
        result
    }

    /// Pin an existing CID on the active backend.
    pub async fn pin(&self, cid: &str) -> Result<(), IpfsError> {
        match &self.config.pinata {
            Some(creds) => self.pinata_pin_by_hash(creds, cid).await,
            None => {
                let response = self
                    .client
                    .post(self.api("pin/add"))
                    .query(&[("arg", cid)])
                    .send()
                    .await?;
                Self::check_status(response).await?;
                tracing::debug!(cid, "Pinned CID");
                Ok(())
            }
        }
    }

    // ---- private helpers ----

    fn api(&self, path: &str) -> String {
        format!("{}/api/v0/{path}", self.config.api_url)
    }

    fn file_form(data: Vec<u8>, filename: &str, content_type: &str) -> Result<Form, IpfsError> {
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        Ok(Form::new().part("file", part))
    }

    async fn node_add(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
        only_hash: bool,
    ) -> Result<String, IpfsError> {
        let form = Self::file_form(data, filename, content_type)?;
        let mut request = self.client.post(self.api("add")).multipart(form);
        if only_hash {
            request = request.query(&[("only-hash", "true")]);
        }
        let added: AddResponse = Self::parse_response(request.send().await?).await?;
        non_empty(added.hash)
    }

    async fn pinata_add(
        &self,
        creds: &PinataCredentials,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, IpfsError> {
        let form = Self::file_form(data, filename, content_type)?;
        let response = self
            .client
            .post(format!("{}/pinning/pinFileToIPFS", self.pinata_url))
            .header("pinata_api_key", &creds.api_key)
            .header("pinata_secret_api_key", &creds.secret_key)
            .multipart(form)
            .send()
            .await?;
        let pinned: PinataPinResponse = Self::parse_response(response).await?;
        non_empty(pinned.ipfs_hash)
    }

    async fn pinata_pin_by_hash(
        &self,
        creds: &PinataCredentials,
        cid: &str,
    ) -> Result<(), IpfsError> {
        let response = self
            .client
            .post(format!("{}/pinning/pinByHash", self.pinata_url))
            .header("pinata_api_key", &creds.api_key)
            .header("pinata_secret_api_key", &creds.secret_key)
            .json(&serde_json::json!({ "hashToPin": cid }))
            .send()
            .await?;
        Self::check_status(response).await?;
        tracing::debug!(cid, "Pinned CID on Pinata");
        Ok(())
    }

    async fn node_cat(&self, cid: &str, length: Option<u64>) -> Result<Vec<u8>, IpfsError> {
        let mut request = self.client.post(self.api("cat")).query(&[("arg", cid)]);
        if let Some(length) = length {
            request = request.query(&[("length", length)]);
        }
        let response = Self::ensure_success(request.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn gateway_get(&self, gateway: &str, cid: &str) -> Result<Vec<u8>, IpfsError> {
        let response = self
            .client
            .get(gateway::gateway_url(gateway, cid))
            .timeout(GATEWAY_TIMEOUT)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`IpfsError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, IpfsError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(IpfsError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, IpfsError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), IpfsError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

fn non_empty(cid: String) -> Result<String, IpfsError> {
    if cid.is_empty() {
        Err(IpfsError::UnexpectedResponse("empty CID in response".into()))
    } else {
        Ok(cid)
    }
}

#[async_trait]
impl ContentStore for IpfsClient {
    async fn add_bytes(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, IpfsError> {
        let size = data.len();
        let cid = match &self.config.pinata {
            Some(creds) => self.pinata_add(creds, data, filename, content_type).await?,
            None => {
                let cid = self.node_add(data, filename, content_type, false).await?;
                self.pin(&cid).await?;
                cid
            }
        };
        tracing::info!(%cid, filename, size, "Stored content on IPFS");
        Ok(cid)
    }

    async fn add_json(
        &self,
        value: &serde_json::Value,
        filename: &str,
    ) -> Result<String, IpfsError> {
        let body = serde_json::to_vec(value)?;
        self.add_bytes(body, filename, "application/json").await
    }

    async fn calculate_cid(&self, data: Vec<u8>, filename: &str) -> Result<String, IpfsError> {
        let cid = self
            .node_add(data, filename, "application/octet-stream", true)
            .await?;
        tracing::debug!(%cid, filename, "Calculated CID");
        Ok(cid)
    }

    async fn exists(&self, cid: &str) -> bool {
        match self.node_cat(cid, Some(1)).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(cid, error = %e, "Content not available on node");
                false
            }
        }
    }

    async fn get_json(&self, uri: &str) -> Result<serde_json::Value, IpfsError> {
        let cid = extract_cid(uri);
        if cid.is_empty() {
            return Err(IpfsError::NotFound(uri.to_string()));
        }
        let response = self
            .client
            .get(self.gateway_url(cid))
            .timeout(GATEWAY_TIMEOUT)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn fetch_content(&self, cid: &str) -> Result<Vec<u8>, IpfsError> {
        match self.node_cat(cid, None).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => tracing::warn!(cid, error = %e, "Local node could not serve content"),
        }

        for gw in gateway::gateway_chain(&self.config.gateway_url) {
            match self.gateway_get(&gw, cid).await {
                Ok(bytes) => {
                    tracing::info!(cid, gateway = %gw, "Retrieved content from gateway");
                    return Ok(bytes);
                }
                Err(e) => tracing::debug!(cid, gateway = %gw, error = %e, "Gateway fetch failed"),
            }
        }

        tracing::error!(cid, "Content unavailable from every source");
        Err(IpfsError::NotFound(cid.to_string()))
    }

    async fn version(&self) -> Result<String, IpfsError> {
        let response = self.client.post(self.api("version")).send().await?;
        let version: VersionResponse = Self::parse_response(response).await?;
        Ok(version.version)
    }

    fn gateway_url(&self, cid: &str) -> String {
        gateway::gateway_url(&self.config.gateway_url, cid)
    }
}
