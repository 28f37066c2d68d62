//! Gateway URL helpers.

/// Public gateways tried after the configured one when fetching content.
pub const FALLBACK_GATEWAYS: &[&str] = &[
    "https://ipfs.io",
    "https://gateway.pinata.cloud",
    "https://cloudflare-ipfs.com",
    "https://ipfs.infura.io",
];

/// `{gateway}/ipfs/{cid}`, or an empty string for an empty CID.
pub fn gateway_url(gateway: &str, cid: &str) -> String {
    if cid.is_empty() {
        return String::new();
    }
    let base = gateway.trim_end_matches('/');
    let base = base.strip_suffix("/ipfs").unwrap_or(base);
    format!("{base}/ipfs/{cid}")
}

/// Configured gateway followed by the public fallbacks, without duplicates.
pub fn gateway_chain(configured: &str) -> Vec<String> {
    let mut gateways = vec![configured.trim_end_matches('/').to_string()];
    for gw in FALLBACK_GATEWAYS {
        if !gateways.iter().any(|g| g == gw) {
            gateways.push((*gw).to_string());
        }
    }
    gateways
}
