//! Progressive block-range log scanner.
//!
//! Many RPC providers refuse `eth_getLogs` over large block spans. The
//! scanner always covers the same span (the last [`ScanPolicy::lookback`]
//! blocks ending at the head) but pages over it with a window that shrinks
//! by [`ScanPolicy::shrink_factor`] each time the provider rejects a page.
//! Once the window would drop below [`ScanPolicy::min_window`] the scan
//! gives up with [`ScanOutcome::Unavailable`], which callers present as
//! "nothing found" rather than an error.
//!
//! Because the span never changes, a scan that needed a fallback window
//! returns exactly the logs a single full-span query would have returned.

use alloy::primitives::B256;

use crate::client::{ChainClient, ChainLog, LogQuery};

/// Limits for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPolicy {
    /// How many blocks back from the head to cover.
    pub lookback: u64,
    /// First page size tried.
    pub initial_window: u64,
    /// Smallest page size worth trying.
    pub min_window: u64,
    /// Divisor applied to the window after a rejected page.
    pub shrink_factor: u64,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            lookback: 1000,
            initial_window: 1000,
            min_window: 10,
            shrink_factor: 10,
        }
    }
}

/// Result of a scan.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Complete {
        logs: Vec<ChainLog>,
        from_block: u64,
        to_block: u64,
        /// Page size that finally succeeded.
        window: u64,
    },
    Unavailable {
        reason: String,
    },
}

impl ScanOutcome {
    /// Logs found, empty when the scan was unavailable.
    pub fn into_logs(self) -> Vec<ChainLog> {
        match self {
            Self::Complete { logs, .. } => logs,
            Self::Unavailable { .. } => Vec::new(),
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Complete { .. } => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

/// Which logs to look for.
#[derive(Debug, Clone, Copy)]
pub struct ScanFilter {
    pub event: B256,
    pub topic1: Option<B256>,
    pub topic2: Option<B256>,
}

impl ScanFilter {
    pub fn event(event: B256) -> Self {
        Self {
            event,
            topic1: None,
            topic2: None,
        }
    }

    pub fn topic1(mut self, topic: B256) -> Self {
        self.topic1 = Some(topic);
        self
    }

    pub fn topic2(mut self, topic: B256) -> Self {
        self.topic2 = Some(topic);
        self
    }
}

pub struct BlockRangeScanner<'a> {
    client: &'a dyn ChainClient,
    policy: ScanPolicy,
}

impl<'a> BlockRangeScanner<'a> {
    pub fn new(client: &'a dyn ChainClient, policy: ScanPolicy) -> Self {
        Self { client, policy }
    }

    /// Scan the lookback span for logs matching `filter`.
    ///
    /// Pages are requested sequentially. A rejected page is retried with a
    /// smaller window; pages already fetched are kept.
    pub async fn scan(&self, filter: ScanFilter) -> ScanOutcome {
        let head = match self.client.block_number().await {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read chain head for log scan");
                return ScanOutcome::Unavailable {
                    reason: format!("chain head unavailable: {e}"),
                };
            }
        };

        let from_block = head.saturating_sub(self.policy.lookback);
        let shrink = self.policy.shrink_factor.max(2);
        let min_window = self.policy.min_window.max(1);
        let mut window = self.policy.initial_window.max(min_window);
        let mut cursor = from_block;
        let mut logs = Vec::new();

        while cursor <= head {
            let query = LogQuery {
                event: filter.event,
                topic1: filter.topic1,
                topic2: filter.topic2,
                from_block: cursor,
                to_block: cursor.saturating_add(window - 1).min(head),
            };

            match self.client.logs(&query).await {
                Ok(mut page) => {
                    logs.append(&mut page);
                    match query.to_block.checked_add(1) {
                        Some(next) => cursor = next,
                        None => break,
                    }
                }
                Err(e) => {
                    let next = window / shrink;
                    if next < min_window {
                        tracing::warn!(
                            error = %e,
                            window,
                            from_block = query.from_block,
                            "Log scan exhausted all window sizes"
                        );
                        return ScanOutcome::Unavailable {
                            reason: format!(
                                "provider rejected blocks {}..={} even at window {window}: {e}",
                                query.from_block, query.to_block
                            ),
                        };
                    }
                    tracing::info!(
                        error = %e,
                        range_limit = e.is_range_limit(),
                        window,
                        next_window = next,
                        "Log query rejected, retrying with a smaller window"
                    );
                    window = next;
                }
            }
        }

        tracing::debug!(
            from_block,
            to_block = head,
            window,
            found = logs.len(),
            "Log scan complete"
        );
        ScanOutcome::Complete {
            logs,
            from_block,
            to_block: head,
            window,
        }
    }
}
