//! Exponential-backoff retry for the IPFS node connection probe.
//!
//! The server probes the node with [`retry`] at startup so a daemon that is
//! still booting does not leave the storage layer marked unreachable.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Backoff starting at `initial_delay` with the default growth.
    pub fn starting_at(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            ..Default::default()
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`BackoffConfig::max_delay`].
pub fn next_delay(current: Duration, config: &BackoffConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Run `op` up to `max_attempts` times, sleeping with exponential backoff
/// between failures.
///
/// Returns the first success, or the last error once attempts are
/// exhausted. Returns `None` if `cancel` fires first.
pub async fn retry<T, E, F, Fut>(
    label: &str,
    max_attempts: u32,
    config: &BackoffConfig,
    cancel: &CancellationToken,
    mut op: F,
) -> Option<Result<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(label, "Retry cancelled");
                return None;
            }
            result = op() => result,
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(label, attempt, "Succeeded after retry");
                }
                return Some(Ok(value));
            }
            Err(e) if attempt >= max_attempts => {
                tracing::error!(label, attempt, error = %e, "Giving up after all attempts");
                return Some(Err(e));
            }
            Err(e) => {
                tracing::warn!(
                    label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying",
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }
}
