//! Retry logic with exponential backoff.
//!
//! Page and asset requests are idempotent GETs, so transient failures
//! (timeouts, refused connections, 5xx and 429 responses) are retried with an
//! exponentially growing delay plus random jitter. Permanent failures and
//! exhausted retries surface the last error unchanged.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

use crate::config::RetryConfig;
use crate::error::Error;

/// Classifies errors as transient (worth retrying) or permanent.
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again.
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { source, .. } => is_transient(source),
            Self::Parse(_)
            | Self::Format { .. }
            | Self::InvalidUrl { .. }
            | Self::Io { .. }
            | Self::Config(_)
            | Self::Http(_) => false,
        }
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    if let Some(status) = err.status() {
        return status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
    }
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/// Delay before retry number `retry` (1-based), without jitter.
#[must_use]
pub fn backoff_delay(config: &RetryConfig, retry: u32) -> Duration {
    let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
    let secs = config.initial_delay.as_secs_f64() * config.backoff_multiplier.powi(exponent);
    Duration::try_from_secs_f64(secs.max(0.0))
        .map_or(config.max_delay, |delay| delay.min(config.max_delay))
}

fn add_jitter(delay: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return delay;
    }
    let extra = rand::thread_rng().gen_range(0.0..=jitter.as_secs_f64());
    delay + Duration::from_secs_f64(extra)
}

/// Runs `operation` until it succeeds, fails permanently or runs out of retries.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if retry > 0 {
                    log::info!("{what}: succeeded after {retry} retries");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && retry < config.max_attempts => {
                retry += 1;
                let delay = add_jitter(backoff_delay(config, retry), config.jitter);
                log::warn!(
                    "{what}: {e}; retry {retry}/{} in {:.1}s",
                    config.max_attempts,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if retry > 0 {
                    log::error!("{what}: giving up after {} attempts: {e}", retry + 1);
                }
                return Err(e);
            }
        }
    }
}
