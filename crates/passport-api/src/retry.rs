//! Retry with exponential back-off and jitter for the RPC client.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (network failures, 5xx, 429). RPC error envelopes and
//! decode failures are returned immediately; retrying would not change them.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 5xx responses and 429 rate limiting.
///
/// **Not retriable:**
/// - [`ApiError::Rpc`]: the service rejected the call.
/// - [`ApiError::NotFound`], [`ApiError::Deserialize`], [`ApiError::InvalidBaseUrl`].
/// - [`ApiError::UnexpectedStatus`] with a 4xx status.
pub(crate) fn is_retriable(err: &ApiError) -> bool {
    match err {
        ApiError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ApiError::RateLimited { .. } => true,
        ApiError::UnexpectedStatus { status, .. } => *status >= 500,
        ApiError::Rpc { .. }
        | ApiError::NotFound { .. }
        | ApiError::Deserialize { .. }
        | ApiError::InvalidBaseUrl { .. } => false,
    }
}

const MAX_BACKOFF_MS: u64 = 30_000;

/// Delay before retry number `attempt` (1-based).
///
/// The back-off is `backoff_base_ms × 2^(attempt-1)` capped at 30 s and scaled
/// by `jitter`. A rate-limit answer waits at least its `Retry-After`, even
/// past the cap.
fn retry_delay(attempt: u32, backoff_base_ms: u64, err: &ApiError, jitter: f64) -> Duration {
    let backoff = backoff_base_ms
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(10))
        .min(MAX_BACKOFF_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (backoff as f64 * jitter) as u64;
    let delay_ms = match err {
        ApiError::RateLimited { retry_after_secs } => {
            jittered.max(retry_after_secs.saturating_mul(1_000))
        }
        _ => jittered,
    };
    Duration::from_millis(delay_ms)
}

/// Runs `operation` with up to `max_retries` additional attempts on transient
/// errors, sleeping [`retry_delay`] with ±25 % jitter between them.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }
        attempt += 1;
        let delay = retry_delay(
            attempt,
            backoff_base_ms,
            &err,
            0.75 + rand::random::<f64>() * 0.5,
        );
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient API error, retrying after back-off"
        );
        tokio::time::sleep(delay).await;
    }
}
