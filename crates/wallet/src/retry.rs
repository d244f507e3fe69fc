//! Retry with exponential backoff for transient RPC failures on chain reads.

use alloy::transports::{TransportError, TransportErrorKind, TransportResult};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

const INITIAL_DELAY_MS: u64 = 100;
const MAX_DELAY_MS: u64 = 10_000;
const MAX_RETRIES: usize = 5;

/// Node hiccups worth another attempt. Reverts and malformed requests are
/// final.
fn is_transient_error(err: &TransportError) -> bool {
    if err.as_transport_err().is_some_and(TransportErrorKind::is_retry_err) {
        return true;
    }

    let msg = err.to_string().to_lowercase();
    [
        "connection",
        "timeout",
        "too many requests",
        "502",
        "503",
        "504",
        "temporarily unavailable",
        "reset by peer",
    ]
    .iter()
    .any(|needle| msg.contains(needle))
}

/// Exponential backoff capped at [`MAX_DELAY_MS`], plus up to a quarter of
/// jitter.
fn compute_delay(attempt: usize) -> Duration {
    let delay = INITIAL_DELAY_MS
        .saturating_mul(1 << attempt.min(10))
        .min(MAX_DELAY_MS);
    let jitter = rand::thread_rng().gen_range(0..=delay / 4);
    Duration::from_millis(delay + jitter)
}

/// Runs a read-only RPC request, retrying transient transport failures.
///
/// Only for idempotent reads, submissions are never retried.
pub(crate) async fn with_retry<F, Fut, T>(operation: &str, mut f: F) -> TransportResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = TransportResult<T>>,
{
    let mut attempt = 0;
    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(err) if !is_transient_error(&err) => return Err(err),
            Err(err) => err,
        };
        if attempt == MAX_RETRIES {
            warn!(operation, attempts = attempt + 1, %err, "Giving up on chain read");
            return Err(err);
        }

        let delay = compute_delay(attempt);
        debug!(
            operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            %err,
            "Retrying chain read"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
