//! Bounded retry with exponential backoff for transactional units of work.
//!
//! The closure is re-run from scratch on every attempt, so it must own its
//! whole transaction (begin, work, commit). A retry never observes partial
//! effects of a previous attempt.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Cap for exponential growth.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Jitter percentage in [0.0, 1.0]; e.g. 0.2 means +/-20% jitter.
    pub jitter_pct: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter_pct: 0.2,
        }
    }
}

impl RetryConfig {
    /// Delay to sleep after `attempt` (1-based) failed, before the next one.
    /// `nonce` is fixed for one `with_retry` call and differs between calls.
    pub fn delay_for(&self, key: &str, attempt: u32, nonce: u64) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let raw = self
            .initial_backoff
            .mul_f64(self.backoff_multiplier.max(1.0).powi(exp));
        let capped = std::cmp::min(raw, self.max_backoff);

        let pct = self.jitter_pct.clamp(0.0, 1.0) as f64;
        let lo = 1.0 - pct;
        let hi = 1.0 + pct;
        // Callers racing on the same key differ only by nonce.
        let h = xxh3_64_with_seed(
            &attempt.to_le_bytes(),
            xxh3_64_with_seed(key.as_bytes(), nonce),
        );
        let frac = h as f64 / u64::MAX as f64;
        capped.mul_f64(lo + frac * (hi - lo))
    }
}

static CALLS: AtomicU64 = AtomicU64::new(0);

/// Distinct per call within a process and, through the clock, across
/// processes sharing one database file.
fn call_nonce() -> u64 {
    let seq = CALLS.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    xxh3_64_with_seed(&nanos.to_le_bytes(), seq)
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt hit a retryable failure; carries the last one.
    Exhausted { attempts: u32, last: E },
    /// A non-retryable failure; returned immediately.
    Fatal(E),
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
pub async fn with_retry<T, E, F, Fut, R>(
    config: &RetryConfig,
    key: &str,
    is_retryable: R,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let nonce = call_nonce();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if !is_retryable(&e) => return Err(RetryError::Fatal(e)),
            Err(e) if attempt >= max_attempts => {
                tracing::warn!(key, attempts = attempt, "retry budget exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(_) => {
                let delay = config.delay_for(key, attempt, nonce);
                tracing::debug!(key, attempt, ?delay, "retryable conflict, backing off");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
