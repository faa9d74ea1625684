//! Retry loop: run a closure until success or policy says stop.

use std::time::Duration;

use super::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};

/// Passed to the caller's hook before each backoff sleep.
#[derive(Debug)]
pub struct RetryNotice<'a> {
    /// The attempt that just failed (1-based).
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub error: &'a FetchError,
}

/// Runs `f` until it succeeds or the retry policy says to stop.
///
/// `f` receives the 1-based attempt number. Before every backoff sleep
/// `before_retry` is called; returning `false` stops with `FetchError::Cancelled`.
pub fn run_with_retry<T, F, B>(
    policy: &RetryPolicy,
    mut f: F,
    mut before_retry: B,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Result<T, FetchError>,
    B: FnMut(&RetryNotice<'_>) -> bool,
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(delay) => {
                        let notice = RetryNotice {
                            attempt,
                            max_attempts: policy.max_attempts,
                            delay,
                            error: &e,
                        };
                        if !before_retry(&notice) {
                            return Err(FetchError::Cancelled);
                        }
                        tracing::debug!(attempt, ?kind, ?delay, "retrying after error: {}", e);
                        std::thread::sleep(delay);
                        attempt += 1;
                    }
                }
            }
        }
    }
}
