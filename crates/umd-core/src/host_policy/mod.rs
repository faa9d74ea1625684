//! Per-host request guards.
//!
//! Every page and image request goes through the [`HostGuard`] for its
//! origin: a token bucket spaces requests out and a circuit breaker stops
//! hammering a host that keeps failing. Guards are created lazily and shared
//! by all jobs in the process.

mod key;

pub use key::HostKey;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::UmdConfig;
use crate::rate_limit::RateLimiter;
use crate::retry::{classify, FetchError};

/// Limiter and breaker for one origin.
#[derive(Debug)]
pub struct HostGuard {
    pub key: HostKey,
    pub limiter: RateLimiter,
    pub breaker: CircuitBreaker,
}

impl HostGuard {
    /// Check the breaker, wait for a token, then run `f`.
    ///
    /// Network failures are recorded against the breaker. Cancellation and
    /// local storage errors say nothing about the host and are not recorded.
    pub fn run<T, F>(&self, f: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Result<T, FetchError>,
    {
        self.breaker.before_call()?;
        self.limiter.acquire(true);
        match f() {
            Ok(v) => {
                self.breaker.on_success();
                Ok(v)
            }
            Err(e) => {
                if classify(&e).is_retryable() {
                    self.breaker.on_failure();
                }
                Err(e)
            }
        }
    }
}

/// Process-wide registry of host guards.
#[derive(Debug)]
pub struct HostGuards {
    seconds_per_token: f64,
    burst: u32,
    breaker: CircuitBreakerConfig,
    hosts: RwLock<HashMap<HostKey, Arc<HostGuard>>>,
}

impl HostGuards {
    pub fn new(seconds_per_token: f64, burst: u32, breaker: CircuitBreakerConfig) -> Self {
        Self {
            seconds_per_token,
            burst,
            breaker,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &UmdConfig) -> Self {
        Self::new(
            cfg.rate_limit.seconds_per_token(),
            cfg.rate_limit.burst,
            cfg.circuit_breaker.to_breaker_config(),
        )
    }

    /// Guard for the URL's origin, created on first use. `None` when the URL
    /// has no host (the request then runs unguarded).
    pub fn for_url(&self, url: &str) -> Option<Arc<HostGuard>> {
        let key = HostKey::from_url(url)?;
        if let Some(g) = self
            .hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Some(Arc::clone(g));
        }
        let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
        let guard = hosts.entry(key.clone()).or_insert_with(|| {
            tracing::debug!(host = %key, "creating host guard");
            Arc::new(HostGuard {
                key,
                limiter: RateLimiter::new(self.seconds_per_token, self.burst),
                breaker: CircuitBreaker::new(self.breaker.clone()),
            })
        });
        Some(Arc::clone(guard))
    }

    /// Run `f` through the guard for `url`, or directly when the URL has no host.
    pub fn run<T, F>(&self, url: &str, f: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Result<T, FetchError>,
    {
        match self.for_url(url) {
            Some(guard) => guard.run(f),
            None => f(),
        }
    }

    pub fn len(&self) -> usize {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
