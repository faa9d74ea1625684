//! Failure-window circuit breaker guarding a fragile remote endpoint.
//!
//! Closed: calls pass; the last `window_size` outcomes are kept and the
//! breaker opens once `failure_threshold` of them are failures.
//! Open: calls are refused with [`CircuitOpen`] until `timeout` has elapsed
//! since the last failure; the next attempt after that moves to half-open.
//! Half-open: `success_threshold` consecutive successes close the breaker,
//! any failure reopens it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub success_threshold: usize,
    pub timeout: Duration,
    pub window_size: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            window_size: 10,
        }
    }
}

/// Returned instead of invoking the guarded call while the breaker is open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit open (failed {failures} times)")]
pub struct CircuitOpen {
    pub failures: usize,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    last_failure: Option<Instant>,
    recent: VecDeque<bool>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(mut config: CircuitBreakerConfig) -> Self {
        config.failure_threshold = config.failure_threshold.max(1);
        config.success_threshold = config.success_threshold.max(1);
        config.window_size = config.window_size.max(config.failure_threshold);
        let recent = VecDeque::with_capacity(config.window_size);
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
                recent,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> usize {
        self.lock().failure_count
    }

    /// Run `f` through the breaker. Any `Err` from `f` counts as a failure.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<CircuitOpen>,
    {
        self.before_call()?;
        match f() {
            Ok(v) => {
                self.on_success();
                Ok(v)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }

    /// Gate for callers that record the outcome themselves. Moves an expired
    /// open breaker to half-open; refuses while the timeout is unmet.
    pub fn before_call(&self) -> Result<(), CircuitOpen> {
        let mut inner = self.lock();
        if inner.state == CircuitState::Open {
            let expired = inner
                .last_failure
                .map_or(true, |t| t.elapsed() >= self.config.timeout);
            if !expired {
                return Err(CircuitOpen {
                    failures: inner.failure_count,
                });
            }
            tracing::info!("circuit breaker half-open after {:?}", self.config.timeout);
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
        }
        Ok(())
    }

    pub fn on_success(&self) {
        let mut inner = self.lock();
        self.push_outcome(&mut inner, true);
        if inner.state == CircuitState::HalfOpen {
            inner.success_count += 1;
            if inner.success_count >= self.config.success_threshold {
                tracing::info!("circuit breaker closed");
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.recent.clear();
            }
        }
    }

    pub fn on_failure(&self) {
        let mut inner = self.lock();
        inner.last_failure = Some(Instant::now());
        inner.failure_count += 1;
        self.push_outcome(&mut inner, false);
        match inner.state {
            CircuitState::HalfOpen => {
                tracing::warn!("circuit breaker reopened by half-open failure");
                inner.state = CircuitState::Open;
                inner.success_count = 0;
            }
            CircuitState::Closed => {
                let recent_failures = inner.recent.iter().filter(|ok| !**ok).count();
                if recent_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        recent_failures,
                        window = self.config.window_size,
                        "circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker back to closed with empty history.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure = None;
        inner.recent.clear();
    }

    fn push_outcome(&self, inner: &mut Inner, ok: bool) {
        if inner.recent.len() == self.config.window_size {
            inner.recent.pop_front();
        }
        inner.recent.push_back(ok);
    }
}
