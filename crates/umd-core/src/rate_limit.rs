//! Token-bucket throttle for outbound requests.
//!
//! Tokens refill continuously at one per `rate` seconds up to `capacity`.
//! Blocking acquires sleep outside the lock so other threads can refill and
//! take tokens while one caller waits.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Smallest accepted interval between tokens.
const MIN_RATE_SECS: f64 = 0.001;
/// A blocked caller re-checks the bucket at least this often.
const MAX_SLEEP: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_update: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `rate` is seconds per token (floor 1ms); `capacity` is the burst size (floor 1).
    /// The bucket starts full.
    pub fn new(rate: f64, capacity: u32) -> Self {
        let rate = if rate.is_finite() { rate.max(MIN_RATE_SECS) } else { 1.0 };
        let capacity = f64::from(capacity.max(1));
        Self {
            rate,
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_update: Instant::now(),
            }),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Take one token. Non-blocking calls return `false` when the bucket is
    /// empty; blocking calls sleep until a token is available and return `true`.
    pub fn acquire(&self, block: bool) -> bool {
        loop {
            let wait = {
                let mut b = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
                self.refill(&mut b);
                if b.tokens >= 1.0 {
                    b.tokens -= 1.0;
                    return true;
                }
                if !block {
                    return false;
                }
                let deficit = 1.0 - b.tokens;
                Duration::from_secs_f64(deficit * self.rate).min(MAX_SLEEP)
            };
            std::thread::sleep(wait);
        }
    }

    /// Tokens currently available (after refill).
    pub fn available(&self) -> f64 {
        let mut b = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut b);
        b.tokens
    }

    fn refill(&self, b: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(b.last_update).as_secs_f64();
        b.tokens = (b.tokens + elapsed / self.rate).min(self.capacity);
        b.last_update = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn non_blocking_acquire_drains_and_refills() {
        let limiter = RateLimiter::new(0.1, 1);
        assert!(limiter.acquire(false));
        assert!(!limiter.acquire(false));
        std::thread::sleep(Duration::from_millis(150));
        assert!(limiter.acquire(false));
    }

    #[test]
    fn blocking_acquire_waits_for_refill() {
        let limiter = RateLimiter::new(0.05, 1);
        assert!(limiter.acquire(true));
        let start = Instant::now();
        assert!(limiter.acquire(true));
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn burst_up_to_capacity() {
        let limiter = RateLimiter::new(10.0, 3);
        assert!(limiter.acquire(false));
        assert!(limiter.acquire(false));
        assert!(limiter.acquire(false));
        assert!(!limiter.acquire(false));
    }

    #[test]
    fn parameters_have_floors() {
        let limiter = RateLimiter::new(0.0, 0);
        assert!((limiter.rate() - MIN_RATE_SECS).abs() < 1e-12);
        assert_eq!(limiter.capacity(), 1);
    }

    #[test]
    fn tokens_never_exceed_capacity() {
        let limiter = RateLimiter::new(0.001, 2);
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.available() <= 2.0);
    }

    #[test]
    fn shared_across_threads() {
        let limiter = Arc::new(RateLimiter::new(0.01, 2));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let l = Arc::clone(&limiter);
                std::thread::spawn(move || l.acquire(true))
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }
}
