//! Throttled progress reporting for image downloads.

use std::time::{Duration, Instant};

/// Decides when a progress update is worth sending.
///
/// The first update and any forced update always pass; others pass only if
/// at least `interval` has elapsed since the last one that did.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn should_emit(&mut self, force: bool) -> bool {
        self.should_emit_at(Instant::now(), force)
    }

    fn should_emit_at(&mut self, now: Instant, force: bool) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due || force {
            self.last = Some(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_then_interval() {
        let mut t = ProgressThrottle::new(Duration::from_millis(100));
        let start = Instant::now();
        assert!(t.should_emit_at(start, false));
        assert!(!t.should_emit_at(start + Duration::from_millis(50), false));
        assert!(t.should_emit_at(start + Duration::from_millis(100), false));
        assert!(!t.should_emit_at(start + Duration::from_millis(120), false));
    }

    #[test]
    fn force_always_emits() {
        let mut t = ProgressThrottle::new(Duration::from_secs(60));
        let start = Instant::now();
        assert!(t.should_emit_at(start, false));
        assert!(t.should_emit_at(start, true));
    }
}
