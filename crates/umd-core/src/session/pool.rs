//! Bounded LIFO pool of HTTP sessions.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::client::{HttpSession, SessionSettings};
use crate::config::UmdConfig;

/// Waiters re-check the pool (and the closed flag) at least this often.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("session pool is closed")]
    Closed,
    #[error("failed to create HTTP session: {0}")]
    Create(#[from] curl::Error),
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub created: usize,
    pub max_size: usize,
    pub idle: usize,
    pub waiting: usize,
}

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<HttpSession>,
    created: usize,
    closed: bool,
    waiting: usize,
}

/// Pool of reusable sessions. `max_size == 0` means unbounded.
///
/// When every pooled session is checked out, `acquire` waits up to its
/// timeout and then hands out a transient session instead of failing.
#[derive(Debug)]
pub struct SessionPool {
    settings: SessionSettings,
    max_size: usize,
    wait_timeout: Duration,
    state: Mutex<PoolState>,
    available: Condvar,
    next_id: AtomicU64,
}

impl SessionPool {
    pub fn new(settings: SessionSettings, max_size: usize, wait_timeout: Duration) -> Self {
        Self {
            settings,
            max_size,
            wait_timeout,
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(cfg: &UmdConfig, settings: SessionSettings) -> Self {
        Self::new(
            settings,
            cfg.session_pool.max_size,
            cfg.session_pool.wait_timeout(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create(&self, transient: bool) -> Result<HttpSession, curl::Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        HttpSession::new(id, &self.settings, transient)
    }

    /// Acquire with the pool's configured wait timeout.
    pub fn acquire(&self) -> Result<PooledSession<'_>, PoolError> {
        self.acquire_timeout(self.wait_timeout)
    }

    /// Pop the most recently released session, create one if under
    /// `max_size`, or wait up to `timeout` before falling back to a transient
    /// session. Fails only if the pool is (or becomes) closed.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<PooledSession<'_>, PoolError> {
        let mut state = self.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        if let Some(session) = state.idle.pop() {
            return Ok(self.wrap(session));
        }
        if self.max_size == 0 || state.created < self.max_size {
            state.created += 1;
            drop(state);
            return match self.create(false) {
                Ok(session) => Ok(self.wrap(session)),
                Err(e) => {
                    self.lock().created -= 1;
                    Err(PoolError::Create(e))
                }
            };
        }

        state.waiting += 1;
        let deadline = Instant::now() + timeout;
        loop {
            if state.closed {
                state.waiting -= 1;
                return Err(PoolError::Closed);
            }
            if let Some(session) = state.idle.pop() {
                state.waiting -= 1;
                return Ok(self.wrap(session));
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = (deadline - now).min(POLL_INTERVAL);
            state = self
                .available
                .wait_timeout(state, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state.waiting -= 1;
        drop(state);

        tracing::warn!(
            max_size = self.max_size,
            ?timeout,
            "session pool exhausted, using transient session"
        );
        let session = self.create(true)?;
        Ok(self.wrap(session))
    }

    fn wrap(&self, session: HttpSession) -> PooledSession<'_> {
        PooledSession {
            pool: self,
            session: Some(session),
        }
    }

    /// Return a session. Transient sessions, and any session arriving after
    /// `close()` or when the pool is already full, are closed instead.
    pub fn release(&self, session: HttpSession) {
        if session.is_transient() {
            return;
        }
        let mut state = self.lock();
        let full = self.max_size > 0 && state.idle.len() >= self.max_size;
        if state.closed || full {
            state.created = state.created.saturating_sub(1);
            return;
        }
        state.idle.push(session);
        drop(state);
        self.available.notify_one();
    }

    /// Close all idle sessions; later `acquire` calls fail. Sessions still
    /// checked out are closed when released.
    pub fn close(&self) {
        let drained = {
            let mut state = self.lock();
            state.closed = true;
            let drained: Vec<HttpSession> = state.idle.drain(..).collect();
            state.created = state.created.saturating_sub(drained.len());
            drained
        };
        tracing::debug!(closed = drained.len(), "session pool closed");
        drop(drained);
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            created: state.created,
            max_size: self.max_size,
            idle: state.idle.len(),
            waiting: state.waiting,
        }
    }
}

/// Session on loan from a [`SessionPool`]; released when dropped.
#[derive(Debug)]
pub struct PooledSession<'a> {
    pool: &'a SessionPool,
    session: Option<HttpSession>,
}

impl Deref for PooledSession<'_> {
    type Target = HttpSession;

    fn deref(&self) -> &HttpSession {
        self.session.as_ref().expect("session present until drop")
    }
}

impl DerefMut for PooledSession<'_> {
    fn deref_mut(&mut self) -> &mut HttpSession {
        self.session.as_mut().expect("session present until drop")
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pool(max_size: usize) -> SessionPool {
        SessionPool::new(SessionSettings::default(), max_size, Duration::from_secs(5))
    }

    #[test]
    fn reuses_released_sessions_lifo() {
        let p = pool(4);
        let a = p.acquire().unwrap();
        let b = p.acquire().unwrap();
        let (a_id, b_id) = (a.id(), b.id());
        drop(a);
        drop(b);
        assert_eq!(p.stats().idle, 2);
        let again = p.acquire().unwrap();
        assert_eq!(again.id(), b_id);
        assert_ne!(again.id(), a_id);
        assert_eq!(p.stats().created, 2);
    }

    #[test]
    fn exhausted_pool_falls_back_to_transient_after_timeout() {
        let p = pool(2);
        let _a = p.acquire().unwrap();
        let _b = p.acquire().unwrap();
        let start = Instant::now();
        let c = p.acquire_timeout(Duration::from_millis(200)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(c.is_transient());
        drop(c);
        let stats = p.stats();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.waiting, 0);
    }

    #[test]
    fn waiter_gets_released_session() {
        let p = Arc::new(pool(1));
        let held = p.acquire().unwrap();
        let held_id = held.id();
        let p2 = Arc::clone(&p);
        let waiter = std::thread::spawn(move || {
            let s = p2.acquire_timeout(Duration::from_secs(5)).unwrap();
            (s.id(), s.is_transient())
        });
        std::thread::sleep(Duration::from_millis(50));
        drop(held);
        let (id, transient) = waiter.join().unwrap();
        assert_eq!(id, held_id);
        assert!(!transient);
    }

    #[test]
    fn closed_pool_refuses_acquire() {
        let p = pool(2);
        let s = p.acquire().unwrap();
        p.close();
        assert!(p.is_closed());
        assert!(matches!(p.acquire(), Err(PoolError::Closed)));
        drop(s);
        assert_eq!(p.stats().idle, 0);
    }

    #[test]
    fn close_wakes_waiters_with_error() {
        let p = Arc::new(pool(1));
        let _held = p.acquire().unwrap();
        let p2 = Arc::clone(&p);
        let waiter =
            std::thread::spawn(move || p2.acquire_timeout(Duration::from_secs(10)).map(|s| s.id()));
        std::thread::sleep(Duration::from_millis(50));
        p.close();
        assert!(matches!(waiter.join().unwrap(), Err(PoolError::Closed)));
    }

    #[test]
    fn unbounded_pool_always_creates() {
        let p = pool(0);
        let sessions: Vec<_> = (0..5).map(|_| p.acquire().unwrap()).collect();
        assert!(sessions.iter().all(|s| !s.is_transient()));
        assert_eq!(p.stats().created, 5);
    }
}
