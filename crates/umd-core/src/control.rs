//! Cooperative cancellation and pause.
//!
//! Each running job gets a [`CancelToken`] registered in [`JobControl`] so a
//! cancel request can reach it by queue id. All jobs share one [`PauseGate`]:
//! while it is closed, workers park at their next check instead of issuing
//! new requests. Neither interrupts a blocking call already in progress.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::time::Duration;

use crate::queue::QueueId;

/// Parked workers re-check their cancel token this often.
const GATE_RECHECK: Duration = Duration::from_millis(200);

/// Error used when a job stops because it was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("download cancelled")]
pub struct JobCancelled;

/// Shared cancellation flag. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(JobCancelled)` once cancelled, for use with `?` at phase boundaries.
    pub fn check(&self) -> Result<(), JobCancelled> {
        if self.is_cancelled() {
            Err(JobCancelled)
        } else {
            Ok(())
        }
    }
}

/// Open/closed gate shared by every job. Open means running.
#[derive(Debug)]
pub struct PauseGate {
    paused: Mutex<bool>,
    changed: Condvar,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self {
            paused: Mutex::new(false),
            changed: Condvar::new(),
        }
    }
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn resume(&self) {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.changed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block while the gate is closed. Returns `Err(JobCancelled)` if `cancel`
    /// fires while waiting (or had already fired).
    pub fn wait(&self, cancel: &CancelToken) -> Result<(), JobCancelled> {
        let mut paused = self.paused.lock().unwrap_or_else(PoisonError::into_inner);
        while *paused {
            cancel.check()?;
            paused = self
                .changed
                .wait_timeout(paused, GATE_RECHECK)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(paused);
        cancel.check()
    }
}

/// Registry of queue id -> cancel token for jobs that have been scheduled.
#[derive(Debug, Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<QueueId, CancelToken>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job; returns the token to hand to its task.
    pub fn register(&self, id: QueueId) -> CancelToken {
        let token = CancelToken::new();
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, token.clone());
        token
    }

    /// Unregister a job (call when the job finishes, whatever the outcome).
    pub fn unregister(&self, id: QueueId) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Signal the job's token. Returns false if the job is not registered.
    pub fn request_cancel(&self, id: QueueId) -> bool {
        match self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Signal every registered job; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        for token in jobs.values() {
            token.cancel();
        }
        jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn token_clones_share_state() {
        let t = CancelToken::new();
        let t2 = t.clone();
        assert!(t.check().is_ok());
        t2.cancel();
        assert!(t.is_cancelled());
        assert_eq!(t.check(), Err(JobCancelled));
    }

    #[test]
    fn open_gate_passes_immediately() {
        let gate = PauseGate::new();
        assert!(gate.wait(&CancelToken::new()).is_ok());
    }

    #[test]
    fn closed_gate_blocks_until_resume() {
        let gate = Arc::new(PauseGate::new());
        gate.pause();
        let g = Arc::clone(&gate);
        let start = Instant::now();
        let waiter = std::thread::spawn(move || g.wait(&CancelToken::new()));
        std::thread::sleep(Duration::from_millis(100));
        assert!(!waiter.is_finished());
        gate.resume();
        assert!(waiter.join().unwrap().is_ok());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn cancel_releases_parked_waiter() {
        let gate = Arc::new(PauseGate::new());
        gate.pause();
        let token = CancelToken::new();
        let (g, t) = (Arc::clone(&gate), token.clone());
        let waiter = std::thread::spawn(move || g.wait(&t));
        std::thread::sleep(Duration::from_millis(50));
        token.cancel();
        assert_eq!(waiter.join().unwrap(), Err(JobCancelled));
        assert!(gate.is_paused());
    }

    #[test]
    fn registry_signals_registered_jobs_only() {
        let control = JobControl::new();
        let token = control.register(5);
        assert!(!control.request_cancel(6));
        assert!(control.request_cancel(5));
        assert!(token.is_cancelled());
        control.unregister(5);
        assert!(control.is_empty());
        assert!(!control.request_cancel(5));
    }

    #[test]
    fn cancel_all_signals_everyone() {
        let control = JobControl::new();
        let a = control.register(1);
        let b = control.register(2);
        assert_eq!(control.cancel_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
    }
}
