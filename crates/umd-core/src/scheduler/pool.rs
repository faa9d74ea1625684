//! Fixed-size chapter worker pool with a withdrawable FIFO.

use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::queue::QueueId;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    pending: VecDeque<(QueueId, Job)>,
    running: Vec<QueueId>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<PoolState>,
    work: Condvar,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of [`ChapterPool::execute_unless`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// `hold` said no; the job was dropped.
    Held,
    /// The pool is shut down; the job was dropped.
    Closed,
}

/// Worker threads pulling jobs in submission order. Jobs that have not been
/// picked up yet can be withdrawn by id.
pub struct ChapterPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl std::fmt::Debug for ChapterPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("ChapterPool")
            .field("size", &self.size)
            .field("pending", &state.pending.len())
            .field("running", &state.running)
            .finish()
    }
}

impl ChapterPool {
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let shared = Arc::new(Shared::default());
        let mut workers = Vec::with_capacity(size);
        for n in 0..size {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("chapter-{n}"))
                .spawn(move || worker_loop(&shared))?;
            workers.push(handle);
        }
        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a job. Returns false (dropping the job) after shutdown.
    pub fn execute<F>(&self, id: QueueId, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_unless(id, job, || false) == Admission::Queued
    }

    /// Queue a job unless `hold` returns true. `hold` runs under the queue
    /// lock, so a concurrent [`take_pending`](Self::take_pending) either sees
    /// the job or the job sees whatever `hold` checks.
    pub fn execute_unless<F, H>(&self, id: QueueId, job: F, hold: H) -> Admission
    where
        F: FnOnce() + Send + 'static,
        H: FnOnce() -> bool,
    {
        let mut state = self.shared.lock();
        if state.shutdown {
            return Admission::Closed;
        }
        if hold() {
            return Admission::Held;
        }
        state.pending.push_back((id, Box::new(job)));
        drop(state);
        self.shared.work.notify_one();
        Admission::Queued
    }

    /// Withdraw a job that has not started. Returns false if it is running,
    /// finished or unknown.
    pub fn remove(&self, id: QueueId) -> bool {
        let mut state = self.shared.lock();
        let before = state.pending.len();
        state.pending.retain(|(queued, _)| *queued != id);
        let removed = state.pending.len() != before;
        if removed {
            self.notify_if_idle(&state);
        }
        removed
    }

    /// Withdraw every job that has not started, in queue order.
    pub fn take_pending(&self) -> Vec<QueueId> {
        let mut state = self.shared.lock();
        let ids = state.pending.drain(..).map(|(id, _)| id).collect();
        self.notify_if_idle(&state);
        ids
    }

    pub fn running_ids(&self) -> Vec<QueueId> {
        self.shared.lock().running.clone()
    }

    pub fn is_idle(&self) -> bool {
        let state = self.shared.lock();
        state.pending.is_empty() && state.running.is_empty()
    }

    /// Block until nothing is queued or running.
    pub fn wait_idle(&self) {
        let mut state = self.shared.lock();
        while !(state.pending.is_empty() && state.running.is_empty()) {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Drop queued jobs, let running ones finish, and join the workers.
    /// Returns the ids of the dropped jobs.
    pub fn shutdown(&self) -> Vec<QueueId> {
        let dropped: Vec<QueueId> = {
            let mut state = self.shared.lock();
            state.shutdown = true;
            let ids = state.pending.drain(..).map(|(id, _)| id).collect();
            self.notify_if_idle(&state);
            ids
        };
        self.shared.work.notify_all();
        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!("chapter worker panicked");
            }
        }
        dropped
    }

    fn notify_if_idle(&self, state: &PoolState) {
        if state.pending.is_empty() && state.running.is_empty() {
            self.shared.idle.notify_all();
        }
    }
}

impl Drop for ChapterPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let (id, job) = {
            let mut state = shared.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(next) = state.pending.pop_front() {
                    state.running.push(next.0);
                    break next;
                }
                state = shared
                    .work
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(queue_id = id, "chapter job panicked");
        }
        let mut state = shared.lock();
        state.running.retain(|r| *r != id);
        if state.pending.is_empty() && state.running.is_empty() {
            shared.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn runs_all_jobs_and_goes_idle() {
        let pool = ChapterPool::new(3).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for id in 0..10 {
            let done = Arc::clone(&done);
            assert!(pool.execute(id, move || {
                std::thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.wait_idle();
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert!(pool.is_idle());
    }

    #[test]
    fn queued_jobs_can_be_withdrawn() {
        let pool = ChapterPool::new(1).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        pool.execute(1, move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        started_rx.recv().unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        for id in 2..=4 {
            let ran = Arc::clone(&ran);
            pool.execute(id, move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(pool.running_ids(), vec![1]);
        assert!(!pool.remove(1));
        assert!(pool.remove(3));
        assert_eq!(pool.take_pending(), vec![2, 4]);
        release_tx.send(()).unwrap();
        pool.wait_idle();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let pool = ChapterPool::new(1).unwrap();
        pool.execute(1, || panic!("job failure"));
        let done = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&done);
        pool.execute(2, move || {
            d.fetch_add(1, Ordering::SeqCst);
        });
        pool.wait_idle();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_drops_queue_and_refuses_new_jobs() {
        let pool = ChapterPool::new(1).unwrap();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        pool.execute(1, move || {
            started_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(50));
        });
        started_rx.recv().unwrap();
        pool.execute(2, || {});
        assert_eq!(pool.shutdown(), vec![2]);
        assert!(!pool.execute(3, || {}));
        assert!(pool.is_idle());
    }

    #[test]
    fn held_jobs_are_not_queued() {
        let pool = ChapterPool::new(2).unwrap();
        assert_eq!(pool.size(), 2);
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        let admission = pool.execute_unless(
            1,
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
            || true,
        );
        assert_eq!(admission, Admission::Held);
        pool.wait_idle();
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        pool.shutdown();
        assert_eq!(pool.execute_unless(2, || {}, || false), Admission::Closed);
    }
}
