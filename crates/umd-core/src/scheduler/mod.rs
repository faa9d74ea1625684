//! Chapter-level scheduler.
//!
//! [`Downloader`] owns the chapter worker pool, the pause gate, the per-job
//! cancel tokens and the global image budget. It is the entry point a front
//! end uses: submit URLs, pause and resume, cancel, and clear finished items.

mod budget;
mod pool;
mod progress;

pub use budget::{BudgetPermit, ImageBudget};
pub use pool::{Admission, ChapterPool};
pub use progress::ProgressThrottle;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};

use crate::config::UmdConfig;
use crate::control::{JobControl, PauseGate};
use crate::plugin::PluginRegistry;
use crate::queue::{DeferredEntry, QueueId, QueueManager, QueueState};
use crate::storage::FreeSpaceProbe;
use crate::task::{DownloadTask, TaskContext, TaskOutcome, UiHooks};

/// Queue front door: runs submitted chapters on a fixed pool of workers.
pub struct Downloader {
    ctx: Arc<TaskContext>,
    pool: ChapterPool,
    control: Arc<JobControl>,
    gate: Arc<PauseGate>,
    outcomes: Arc<Mutex<HashMap<QueueId, TaskOutcome>>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl Downloader {
    pub fn new(config: UmdConfig, plugins: PluginRegistry, hooks: Arc<dyn UiHooks>) -> Result<Self> {
        Self::with_context(TaskContext::new(config, plugins, hooks))
    }

    /// Same as [`Downloader::new`] with a custom free-space source.
    pub fn with_probe(
        config: UmdConfig,
        plugins: PluginRegistry,
        hooks: Arc<dyn UiHooks>,
        probe: Arc<dyn FreeSpaceProbe>,
    ) -> Result<Self> {
        Self::with_context(TaskContext::new(config, plugins, hooks).with_probe(probe))
    }

    fn with_context(ctx: TaskContext) -> Result<Self> {
        let pool = ChapterPool::new(ctx.config.download.chapter_worker_count())
            .context("failed to start chapter workers")?;
        tracing::info!(
            chapter_workers = pool.size(),
            image_workers = ctx.config.download.image_worker_count(),
            image_budget = ctx.budget.max_total(),
            root = %ctx.download_root.display(),
            "downloader ready"
        );
        Ok(Self {
            ctx: Arc::new(ctx),
            pool,
            control: Arc::new(JobControl::new()),
            gate: Arc::new(PauseGate::new()),
            outcomes: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn queue(&self) -> &Arc<QueueManager> {
        &self.ctx.queue
    }

    pub fn context(&self) -> &Arc<TaskContext> {
        &self.ctx
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused() || self.ctx.queue.is_paused()
    }

    /// Register a new job and start it, or park it if downloads are paused.
    pub fn submit(&self, url: &str, label: Option<&str>) -> QueueId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.ctx.queue.add_item(id, url, label);
        tracing::info!(queue_id = id, url, "job submitted");
        let entry = DeferredEntry {
            id,
            url: url.to_string(),
            initial_label: label.map(str::to_string),
        };
        if self.is_paused() {
            self.defer(entry);
        } else {
            self.start(entry);
        }
        id
    }

    fn start(&self, entry: DeferredEntry) {
        if self.is_paused() {
            self.defer(entry);
            return;
        }
        let id = entry.id;
        let token = self.control.register(id);
        let task = DownloadTask::new(
            id,
            entry.url.clone(),
            entry.initial_label.clone(),
            Arc::clone(&self.ctx),
        )
        .with_control(token, Arc::clone(&self.gate));
        let ctx = Arc::clone(&self.ctx);
        let control = Arc::clone(&self.control);
        let outcomes = Arc::clone(&self.outcomes);
        self.ctx.queue.clear_paused(id);
        self.set_item_status(id, "Queued", QueueState::Pending);
        let job = move || {
            let outcome = task.run();
            control.unregister(id);
            ctx.queue.clear_paused(id);
            ctx.queue.clear_cancelled(id);
            tracing::debug!(queue_id = id, ?outcome, "job finished");
            outcomes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id, outcome);
        };
        // pause() closes the gate before draining the pool, so checking it
        // under the pool lock cannot miss a pause.
        match self.pool.execute_unless(id, job, || self.is_paused()) {
            Admission::Queued => {}
            Admission::Held => {
                self.control.unregister(id);
                self.defer(entry);
            }
            Admission::Closed => {
                self.control.unregister(id);
                self.mark_cancelled(id);
            }
        }
    }

    fn defer(&self, entry: DeferredEntry) {
        let id = entry.id;
        let already = self.ctx.queue.is_item_paused(id);
        self.ctx.queue.pause_item(id);
        if !already {
            self.ctx.queue.add_deferred(entry);
        }
        self.set_item_status(id, "Paused", QueueState::Paused);
    }

    /// Close the gate and park every job that has not started. Running jobs
    /// block at their next check. Returns how many jobs were parked.
    pub fn pause(&self) -> usize {
        if self.is_paused() {
            return 0;
        }
        self.gate.pause();
        self.ctx.queue.pause();
        let mut parked = 0;
        for id in self.pool.take_pending() {
            self.control.unregister(id);
            let Some(item) = self.ctx.queue.get_item(id) else {
                continue;
            };
            self.defer(DeferredEntry {
                id,
                url: item.url,
                initial_label: item.initial_label,
            });
            parked += 1;
        }
        let message = if parked > 0 {
            format!("Status: Paused downloads (moved {parked} pending job(s)).")
        } else {
            "Status: Downloads paused.".to_string()
        };
        self.ctx.hooks.set_status(&message);
        tracing::info!(parked, "downloads paused");
        parked
    }

    /// Open the gate and restart parked jobs that were not cancelled meanwhile.
    pub fn resume(&self) -> usize {
        if !self.is_paused() {
            return 0;
        }
        self.gate.resume();
        self.ctx.queue.resume();
        let mut resumed = 0;
        for entry in self.ctx.queue.get_deferred() {
            self.ctx.queue.clear_paused(entry.id);
            if self.ctx.queue.is_cancelled(entry.id) {
                self.ctx.queue.clear_cancelled(entry.id);
                continue;
            }
            self.start(entry);
            resumed += 1;
        }
        let message = if resumed > 0 {
            format!("Status: Resumed {resumed} paused download(s).")
        } else {
            "Status: Downloads resumed.".to_string()
        };
        self.ctx.hooks.set_status(&message);
        tracing::info!(resumed, "downloads resumed");
        resumed
    }

    /// Cancel every parked or not-yet-started job. Running jobs are left alone.
    pub fn cancel_pending(&self) -> usize {
        let mut ids: Vec<QueueId> = self
            .ctx
            .queue
            .get_deferred()
            .into_iter()
            .map(|e| e.id)
            .collect();
        for id in self.pool.take_pending() {
            self.control.unregister(id);
            ids.push(id);
        }
        ids.sort_unstable();
        ids.dedup();
        let mut cancelled = 0;
        for &id in &ids {
            self.ctx.queue.clear_paused(id);
            if self.mark_cancelled(id) {
                cancelled += 1;
            }
        }
        let message = if cancelled > 0 {
            format!("Status: Cancelled {cancelled} download(s).")
        } else if self.pool.running_ids().is_empty() {
            "Status: No pending downloads to cancel.".to_string()
        } else {
            "Status: Unable to cancel active downloads.".to_string()
        };
        self.ctx.hooks.set_status(&message);
        cancelled
    }

    /// Cancel one job: withdraw it if it has not started, otherwise signal it.
    pub fn cancel(&self, id: QueueId) -> bool {
        if self.pool.remove(id) {
            self.control.unregister(id);
            self.ctx.queue.clear_paused(id);
            return self.mark_cancelled(id);
        }
        if self.control.request_cancel(id) {
            tracing::info!(queue_id = id, "cancel requested for running job");
            self.ctx.queue.cancel_item(id);
            return true;
        }
        // Parked while paused; resume() skips it.
        self.mark_cancelled(id)
    }

    /// Remove finished items from the queue. Counters restart once nothing
    /// is pending or running.
    pub fn clear_finished(&self) -> usize {
        let ids = self.ctx.queue.removable_items();
        for &id in &ids {
            self.ctx.queue.remove_item(id);
        }
        let stats = self.ctx.queue.stats();
        if stats.pending == 0 && stats.active == 0 {
            self.ctx.queue.reset_counters();
        }
        let message = if ids.is_empty() {
            "Status: No finished items to clear.".to_string()
        } else {
            format!("Status: Cleared {} finished item(s) from the queue.", ids.len())
        };
        self.ctx.hooks.set_status(&message);
        ids.len()
    }

    /// Block until no job is queued or running. Parked jobs do not count.
    pub fn wait_idle(&self) {
        self.pool.wait_idle();
    }

    /// Outcome of a finished job; each is handed out once.
    pub fn take_outcome(&self, id: QueueId) -> Option<TaskOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Cancel everything, join the workers and close the session pool.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let signalled = self.control.cancel_all();
        self.gate.resume();
        for id in self.pool.shutdown() {
            self.mark_cancelled(id);
        }
        for entry in self.ctx.queue.get_deferred() {
            self.mark_cancelled(entry.id);
        }
        self.ctx.sessions.close();
        tracing::info!(signalled, "downloader shut down");
    }

    /// `cancel_item`, progress back to 1, status `Cancelled`.
    fn mark_cancelled(&self, id: QueueId) -> bool {
        if !self.ctx.queue.cancel_item(id) {
            return false;
        }
        self.ctx.queue.reset_progress(id, 1);
        self.ctx.hooks.queue_reset_progress(id, 1);
        self.set_item_status(id, "Cancelled", QueueState::Cancelled);
        true
    }

    fn set_item_status(&self, id: QueueId, status: &str, state: QueueState) {
        self.ctx.queue.set_status(id, status);
        self.ctx.hooks.queue_set_status(id, status, Some(state));
    }
}

impl Drop for Downloader {
    fn drop(&mut self) {
        self.shutdown();
    }
}
