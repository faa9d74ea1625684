use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::state::{DeferredEntry, QueueId, QueueItem, QueueState, QueueStats};

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<QueueId, QueueItem>,
    /// Submission order, for listing.
    order: Vec<QueueId>,
    stats: QueueStats,
    deferred: Vec<DeferredEntry>,
    cancelled: HashSet<QueueId>,
    paused: HashSet<QueueId>,
    paused_globally: bool,
}

impl Inner {
    /// Remove the item from the counter that matches its current state.
    fn leave(&mut self, state: QueueState) {
        match state {
            QueueState::Pending | QueueState::Paused => {
                self.stats.pending = self.stats.pending.saturating_sub(1);
            }
            QueueState::Running => {
                self.stats.active = self.stats.active.saturating_sub(1);
            }
            QueueState::Success | QueueState::Error | QueueState::Cancelled => {}
        }
    }
}

/// Registry of queue items. All methods lock once and return snapshots.
#[derive(Debug, Default)]
pub struct QueueManager {
    inner: Mutex<Inner>,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new job in `Pending`. Returns false if the id is already known.
    pub fn add_item(&self, id: QueueId, url: &str, label: Option<&str>) -> bool {
        let mut inner = self.lock();
        if inner.items.contains_key(&id) {
            tracing::warn!(queue_id = id, "duplicate queue id ignored");
            return false;
        }
        inner.items.insert(id, QueueItem::new(id, url, label));
        inner.order.push(id);
        inner.stats.pending += 1;
        inner.stats.total += 1;
        true
    }

    /// `Pending|Paused → Running`.
    pub fn start_item(&self, id: QueueId) -> bool {
        let mut inner = self.lock();
        let prior = match inner.items.get(&id) {
            Some(item) if matches!(item.state, QueueState::Pending | QueueState::Paused) => {
                item.state
            }
            _ => return false,
        };
        inner.leave(prior);
        inner.stats.active += 1;
        if let Some(item) = inner.items.get_mut(&id) {
            item.state = QueueState::Running;
            item.error_message = None;
        }
        true
    }

    /// `Running → Success|Error`. Any other state is left alone.
    pub fn complete_item(&self, id: QueueId, success: bool, error: Option<&str>) -> bool {
        let mut inner = self.lock();
        if !inner
            .items
            .get(&id)
            .is_some_and(|item| item.state == QueueState::Running)
        {
            return false;
        }
        inner.leave(QueueState::Running);
        inner.stats.completed = (inner.stats.completed + 1).min(inner.stats.total);
        if !success {
            inner.stats.failed += 1;
        }
        if let Some(item) = inner.items.get_mut(&id) {
            item.state = if success {
                QueueState::Success
            } else {
                QueueState::Error
            };
            item.error_message = error.map(str::to_string);
        }
        true
    }

    /// Cancel a job that has not finished and drop it from `total`.
    ///
    /// The id is remembered as cancelled even if the item is unknown or
    /// already finished, so late checks from worker threads still see it.
    pub fn cancel_item(&self, id: QueueId) -> bool {
        let mut inner = self.lock();
        inner.cancelled.insert(id);
        let prior = match inner.items.get(&id) {
            Some(item) if !item.state.is_terminal() => item.state,
            _ => return false,
        };
        inner.leave(prior);
        inner.stats.total = inner.stats.total.saturating_sub(1);
        inner.stats.cancelled += 1;
        if let Some(item) = inner.items.get_mut(&id) {
            item.state = QueueState::Cancelled;
        }
        true
    }

    /// Mark a job as paused. A pending job shows `Paused`; counters are unchanged.
    pub fn pause_item(&self, id: QueueId) {
        let mut inner = self.lock();
        inner.paused.insert(id);
        if let Some(item) = inner.items.get_mut(&id) {
            if item.state == QueueState::Pending {
                item.state = QueueState::Paused;
            }
        }
    }

    pub fn clear_paused(&self, id: QueueId) {
        let mut inner = self.lock();
        inner.paused.remove(&id);
        if let Some(item) = inner.items.get_mut(&id) {
            if item.state == QueueState::Paused {
                item.state = QueueState::Pending;
            }
        }
    }

    pub fn is_item_paused(&self, id: QueueId) -> bool {
        self.lock().paused.contains(&id)
    }

    pub fn is_cancelled(&self, id: QueueId) -> bool {
        self.lock().cancelled.contains(&id)
    }

    pub fn clear_cancelled(&self, id: QueueId) {
        self.lock().cancelled.remove(&id);
    }

    /// Set progress (clamped to `[0, maximum]`), optionally changing `maximum` (floor 1).
    pub fn update_progress(&self, id: QueueId, value: u64, maximum: Option<u64>) {
        let mut inner = self.lock();
        if let Some(item) = inner.items.get_mut(&id) {
            if let Some(m) = maximum {
                item.maximum = m.max(1);
            }
            item.progress = value.min(item.maximum);
        }
    }

    pub fn reset_progress(&self, id: QueueId, maximum: u64) {
        let mut inner = self.lock();
        if let Some(item) = inner.items.get_mut(&id) {
            item.maximum = maximum.max(1);
            item.progress = 0;
        }
    }

    pub fn update_title(&self, id: QueueId, title: &str) {
        let mut inner = self.lock();
        if let Some(item) = inner.items.get_mut(&id) {
            item.title = Some(title.to_string());
        }
    }

    /// Store the human-readable status line for a job.
    pub fn set_status(&self, id: QueueId, status: &str) {
        let mut inner = self.lock();
        if let Some(item) = inner.items.get_mut(&id) {
            item.status = status.to_string();
        }
    }

    pub fn add_deferred(&self, entry: DeferredEntry) {
        self.lock().deferred.push(entry);
    }

    /// Return and clear the deferred list; each entry is delivered at most once.
    pub fn get_deferred(&self) -> Vec<DeferredEntry> {
        std::mem::take(&mut self.lock().deferred)
    }

    pub fn deferred_len(&self) -> usize {
        self.lock().deferred.len()
    }

    /// Global pause flag consulted when new jobs are submitted.
    pub fn pause(&self) {
        self.lock().paused_globally = true;
    }

    pub fn resume(&self) {
        self.lock().paused_globally = false;
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused_globally
    }

    pub fn get_item(&self, id: QueueId) -> Option<QueueItem> {
        self.lock().items.get(&id).cloned()
    }

    /// Forget an item. Counters are not touched.
    pub fn remove_item(&self, id: QueueId) -> Option<QueueItem> {
        let mut inner = self.lock();
        let removed = inner.items.remove(&id);
        if removed.is_some() {
            inner.order.retain(|x| *x != id);
            inner.paused.remove(&id);
            inner.cancelled.remove(&id);
        }
        removed
    }

    /// All items in submission order.
    pub fn items(&self) -> Vec<QueueItem> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.items.get(id).cloned())
            .collect()
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats
    }

    /// Ids in `Success`, `Error` or `Cancelled`, in submission order.
    pub fn removable_items(&self) -> Vec<QueueId> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .items
                    .get(id)
                    .is_some_and(|item| item.state.is_terminal())
            })
            .copied()
            .collect()
    }

    pub fn reset_counters(&self) {
        self.lock().stats = QueueStats::default();
    }
}
