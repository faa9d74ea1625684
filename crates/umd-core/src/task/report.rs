//! Mirrors every job transition into the queue and the UI hooks.

use std::sync::Arc;

use super::hooks::UiHooks;
use crate::queue::{QueueId, QueueManager, QueueState};

pub(crate) struct Reporter {
    id: QueueId,
    queue: Arc<QueueManager>,
    hooks: Arc<dyn UiHooks>,
}

impl Reporter {
    pub(crate) fn new(id: QueueId, queue: Arc<QueueManager>, hooks: Arc<dyn UiHooks>) -> Self {
        Self { id, queue, hooks }
    }

    pub(crate) fn hooks(&self) -> &dyn UiHooks {
        &*self.hooks
    }

    /// Status line for a job that is still running.
    pub(crate) fn status(&self, status: &str) {
        self.status_with(status, Some(QueueState::Running));
    }

    pub(crate) fn status_with(&self, status: &str, state: Option<QueueState>) {
        self.queue.set_status(self.id, status);
        self.hooks.queue_set_status(self.id, status, state);
    }

    pub(crate) fn global(&self, message: &str) {
        self.hooks.set_status(message);
    }

    pub(crate) fn title(&self, title: &str) {
        self.queue.update_title(self.id, title);
        self.hooks.queue_update_title(self.id, title);
    }

    pub(crate) fn reset_progress(&self, maximum: u64) {
        self.queue.reset_progress(self.id, maximum);
        self.hooks.queue_reset_progress(self.id, maximum.max(1));
    }

    pub(crate) fn progress(&self, value: u64, maximum: Option<u64>) {
        self.queue.update_progress(self.id, value, maximum);
        self.hooks.queue_update_progress(self.id, value, maximum);
    }

    /// Terminal report. Ignored for a job that was cancelled meanwhile.
    pub(crate) fn finish(&self, success: bool, message: &str) {
        let error = (!success).then_some(message);
        if !self.queue.complete_item(self.id, success, error) {
            tracing::debug!(queue_id = self.id, "job already finished or cancelled");
            return;
        }
        self.queue.set_status(self.id, message);
        self.hooks
            .queue_mark_finished(self.id, success, Some(message));
    }

    pub(crate) fn cancelled(&self) {
        self.queue.cancel_item(self.id);
        self.status_with("Cancelled", Some(QueueState::Cancelled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::hooks::{event_channel, UiEvent};

    fn reporter() -> (Reporter, Arc<QueueManager>, std::sync::mpsc::Receiver<UiEvent>) {
        let queue = Arc::new(QueueManager::new());
        queue.add_item(1, "https://example.com/c.json", None);
        let (hooks, rx) = event_channel();
        (
            Reporter::new(1, Arc::clone(&queue), Arc::new(hooks)),
            queue,
            rx,
        )
    }

    #[test]
    fn finish_updates_queue_and_hooks() {
        let (r, queue, rx) = reporter();
        queue.start_item(1);
        r.finish(false, "No images found.");
        let item = queue.get_item(1).unwrap();
        assert_eq!(item.state, QueueState::Error);
        assert_eq!(item.status, "No images found.");
        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Finished {
                id: 1,
                success: false,
                message: Some("No images found.".into())
            }
        );
    }

    #[test]
    fn finish_after_cancel_is_silent() {
        let (r, queue, rx) = reporter();
        queue.start_item(1);
        queue.cancel_item(1);
        r.finish(true, "Completed");
        assert_eq!(queue.get_item(1).unwrap().state, QueueState::Cancelled);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancelled_marks_state_once() {
        let (r, queue, _rx) = reporter();
        queue.start_item(1);
        r.cancelled();
        r.cancelled();
        let s = queue.stats();
        assert_eq!((s.cancelled, s.total, s.active), (1, 0, 0));
        assert_eq!(queue.get_item(1).unwrap().status, "Cancelled");
    }
}
