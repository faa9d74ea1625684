//! UI sink for job progress.
//!
//! The engine never touches a UI directly. Every transition is reported
//! through [`UiHooks`]; [`EventSender`] turns the calls into [`UiEvent`]s on a
//! channel so a single owner thread can apply them in order.

use std::sync::mpsc;

use crate::queue::{QueueId, QueueState};

/// Callbacks made by running jobs, from worker threads.
pub trait UiHooks: Send + Sync {
    fn on_start(&self, id: QueueId, label: &str);
    fn on_end(&self, id: QueueId, label: &str);
    fn queue_set_status(&self, id: QueueId, status: &str, state: Option<QueueState>);
    fn queue_mark_finished(&self, id: QueueId, success: bool, message: Option<&str>);
    fn queue_update_title(&self, id: QueueId, title: &str);
    fn queue_reset_progress(&self, id: QueueId, maximum: u64);
    fn queue_update_progress(&self, id: QueueId, value: u64, maximum: Option<u64>);
    /// Application-wide status line.
    fn set_status(&self, message: &str);
}

/// One [`UiHooks`] call, as delivered to the owner thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Started {
        id: QueueId,
        label: String,
    },
    Ended {
        id: QueueId,
        label: String,
    },
    Status {
        id: QueueId,
        status: String,
        state: Option<QueueState>,
    },
    Finished {
        id: QueueId,
        success: bool,
        message: Option<String>,
    },
    Title {
        id: QueueId,
        title: String,
    },
    ResetProgress {
        id: QueueId,
        maximum: u64,
    },
    Progress {
        id: QueueId,
        value: u64,
        maximum: Option<u64>,
    },
    GlobalStatus(String),
}

/// [`UiHooks`] that forwards every call over an mpsc channel.
///
/// Sends after the receiver is gone are dropped silently.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<UiEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<UiEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }
}

/// Sender/receiver pair for wiring a [`Downloader`](crate::scheduler::Downloader) to a UI loop.
pub fn event_channel() -> (EventSender, mpsc::Receiver<UiEvent>) {
    let (tx, rx) = mpsc::channel();
    (EventSender::new(tx), rx)
}

impl UiHooks for EventSender {
    fn on_start(&self, id: QueueId, label: &str) {
        self.send(UiEvent::Started {
            id,
            label: label.to_string(),
        });
    }

    fn on_end(&self, id: QueueId, label: &str) {
        self.send(UiEvent::Ended {
            id,
            label: label.to_string(),
        });
    }

    fn queue_set_status(&self, id: QueueId, status: &str, state: Option<QueueState>) {
        self.send(UiEvent::Status {
            id,
            status: status.to_string(),
            state,
        });
    }

    fn queue_mark_finished(&self, id: QueueId, success: bool, message: Option<&str>) {
        self.send(UiEvent::Finished {
            id,
            success,
            message: message.map(str::to_string),
        });
    }

    fn queue_update_title(&self, id: QueueId, title: &str) {
        self.send(UiEvent::Title {
            id,
            title: title.to_string(),
        });
    }

    fn queue_reset_progress(&self, id: QueueId, maximum: u64) {
        self.send(UiEvent::ResetProgress { id, maximum });
    }

    fn queue_update_progress(&self, id: QueueId, value: u64, maximum: Option<u64>) {
        self.send(UiEvent::Progress { id, value, maximum });
    }

    fn set_status(&self, message: &str) {
        self.send(UiEvent::GlobalStatus(message.to_string()));
    }
}

/// Hooks that ignore everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl UiHooks for NoopHooks {
    fn on_start(&self, _id: QueueId, _label: &str) {}
    fn on_end(&self, _id: QueueId, _label: &str) {}
    fn queue_set_status(&self, _id: QueueId, _status: &str, _state: Option<QueueState>) {}
    fn queue_mark_finished(&self, _id: QueueId, _success: bool, _message: Option<&str>) {}
    fn queue_update_title(&self, _id: QueueId, _title: &str) {}
    fn queue_reset_progress(&self, _id: QueueId, _maximum: u64) {}
    fn queue_update_progress(&self, _id: QueueId, _value: u64, _maximum: Option<u64>) {}
    fn set_status(&self, _message: &str) {}
}
