use serde::Serialize;

pub type QueueId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Pending,
    Running,
    Success,
    Error,
    Paused,
    Cancelled,
}

impl QueueState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueueState::Success | QueueState::Error | QueueState::Cancelled
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            QueueState::Pending => "pending",
            QueueState::Running => "running",
            QueueState::Success => "success",
            QueueState::Error => "error",
            QueueState::Paused => "paused",
            QueueState::Cancelled => "cancelled",
        }
    }

    /// Display color for the status text; pending items use the default color.
    pub fn color(self) -> Option<&'static str> {
        match self {
            QueueState::Success => Some("#1a7f37"),
            QueueState::Error => Some("#b91c1c"),
            QueueState::Running => Some("#1d4ed8"),
            QueueState::Paused => Some("#d97706"),
            QueueState::Cancelled => Some("#6b7280"),
            QueueState::Pending => None,
        }
    }
}

/// Snapshot of one job. Only `QueueManager` mutates the stored copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    pub id: QueueId,
    pub url: String,
    pub initial_label: Option<String>,
    /// `{title} — {chapter}` once the page has been parsed.
    pub title: Option<String>,
    pub state: QueueState,
    pub status: String,
    pub progress: u64,
    pub maximum: u64,
    pub error_message: Option<String>,
}

impl QueueItem {
    pub(crate) fn new(id: QueueId, url: &str, initial_label: Option<&str>) -> Self {
        Self {
            id,
            url: url.to_string(),
            initial_label: initial_label.map(str::to_string),
            title: None,
            state: QueueState::Pending,
            status: "Pending".to_string(),
            progress: 0,
            maximum: 1,
            error_message: None,
        }
    }

    /// Best label for display: parsed title, then submission label, then URL.
    pub fn display_label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.initial_label.as_deref())
            .unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub active: usize,
    /// Finished jobs, successful or not.
    pub completed: usize,
    /// Subset of `completed` that ended in error.
    pub failed: usize,
    pub cancelled: usize,
}

/// Job parked while the queue is paused; resubmitted once on resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredEntry {
    pub id: QueueId,
    pub url: String,
    pub initial_label: Option<String>,
}
