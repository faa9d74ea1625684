use crate::control::JobCancelled;
use crate::session::PoolError;

/// Why a job stopped before completing. `Display` is the queue status text.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Cancelled")]
    Cancelled,
    #[error("Network error after {attempts} attempts: {detail}")]
    Network { attempts: u32, detail: String },
    /// The host's breaker is open; message is `circuit open for {host}`.
    #[error("{0}")]
    CircuitOpen(String),
    #[error("Network error: {0}")]
    Session(#[from] PoolError),
    #[error("No parser plugins enabled.")]
    NoParsers,
    #[error("No suitable parser found.")]
    NoSuitableParser,
    #[error("No images found.")]
    NoImages,
    #[error("Unable to prepare download directory.")]
    Directory(#[source] std::io::Error),
    /// Disk preflight failed; carries the full user-facing message.
    #[error("{0}")]
    DiskSpace(String),
    #[error("All image downloads failed.")]
    AllImagesFailed,
    #[error("Conversion failed.")]
    Conversion,
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl TaskError {
    /// Failures that leave a partial chapter directory worth removing.
    pub fn removes_directory(&self) -> bool {
        matches!(self, TaskError::AllImagesFailed | TaskError::Conversion)
    }
}

impl From<JobCancelled> for TaskError {
    fn from(_: JobCancelled) -> Self {
        TaskError::Cancelled
    }
}
