//! Per-job download pipeline.
//!
//! [`DownloadTask::run`] takes one queue item through fetch → parse →
//! directory → disk preflight → images → converters, reporting each step to
//! the [`QueueManager`] and the [`UiHooks`]. It blocks, so it runs on a
//! chapter worker thread. Between phases (and per image chunk) it waits on
//! the shared pause gate and checks its cancel token.

mod convert;
mod error;
mod hooks;
mod images;
mod page;
mod prepare;
mod report;

pub use convert::collect_image_files;
pub use error::TaskError;
pub use hooks::{event_channel, EventSender, NoopHooks, UiEvent, UiHooks};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::UmdConfig;
use crate::control::{CancelToken, PauseGate};
use crate::host_policy::HostGuards;
use crate::plugin::{ChapterMetadata, PluginRegistry};
use crate::queue::{QueueId, QueueManager};
use crate::scheduler::ImageBudget;
use crate::session::{SessionPool, SessionSettings};
use crate::storage::{FreeSpaceProbe, StatvfsProbe};

use report::Reporter;

/// Everything a task shares with the other jobs of one downloader.
pub struct TaskContext {
    pub config: UmdConfig,
    pub download_root: PathBuf,
    pub queue: Arc<QueueManager>,
    pub sessions: Arc<SessionPool>,
    pub hosts: Arc<HostGuards>,
    pub plugins: Arc<PluginRegistry>,
    pub budget: Arc<ImageBudget>,
    pub hooks: Arc<dyn UiHooks>,
    pub probe: Arc<dyn FreeSpaceProbe>,
}

impl TaskContext {
    /// Build the shared pieces from `config`. Free space is read with `statvfs`.
    pub fn new(config: UmdConfig, plugins: PluginRegistry, hooks: Arc<dyn UiHooks>) -> Self {
        let settings = SessionSettings::from_config(&config.download);
        Self {
            download_root: config.download.download_root(),
            queue: Arc::new(QueueManager::new()),
            sessions: Arc::new(SessionPool::from_config(&config, settings)),
            hosts: Arc::new(HostGuards::from_config(&config)),
            plugins: Arc::new(plugins),
            budget: Arc::new(ImageBudget::new(config.download.global_image_limit())),
            hooks,
            probe: Arc::new(StatvfsProbe),
            config,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn FreeSpaceProbe>) -> Self {
        self.probe = probe;
        self
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// All or some images were saved and conversion succeeded.
    Completed {
        dir: PathBuf,
        failed_urls: Vec<String>,
        outputs: Vec<PathBuf>,
    },
    Failed {
        message: String,
    },
    Cancelled,
}

struct Downloaded {
    dir: PathBuf,
    failed_urls: Vec<String>,
    outputs: Vec<PathBuf>,
}

/// Emits `on_end` however `run` exits.
struct EndGuard<'a> {
    hooks: &'a dyn UiHooks,
    id: QueueId,
    label: &'a str,
}

impl Drop for EndGuard<'_> {
    fn drop(&mut self) {
        self.hooks.on_end(self.id, self.label);
    }
}

/// One queued chapter download.
pub struct DownloadTask {
    queue_id: QueueId,
    url: String,
    label: Option<String>,
    ctx: Arc<TaskContext>,
    cancel: CancelToken,
    gate: Arc<PauseGate>,
}

impl DownloadTask {
    pub fn new(
        queue_id: QueueId,
        url: impl Into<String>,
        label: Option<String>,
        ctx: Arc<TaskContext>,
    ) -> Self {
        Self {
            queue_id,
            url: url.into(),
            label,
            ctx,
            cancel: CancelToken::new(),
            gate: Arc::new(PauseGate::new()),
        }
    }

    /// Use a token and gate owned by a scheduler instead of private ones.
    pub fn with_control(mut self, cancel: CancelToken, gate: Arc<PauseGate>) -> Self {
        self.cancel = cancel;
        self.gate = gate;
        self
    }

    pub fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run the whole pipeline on the calling thread.
    ///
    /// Never panics: a panic inside the pipeline becomes
    /// `Unexpected error: …`. `on_start` and `on_end` are each emitted once.
    pub fn run(&self) -> TaskOutcome {
        let label = self.label.clone().unwrap_or_else(|| self.url.clone());
        let reporter = Reporter::new(
            self.queue_id,
            Arc::clone(&self.ctx.queue),
            Arc::clone(&self.ctx.hooks),
        );
        reporter.hooks().on_start(self.queue_id, &label);
        let _end = EndGuard {
            hooks: reporter.hooks(),
            id: self.queue_id,
            label: &label,
        };
        let span = tracing::info_span!("chapter", queue_id = self.queue_id);
        let _entered = span.enter();

        self.ctx.queue.start_item(self.queue_id);
        reporter.status("Starting download…");
        reporter.reset_progress(1);
        reporter.global(&format!("Status: Downloading {label}..."));
        tracing::info!(url = %self.url, "download started");

        let mut display = label.clone();
        let mut dir = None;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline(&reporter, &mut display, &mut dir)
        }))
        .unwrap_or_else(|payload| Err(TaskError::Unexpected(panic_message(&*payload))));

        self.conclude(result, &reporter, &display, dir)
    }

    fn checkpoint(&self) -> Result<(), TaskError> {
        self.gate.wait(&self.cancel)?;
        Ok(())
    }

    fn pipeline(
        &self,
        r: &Reporter,
        display: &mut String,
        dir_slot: &mut Option<PathBuf>,
    ) -> Result<Downloaded, TaskError> {
        self.checkpoint()?;
        let page = self.fetch_page(r, display)?;
        self.checkpoint()?;
        let chapter = self.parse_chapter(&page, r, display)?;

        *display = format!("{} — {}", chapter.title, chapter.chapter);
        r.title(display);
        r.status("Preparing download…");
        if chapter.image_urls.is_empty() {
            return Err(TaskError::NoImages);
        }

        let dir = self.prepare_dir(&chapter)?;
        *dir_slot = Some(dir.clone());
        self.checkpoint()?;
        self.preflight_disk(&dir, chapter.image_urls.len(), display)?;

        let failed_urls = self.download_images(r, &chapter.image_urls, &dir, display)?;
        if failed_urls.len() == chapter.image_urls.len() {
            return Err(TaskError::AllImagesFailed);
        }

        let metadata = ChapterMetadata {
            title: chapter.title,
            chapter: chapter.chapter,
            source_url: self.url.clone(),
        };
        let outputs = self.run_converters(r, &dir, &metadata, display)?;
        Ok(Downloaded {
            dir,
            failed_urls,
            outputs,
        })
    }

    /// Send the terminal report and build the outcome.
    fn conclude(
        &self,
        result: Result<Downloaded, TaskError>,
        r: &Reporter,
        display: &str,
        dir: Option<PathBuf>,
    ) -> TaskOutcome {
        match result {
            Ok(done) => {
                let message = if done.failed_urls.is_empty() {
                    r.global(&format!("Status: Completed {display}."));
                    "Completed".to_string()
                } else {
                    let n = done.failed_urls.len();
                    tracing::warn!(failed = n, urls = ?done.failed_urls, "chapter completed with failed images");
                    r.global(&format!(
                        "Status: Completed {display} with {n} failed image(s)."
                    ));
                    format!("Completed with {n} failed image(s).")
                };
                tracing::info!(dir = %done.dir.display(), "{message}");
                r.finish(true, &message);
                TaskOutcome::Completed {
                    dir: done.dir,
                    failed_urls: done.failed_urls,
                    outputs: done.outputs,
                }
            }
            Err(TaskError::Cancelled) => {
                tracing::info!("download cancelled");
                r.cancelled();
                r.global(&format!("Status: Cancelled {display}."));
                TaskOutcome::Cancelled
            }
            Err(e) => {
                if e.removes_directory() && self.ctx.config.download.cleanup_on_failure {
                    if let Some(dir) = &dir {
                        prepare::cleanup_dir(dir);
                    }
                }
                let message = e.to_string();
                match &e {
                    TaskError::Unexpected(_) => tracing::error!(url = %self.url, "{message}"),
                    _ => tracing::warn!(url = %self.url, error = ?e, "download failed: {message}"),
                }
                r.finish(false, &message);
                r.global(&format!("Status: {display} • {message}"));
                TaskOutcome::Failed { message }
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests;
