//! `umd download` – fetch chapters and print their progress.
//!
//! The main thread is the event consumer: workers report through the
//! channel and only this loop writes to stdout.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use umd_core::config::UmdConfig;
use umd_core::plugin::builtin::default_registry;
use umd_core::queue::{QueueItem, QueueState};
use umd_core::scheduler::Downloader;
use umd_core::task::{event_channel, TaskOutcome, UiEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct DownloadArgs {
    pub urls: Vec<String>,
    pub output: Option<PathBuf>,
    pub chapter_workers: Option<usize>,
    pub image_workers: Option<usize>,
    pub no_cbz: bool,
    pub no_checksums: bool,
}

impl DownloadArgs {
    /// Command-line flags take precedence over the config file.
    pub fn apply(&self, cfg: &mut UmdConfig) {
        if let Some(dir) = &self.output {
            cfg.download.download_dir = Some(dir.clone());
        }
        if let Some(n) = self.chapter_workers {
            cfg.download.chapter_workers = n;
        }
        if let Some(n) = self.image_workers {
            cfg.download.image_workers = n;
        }
    }
}

pub fn run_download(mut cfg: UmdConfig, args: DownloadArgs) -> Result<()> {
    args.apply(&mut cfg);

    let mut plugins = default_registry();
    if args.no_cbz {
        plugins.set_enabled("CBZ", false);
    }
    if args.no_checksums {
        plugins.set_enabled("SHA-256", false);
    }

    let (hooks, events) = event_channel();
    let downloader = Downloader::new(cfg, plugins, Arc::new(hooks))?;
    let ids: Vec<_> = args
        .urls
        .iter()
        .map(|url| downloader.submit(url, None))
        .collect();
    tracing::info!(chapters = ids.len(), "submitted");

    drain_until_idle(&downloader, &events);
    downloader.wait_idle();
    for event in events.try_iter() {
        print_event(&event);
    }

    println!();
    println!("{:<4} {:<10} {}", "ID", "STATE", "CHAPTER");
    let mut failed = 0;
    for id in &ids {
        let Some(item) = downloader.queue().get_item(*id) else {
            continue;
        };
        println!("{}", summary_line(&item));
        match downloader.take_outcome(*id) {
            Some(TaskOutcome::Completed {
                dir,
                failed_urls,
                outputs,
            }) => {
                println!("     saved to {}", dir.display());
                for out in outputs {
                    println!("     wrote {}", out.display());
                }
                for url in failed_urls {
                    println!("     missing {url}");
                }
            }
            Some(TaskOutcome::Failed { .. }) => failed += 1,
            Some(TaskOutcome::Cancelled) | None => {}
        }
    }
    downloader.shutdown();

    if failed > 0 {
        bail!("{failed} of {} chapter(s) failed", ids.len());
    }
    Ok(())
}

fn drain_until_idle(downloader: &Downloader, events: &Receiver<UiEvent>) {
    loop {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => print_event(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
        let stats = downloader.queue().stats();
        if stats.pending == 0 && stats.active == 0 {
            return;
        }
    }
}

fn print_event(event: &UiEvent) {
    if let Some(line) = render_event(event) {
        println!("{line}");
    }
}

/// One stdout line per interesting event; progress counters and the global
/// status line only go to the log.
pub(crate) fn render_event(event: &UiEvent) -> Option<String> {
    match event {
        UiEvent::Started { id, label } => Some(format!("[{id}] started {label}")),
        UiEvent::Title { id, title } => Some(format!("[{id}] {title}")),
        UiEvent::Status { id, status, .. } => Some(format!("[{id}] {status}")),
        UiEvent::Finished {
            id,
            success,
            message,
        } => {
            let mark = if *success { "done" } else { "FAILED" };
            Some(match message {
                Some(msg) => format!("[{id}] {mark}: {msg}"),
                None => format!("[{id}] {mark}"),
            })
        }
        UiEvent::GlobalStatus(msg) => {
            tracing::debug!("{msg}");
            None
        }
        UiEvent::Ended { .. } | UiEvent::ResetProgress { .. } | UiEvent::Progress { .. } => None,
    }
}

pub(crate) fn summary_line(item: &QueueItem) -> String {
    let detail = match item.state {
        QueueState::Error => item.error_message.as_deref().unwrap_or(&item.status),
        _ => item.status.as_str(),
    };
    format!(
        "{:<4} {:<10} {} ({})",
        item.id,
        item.state.label(),
        item.display_label(),
        detail
    )
}
