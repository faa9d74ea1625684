//! Image phase: a bounded worker pool per chapter, throttled globally.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread;

use super::error::TaskError;
use super::report::Reporter;
use super::DownloadTask;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::scheduler::ProgressThrottle;
use crate::session::{HttpSession, PoolError};
use crate::storage::{temp_path, ImageWriter};
use crate::url_model::{image_extension, image_file_name};

impl DownloadTask {
    /// Download every image into `dir`. Returns the URLs that failed after
    /// retries, in submission order.
    pub(super) fn download_images(
        &self,
        r: &Reporter,
        urls: &[String],
        dir: &Path,
        display: &str,
    ) -> Result<Vec<String>, TaskError> {
        self.checkpoint()?;
        let total = urls.len();
        let workers = self.ctx.config.download.image_worker_count().min(total).max(1);
        r.reset_progress(total as u64);
        r.status(&format!("Downloading images (0/{total})…"));
        r.global(&format!("Status: {display} • Downloading images..."));
        tracing::info!(images = total, workers, dir = %dir.display(), "downloading images");

        let policy = self.ctx.config.download.retry_policy();
        let work: Mutex<VecDeque<(usize, &str)>> =
            Mutex::new(urls.iter().map(String::as_str).enumerate().collect());
        let (tx, rx) = mpsc::channel::<(usize, Result<PathBuf, FetchError>)>();
        let mut throttle = ProgressThrottle::new(self.ctx.config.ui.progress_interval());
        let mut failed: Vec<usize> = Vec::new();
        let mut completed = 0usize;

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let (work, policy) = (&work, &policy);
                scope.spawn(move || loop {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    let next = work
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some((index, url)) = next else {
                        break;
                    };
                    let res = self.fetch_image(index, url, dir, policy);
                    if tx.send((index, res)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for (index, res) in rx.iter() {
                completed += 1;
                match res {
                    Ok(path) => {
                        tracing::trace!(index = index + 1, path = %path.display(), "image saved")
                    }
                    Err(FetchError::Cancelled) => {}
                    Err(e) => {
                        let url = &urls[index];
                        tracing::warn!(
                            index = index + 1,
                            url = %url,
                            "image failed after retries: {}",
                            e.describe(url)
                        );
                        failed.push(index);
                    }
                }
                if throttle.should_emit(completed == total) {
                    r.progress(completed as u64, None);
                    r.status(&format!("Downloading images ({completed}/{total})…"));
                    r.global(&format!(
                        "Status: {display} • {completed}/{total} image(s) downloaded"
                    ));
                }
            }
        });

        self.cancel.check()?;
        failed.sort_unstable();
        if failed.is_empty() {
            r.status("Images downloaded.");
        } else {
            r.status(&format!("Images downloaded with {} failure(s).", failed.len()));
        }
        Ok(failed.into_iter().map(|i| urls[i].clone()).collect())
    }

    /// Global permit, then a session, then the host guard for each attempt.
    fn fetch_image(
        &self,
        index: usize,
        url: &str,
        dir: &Path,
        policy: &RetryPolicy,
    ) -> Result<PathBuf, FetchError> {
        let _permit = self
            .ctx
            .budget
            .acquire(&self.cancel)
            .map_err(|_| FetchError::Cancelled)?;
        let mut session = match self.ctx.sessions.acquire() {
            Ok(s) => s,
            Err(PoolError::Closed) => return Err(FetchError::Cancelled),
            Err(PoolError::Create(e)) => return Err(FetchError::Curl(e)),
        };
        run_with_retry(
            policy,
            |_attempt| {
                self.gate
                    .wait(&self.cancel)
                    .map_err(|_| FetchError::Cancelled)?;
                self.ctx
                    .hosts
                    .run(url, || self.stream_image(&mut session, index, url, dir))
            },
            |notice| {
                tracing::debug!(
                    index = index + 1,
                    attempt = notice.attempt,
                    max_attempts = notice.max_attempts,
                    delay = ?notice.delay,
                    "retrying image: {}",
                    notice.error
                );
                !self.cancel.is_cancelled()
            },
        )
    }

    /// Stream one image to `NNN.part`, then rename to `NNN<ext>`.
    fn stream_image(
        &self,
        session: &mut HttpSession,
        index: usize,
        url: &str,
        dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let mut writer = ImageWriter::create(&temp_path(&dir.join(format!("{:03}", index + 1))))?;
        let response = session.get_streaming(url, &[("Referer", self.url.as_str())], |chunk| {
            self.gate
                .wait(&self.cancel)
                .map_err(|_| FetchError::Cancelled)?;
            writer.write_chunk(chunk)?;
            Ok(())
        })?;
        let ext = image_extension(url, response.content_type.as_deref());
        let final_path = dir.join(image_file_name(index, &ext));
        tracing::trace!(index = index + 1, bytes = writer.bytes_written(), "image body received");
        writer.finalize(&final_path)?;
        Ok(final_path)
    }
}
