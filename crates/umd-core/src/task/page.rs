//! Fetch and parse phases.

use super::error::TaskError;
use super::report::Reporter;
use super::DownloadTask;
use crate::plugin::ChapterData;
use crate::retry::{run_with_retry, FetchError};

impl DownloadTask {
    /// GET the chapter page through the host guard, retrying per the download policy.
    pub(super) fn fetch_page(&self, r: &Reporter, display: &str) -> Result<String, TaskError> {
        r.status("Fetching chapter page…");
        r.global(&format!("Status: Fetching {display}..."));

        let policy = self.ctx.config.download.retry_policy();
        let mut session = self.ctx.sessions.acquire()?;
        let mut attempts = 0u32;
        let result = run_with_retry(
            &policy,
            |attempt| {
                attempts = attempt;
                self.gate
                    .wait(&self.cancel)
                    .map_err(|_| FetchError::Cancelled)?;
                self.ctx
                    .hosts
                    .run(&self.url, || session.get_text(&self.url, &[]))
            },
            |notice| {
                tracing::info!(
                    attempt = notice.attempt,
                    max_retries = policy.max_retries(),
                    delay = ?notice.delay,
                    "retrying chapter page: {}",
                    notice.error
                );
                r.status(&format!(
                    "Retrying ({}/{})…",
                    notice.attempt,
                    policy.max_retries()
                ));
                !self.cancel.is_cancelled()
            },
        );

        match result {
            Ok(page) => Ok(page),
            Err(FetchError::Cancelled) => Err(TaskError::Cancelled),
            Err(e @ FetchError::CircuitOpen(_)) => {
                let message = e.describe(&self.url);
                tracing::warn!(url = %self.url, "{message}");
                Err(TaskError::CircuitOpen(message))
            }
            Err(e) => {
                let detail = e.describe(&self.url);
                tracing::error!(url = %self.url, attempts, "failed to fetch chapter page: {detail}");
                r.global(&format!("Status: Failed to fetch {display} - {detail}"));
                Err(TaskError::Network { attempts, detail })
            }
        }
    }

    /// First enabled parser that can handle the URL and returns data wins.
    pub(super) fn parse_chapter(
        &self,
        page: &str,
        r: &Reporter,
        display: &str,
    ) -> Result<ChapterData, TaskError> {
        let parsers = self.ctx.plugins.enabled_parsers();
        if parsers.is_empty() {
            return Err(TaskError::NoParsers);
        }
        for parser in &parsers {
            if !parser.can_handle(&self.url) {
                continue;
            }
            r.status(&format!("Parsing with {}…", parser.name()));
            r.global(&format!(
                "Status: {display} • trying parser {}...",
                parser.name()
            ));
            if let Some(data) = parser.parse(page, &self.url) {
                tracing::debug!(
                    parser = parser.name(),
                    images = data.image_urls.len(),
                    "chapter page parsed"
                );
                return Ok(data);
            }
        }
        Err(TaskError::NoSuitableParser)
    }
}
