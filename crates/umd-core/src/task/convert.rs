//! Converter phase.

use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use super::error::TaskError;
use super::report::Reporter;
use super::{panic_message, DownloadTask};
use crate::plugin::ChapterMetadata;
use crate::url_model::is_image_path;

impl DownloadTask {
    /// Run every enabled converter; one failing does not stop the others.
    pub(super) fn run_converters(
        &self,
        r: &Reporter,
        dir: &Path,
        metadata: &ChapterMetadata,
        display: &str,
    ) -> Result<Vec<PathBuf>, TaskError> {
        let images = collect_image_files(dir).map_err(|e| {
            tracing::error!(dir = %dir.display(), "cannot list chapter images: {}", e);
            TaskError::Conversion
        })?;
        if images.is_empty() {
            r.global(&format!(
                "Status: {display} • No images available for conversion."
            ));
            return Err(TaskError::Conversion);
        }

        let converters = self.ctx.plugins.enabled_converters();
        if converters.is_empty() {
            r.status("Images downloaded (no converters enabled).");
            return Ok(Vec::new());
        }

        let mut outputs = Vec::new();
        for converter in &converters {
            let name = converter.name();
            r.status(&format!("Converting with {name}…"));
            r.global(&format!("Status: {display} • Converting with {name}..."));
            self.checkpoint()?;
            let result =
                panic::catch_unwind(AssertUnwindSafe(|| converter.convert(&images, dir, metadata)))
                    .unwrap_or_else(|payload| Err(anyhow::anyhow!(panic_message(&*payload))));
            match result {
                Err(e) => {
                    tracing::error!(converter = name, "converter failed: {e:#}");
                    r.status(&format!("{name} failed: {e}"));
                }
                Ok(None) => r.status(&format!("{name} produced no output.")),
                Ok(Some(path)) => {
                    let file = path
                        .file_name()
                        .map(|f| f.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    tracing::info!(converter = name, path = %path.display(), "conversion done");
                    r.status(&format!("{name} created {file}"));
                    outputs.push(path);
                }
            }
        }
        if outputs.is_empty() {
            Err(TaskError::Conversion)
        } else {
            Ok(outputs)
        }
    }
}

/// Image files directly inside `dir`, sorted by name.
pub fn collect_image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_path(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
