//! Directory and disk-space checks before any image is requested.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::error::TaskError;
use super::DownloadTask;
use crate::plugin::ChapterData;
use crate::storage::{check_disk_space, estimate_chapter_bytes};
use crate::url_model::compose_chapter_name;

impl DownloadTask {
    /// Create `<download root>/<title - chapter>` and return its canonical path.
    ///
    /// The folder must be a single path component and must still resolve
    /// inside the root once symlinks are followed.
    pub(super) fn prepare_dir(&self, chapter: &ChapterData) -> Result<PathBuf, TaskError> {
        let folder = compose_chapter_name(&chapter.title, &chapter.chapter);
        let mut parts = Path::new(&folder).components();
        if !matches!(
            (parts.next(), parts.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(TaskError::Directory(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid chapter folder name {folder:?}"),
            )));
        }

        let root = &self.ctx.download_root;
        fs::create_dir_all(root).map_err(TaskError::Directory)?;
        let real_root = fs::canonicalize(root).map_err(TaskError::Directory)?;
        let dir = real_root.join(&folder);
        fs::create_dir_all(&dir).map_err(TaskError::Directory)?;
        let real_dir = fs::canonicalize(&dir).map_err(TaskError::Directory)?;
        if !real_dir.starts_with(&real_root) {
            tracing::error!(
                dir = %real_dir.display(),
                root = %real_root.display(),
                "chapter directory escapes download root"
            );
            return Err(TaskError::Directory(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "chapter directory outside download root",
            )));
        }
        tracing::debug!(dir = %real_dir.display(), "chapter directory ready");
        Ok(real_dir)
    }

    pub(super) fn preflight_disk(
        &self,
        dir: &Path,
        image_count: usize,
        chapter_label: &str,
    ) -> Result<(), TaskError> {
        let disk = &self.ctx.config.disk;
        let estimate = estimate_chapter_bytes(image_count, disk);
        let check = check_disk_space(&*self.ctx.probe, dir, estimate, disk);
        if check.sufficient {
            if check.free.is_none() {
                tracing::debug!(dir = %dir.display(), "free space unknown, continuing");
            }
            return Ok(());
        }
        let message = check.message();
        tracing::warn!(chapter = chapter_label, "{message}");
        Err(TaskError::DiskSpace(message))
    }
}

/// Remove a failed chapter directory, logging instead of failing.
pub(super) fn cleanup_dir(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => tracing::info!(dir = %dir.display(), "removed failed download directory"),
        Err(e) => tracing::warn!(dir = %dir.display(), "could not remove failed download directory: {}", e),
    }
}
