//! Free-space preflight before a chapter's images are requested.

use std::path::Path;

use crate::config::DiskConfig;

const MIB: f64 = 1024.0 * 1024.0;

/// Source of free-space figures; swapped out in tests.
pub trait FreeSpaceProbe: Send + Sync {
    /// Bytes available to unprivileged writers on the filesystem holding
    /// `path`, or `None` if that cannot be determined.
    fn free_bytes(&self, path: &Path) -> Option<u64>;
}

/// Probe backed by `statvfs(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl FreeSpaceProbe for StatvfsProbe {
    fn free_bytes(&self, path: &Path) -> Option<u64> {
        free_space(path)
    }
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
pub fn free_space(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut st = std::mem::MaybeUninit::<libc::statvfs>::uninit();
    let r = unsafe { libc::statvfs(c_path.as_ptr(), st.as_mut_ptr()) };
    if r != 0 {
        tracing::debug!(path = %path.display(), errno = ?std::io::Error::last_os_error(), "statvfs failed");
        return None;
    }
    let st = unsafe { st.assume_init() };
    Some((st.f_bavail as u64).saturating_mul(st.f_frsize as u64))
}

#[cfg(not(unix))]
pub fn free_space(_path: &Path) -> Option<u64> {
    None
}

/// Estimated bytes for `image_count` images: count × average size × buffer.
pub fn estimate_chapter_bytes(image_count: usize, cfg: &DiskConfig) -> u64 {
    let mb = image_count as f64 * cfg.avg_image_size_mb.max(0.0) * cfg.size_buffer.max(1.0);
    (mb * MIB) as u64
}

/// Outcome of a free-space check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskCheck {
    pub sufficient: bool,
    /// `None` when free space could not be determined (treated as sufficient).
    pub free: Option<u64>,
    /// Estimate plus safety margin.
    pub required: u64,
}

impl DiskCheck {
    /// `Insufficient disk space: 12.0 MB free, 148.0 MB required.`
    pub fn message(&self) -> String {
        let free_mb = self.free.unwrap_or(0) as f64 / MIB;
        let required_mb = self.required as f64 / MIB;
        format!("Insufficient disk space: {free_mb:.1} MB free, {required_mb:.1} MB required.")
    }
}

/// Compare free space at `path` against `estimated` plus the configured margin.
pub fn check_disk_space(
    probe: &dyn FreeSpaceProbe,
    path: &Path,
    estimated: u64,
    cfg: &DiskConfig,
) -> DiskCheck {
    let margin = cfg.safety_margin_mb.saturating_mul(1024 * 1024);
    let required = estimated.saturating_add(margin);
    match probe.free_bytes(path) {
        Some(free) => DiskCheck {
            sufficient: free >= required,
            free: Some(free),
            required,
        },
        None => DiskCheck {
            sufficient: true,
            free: None,
            required,
        },
    }
}
