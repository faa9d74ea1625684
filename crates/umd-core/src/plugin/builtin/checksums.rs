//! SHA-256 manifest of the downloaded images.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use super::sibling_output;
use crate::plugin::{ChapterMetadata, Converter};

const BUF_SIZE: usize = 64 * 1024;

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Writes `<dir>.sha256` in `sha256sum` format, paths relative to the parent.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChecksumConverter;

impl Converter for ChecksumConverter {
    fn name(&self) -> &str {
        "SHA-256"
    }

    fn convert(
        &self,
        images: &[PathBuf],
        dir: &Path,
        _metadata: &ChapterMetadata,
    ) -> Result<Option<PathBuf>> {
        if images.is_empty() {
            return Ok(None);
        }
        let folder = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut manifest = String::new();
        for image in images {
            let digest = sha256_path(image)?;
            let name = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = writeln!(manifest, "{digest}  {folder}/{name}");
        }
        let out = sibling_output(dir, ".sha256")?;
        std::fs::write(&out, manifest).with_context(|| format!("write {}", out.display()))?;
        tracing::debug!(path = %out.display(), "wrote checksum manifest");
        Ok(Some(out))
    }
}
