use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::sibling_output;
use crate::plugin::{ChapterMetadata, Converter};

/// Packs the chapter images into `<dir>.cbz`, named `001.ext`, `002.ext`, ...
#[derive(Debug, Default, Clone, Copy)]
pub struct CbzConverter;

impl Converter for CbzConverter {
    fn name(&self) -> &str {
        "CBZ"
    }

    fn convert(
        &self,
        images: &[PathBuf],
        dir: &Path,
        metadata: &ChapterMetadata,
    ) -> Result<Option<PathBuf>> {
        if images.is_empty() {
            tracing::warn!(title = %metadata.title, "CBZ converter received no images");
            return Ok(None);
        }
        let archive_path = sibling_output(dir, ".cbz")?;
        let file = File::create(&archive_path)
            .with_context(|| format!("create {}", archive_path.display()))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        // Images are already compressed.
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (i, image) in images.iter().enumerate() {
            let ext = image
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e.to_ascii_lowercase()))
                .unwrap_or_default();
            zip.start_file(format!("{:03}{}", i + 1, ext), options)?;
            let mut src =
                File::open(image).with_context(|| format!("open {}", image.display()))?;
            io::copy(&mut src, &mut zip).with_context(|| format!("read {}", image.display()))?;
        }
        zip.finish()?;
        tracing::info!(path = %archive_path.display(), images = images.len(), "created CBZ");
        Ok(Some(archive_path))
    }
}
