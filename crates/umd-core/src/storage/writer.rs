//! Sequential temp-file writer for one streamed image.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes one image body to its `.part` file. Unless `finalize` succeeds,
/// the temp file is removed when the writer goes away.
#[derive(Debug)]
pub struct ImageWriter {
    file: Option<BufWriter<File>>,
    temp_path: PathBuf,
    written: u64,
    finalized: bool,
}

impl ImageWriter {
    /// Create (or truncate) the temp file at `temp_path`.
    pub fn create(temp_path: &Path) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        Ok(Self {
            file: Some(BufWriter::with_capacity(64 * 1024, file)),
            temp_path: temp_path.to_path_buf(),
            written: 0,
            finalized: false,
        })
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("image writer already closed"))?;
        file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush and rename the temp file to `final_path`, replacing any existing file.
    /// On error the temp file is removed.
    pub fn finalize(mut self, final_path: &Path) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            let file = file.into_inner().map_err(|e| e.into_error())?;
            file.sync_data()?;
        }
        std::fs::rename(&self.temp_path, final_path)?;
        self.finalized = true;
        Ok(())
    }
}

impl Drop for ImageWriter {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        drop(self.file.take());
        if let Err(e) = std::fs::remove_file(&self.temp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::debug!(path = %self.temp_path.display(), "could not remove temp file: {}", e);
            }
        }
    }
}
