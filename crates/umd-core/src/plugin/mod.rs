//! Parser and converter capabilities.
//!
//! A parser turns a fetched page into a [`ChapterData`]; a converter packages
//! the downloaded images into some output next to the chapter directory. Both
//! are registered on a [`PluginRegistry`] before the downloader starts and are
//! shared read-only by every job.

pub mod builtin;
mod registry;

pub use registry::PluginRegistry;

use std::path::{Path, PathBuf};

/// Result of parsing a chapter page. Immutable once returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterData {
    pub title: String,
    pub chapter: String,
    pub image_urls: Vec<String>,
}

/// What a converter knows about the chapter it is packaging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterMetadata {
    pub title: String,
    pub chapter: String,
    pub source_url: String,
}

/// Site-specific page parser.
pub trait Parser: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap check on the URL alone; no network access.
    fn can_handle(&self, url: &str) -> bool;

    /// Parse the page body fetched from `url`. `None` lets the next capable
    /// parser try.
    fn parse(&self, page: &str, url: &str) -> Option<ChapterData>;
}

/// Output-format generator run after the images are on disk.
pub trait Converter: Send + Sync {
    fn name(&self) -> &str;

    /// `images` are sorted by file name. Returns the created file, or `None`
    /// if there was nothing to produce.
    fn convert(
        &self,
        images: &[PathBuf],
        dir: &Path,
        metadata: &ChapterMetadata,
    ) -> anyhow::Result<Option<PathBuf>>;
}
