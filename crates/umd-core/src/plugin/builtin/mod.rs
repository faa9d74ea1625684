//! Plugins shipped with the engine and registered by the CLI.

mod cbz;
mod checksums;
mod json_manifest;

pub use cbz::CbzConverter;
pub use checksums::{sha256_path, ChecksumConverter};
pub use json_manifest::JsonManifestParser;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::PluginRegistry;

/// Registry with every built-in plugin registered and enabled.
pub fn default_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register_parser(Arc::new(JsonManifestParser));
    registry.register_converter(Arc::new(CbzConverter));
    registry.register_converter(Arc::new(ChecksumConverter));
    registry
}

/// `<parent>/<dir name><ext>`: outputs live beside the chapter directory.
fn sibling_output(dir: &Path, ext: &str) -> anyhow::Result<PathBuf> {
    let name = dir
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("chapter directory has no name: {}", dir.display()))?;
    let mut file = name.to_os_string();
    file.push(ext);
    Ok(match dir.parent() {
        Some(parent) => parent.join(file),
        None => PathBuf::from(file),
    })
}
