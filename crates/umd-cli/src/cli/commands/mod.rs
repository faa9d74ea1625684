//! CLI command handlers, one per file.

mod completions;
mod config;
pub(super) mod download;

pub use completions::run_completions;
pub use config::run_config;
pub use download::{run_download, DownloadArgs};
