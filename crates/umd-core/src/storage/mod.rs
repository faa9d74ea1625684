//! Disk I/O for chapter images.
//!
//! Images stream into a `.part` temp file and are renamed into place only
//! after the transfer succeeds, so converters never see a half-written
//! image. `disk` holds the free-space preflight.

mod disk;
mod writer;

pub use disk::{
    check_disk_space, estimate_chapter_bytes, free_space, DiskCheck, FreeSpaceProbe, StatvfsProbe,
};
pub use writer::ImageWriter;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `001.png` → `001.png.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}
