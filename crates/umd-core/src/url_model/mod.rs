//! Local names for chapter folders and image files.
//!
//! Folder names come from the parsed title and chapter label; image files are
//! named by their submission index with an extension taken from the URL path,
//! else the `Content-Type`, else `.jpg`.

mod path;
mod sanitize;

pub use path::{extension_from_content_type, extension_from_url};
pub use sanitize::sanitize_component;

/// Extension used when neither URL nor Content-Type gives one.
pub const DEFAULT_IMAGE_EXT: &str = ".jpg";

/// Extensions treated as chapter images when collecting files for converters.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Folder name for a chapter: sanitized non-empty parts joined with ` - `.
///
/// # Examples
///
/// - `compose_chapter_name("One Piece", "Chapter 1000")` → `"One Piece - Chapter 1000"`
/// - `compose_chapter_name("", "")` → `"Chapter"`
pub fn compose_chapter_name(title: &str, chapter: &str) -> String {
    let parts: Vec<String> = [title, chapter]
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| sanitize_component(p))
        .collect();
    if parts.is_empty() {
        return "Chapter".to_string();
    }
    let joined = parts.join(" - ");
    let trimmed = joined.trim_matches(|c| c == ' ' || c == '-');
    if trimmed.is_empty() {
        "Chapter".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Extension for a downloaded image.
pub fn image_extension(url: &str, content_type: Option<&str>) -> String {
    extension_from_url(url)
        .or_else(|| content_type.and_then(extension_from_content_type))
        .unwrap_or_else(|| DEFAULT_IMAGE_EXT.to_string())
}

/// File name for the image at zero-based submission `index`: `001.png`, `002.jpg`, ...
pub fn image_file_name(index: usize, ext: &str) -> String {
    format!("{:03}{}", index + 1, ext)
}

/// True if the path's extension is one of [`IMAGE_EXTENSIONS`] (case-insensitive).
pub fn is_image_path(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn chapter_name_joins_parts() {
        assert_eq!(
            compose_chapter_name("One Piece", "Chapter 1000"),
            "One Piece - Chapter 1000"
        );
        assert_eq!(compose_chapter_name("Solo", "  "), "Solo");
        assert_eq!(compose_chapter_name("", "Ch. 2"), "Ch. 2");
    }

    #[test]
    fn chapter_name_defaults() {
        assert_eq!(compose_chapter_name("", ""), "Chapter");
        assert_eq!(compose_chapter_name("---", ""), "Chapter");
    }

    #[test]
    fn chapter_name_is_a_single_component() {
        let name = compose_chapter_name("../../evil", "x/y");
        assert!(!name.contains('/'));
        assert!(!name.starts_with('.'));
    }

    #[test]
    fn extension_precedence() {
        assert_eq!(image_extension("https://x.test/1.png", Some("image/webp")), ".png");
        assert_eq!(image_extension("https://x.test/img?id=1", Some("image/webp")), ".webp");
        assert_eq!(image_extension("https://x.test/img", Some("text/plain")), ".jpg");
        assert_eq!(image_extension("https://x.test/img", None), ".jpg");
    }

    #[test]
    fn file_names_are_one_based_and_padded() {
        assert_eq!(image_file_name(0, ".png"), "001.png");
        assert_eq!(image_file_name(9, ".jpg"), "010.jpg");
        assert_eq!(image_file_name(999, ".gif"), "1000.gif");
    }

    #[test]
    fn image_path_detection() {
        assert!(is_image_path(Path::new("/a/001.JPG")));
        assert!(is_image_path(Path::new("002.webp")));
        assert!(!is_image_path(Path::new("003.png.part")));
        assert!(!is_image_path(Path::new("notes.txt")));
    }
}
