//! Image file extension derivation from URL path or Content-Type.

/// Longest suffix accepted as an extension (".jpeg", ".webp").
const MAX_EXT_LEN: usize = 5;

/// Extension of the URL's last path segment, lowercased with a leading dot.
///
/// Returns `None` if the URL cannot be parsed, the path has no suffix, or the
/// suffix does not look like a file extension.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXT_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

/// `.png` from `image/png; charset=binary`; `None` for non-image types.
pub fn extension_from_content_type(content_type: &str) -> Option<String> {
    let lower = content_type.trim().to_ascii_lowercase();
    let rest = lower.strip_prefix("image/")?;
    let subtype: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if subtype.is_empty() {
        None
    } else {
        Some(format!(".{subtype}"))
    }
}
