//! Folder-name sanitization for chapter directories.

/// Linux NAME_MAX in bytes.
const NAME_MAX: usize = 255;

/// Sanitizes a title or chapter label for use as (part of) a folder name.
///
/// - `:` becomes ` - `; `/ \ * ? " < > |`, newlines and control characters become spaces
/// - underscores become spaces; runs of whitespace collapse to one space
/// - runs of dashes collapse to one dash
/// - leading/trailing spaces and dots are trimmed (so `..` cannot survive)
/// - limited to 255 bytes on a char boundary
///
/// Returns `"item"` when nothing usable is left.
pub fn sanitize_component(name: &str) -> String {
    let mut spaced = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            ':' => spaced.push_str(" - "),
            '/' | '\\' | '*' | '?' | '"' | '<' | '>' | '|' | '_' => spaced.push(' '),
            c if c.is_control() => spaced.push(' '),
            c => spaced.push(c),
        }
    }

    let mut out = String::with_capacity(spaced.len());
    let mut prev: Option<char> = None;
    for c in spaced.chars() {
        let c = if c.is_whitespace() { ' ' } else { c };
        if (c == ' ' || c == '-') && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "item".to_string();
    }
    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        return trimmed[..take].trim_end_matches([' ', '.']).to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_and_separators() {
        assert_eq!(sanitize_component("Re:Zero"), "Re - Zero");
        assert_eq!(sanitize_component("a/b\\c"), "a b c");
        assert_eq!(sanitize_component("what?*<>|\"x"), "what x");
    }

    #[test]
    fn underscores_and_whitespace_collapse() {
        assert_eq!(sanitize_component("My__Hero\n\tAcademia"), "My Hero Academia");
    }

    #[test]
    fn dashes_collapse() {
        assert_eq!(sanitize_component("Vol 1 -- Ch 2"), "Vol 1 - Ch 2");
    }

    #[test]
    fn dots_and_traversal_trimmed() {
        assert_eq!(sanitize_component(" ..Chapter 5.. "), "Chapter 5");
        assert_eq!(sanitize_component(".."), "item");
        assert_eq!(sanitize_component("../../etc"), "etc");
        assert_eq!(sanitize_component("   "), "item");
    }

    #[test]
    fn long_names_truncated_on_char_boundary() {
        let long = "é".repeat(300);
        let s = sanitize_component(&long);
        assert!(s.len() <= NAME_MAX);
        assert!(s.chars().all(|c| c == 'é'));
    }
}
