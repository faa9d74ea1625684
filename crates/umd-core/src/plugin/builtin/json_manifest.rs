//! Parser for JSON chapter manifests.
//!
//! ```json
//! {"title": "Series", "chapter": "Chapter 3", "images": ["001.png", "https://cdn/x.jpg"]}
//! ```
//!
//! `image_urls` is accepted in place of `images`. Relative image URLs are
//! resolved against the manifest URL.

use serde::Deserialize;
use url::Url;

use crate::plugin::{ChapterData, Parser};

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    title: String,
    #[serde(default, deserialize_with = "string_or_number")]
    chapter: String,
    #[serde(default, alias = "image_urls")]
    images: Vec<String>,
}

fn string_or_number<'de, D>(d: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "chapter must be a string or number, got {other}"
        ))),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonManifestParser;

impl Parser for JsonManifestParser {
    fn name(&self) -> &str {
        "JSON manifest"
    }

    fn can_handle(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| u.path().to_ascii_lowercase().ends_with(".json"))
            .unwrap_or(false)
    }

    fn parse(&self, page: &str, url: &str) -> Option<ChapterData> {
        let manifest: Manifest = match serde_json::from_str(page) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(url, error = %e, "not a chapter manifest");
                return None;
            }
        };
        let base = Url::parse(url).ok();
        let image_urls = manifest
            .images
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter_map(|s| match &base {
                Some(base) => base.join(s).ok().map(String::from),
                None => Url::parse(s).ok().map(String::from),
            })
            .collect();
        Some(ChapterData {
            title: manifest.title.trim().to_string(),
            chapter: manifest.chapter.trim().to_string(),
            image_urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/series/ch3/manifest.json";

    #[test]
    fn handles_json_paths_only() {
        let p = JsonManifestParser;
        assert!(p.can_handle(URL));
        assert!(p.can_handle("https://example.com/A.JSON?x=1"));
        assert!(!p.can_handle("https://example.com/chapter/3"));
        assert!(!p.can_handle("not a url.json"));
    }

    #[test]
    fn resolves_relative_images() {
        let page = r#"{"title":"Series","chapter":"Chapter 3",
            "images":["001.png","/img/002.jpg","https://cdn.example.net/003.webp"]}"#;
        let data = JsonManifestParser.parse(page, URL).unwrap();
        assert_eq!(data.title, "Series");
        assert_eq!(data.chapter, "Chapter 3");
        assert_eq!(
            data.image_urls,
            vec![
                "https://example.com/series/ch3/001.png",
                "https://example.com/img/002.jpg",
                "https://cdn.example.net/003.webp",
            ]
        );
    }

    #[test]
    fn accepts_image_urls_alias_and_numeric_chapter() {
        let page = r#"{"title":"S","chapter":12,"image_urls":["a.png"]}"#;
        let data = JsonManifestParser.parse(page, URL).unwrap();
        assert_eq!(data.chapter, "12");
        assert_eq!(data.image_urls.len(), 1);
    }

    #[test]
    fn invalid_json_is_none() {
        assert!(JsonManifestParser.parse("<html></html>", URL).is_none());
    }

    #[test]
    fn missing_images_gives_empty_list() {
        let data = JsonManifestParser.parse(r#"{"title":"S"}"#, URL).unwrap();
        assert!(data.image_urls.is_empty());
    }
}
