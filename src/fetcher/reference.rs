//! ## Sharing-link resolution
//!
//! Extracts the [`ResourceId`] from a sharing link. Three link shapes are recognized and tried
//! in this order; the first one that matches wins:
//!
//! 1. `.../file/d/<ID>/...`
//! 2. `...id=<ID>...`
//! 3. `.../open?id=<ID>`
//!
//! An id is a run of ASCII letters, digits, `_` and `-`.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static LINK_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"/file/d/([a-zA-Z0-9_-]+)").unwrap(),
        Regex::new(r"id=([a-zA-Z0-9_-]+)").unwrap(),
        Regex::new(r"/open\?id=([a-zA-Z0-9_-]+)").unwrap(),
    ]
});

/// Opaque token identifying a remotely hosted file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical download URL for this id under the given base.
    pub fn download_url(&self, base_url: &str) -> String {
        format!("{}?id={}", base_url, self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the resource id of the first pattern that matches `reference`, if any.
pub fn extract_resource_id(reference: &str) -> Option<ResourceId> {
    LINK_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(reference)
            .and_then(|caps| caps.get(1))
            .map(|m| ResourceId(m.as_str().to_string()))
    })
}

/// Like [`extract_resource_id`], but a reference with no id is an `InvalidReference` error.
pub fn resolve_reference(reference: &str) -> TripLoaderResult<ResourceId> {
    extract_resource_id(reference).ok_or_else(|| {
        TripLoaderError::InvalidReference(format!(
            "no file id found in '{}'; expected a link like \
             https://drive.google.com/file/d/FILE_ID/view, \
             https://drive.google.com/open?id=FILE_ID or \
             https://drive.google.com/uc?id=FILE_ID",
            reference
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(reference: &str) -> Option<String> {
        extract_resource_id(reference).map(|r| r.as_str().to_string())
    }

    #[test]
    fn test_file_d_form() {
        assert_eq!(
            id("https://drive.example.com/file/d/ABC123/view?usp=sharing"),
            Some("ABC123".to_string())
        );
    }

    #[test]
    fn test_id_query_form() {
        assert_eq!(
            id("https://drive.example.com/uc?id=XYZ789"),
            Some("XYZ789".to_string())
        );
    }

    #[test]
    fn test_open_form() {
        assert_eq!(
            id("https://drive.example.com/open?id=a_b-C9"),
            Some("a_b-C9".to_string())
        );
    }

    #[test]
    fn test_first_pattern_wins() {
        // Both the path form and the query form match; the path form is tried first.
        assert_eq!(
            id("https://drive.example.com/file/d/PATH1/view?id=QUERY2"),
            Some("PATH1".to_string())
        );
    }

    #[test]
    fn test_id_stops_at_separator() {
        assert_eq!(
            id("https://drive.example.com/uc?id=Q1w2&export=download"),
            Some("Q1w2".to_string())
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(id("not-a-url"), None);
        assert_eq!(id("https://drive.example.com/drive/folders"), None);
        assert_eq!(id(""), None);
    }

    #[test]
    fn test_resolve_reference_error() {
        let err = resolve_reference("not-a-url").unwrap_err();
        assert!(matches!(err, TripLoaderError::InvalidReference(_)));
        assert!(err.to_string().contains("not-a-url"));
    }

    #[test]
    fn test_download_url() {
        let rid = extract_resource_id("https://drive.example.com/open?id=XYZ").unwrap();
        assert_eq!(
            rid.download_url("https://drive.google.com/uc"),
            "https://drive.google.com/uc?id=XYZ"
        );
    }
}
