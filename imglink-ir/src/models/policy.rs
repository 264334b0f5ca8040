//! Reconciliation policy parameters
//!
//! The direct-link and candidate thresholds are policy, not fixed truths;
//! every scan request may override them.

use serde::{Deserialize, Serialize};

/// Scan and matching policy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// Best score at or above this creates a direct link (default: 80)
    #[serde(default = "default_direct_link_threshold")]
    pub direct_link_threshold: u8,

    /// Best score at or above this (but below the direct threshold)
    /// creates a review candidate (default: 60)
    #[serde(default = "default_candidate_threshold")]
    pub candidate_threshold: u8,

    /// Image store listing page size (default: 200)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Images processed between progress snapshots and cancellation
    /// checks (default: 5)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches to avoid saturating the persistence layer
    /// (default: 50ms)
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Time budget per batch; items still unprocessed when it runs out are
    /// marked failed and the run continues with the next batch
    /// (default: 30s)
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// Cap on the error sample kept in the report (default: 20)
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,

    /// Cap on the unresolved image list kept in the report (default: 500)
    #[serde(default = "default_max_unresolved")]
    pub max_unresolved: usize,

    /// Recurse into subfolders of the image store (default: true)
    #[serde(default = "default_recurse_subfolders")]
    pub recurse_subfolders: bool,

    /// File extensions treated as images (default: common web formats)
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_direct_link_threshold() -> u8 {
    80
}

fn default_candidate_threshold() -> u8 {
    60
}

fn default_page_size() -> usize {
    200
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_pause_ms() -> u64 {
    50
}

fn default_batch_timeout_ms() -> u64 {
    30_000
}

fn default_max_errors() -> usize {
    20
}

fn default_max_unresolved() -> usize {
    500
}

fn default_recurse_subfolders() -> bool {
    true
}

fn default_image_extensions() -> Vec<String> {
    vec![
        ".jpg".to_string(),
        ".jpeg".to_string(),
        ".png".to_string(),
        ".gif".to_string(),
        ".webp".to_string(),
        ".bmp".to_string(),
        ".avif".to_string(),
    ]
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            direct_link_threshold: default_direct_link_threshold(),
            candidate_threshold: default_candidate_threshold(),
            page_size: default_page_size(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            batch_timeout_ms: default_batch_timeout_ms(),
            max_errors: default_max_errors(),
            max_unresolved: default_max_unresolved(),
            recurse_subfolders: default_recurse_subfolders(),
            image_extensions: default_image_extensions(),
        }
    }
}

impl MatchPolicy {
    /// Check whether a filename carries one of the configured image extensions
    pub fn is_image_filename(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.image_extensions.iter().any(|ext| lower.ends_with(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = MatchPolicy::default();
        assert_eq!(policy.direct_link_threshold, 80);
        assert_eq!(policy.candidate_threshold, 60);
        assert_eq!(policy.page_size, 200);
        assert_eq!(policy.batch_size, 5);
        assert_eq!(policy.batch_timeout_ms, 30_000);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let policy: MatchPolicy = serde_json::from_str(r#"{"direct_link_threshold": 90}"#).unwrap();
        assert_eq!(policy.direct_link_threshold, 90);
        assert_eq!(policy.candidate_threshold, 60);
    }

    #[test]
    fn test_image_filename_filter() {
        let policy = MatchPolicy::default();
        assert!(policy.is_image_filename("445404.jpg"));
        assert!(policy.is_image_filename("PHOTO.JPEG"));
        assert!(!policy.is_image_filename("readme.txt"));
        assert!(!policy.is_image_filename("445404"));
    }
}
