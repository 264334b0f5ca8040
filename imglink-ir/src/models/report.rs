//! Scan report aggregates

use serde::{Deserialize, Serialize};

/// An image no extracted code resolved for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedImage {
    /// Filename as listed by the image store
    pub filename: String,
    /// Every code extracted from the filename, best first
    pub extracted_codes: Vec<String>,
    /// Number of catalog match attempts made
    pub match_attempts: usize,
}

/// One non-fatal error captured during a scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanIssue {
    /// Filename being processed when the error occurred
    pub filename: String,
    /// Error description
    pub message: String,
}

/// Final aggregate report for one scan session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    /// Images examined (after extension filtering)
    pub total_images: usize,
    /// Active products with codes loaded into the index
    pub total_products: usize,
    /// Images skipped because their filename was already linked
    pub linked_images: usize,
    /// Images still without an active link when the scan finished
    pub unlinked_images: usize,
    /// Links created without review
    pub direct_links_created: usize,
    /// Review candidates created
    pub candidates_created: usize,
    /// Images skipped because the matched product already had an active link
    pub duplicate_link_skips: usize,
    /// Images that failed with an error
    pub failed_images: usize,
    /// Wall-clock processing time
    pub processing_time_ms: u64,
    /// Bounded list of images nothing resolved for
    pub unresolved: Vec<UnresolvedImage>,
    /// Bounded sample of per-image errors
    pub errors: Vec<ScanIssue>,
}

impl ScanReport {
    /// Append to the unresolved list, respecting the configured cap
    pub fn push_unresolved(&mut self, image: UnresolvedImage, cap: usize) {
        if self.unresolved.len() < cap {
            self.unresolved.push(image);
        }
    }

    /// Append to the error sample, respecting the configured cap
    pub fn push_error(&mut self, issue: ScanIssue, cap: usize) {
        if self.errors.len() < cap {
            self.errors.push(issue);
        }
    }
}
