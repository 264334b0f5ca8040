//! Business logic services for imglink-ir

pub mod catalog_index;
pub mod code_extractor;
pub mod image_store;
pub mod progress;
pub mod review;
pub mod scan_orchestrator;

pub use catalog_index::{score, CatalogIndex, ScoredMatch};
pub use code_extractor::extract_codes;
pub use image_store::{FsImageStore, ImageStore, StoreError};
pub use progress::ProgressBroadcaster;
pub use review::{CandidateReviewService, ReviewError};
pub use scan_orchestrator::ScanOrchestrator;
