//! Data models for imglink-ir

mod candidate;
mod matching;
mod policy;
mod report;
mod scan_session;

pub use candidate::{CandidateStatus, ImageCandidate, ImageLink};
pub use matching::{ExtractedCode, ImageEntry, MatchType, Product, Provenance};
pub use policy::MatchPolicy;
pub use report::{ScanIssue, ScanReport, UnresolvedImage};
pub use scan_session::{ScanProgress, ScanSession, ScanState, StateTransition};
