//! Extraction and matching types
//!
//! `ExtractedCode` values are run-scoped and never persisted on their own;
//! they are produced fresh for every filename examined.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product (read-only to this service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product UUID
    pub id: Uuid,
    /// Catalog identifier (SKU)
    pub code: String,
    /// Display name
    pub name: String,
    /// Whether the product is active in the catalog
    pub active: bool,
}

/// Which extraction strategy produced a given code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Filename is the code itself
    Exact,
    /// Zero-padding add/strip variant of an exact filename code
    ZeroPadded,
    /// One of several codes in a multi-SKU filename
    Multi,
    /// Numeric run or labeled decoration found inside the name
    Pattern,
    /// Numeric token taken from a parent folder name
    Path,
    /// Zero-padding variant generated from another extracted code
    Fuzzy,
}

/// A candidate identifying code extracted from a filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCode {
    /// The code text, digits only after normalization
    pub value: String,
    /// Heuristic likelihood (0-100) that this token is a genuine SKU
    pub confidence: u8,
    /// Strategy that produced this code
    pub provenance: Provenance,
}

/// How an extracted code related to the catalog code it matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Normalized codes were identical
    Exact,
    /// Codes matched after zero-padding normalization
    Variant,
    /// Substring or edit-distance near match
    Fuzzy,
}

/// One entry from an image store listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// Bare filename
    pub filename: String,
    /// Path within the store, used to build the public URL
    pub storage_path: String,
    /// Whether this entry is a subfolder rather than a file
    pub is_directory: bool,
}
