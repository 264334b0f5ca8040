//! Catalog index and match scoring
//!
//! The index is run-scoped: the orchestrator builds it once at the start of
//! a scan from the active product list, passes it by reference to the
//! matching calls, and discards it at run end. No cross-run state.

use crate::models::{ExtractedCode, MatchType, Product};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Minimum normalized Levenshtein similarity for a fuzzy match
const FUZZY_SIMILARITY_FLOOR: f64 = 0.8;
/// Typical catalog SKU width, target for zero-padding variants
const TYPICAL_SKU_WIDTH: usize = 6;

/// Normalized lookup of catalog codes and their zero-padding variants
pub struct CatalogIndex {
    /// normalized code variant -> product ids carrying it
    variants: HashMap<String, HashSet<Uuid>>,
    /// product id -> normalized canonical code
    codes: HashMap<Uuid, String>,
}

/// Best score one extracted-code list achieved against one product code
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    /// Combined score (0-100)
    pub score: u8,
    /// Match tier the score came from
    pub match_type: MatchType,
    /// The extracted code that produced the score
    pub extracted_code: String,
}

impl CatalogIndex {
    /// Build the index from a product list
    ///
    /// Idempotent: building from the same list always yields the same index,
    /// and a fresh build replaces prior state entirely.
    pub fn build(products: &[Product]) -> Self {
        let mut variants: HashMap<String, HashSet<Uuid>> = HashMap::new();
        let mut codes = HashMap::new();

        for product in products {
            let normalized = normalize(&product.code);
            if normalized.is_empty() {
                continue;
            }
            codes.insert(product.id, normalized.clone());
            for variant in zero_pad_variants(&normalized) {
                variants.entry(variant).or_default().insert(product.id);
            }
        }

        Self { variants, codes }
    }

    /// Products whose code (or a zero-padding variant of it) equals the
    /// given extracted code
    pub fn lookup(&self, code: &str) -> Vec<Uuid> {
        let normalized = normalize(code);
        let mut ids: Vec<Uuid> = self
            .variants
            .get(&normalized)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        // Deterministic iteration order for callers
        ids.sort();
        ids
    }

    /// Normalized canonical code for a product
    pub fn product_code(&self, id: Uuid) -> Option<&str> {
        self.codes.get(&id).map(String::as_str)
    }

    /// Number of indexed products
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Every indexed product id, for exhaustive fuzzy passes
    pub fn product_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.codes.keys().copied()
    }
}

/// Case-insensitive, trimmed code normalization
fn normalize(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Strip leading zeros, keeping at least one character
fn strip_leading_zeros(code: &str) -> &str {
    let trimmed = code.trim_start_matches('0');
    if trimmed.is_empty() {
        &code[code.len() - 1..]
    } else {
        trimmed
    }
}

/// The code itself plus its zero-padding spellings
fn zero_pad_variants(normalized: &str) -> Vec<String> {
    let mut variants = vec![normalized.to_string()];

    let stripped = strip_leading_zeros(normalized);
    if stripped != normalized {
        variants.push(stripped.to_string());
    }

    if normalized.chars().all(|c| c.is_ascii_digit()) && normalized.len() < TYPICAL_SKU_WIDTH {
        variants.push(format!("{:0>width$}", normalized, width = TYPICAL_SKU_WIDTH));
    }

    variants
}

/// Score a set of extracted codes against one catalog code
///
/// Tiers, best of all extracted codes, rounded to an integer:
/// - exact normalized match: extracted confidence
/// - zero-pad-insensitive match: 0.9 x confidence
/// - substring containment either direction: 0.7 x confidence x length ratio
/// - Levenshtein similarity above the floor: 0.6 x confidence x similarity
///
/// Returns `None` when no tier applies at all; thresholding against policy
/// is the caller's concern.
pub fn score(product_code: &str, extracted: &[ExtractedCode]) -> Option<ScoredMatch> {
    let product_norm = normalize(product_code);
    if product_norm.is_empty() {
        return None;
    }

    let mut best: Option<(f64, MatchType, &str)> = None;

    for code in extracted {
        let Some((value, match_type)) = score_one(&product_norm, code) else {
            continue;
        };
        match &best {
            Some((current, _, _)) if *current >= value => {}
            _ => best = Some((value, match_type, &code.value)),
        }
    }

    best.map(|(value, match_type, extracted_code)| ScoredMatch {
        score: value.round().clamp(0.0, 100.0) as u8,
        match_type,
        extracted_code: extracted_code.to_string(),
    })
}

fn score_one(product_norm: &str, code: &ExtractedCode) -> Option<(f64, MatchType)> {
    let extracted_norm = normalize(&code.value);
    if extracted_norm.is_empty() {
        return None;
    }
    let confidence = code.confidence as f64;

    // Tier 1: exact normalized match
    if extracted_norm == product_norm {
        return Some((confidence, MatchType::Exact));
    }

    // Tier 2: zero-pad-insensitive match
    if strip_leading_zeros(&extracted_norm) == strip_leading_zeros(product_norm) {
        return Some((0.9 * confidence, MatchType::Variant));
    }

    // Tier 3: substring containment either direction
    if extracted_norm.contains(product_norm) || product_norm.contains(&extracted_norm) {
        let (shorter, longer) = if extracted_norm.len() < product_norm.len() {
            (extracted_norm.len(), product_norm.len())
        } else {
            (product_norm.len(), extracted_norm.len())
        };
        let ratio = shorter as f64 / longer as f64;
        return Some((0.7 * confidence * ratio, MatchType::Fuzzy));
    }

    // Tier 4: edit distance
    let max_len = extracted_norm.len().max(product_norm.len());
    let distance = strsim::levenshtein(&extracted_norm, product_norm);
    let similarity = 1.0 - (distance as f64 / max_len as f64);
    if similarity > FUZZY_SIMILARITY_FLOOR {
        return Some((0.6 * confidence * similarity, MatchType::Fuzzy));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;

    fn product(code: &str) -> Product {
        Product {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: format!("Product {}", code),
            active: true,
        }
    }

    fn extracted(value: &str, confidence: u8) -> ExtractedCode {
        ExtractedCode {
            value: value.to_string(),
            confidence,
            provenance: Provenance::Exact,
        }
    }

    #[test]
    fn test_build_and_lookup() {
        let products = vec![product("445404"), product("319027")];
        let index = CatalogIndex::build(&products);

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("445404"), vec![products[0].id].into_iter().collect::<Vec<_>>());
        assert!(index.lookup("999999").is_empty());
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_trimmed() {
        let products = vec![product(" AB-445404 ")];
        let index = CatalogIndex::build(&products);
        assert_eq!(index.lookup("ab-445404").len(), 1);
    }

    #[test]
    fn test_zero_pad_variants_indexed() {
        let products = vec![product("00445")];
        let index = CatalogIndex::build(&products);
        // Stripped spelling resolves to the same product
        assert_eq!(index.lookup("445").len(), 1);
        assert_eq!(index.lookup("00445").len(), 1);
    }

    #[test]
    fn test_rebuild_replaces_prior_state() {
        let first = CatalogIndex::build(&[product("111222")]);
        let second = CatalogIndex::build(&[product("333444")]);
        assert_eq!(first.lookup("111222").len(), 1);
        assert!(second.lookup("111222").is_empty());
        assert_eq!(second.lookup("333444").len(), 1);
    }

    #[test]
    fn test_exact_match_scores_full_confidence() {
        let result = score("445404", &[extracted("445404", 100)]).unwrap();
        assert_eq!(result.score, 100);
        assert_eq!(result.match_type, MatchType::Exact);
    }

    #[test]
    fn test_zero_pad_match_scores_ninety_percent_tier() {
        // "445" against catalog "00445" must land in the variant tier,
        // not a lower one
        let result = score("00445", &[extracted("445", 100)]).unwrap();
        assert_eq!(result.score, 90);
        assert_eq!(result.match_type, MatchType::Variant);

        let result = score("00445", &[extracted("445", 80)]).unwrap();
        assert!(result.score as f64 >= 0.9 * 80.0);
    }

    #[test]
    fn test_substring_match_scaled_by_length_ratio() {
        let result = score("12344540499", &[extracted("445404", 100)]).unwrap();
        assert_eq!(result.match_type, MatchType::Fuzzy);
        // 0.7 * 100 * (6/11)
        assert_eq!(result.score, 38);
    }

    #[test]
    fn test_edit_distance_match_above_floor() {
        // One substitution in eight characters: similarity 0.875
        let result = score("44540411", &[extracted("44540412", 100)]).unwrap();
        assert_eq!(result.match_type, MatchType::Fuzzy);
        // 0.6 * 100 * 0.875
        assert_eq!(result.score, 53);
    }

    #[test]
    fn test_dissimilar_codes_do_not_score() {
        assert!(score("445404", &[extracted("981", 100)]).is_none());
    }

    #[test]
    fn test_best_of_multiple_extracted_codes_wins() {
        let codes = vec![extracted("319026", 86), extracted("319027", 90)];
        let result = score("319027", &codes).unwrap();
        assert_eq!(result.score, 90);
        assert_eq!(result.extracted_code, "319027");
    }

    #[test]
    fn test_empty_extraction_scores_nothing() {
        assert!(score("445404", &[]).is_none());
    }
}
