//! Filename code extraction
//!
//! Pure, deterministic extraction of candidate SKU codes from image
//! filenames. The cascade is an ordered list of independent, named strategy
//! functions; each stage only adds codes not already present at equal or
//! higher confidence, so strategies can be added or reordered without
//! touching existing ones.

use crate::models::{ExtractedCode, Provenance};
use std::path::Path;

/// Minimum digits for a token to qualify as a SKU candidate
const MIN_CODE_LEN: usize = 3;
/// Maximum digits for a token to qualify as a SKU candidate
const MAX_CODE_LEN: usize = 8;
/// Typical catalog SKU width, target for zero-padding variants
const TYPICAL_SKU_WIDTH: usize = 6;

/// A single extraction strategy: filename stem + optional full path in,
/// candidate codes out
type Strategy = fn(&ExtractionInput) -> Vec<ExtractedCode>;

/// Shared input handed to every strategy
struct ExtractionInput<'a> {
    /// Filename with the extension stripped
    stem: &'a str,
    /// Full storage path, when the caller has one
    full_path: Option<&'a str>,
}

/// The cascade, applied in order
const STRATEGIES: &[(&str, Strategy)] = &[
    ("exact", extract_exact),
    ("multi_sku", extract_multi_sku),
    ("numeric_anywhere", extract_numeric_anywhere),
    ("path_segment", extract_path_segment),
    ("labeled_pattern", extract_labeled_pattern),
];

/// Extract candidate codes from a filename
///
/// Returns a deduplicated list sorted by descending confidence; for each
/// distinct value the highest confidence seen wins. Calling twice on the
/// same input yields identical ordered output.
pub fn extract_codes(filename: &str, full_path: Option<&str>) -> Vec<ExtractedCode> {
    let stem = file_stem(filename);
    let input = ExtractionInput { stem, full_path };

    let mut found: Vec<ExtractedCode> = Vec::new();
    for (_name, strategy) in STRATEGIES {
        for code in strategy(&input) {
            merge(&mut found, code);
        }
    }

    // Fuzzy variants derive from everything found so far, so they run after
    // the cascade rather than inside it
    for variant in fuzzy_variants(&found) {
        merge(&mut found, variant);
    }

    // Stable sort keeps cascade order for equal confidences
    found.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    found
}

/// Add a code unless the value is already present at equal-or-higher confidence
fn merge(found: &mut Vec<ExtractedCode>, code: ExtractedCode) {
    match found.iter_mut().find(|c| c.value == code.value) {
        Some(existing) => {
            if code.confidence > existing.confidence {
                *existing = code;
            }
        }
        None => found.push(code),
    }
}

/// Strip the final extension, tolerating multi-dot names like `319027.319026.png`
fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

fn is_code_candidate(token: &str) -> bool {
    (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&token.len())
        && token.chars().all(|c| c.is_ascii_digit())
}

/// Maximal runs of ASCII digits with their byte offsets
fn digit_runs(text: &str) -> Vec<(usize, &str)> {
    let mut runs = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            runs.push((start, &text[start..i]));
        } else {
            i += 1;
        }
    }
    runs
}

/// Strip leading zeros, keeping at least one digit
fn strip_leading_zeros(code: &str) -> &str {
    let trimmed = code.trim_start_matches('0');
    if trimmed.is_empty() {
        &code[code.len() - 1..]
    } else {
        trimmed
    }
}

/// Stage 1: the whole stem is the code
///
/// A purely numeric stem is the strongest possible signal. Five-digit codes
/// commonly appear with and without a leading zero in catalogs, so both
/// spellings are emitted.
fn extract_exact(input: &ExtractionInput) -> Vec<ExtractedCode> {
    let stem = input.stem;
    if !is_code_candidate(stem) {
        return Vec::new();
    }

    let mut codes = vec![ExtractedCode {
        value: stem.to_string(),
        confidence: 100,
        provenance: Provenance::Exact,
    }];

    if stem.len() == 5 && !stem.starts_with('0') {
        codes.push(ExtractedCode {
            value: format!("0{}", stem),
            confidence: 95,
            provenance: Provenance::ZeroPadded,
        });
    }
    if stem.starts_with('0') && stem.len() > MIN_CODE_LEN {
        codes.push(ExtractedCode {
            value: strip_leading_zeros(stem).to_string(),
            confidence: 95,
            provenance: Provenance::ZeroPadded,
        });
    }

    codes
}

/// Stage 2: multi-SKU filename
///
/// A stem that is nothing but 3-8 digit groups joined by `.`, `_`, or `-`
/// names several products at once; earlier positions are more trustworthy.
fn extract_multi_sku(input: &ExtractionInput) -> Vec<ExtractedCode> {
    let parts: Vec<&str> = input.stem.split(['.', '_', '-']).collect();
    if parts.len() < 2 || !parts.iter().all(|p| is_code_candidate(p)) {
        return Vec::new();
    }

    parts
        .iter()
        .enumerate()
        .map(|(i, part)| ExtractedCode {
            value: part.to_string(),
            // Clamp before narrowing; positions past 5 all sit on the floor
            confidence: (90 - (i * 4).min(20)) as u8,
            provenance: Provenance::Multi,
        })
        .collect()
}

/// Stage 3: numeric run anywhere in the stem
///
/// Codes at the start of the name score higher than codes at the end or
/// buried mid-string.
fn extract_numeric_anywhere(input: &ExtractionInput) -> Vec<ExtractedCode> {
    let stem = input.stem;
    digit_runs(stem)
        .into_iter()
        .filter(|(_, run)| is_code_candidate(run))
        .map(|(start, run)| {
            let confidence = if start == 0 {
                85
            } else if start + run.len() == stem.len() {
                68
            } else {
                62
            };
            ExtractedCode {
                value: run.to_string(),
                confidence,
                provenance: Provenance::Pattern,
            }
        })
        .collect()
}

/// Stage 4: numeric token in a parent folder name
fn extract_path_segment(input: &ExtractionInput) -> Vec<ExtractedCode> {
    let Some(full_path) = input.full_path else {
        return Vec::new();
    };

    let mut codes = Vec::new();
    let normalized = full_path.replace('\\', "/");
    let mut segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    // Last segment is the filename itself, covered by the other stages
    segments.pop();

    for segment in segments {
        if is_code_candidate(segment) {
            codes.push(ExtractedCode {
                value: segment.to_string(),
                confidence: 68,
                provenance: Provenance::Path,
            });
        } else {
            for (_, run) in digit_runs(segment) {
                if is_code_candidate(run) {
                    codes.push(ExtractedCode {
                        value: run.to_string(),
                        confidence: 65,
                        provenance: Provenance::Path,
                    });
                }
            }
        }
    }

    codes
}

/// Stage 5: labeled decorations
///
/// `SKU-123456`, `[123456]`, `(123456)`, and delimiter-framed numeric
/// groups are weak but recognizable conventions.
fn extract_labeled_pattern(input: &ExtractionInput) -> Vec<ExtractedCode> {
    let stem = input.stem;
    let mut codes = Vec::new();

    for (start, run) in digit_runs(stem) {
        if !is_code_candidate(run) {
            continue;
        }
        let end = start + run.len();
        let before = stem[..start].chars().last();
        let after = stem[end..].chars().next();

        let bracketed = matches!((before, after), (Some('['), Some(']')) | (Some('('), Some(')')));
        let sku_labeled = stem[..start]
            .trim_end_matches(['-', '_', ' '])
            .to_ascii_lowercase()
            .ends_with("sku");
        let delimited = matches!(before, Some('-') | Some('_')) || matches!(after, Some('-') | Some('_'));

        if bracketed || sku_labeled || delimited {
            codes.push(ExtractedCode {
                value: run.to_string(),
                confidence: 60,
                provenance: Provenance::Pattern,
            });
        }
    }

    codes
}

/// Stage 6: zero-padding variants of every code found so far
///
/// Catches formatting differences between filenames and catalog codes
/// (`445` vs `00445`) at low confidence.
fn fuzzy_variants(found: &[ExtractedCode]) -> Vec<ExtractedCode> {
    let mut variants = Vec::new();

    for code in found {
        // Pad short codes up to typical SKU width
        if code.value.len() < TYPICAL_SKU_WIDTH {
            let padded = format!("{:0>width$}", code.value, width = TYPICAL_SKU_WIDTH);
            variants.push(ExtractedCode {
                value: padded,
                confidence: 45,
                provenance: Provenance::Fuzzy,
            });
        }
        // Strip all leading zeros
        let stripped = strip_leading_zeros(&code.value);
        if stripped != code.value {
            variants.push(ExtractedCode {
                value: stripped.to_string(),
                confidence: 45,
                provenance: Provenance::Fuzzy,
            });
        }
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_numeric_filename() {
        let codes = extract_codes("445404.jpg", None);
        assert_eq!(codes[0].value, "445404");
        assert_eq!(codes[0].confidence, 100);
        assert_eq!(codes[0].provenance, Provenance::Exact);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let first = extract_codes("445404.jpg", None);
        let second = extract_codes("445404.jpg", None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_five_digit_code_emits_padded_variant() {
        let codes = extract_codes("44540.jpg", None);
        assert_eq!(codes[0].value, "44540");
        assert_eq!(codes[0].confidence, 100);

        let padded = codes.iter().find(|c| c.value == "044540").unwrap();
        assert_eq!(padded.confidence, 95);
        assert_eq!(padded.provenance, Provenance::ZeroPadded);
    }

    #[test]
    fn test_leading_zero_code_emits_trimmed_variant() {
        let codes = extract_codes("00445.jpg", None);
        assert_eq!(codes[0].value, "00445");
        assert_eq!(codes[0].confidence, 100);

        let trimmed = codes.iter().find(|c| c.value == "445").unwrap();
        assert_eq!(trimmed.confidence, 95);
    }

    #[test]
    fn test_multi_sku_descending_confidence() {
        let codes = extract_codes("319027.319026.png", None);
        assert_eq!(codes[0].value, "319027");
        assert_eq!(codes[1].value, "319026");
        assert!(codes[0].confidence > codes[1].confidence);
        assert_eq!(codes[0].provenance, Provenance::Multi);
    }

    #[test]
    fn test_multi_sku_confidence_floor() {
        let codes = extract_codes("100.200.300.400.500.600.700.800.900.111.jpg", None);
        let multi: Vec<_> = codes
            .iter()
            .filter(|c| c.provenance == Provenance::Multi)
            .collect();
        assert!(multi.iter().all(|c| c.confidence >= 70));
    }

    #[test]
    fn test_multi_sku_floor_holds_at_extreme_positions() {
        // 70 groups; positions past the 64th must still sit on the floor,
        // not wrap back up
        let stem: Vec<String> = (0..70).map(|i| format!("{:03}", 100 + i)).collect();
        let filename = format!("{}.jpg", stem.join("."));
        let codes = extract_codes(&filename, None);

        let late = codes.iter().find(|c| c.value == "164").unwrap();
        assert_eq!(late.confidence, 70);
        let last = codes.iter().find(|c| c.value == "169").unwrap();
        assert_eq!(last.confidence, 70);
        assert!(codes
            .iter()
            .filter(|c| c.provenance == Provenance::Multi)
            .all(|c| (70..=90).contains(&c.confidence)));
    }

    #[test]
    fn test_numeric_prefix_scores_above_direct_threshold() {
        let codes = extract_codes("500123_frontview_extra_text.jpg", None);
        assert_eq!(codes[0].value, "500123");
        assert!(codes[0].confidence >= 80);
    }

    #[test]
    fn test_numeric_suffix_scores_lower_than_prefix() {
        let prefix = extract_codes("500123_photo.jpg", None);
        let suffix = extract_codes("photo_500123.jpg", None);
        let p = prefix.iter().find(|c| c.value == "500123").unwrap();
        let s = suffix.iter().find(|c| c.value == "500123").unwrap();
        assert!(p.confidence > s.confidence);
    }

    #[test]
    fn test_path_segment_extraction() {
        let codes = extract_codes("front.jpg", Some("products/445404/front.jpg"));
        let from_path = codes.iter().find(|c| c.value == "445404").unwrap();
        assert_eq!(from_path.provenance, Provenance::Path);
        assert!(from_path.confidence >= 65 && from_path.confidence <= 70);
    }

    #[test]
    fn test_labeled_sku_pattern() {
        let codes = extract_codes("SKU-123456.jpg", None);
        let labeled = codes.iter().find(|c| c.value == "123456").unwrap();
        // The delimiter-framed numeric-anywhere rule may outrank the label rule
        assert!(labeled.confidence >= 60);
    }

    #[test]
    fn test_bracketed_pattern() {
        let codes = extract_codes("product[123456].jpg", None);
        assert!(codes.iter().any(|c| c.value == "123456"));
    }

    #[test]
    fn test_fuzzy_variants_present_at_low_confidence() {
        let codes = extract_codes("445.jpg", None);
        let padded = codes.iter().find(|c| c.value == "000445").unwrap();
        assert_eq!(padded.provenance, Provenance::Fuzzy);
        assert!(padded.confidence < 60);
    }

    #[test]
    fn test_no_codes_in_plain_name() {
        let codes = extract_codes("hero-banner.jpg", None);
        assert!(codes.is_empty());
    }

    #[test]
    fn test_too_short_and_too_long_runs_ignored() {
        assert!(extract_codes("ab12.jpg", None).is_empty());
        assert!(extract_codes("123456789.jpg", None).is_empty());
    }

    #[test]
    fn test_dedup_keeps_highest_confidence() {
        // "445404" appears both as exact stem and as a digit run
        let codes = extract_codes("445404.jpg", None);
        let occurrences = codes.iter().filter(|c| c.value == "445404").count();
        assert_eq!(occurrences, 1);
        assert_eq!(codes[0].confidence, 100);
    }

    #[test]
    fn test_sorted_by_descending_confidence() {
        let codes = extract_codes("12345_design_00678.jpg", None);
        for pair in codes.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }
}
