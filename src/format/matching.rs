//! Text normalization and fuzzy matching.
//!
//! All comparisons run on normalized text: NFKC-folded, lowercased, trimmed
//! and with inner whitespace collapsed to a single space. Similarity ratios
//! follow the matching-blocks definition `2 * M / T` where `M` is the number
//! of matched characters and `T` the total length of both strings.

use serde::{Deserialize, Serialize};
use similar::TextDiff;
use unicode_normalization::UnicodeNormalization;

/// Normalize a string for comparison.
pub fn normalize_string(s: &str) -> String {
    let folded: String = s.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a single token: NFKC-folded with every whitespace character removed.
pub fn normalize_word(s: &str) -> String {
    s.nfkc().filter(|c| !c.is_whitespace()).collect()
}

/// Character-level similarity ratio in `[0, 1]`; two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(a, b).ratio())
}

/// Length of the common prefix of `a` and `b` relative to the length of `a`.
///
/// Returns 1.0 when `a` is empty.
pub fn prefix_similarity(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    if len_a == 0 {
        return 1.0;
    }
    let common = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count();
    common as f64 / len_a as f64
}

/// How a needle is compared against a piece of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Normalized needle is a substring of normalized text
    #[default]
    Contains,
    /// Similarity ratio against the whole text reaches the threshold
    Fuzzy,
    /// Similarity ratio against the leading window of the text, as long as
    /// the needle, reaches the threshold (headings followed by a date)
    FuzzyStart,
    /// Common-prefix similarity reaches the threshold
    Prefix,
    /// Both `Fuzzy` with `threshold` and `Prefix` with `prefix_threshold`
    FuzzyPrefix,
}

/// Matching rule with its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matcher {
    #[serde(default)]
    pub mode: MatchMode,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_prefix_threshold")]
    pub prefix_threshold: f64,
}

fn default_threshold() -> f64 {
    0.85
}

fn default_prefix_threshold() -> f64 {
    0.3
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            mode: MatchMode::Contains,
            threshold: default_threshold(),
            prefix_threshold: default_prefix_threshold(),
        }
    }
}

impl Matcher {
    /// Create a matcher with the given mode and threshold.
    pub fn new(mode: MatchMode, threshold: f64) -> Self {
        Self {
            mode,
            threshold,
            ..Self::default()
        }
    }

    /// Set the prefix threshold used by [`MatchMode::FuzzyPrefix`].
    pub fn with_prefix_threshold(mut self, threshold: f64) -> Self {
        self.prefix_threshold = threshold;
        self
    }

    /// Whether `needle` matches `text`. Empty needles never match.
    pub fn matches(&self, text: &str, needle: &str) -> bool {
        let needle = normalize_string(needle);
        if needle.is_empty() {
            return false;
        }
        let text = normalize_string(text);
        self.matches_normalized(&text, &needle)
    }

    /// Same as [`Matcher::matches`] for already normalized inputs.
    pub fn matches_normalized(&self, text: &str, needle: &str) -> bool {
        match self.mode {
            MatchMode::Contains => text.contains(needle),
            MatchMode::Fuzzy => ratio(needle, text) >= self.threshold,
            MatchMode::FuzzyStart => leading_ratio(text, needle) >= self.threshold,
            MatchMode::Prefix => prefix_similarity(needle, text) >= self.threshold,
            MatchMode::FuzzyPrefix => {
                ratio(needle, text) >= self.threshold
                    && prefix_similarity(needle, text) >= self.prefix_threshold
            }
        }
    }
}

/// Ratio of `needle` against the first `needle.len()` characters of `text`.
fn leading_ratio(text: &str, needle: &str) -> f64 {
    let window: String = text.chars().take(needle.chars().count()).collect();
    ratio(needle, &window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_string() {
        assert_eq!(normalize_string("  Securities\tPortfolio \n AS AT "), "securities portfolio as at");
        // NFKC folds compatibility forms (non-breaking space, ligatures)
        assert_eq!(normalize_string("E\u{00A0}ni \u{FB01}nance"), "e ni finance");
    }

    #[test]
    fn test_normalize_word() {
        assert_eq!(normalize_word(" 1 234,5 "), "1234,5");
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("abcd", "abcd"), 1.0);
        assert_eq!(ratio("abcd", "wxyz"), 0.0);
        let r = ratio("holdings", "holdinqs");
        assert!(r > 0.85 && r < 1.0);
    }

    #[test]
    fn test_prefix_similarity() {
        assert_eq!(prefix_similarity("", "abc"), 1.0);
        assert_eq!(prefix_similarity("enel", "enel spa"), 1.0);
        assert_eq!(prefix_similarity("enel", "eni"), 0.5);
        assert_eq!(prefix_similarity("abc", "xbc"), 0.0);
    }

    #[test]
    fn test_contains_mode() {
        let m = Matcher::default();
        assert!(m.matches("ENI S.p.A.  5,000", "eni s.p.a."));
        assert!(!m.matches("ENEL", "eni"));
        assert!(!m.matches("anything", "   "));
    }

    #[test]
    fn test_fuzzy_mode_scores_whole_text() {
        let m = Matcher::new(MatchMode::Fuzzy, 0.8);
        assert!(m.matches("Securites Portfolio as at", "Securities Portfolio as at"));
        assert!(m.matches("Leonardo Sp.A.", "Leonardo SpA"));
        // a short needle at the start of a longer name is not a match
        assert!(!m.matches("Intesa Sanpaolo Vita", "Intesa"));
    }

    #[test]
    fn test_fuzzy_start_mode_uses_leading_window() {
        let m = Matcher::new(MatchMode::FuzzyStart, 0.85);
        assert!(m.matches("Securities Portfolio as at 31/12/2024", "Securities Portfolio as at"));
        assert!(m.matches("Securites Portfolio as at", "Securities Portfolio as at"));
        assert!(!m.matches("Statement of Operations", "Securities Portfolio as at"));
    }

    #[test]
    fn test_fuzzy_prefix_mode() {
        let m = Matcher::new(MatchMode::FuzzyPrefix, 0.8).with_prefix_threshold(0.3);
        assert!(m.matches("Intesa Sanpaolo", "intesa sanpaolo spa"));
        // similar body but different leading characters
        assert!(!m.matches("xntesa sanpaolo", "intesa sanpaolo"));
    }

    #[test]
    fn test_matcher_deserialize_defaults() {
        let m: Matcher = serde_yaml::from_str("mode: fuzzy").unwrap();
        assert_eq!(m.mode, MatchMode::Fuzzy);
        assert_eq!(m.threshold, 0.85);
        assert_eq!(m.prefix_threshold, 0.3);
    }
}
