//! Issuer target lists.

use std::io::Read;
use std::path::Path;

use super::matching::{normalize_string, Matcher};
use crate::error::Result;

/// Issuer names to keep; an empty list keeps every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Targets {
    names: Vec<String>,
    normalized: Vec<String>,
}

impl Targets {
    /// Build a target list from names, dropping blank entries.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut targets = Self::default();
        for name in names {
            let name: String = name.into();
            let normalized = normalize_string(&name);
            if normalized.is_empty() {
                continue;
            }
            targets.names.push(name.trim().to_string());
            targets.normalized.push(normalized);
        }
        targets
    }

    /// Read a targets CSV: names in the first column, first row is a header.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let mut names = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if let Some(name) = record.get(0) {
                names.push(name.to_string());
            }
        }
        Ok(Self::new(names))
    }

    /// Read a targets CSV file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Whether no targets are configured.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Target names as given.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// First target (in list order) that matches `text`, usually an issuer name.
    pub fn find_match(&self, text: &str, matcher: &Matcher) -> Option<&str> {
        let text = normalize_string(text);
        self.names
            .iter()
            .zip(&self.normalized)
            .find(|(_, needle)| matcher.matches_normalized(&text, needle))
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::matching::MatchMode;

    #[test]
    fn test_from_reader_skips_header() {
        let csv = "company,sector\nENI S.p.A.,energy\n  ,\nLeonardo,defence\n";
        let targets = Targets::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(targets.names(), &["ENI S.p.A.".to_string(), "Leonardo".to_string()]);
    }

    #[test]
    fn test_find_match_first_wins() {
        let targets = Targets::new(["Leonardo", "Leonardo SpA"]);
        let m = Matcher::default();
        assert_eq!(targets.find_match("LEONARDO SPA\t100", &m), Some("Leonardo"));
        assert_eq!(targets.find_match("ENEL", &m), None);

        let targets = Targets::new(["Fincantieri", "Leonardo SpA"]);
        let fuzzy = Matcher::new(MatchMode::Fuzzy, 0.8);
        assert_eq!(targets.find_match("Leonardo Sp.A.", &fuzzy), Some("Leonardo SpA"));
    }

    #[test]
    fn test_fuzzy_match_is_not_a_prefix_match() {
        let targets = Targets::new(["Intesa"]);
        let fuzzy = Matcher::new(MatchMode::Fuzzy, 0.8);
        assert_eq!(targets.find_match("Intesa Sanpaolo Vita", &fuzzy), None);
        assert_eq!(targets.find_match("INTESA", &fuzzy), Some("Intesa"));
    }
}
