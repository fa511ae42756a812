//! Keyword/signal registry implementation.
//!
//! The registry is the immutable, loaded-once mapping of named term lists
//! (canonical terms, dataset-author seeds, integration terms, scope terms,
//! journal whitelist, negative geography, negative domain) plus the compiled
//! usage-detection patterns, shared by reference between the scorer and the
//! classifier.
//!
//! It is an explicitly constructed value, never a process-wide singleton:
//! load one from YAML at startup with [`SignalRegistry::load`], or build one
//! in memory with [`SignalRegistry::from_spec`] (no filesystem access needed
//! in unit tests).
//!
//! # Example
//!
//! ```
//! use citetrack::{RegistrySpec, SignalRegistry};
//!
//! let registry = SignalRegistry::from_spec(RegistrySpec {
//!     canonical_terms: vec!["Compendium of U.S. Health Systems".into()],
//!     regex_usage_patterns: vec![r"used\s+the\s+Compendium".into()],
//!     ..Default::default()
//! });
//! assert_eq!(registry.compiled_patterns().len(), 1);
//! ```

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::{Result, TrackError};

/// Categories of search terms the orchestrator routes to sources.
///
/// The YAML file lists each category as a top-level key; order within a list
/// is preserved for deterministic query order and "first N matches" logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermCategory {
    ExactUrls,
    PdfUrls,
    PhraseVariants,
    YearCombos,
    AgencyCombos,
    FundingAcknowledgment,
}

impl TermCategory {
    /// All categories in registry-file order.
    pub const ALL: [TermCategory; 6] = [
        TermCategory::ExactUrls,
        TermCategory::PdfUrls,
        TermCategory::PhraseVariants,
        TermCategory::YearCombos,
        TermCategory::AgencyCombos,
        TermCategory::FundingAcknowledgment,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TermCategory::ExactUrls => "exact_urls",
            TermCategory::PdfUrls => "pdf_urls",
            TermCategory::PhraseVariants => "phrase_variants",
            TermCategory::YearCombos => "year_combos",
            TermCategory::AgencyCombos => "agency_combos",
            TermCategory::FundingAcknowledgment => "funding_acknowledgment",
        }
    }
}

impl fmt::Display for TermCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw, deserializable contents of a signal registry.
///
/// Every category defaults to empty so a minimal file is valid; a category
/// that is present with the wrong element type is a fatal config error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrySpec {
    /// Phrases that near-certainly indicate the paper discusses the dataset.
    #[serde(default)]
    pub canonical_terms: Vec<String>,
    /// Seed PMIDs (digits) and author names associated with the dataset's
    /// originators. YAML may list PMIDs as bare numbers.
    #[serde(default, deserialize_with = "seed_strings")]
    pub dataset_author_seeds: Vec<String>,
    /// Integration / market-structure vocabulary.
    #[serde(default)]
    pub integration_terms: Vec<String>,
    /// Cues that the paper's subject is within the dataset's domain.
    #[serde(default)]
    pub scope_terms: Vec<String>,
    /// Journals whose presence is itself a (weak) positive signal.
    #[serde(default)]
    pub journal_whitelist: Vec<String>,
    /// Geography terms that argue against relevance.
    #[serde(default)]
    pub neg_geography: Vec<String>,
    /// Domain terms that argue against relevance.
    #[serde(default)]
    pub neg_domain: Vec<String>,
    /// Regex patterns indicating genuine dataset usage in full text.
    #[serde(default)]
    pub regex_usage_patterns: Vec<String>,
    /// Landing-page URLs of the dataset (searched verbatim, matched literally).
    #[serde(default)]
    pub exact_urls: Vec<String>,
    /// Direct PDF URLs of the dataset releases.
    #[serde(default)]
    pub pdf_urls: Vec<String>,
    /// Name variants of the dataset used as search phrases.
    #[serde(default)]
    pub phrase_variants: Vec<String>,
    /// Dataset name + release-year query combinations.
    #[serde(default)]
    pub year_combos: Vec<String>,
    /// Dataset name + sponsoring-agency query combinations.
    #[serde(default)]
    pub agency_combos: Vec<String>,
    /// Funding-acknowledgment phrasings.
    #[serde(default)]
    pub funding_acknowledgment: Vec<String>,
}

/// Accepts both bare numbers (seed PMIDs) and strings (author names).
fn seed_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seed {
        Pmid(u64),
        Name(String),
    }

    let seeds = Vec::<Seed>::deserialize(deserializer)?;
    Ok(seeds
        .into_iter()
        .map(|seed| match seed {
            Seed::Pmid(pmid) => pmid.to_string(),
            Seed::Name(name) => name,
        })
        .collect())
}

/// Immutable registry of term lists and compiled usage patterns.
///
/// Loaded once at startup and passed by reference into the scorer and the
/// classifier. Patterns are compiled case-insensitively exactly once;
/// patterns that fail to compile are logged and excluded rather than failing
/// the whole registry.
#[derive(Debug, Clone)]
pub struct SignalRegistry {
    spec: RegistrySpec,
    patterns: Vec<Regex>,
}

impl SignalRegistry {
    /// Loads a registry from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::Config`] when the file is missing, unreadable,
    /// not a mapping, or a category has the wrong element type. This is the
    /// only fatal error in the crate: callers must not proceed to collection
    /// without a registry.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            TrackError::Config(format!("cannot read signal registry {}: {e}", path.display()))
        })?;
        let spec: RegistrySpec = serde_yaml::from_str(&text)?;
        Ok(Self::from_spec(spec))
    }

    /// Builds a registry from an in-memory spec, compiling usage patterns.
    #[must_use]
    pub fn from_spec(spec: RegistrySpec) -> Self {
        let patterns = spec
            .regex_usage_patterns
            .iter()
            .filter_map(|pattern| {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(compiled) => Some(compiled),
                    Err(e) => {
                        warn!(pattern, error = %e, "skipping invalid usage pattern");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();
        debug!(
            patterns = patterns.len(),
            canonical_terms = spec.canonical_terms.len(),
            "signal registry ready"
        );
        Self { spec, patterns }
    }

    #[must_use]
    pub fn canonical_terms(&self) -> &[String] {
        &self.spec.canonical_terms
    }

    #[must_use]
    pub fn dataset_author_seeds(&self) -> &[String] {
        &self.spec.dataset_author_seeds
    }

    /// Seed entries that are paper identifiers (all digits).
    pub fn seed_pmids(&self) -> impl Iterator<Item = &str> {
        self.spec
            .dataset_author_seeds
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
    }

    /// Seed entries that are author names (anything not all digits).
    pub fn seed_authors(&self) -> impl Iterator<Item = &str> {
        self.spec
            .dataset_author_seeds
            .iter()
            .map(String::as_str)
            .filter(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()))
    }

    #[must_use]
    pub fn integration_terms(&self) -> &[String] {
        &self.spec.integration_terms
    }

    #[must_use]
    pub fn scope_terms(&self) -> &[String] {
        &self.spec.scope_terms
    }

    #[must_use]
    pub fn journal_whitelist(&self) -> &[String] {
        &self.spec.journal_whitelist
    }

    #[must_use]
    pub fn neg_geography(&self) -> &[String] {
        &self.spec.neg_geography
    }

    #[must_use]
    pub fn neg_domain(&self) -> &[String] {
        &self.spec.neg_domain
    }

    /// Usage patterns, compiled case-insensitively once at construction.
    #[must_use]
    pub fn compiled_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    /// All dataset URLs (landing pages + PDFs), in file order. The
    /// classifier matches these as escaped literals against full text.
    pub fn usage_urls(&self) -> impl Iterator<Item = &str> {
        self.spec
            .exact_urls
            .iter()
            .chain(self.spec.pdf_urls.iter())
            .map(String::as_str)
    }

    /// Terms in one search-term category, in file order.
    #[must_use]
    pub fn terms_in(&self, category: TermCategory) -> &[String] {
        match category {
            TermCategory::ExactUrls => &self.spec.exact_urls,
            TermCategory::PdfUrls => &self.spec.pdf_urls,
            TermCategory::PhraseVariants => &self.spec.phrase_variants,
            TermCategory::YearCombos => &self.spec.year_combos,
            TermCategory::AgencyCombos => &self.spec.agency_combos,
            TermCategory::FundingAcknowledgment => &self.spec.funding_acknowledgment,
        }
    }

    /// All search terms with their categories, in registry-file order.
    #[must_use]
    pub fn search_terms(&self) -> Vec<(&str, TermCategory)> {
        TermCategory::ALL
            .iter()
            .flat_map(|&category| {
                self.terms_in(category)
                    .iter()
                    .map(move |term| (term.as_str(), category))
            })
            .collect()
    }

    /// The category a search term belongs to, if any.
    #[must_use]
    pub fn category_for(&self, term: &str) -> Option<TermCategory> {
        TermCategory::ALL
            .into_iter()
            .find(|&category| self.terms_in(category).iter().any(|t| t == term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE_YAML: &str = r#"
canonical_terms:
  - "Compendium of U.S. Health Systems"
  - "AHRQ Compendium"
dataset_author_seeds:
  - 30674227
  - "Furukawa"
  - "Machta"
integration_terms:
  - "vertical integration"
journal_whitelist:
  - "Health Services Research"
neg_geography:
  - "NHS England"
regex_usage_patterns:
  - 'used\s+the\s+Compendium'
  - '([unclosed'
exact_urls:
  - "https://example.gov/compendium"
phrase_variants:
  - "health systems compendium"
"#;

    #[test]
    fn test_load_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_YAML.as_bytes()).unwrap();

        let registry = SignalRegistry::load(file.path()).unwrap();
        assert_eq!(registry.canonical_terms().len(), 2);
        assert_eq!(
            registry.canonical_terms()[0],
            "Compendium of U.S. Health Systems"
        );
        // Missing categories default to empty, not error
        assert!(registry.scope_terms().is_empty());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = SignalRegistry::load("/nonexistent/keywords.yaml").unwrap_err();
        assert!(matches!(err, TrackError::Config(_)));
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"- just\n- a\n- sequence\n").unwrap();
        let err = SignalRegistry::load(file.path()).unwrap_err();
        assert!(matches!(err, TrackError::Config(_)));
    }

    #[test]
    fn test_wrong_element_type_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"canonical_terms: 42\n").unwrap();
        let err = SignalRegistry::load(file.path()).unwrap_err();
        assert!(matches!(err, TrackError::Config(_)));
    }

    #[test]
    fn test_numeric_seeds_become_strings() {
        let registry =
            SignalRegistry::from_spec(serde_yaml::from_str(SAMPLE_YAML).unwrap());
        assert_eq!(registry.seed_pmids().collect::<Vec<_>>(), vec!["30674227"]);
        assert_eq!(
            registry.seed_authors().collect::<Vec<_>>(),
            vec!["Furukawa", "Machta"]
        );
    }

    #[test]
    fn test_bad_pattern_excluded_not_fatal() {
        let registry =
            SignalRegistry::from_spec(serde_yaml::from_str(SAMPLE_YAML).unwrap());
        // Two patterns in the file, one fails to compile
        assert_eq!(registry.compiled_patterns().len(), 1);
        assert!(registry.compiled_patterns()[0].is_match("They USED the compendium"));
    }

    #[test]
    fn test_search_terms_preserve_order() {
        let registry =
            SignalRegistry::from_spec(serde_yaml::from_str(SAMPLE_YAML).unwrap());
        let terms = registry.search_terms();
        assert_eq!(
            terms,
            vec![
                ("https://example.gov/compendium", TermCategory::ExactUrls),
                ("health systems compendium", TermCategory::PhraseVariants),
            ]
        );
        assert_eq!(
            registry.category_for("health systems compendium"),
            Some(TermCategory::PhraseVariants)
        );
        assert_eq!(registry.category_for("unknown term"), None);
    }

    #[test]
    fn test_usage_urls_chains_both_categories() {
        let registry = SignalRegistry::from_spec(RegistrySpec {
            exact_urls: vec!["https://a.gov".into()],
            pdf_urls: vec!["https://a.gov/data.pdf".into()],
            ..Default::default()
        });
        assert_eq!(
            registry.usage_urls().collect::<Vec<_>>(),
            vec!["https://a.gov", "https://a.gov/data.pdf"]
        );
    }
}
