//! Usage classifier implementation.
//!
//! Given full document text, determines whether the paper genuinely *uses*
//! the dataset versus merely mentioning it, with supporting evidence
//! extraction. Classification is a two-state affair with no persistence:
//! empty text is not classifiable (`method = none`), non-empty text is run
//! against every compiled usage pattern plus every registry URL treated as an
//! escaped literal (`method = regex`). One match anywhere flips the record
//! to "uses dataset".
//!
//! URL literals are matched by raw containment, the same deliberately
//! permissive behavior the scorer documents; see [`crate::score`].
//!
//! # Example
//!
//! ```
//! use citetrack::{RegistrySpec, SignalRegistry, UsageClassifier};
//!
//! let registry = SignalRegistry::from_spec(RegistrySpec {
//!     regex_usage_patterns: vec![r"linked\s+the\s+Compendium".into()],
//!     ..Default::default()
//! });
//! let classifier = UsageClassifier::new(&registry);
//!
//! let result = classifier.classify("We linked the Compendium to claims data.");
//! assert!(result.uses_dataset);
//! ```

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::fulltext::FulltextSource;
use crate::registry::SignalRegistry;
use crate::score::ScoredCitation;
use crate::utils::{ceil_char_boundary, floor_char_boundary};

/// Characters of context kept on each side of a match in `evidence`.
const EVIDENCE_CONTEXT: usize = 100;
/// Maximum match occurrences reported per pattern.
const EVIDENCE_MATCHES_PER_PATTERN: usize = 3;
/// Default snippet length.
pub const SNIPPET_LENGTH: usize = 160;

/// How a classification verdict was reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    Regex,
    #[default]
    None,
}

impl ClassificationMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationMethod::Regex => "regex",
            ClassificationMethod::None => "none",
        }
    }
}

impl fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one document's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// True iff at least one usage pattern matched anywhere in the text.
    pub uses_dataset: bool,
    pub method: ClassificationMethod,
    /// Source strings of every pattern that fired, for audit.
    pub matched_patterns: Vec<String>,
    /// Match contexts with the matched span marked, joined by `\n---\n`.
    pub evidence: String,
}

/// A fully processed record: scored citation plus full-text analysis.
///
/// Every derived field has a non-null default, so report writers never need
/// null checks beyond "is this the empty default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCitation {
    pub scored: ScoredCitation,
    /// Extracted body text (empty if unfetchable).
    pub fulltext: String,
    pub fulltext_source: FulltextSource,
    /// Digest of `fulltext`, used to skip reprocessing. Empty when no text.
    pub content_hash: String,
    pub uses_dataset: bool,
    pub classification_method: ClassificationMethod,
    pub evidence: String,
    pub snippet: String,
}

impl ClassifiedCitation {
    /// The degenerate result for a record whose full text was unavailable
    /// or whose analysis was skipped.
    #[must_use]
    pub fn unanalyzed(scored: ScoredCitation) -> Self {
        Self {
            scored,
            fulltext: String::new(),
            fulltext_source: FulltextSource::None,
            content_hash: String::new(),
            uses_dataset: false,
            classification_method: ClassificationMethod::None,
            evidence: String::new(),
            snippet: String::new(),
        }
    }
}

/// Classifies full text as "uses dataset" vs "mentions only".
///
/// Patterns are compiled once at construction from the registry's usage
/// patterns plus its URLs as escaped literals, then reused for every record.
#[derive(Debug, Clone)]
pub struct UsageClassifier {
    patterns: Vec<Regex>,
    snippet_patterns: Vec<Regex>,
}

impl UsageClassifier {
    #[must_use]
    pub fn new(registry: &SignalRegistry) -> Self {
        let mut patterns: Vec<Regex> = registry.compiled_patterns().to_vec();
        for url in registry.usage_urls() {
            match RegexBuilder::new(&regex::escape(url))
                .case_insensitive(true)
                .build()
            {
                Ok(compiled) => patterns.push(compiled),
                Err(e) => warn!(url, error = %e, "failed to compile URL literal pattern"),
            }
        }

        // Snippet scan terms come from the canonical dataset-name variants,
        // matched whole-word in registry-file order.
        let snippet_patterns = registry
            .canonical_terms()
            .iter()
            .filter_map(|term| {
                RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| warn!(term, error = %e, "failed to compile snippet term"))
                    .ok()
            })
            .collect();

        debug!(patterns = patterns.len(), "usage classifier ready");
        Self {
            patterns,
            snippet_patterns,
        }
    }

    /// Classifies one document's text.
    ///
    /// Empty text yields `uses_dataset = false, method = none`; non-empty
    /// text is matched against every pattern, collecting up to
    /// [`EVIDENCE_MATCHES_PER_PATTERN`] contexts per firing pattern.
    #[must_use]
    pub fn classify(&self, text: &str) -> Classification {
        if text.is_empty() {
            return Classification::default();
        }

        let mut matched_patterns = Vec::new();
        let mut evidence = Vec::new();

        for pattern in &self.patterns {
            let mut fired = false;
            for m in pattern
                .find_iter(text)
                .take(EVIDENCE_MATCHES_PER_PATTERN)
            {
                fired = true;
                evidence.push(marked_context(text, m.start(), m.end()));
            }
            if fired {
                matched_patterns.push(pattern.as_str().to_string());
            }
        }

        Classification {
            uses_dataset: !matched_patterns.is_empty(),
            method: ClassificationMethod::Regex,
            matched_patterns,
            evidence: evidence.join("\n---\n"),
        }
    }

    /// Extracts a short representative snippet from the text.
    ///
    /// Scans the snippet terms in order; the first one found yields a
    /// ~`max_length`-character window centered on the match, expanded
    /// outward to the nearest word boundary. No term found falls back to
    /// the first `max_length` characters with a truncation marker.
    #[must_use]
    pub fn extract_snippet(&self, text: &str, max_length: usize) -> String {
        if text.is_empty() {
            return String::new();
        }

        for pattern in &self.snippet_patterns {
            if let Some(m) = pattern.find(text) {
                let half = max_length / 2;
                let mut start = floor_char_boundary(text, m.start().saturating_sub(half));
                // The window always covers the whole match, so `end` stays
                // positive even for tiny `max_length`.
                let mut end =
                    ceil_char_boundary(text, (m.start() + half).max(m.end()).min(text.len()));

                let bytes = text.as_bytes();
                while start > 0 && bytes[start] != b' ' && bytes[start] != b'\n' {
                    start -= 1;
                }
                while end < text.len() && bytes[end - 1] != b' ' && bytes[end - 1] != b'\n' {
                    end += 1;
                }
                start = floor_char_boundary(text, start);
                end = ceil_char_boundary(text, end);
                return text[start..end].trim().to_string();
            }
        }

        let cut = floor_char_boundary(text, max_length);
        format!("{}...", text[..cut].trim())
    }
}

/// Context around a match with the matched span marked `**like this**`.
fn marked_context(text: &str, start: usize, end: usize) -> String {
    let ctx_start = floor_char_boundary(text, start.saturating_sub(EVIDENCE_CONTEXT));
    let ctx_end = ceil_char_boundary(text, (end + EVIDENCE_CONTEXT).min(text.len()));
    format!(
        "{}**{}**{}",
        &text[ctx_start..start],
        &text[start..end],
        &text[end..ctx_end]
    )
    .trim()
    .to_string()
}
