//! A library for discovering, scoring, deduplicating, and classifying academic
//! citations to a specific reference dataset.
//!
//! `citetrack` takes heterogeneous, noisy records from multiple bibliographic
//! sources (PubMed, OpenAlex, a citation-graph API, Google Scholar, web-search
//! APIs), normalizes them into one canonical schema, merges and deduplicates
//! them by identity keys, applies a multi-signal weighted relevance score to
//! prune false positives, and classifies full text for genuine dataset usage
//! versus mere mention.
//!
//! # Key Features
//!
//! - **Record normalization**: one canonical [`Citation`] schema, mapped from
//!   each source's raw JSON shape
//! - **Signal registry**: named keyword lists and compiled usage patterns,
//!   loaded once from YAML and shared by reference
//! - **Relevance scoring**: composite additive score over configurable
//!   signal-class weights, with audit flags per record
//! - **Merge/dedup**: DOI-first identity, normalized-title fallback,
//!   later-year survivor policy
//! - **Usage classification**: regex evidence extraction over full text
//!
//! # Basic Usage
//!
//! ```rust
//! use citetrack::{RegistrySpec, RelevanceWeights, SignalRegistry, score};
//! use citetrack::{Citation, Source};
//!
//! let registry = SignalRegistry::from_spec(RegistrySpec {
//!     canonical_terms: vec!["Compendium of U.S. Health Systems".into()],
//!     ..Default::default()
//! });
//!
//! let citation = Citation {
//!     title: "Hospital integration using the Compendium of U.S. Health Systems".into(),
//!     source: Source::PubMed,
//!     ..Default::default()
//! };
//!
//! let scored = score(&citation, &registry, &RelevanceWeights::default());
//! assert!(scored.relevance_score >= 2.0);
//! ```
//!
//! # Merge and Deduplication
//!
//! ```rust
//! use citetrack::{merge_and_dedupe, Citation, ScoredCitation};
//!
//! let a = ScoredCitation::unscored(Citation {
//!     title: "Example".into(),
//!     doi: Some("10.1/abc".into()),
//!     year: Some(2020),
//!     ..Default::default()
//! });
//! let b = ScoredCitation::unscored(Citation {
//!     title: "Example (preprint)".into(),
//!     doi: Some("10.1/abc".into()),
//!     year: Some(2019),
//!     ..Default::default()
//! });
//!
//! let merged = merge_and_dedupe(vec![vec![a], vec![b]]);
//! assert_eq!(merged.len(), 1);
//! assert_eq!(merged[0].citation.year, Some(2020));
//! ```
//!
//! # Error Handling
//!
//! The library uses a custom [`Result`] type wrapping [`TrackError`]. Only
//! [`TrackError::Config`] (a missing or malformed signal registry) is fatal;
//! every other failure category is caught at per-source or per-record scope,
//! logged, and converted into degenerate-but-valid data so a run always
//! reaches report generation.
//!
//! # Thread Safety
//!
//! The registry is immutable once loaded and shared by reference. Scoring,
//! merging, and classification are pure transforms over in-memory collections
//! and may be batched in parallel (enable the `parallel` feature).

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod classify;
pub mod fulltext;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod registry;
#[cfg(feature = "csv")]
pub mod report;
pub mod score;
mod utils;

// Reexports
pub use classify::{Classification, ClassificationMethod, ClassifiedCitation, UsageClassifier};
pub use fulltext::{FulltextCache, FulltextProvider, FulltextSource, content_hash};
pub use merge::merge_and_dedupe;
pub use normalize::{normalize, normalize_batch};
pub use pipeline::{Pipeline, PipelineConfig, SourceCollector};
pub use registry::{RegistrySpec, SignalRegistry, TermCategory};
pub use score::{RelevanceWeights, ScoredCitation, Signal, prune, score, score_batch};

/// A specialized Result type for citation-tracking operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Represents errors that can occur while tracking citations.
///
/// Only [`TrackError::Config`] is allowed to terminate a run; the pipeline
/// catches [`TrackError::Source`] per source and degrades to an empty
/// contribution.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    // The field is `name`, not `source`: thiserror reserves a field called
    // `source` for an underlying error value.
    #[error("source {name} failed: {message}")]
    Source { name: String, message: String },
}

impl From<serde_yaml::Error> for TrackError {
    fn from(err: serde_yaml::Error) -> Self {
        TrackError::Config(err.to_string())
    }
}

/// Origin of a citation record.
///
/// The enumeration is fixed; each [`SourceCollector`] implementation reports
/// exactly one of these names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[default]
    PubMed,
    OpenAlex,
    #[serde(rename = "NIH_OCC")]
    NihOcc,
    GoogleScholar,
    WebSearch,
}

impl Source {
    /// The stable name used in logs and report columns.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::PubMed => "PubMed",
            Source::OpenAlex => "OpenAlex",
            Source::NihOcc => "NIH_OCC",
            Source::GoogleScholar => "GoogleScholar",
            Source::WebSearch => "WebSearch",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical citation record, as produced by the normalizer.
///
/// A `Citation` is read-only once created: scoring and classification wrap it
/// in derived records ([`ScoredCitation`], [`ClassifiedCitation`]) instead of
/// mutating it, so provenance stays auditable.
///
/// Identity for deduplication is `doi` when present (always lowercase), else
/// the normalized title; see [`merge_and_dedupe`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Title of the work
    pub title: String,
    /// Author display names, in source order
    pub authors: Vec<String>,
    /// Journal name
    pub journal: String,
    /// Publication year, 4-digit or absent (never 0 or a sentinel)
    pub year: Option<i32>,
    /// Digital Object Identifier, lowercase with no surrounding whitespace
    pub doi: Option<String>,
    /// PubMed ID
    pub pmid: Option<String>,
    /// Abstract text (may be empty)
    pub abstract_text: String,
    /// URL to the article
    pub url: String,
    /// Which bibliographic source produced this record
    pub source: Source,
    /// The query term that produced this hit (provenance, not identity)
    pub match_term: String,
    /// Citation count reported by the source
    pub cited_by_count: u32,
    /// Open-access full-text URL, if the source exposed one
    pub open_access_url: Option<String>,
}

impl Citation {
    /// Semicolon-joined author names, derived from `authors`.
    #[must_use]
    pub fn author_string(&self) -> String {
        self.authors.iter().join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_track_error_display() {
        let error = TrackError::Config("keywords file not found".to_string());
        assert_eq!(error.to_string(), "config error: keywords file not found");

        let error = TrackError::Source {
            name: "PubMed".to_string(),
            message: "HTTP 500".to_string(),
        };
        assert_eq!(error.to_string(), "source PubMed failed: HTTP 500");
    }

    #[test]
    fn test_source_names() {
        assert_eq!(Source::NihOcc.to_string(), "NIH_OCC");
        assert_eq!(Source::PubMed.as_str(), "PubMed");
    }

    #[test]
    fn test_author_string_is_derived() {
        let citation = Citation {
            authors: vec!["Furukawa Michael F".to_string(), "Machta Rachel".to_string()],
            ..Default::default()
        };
        assert_eq!(citation.author_string(), "Furukawa Michael F; Machta Rachel");

        let empty = Citation::default();
        assert_eq!(empty.author_string(), "");
    }
}
