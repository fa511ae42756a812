//! Relevance scorer implementation.
//!
//! Computes a composite additive score per normalized citation from the
//! signal registry: a baseline for having been fetched at all, positive
//! weights for canonical-term, author-seed, integration, scope, and
//! journal-whitelist hits, negative weights for off-geography and off-domain
//! vocabulary, and minor short-title / old-paper heuristics.
//!
//! Weights are externally configurable ([`RelevanceWeights`]); the scorer
//! hardcodes only the trigger conditions. Term matching is case-insensitive
//! raw substring containment, deliberately not word-boundary matching, so
//! short terms can over-match inside unrelated words. That is the defined
//! behavior of the scoring system, kept as a tunable rather than silently
//! "fixed", because switching to word boundaries changes scoring outcomes.
//!
//! Scoring is a pure transform: it produces new [`ScoredCitation`] values and
//! never mutates the input, so batches can be scored in parallel (enable the
//! `parallel` feature).

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::registry::SignalRegistry;
use crate::Citation;

/// A named scoring rule that fired for a record, kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    KeywordHit,
    CanonicalTerm,
    DatasetAuthorSeed,
    IntegrationTerm,
    ScopeTerm,
    JournalWhitelist,
    NegGeography,
    NegDomain,
    ShortTitle,
    OldPaper,
}

impl Signal {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::KeywordHit => "keyword_hit",
            Signal::CanonicalTerm => "canonical_term",
            Signal::DatasetAuthorSeed => "dataset_author_seed",
            Signal::IntegrationTerm => "integration_term",
            Signal::ScopeTerm => "scope_term",
            Signal::JournalWhitelist => "journal_whitelist",
            Signal::NegGeography => "neg_geography",
            Signal::NegDomain => "neg_domain",
            Signal::ShortTitle => "short_title",
            Signal::OldPaper => "old_paper",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal-class weights for the composite relevance score.
///
/// All weights are signed reals loaded from configuration; `Default` matches
/// the observed production configuration. A class's weight applies at most
/// once per record no matter how many terms within the class match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceWeights {
    /// Baseline: the record was fetched at all.
    pub keyword_hit: f64,
    /// Canonical dataset mention in title/abstract; almost a sure thing.
    pub canonical_term: f64,
    /// Cites a seed paper or matches a known dataset author.
    pub dataset_author_seed: f64,
    /// Integration / market-structure vocabulary.
    pub integration_term: f64,
    /// In-scope subject-matter cue.
    pub scope_term: f64,
    /// Journal is on the whitelist.
    pub journal_whitelist: f64,
    /// Off-geography vocabulary (negative).
    pub neg_geography: f64,
    /// Off-domain vocabulary (negative).
    pub neg_domain: f64,
    /// Title under 5 words, often editorials. Default 0: present for
    /// calibration, not load-bearing.
    pub short_title: f64,
    /// Published before the dataset could plausibly be cited (negative).
    pub old_paper: f64,
    /// Years strictly below this trigger `old_paper`.
    pub old_paper_cutoff: i32,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            keyword_hit: 0.5,
            canonical_term: 2.0,
            dataset_author_seed: 1.5,
            integration_term: 1.0,
            scope_term: 1.0,
            journal_whitelist: 0.5,
            neg_geography: -1.0,
            neg_domain: -1.0,
            short_title: 0.0,
            old_paper: -0.5,
            old_paper_cutoff: 2008,
        }
    }
}

/// A [`Citation`] with its deterministic relevance score and audit flags.
///
/// The score is recomputed from the citation plus the registry and weights;
/// it is never mutated directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCitation {
    pub citation: Citation,
    pub relevance_score: f64,
    /// Every signal class that fired, in evaluation order.
    pub signal_flags: Vec<Signal>,
}

impl ScoredCitation {
    /// Wraps a citation with a zero score and no flags. Useful for feeding
    /// externally pre-filtered records into the merge stage.
    #[must_use]
    pub fn unscored(citation: Citation) -> Self {
        Self {
            citation,
            relevance_score: 0.0,
            signal_flags: Vec::new(),
        }
    }

    /// Comma-joined flag names, as emitted in report columns.
    #[must_use]
    pub fn flags_string(&self) -> String {
        self.signal_flags
            .iter()
            .map(Signal::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Scores one citation against the registry with the given weights.
///
/// The search text is `title + " " + abstract`, lowercased; journal and the
/// derived author string are matched separately. Pure and deterministic.
#[must_use]
pub fn score(
    citation: &Citation,
    registry: &SignalRegistry,
    weights: &RelevanceWeights,
) -> ScoredCitation {
    let text = format!("{} {}", citation.title, citation.abstract_text).to_lowercase();
    let authors = citation.author_string().to_lowercase();

    let mut total = 0.0;
    let mut flags = Vec::new();
    let mut fire = |signal: Signal, weight: f64| {
        total += weight;
        flags.push(signal);
    };

    // Baseline: we fetched it
    fire(Signal::KeywordHit, weights.keyword_hit);

    if any_term_in(&text, registry.canonical_terms()) {
        fire(Signal::CanonicalTerm, weights.canonical_term);
    }

    let cites_seed = citation
        .pmid
        .as_deref()
        .is_some_and(|pmid| registry.seed_pmids().any(|seed| pmid.contains(seed)));
    let seed_author = registry
        .seed_authors()
        .any(|name| !name.is_empty() && authors.contains(&name.to_lowercase()));
    if cites_seed || seed_author {
        fire(Signal::DatasetAuthorSeed, weights.dataset_author_seed);
    }

    if any_term_in(&text, registry.integration_terms()) {
        fire(Signal::IntegrationTerm, weights.integration_term);
    }

    if any_term_in(&text, registry.scope_terms()) {
        fire(Signal::ScopeTerm, weights.scope_term);
    }

    if registry
        .journal_whitelist()
        .iter()
        .any(|journal| journal == &citation.journal)
    {
        fire(Signal::JournalWhitelist, weights.journal_whitelist);
    }

    if any_term_in(&text, registry.neg_geography()) {
        fire(Signal::NegGeography, weights.neg_geography);
    }

    if any_term_in(&text, registry.neg_domain()) {
        fire(Signal::NegDomain, weights.neg_domain);
    }

    // Titles under 5 words are often editorials
    if citation.title.split_whitespace().count() < 5 {
        fire(Signal::ShortTitle, weights.short_title);
    }

    if citation
        .year
        .is_some_and(|year| year < weights.old_paper_cutoff)
    {
        fire(Signal::OldPaper, weights.old_paper);
    }

    debug!(
        title = %truncate(&citation.title, 50),
        score = total,
        flags = %flags.iter().map(Signal::as_str).collect::<Vec<_>>().join(","),
        "scored citation"
    );

    ScoredCitation {
        citation: citation.clone(),
        relevance_score: total,
        signal_flags: flags,
    }
}

/// Scores a batch of citations. Rows are independent, so with the `parallel`
/// feature enabled this runs on the rayon pool.
#[must_use]
pub fn score_batch(
    citations: &[Citation],
    registry: &SignalRegistry,
    weights: &RelevanceWeights,
) -> Vec<ScoredCitation> {
    #[cfg(feature = "parallel")]
    {
        citations
            .par_iter()
            .map(|c| score(c, registry, weights))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        citations
            .iter()
            .map(|c| score(c, registry, weights))
            .collect()
    }
}

/// Splits a scored set at the threshold: `(kept, pruned)`.
///
/// Records with `relevance_score >= threshold` are kept. The pruned set is
/// handed back rather than discarded so callers can log or inspect it for
/// calibration.
#[must_use]
pub fn prune(
    scored: Vec<ScoredCitation>,
    threshold: f64,
) -> (Vec<ScoredCitation>, Vec<ScoredCitation>) {
    scored
        .into_iter()
        .partition(|s| s.relevance_score >= threshold)
}

/// Case-insensitive raw substring containment over a term list.
/// Multiple matches within one list still count as one class hit.
fn any_term_in(text: &str, terms: &[String]) -> bool {
    terms
        .iter()
        .any(|term| !term.is_empty() && text.contains(&term.to_lowercase()))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
