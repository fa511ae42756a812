//! Merge/dedup engine implementation.
//!
//! Combines scored citations from all sources into one collection and
//! removes duplicates by identity precedence: lowercase DOI first, then
//! normalized title (lowercased, non-alphanumeric stripped).
//!
//! The collection is stable-sorted descending by year *before* deduplication,
//! with absent years sorting last. This is deliberate policy, not an
//! implementation detail: when two records represent the same paper but
//! disagree on year (preprint vs. journal version), the later year survives,
//! and original arrival order breaks remaining ties. Records with neither a
//! usable DOI nor a usable title cannot be identified as duplicates and are
//! never merged away.

use std::collections::HashSet;
use tracing::info;

use crate::score::ScoredCitation;
use crate::utils::normalize_title;

/// Merges per-source collections and deduplicates by DOI, then by
/// normalized title. Returns the surviving records, highest year first.
#[must_use]
pub fn merge_and_dedupe(per_source: Vec<Vec<ScoredCitation>>) -> Vec<ScoredCitation> {
    let mut merged: Vec<ScoredCitation> = per_source.into_iter().flatten().collect();
    let before = merged.len();

    // Stable sort keeps arrival order within a year; absent years sort last.
    merged.sort_by_key(|s| std::cmp::Reverse(s.citation.year.unwrap_or(i32::MIN)));

    let mut seen_dois: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();

    merged.retain(|s| {
        // DOIs are already lowercase out of the normalizer; lowercasing the
        // key again keeps identity case-insensitive for externally fed rows.
        if let Some(doi) = s.citation.doi.as_deref().filter(|d| !d.is_empty()) {
            if !seen_dois.insert(doi.to_lowercase()) {
                return false;
            }
        }
        let title_key = normalize_title(&s.citation.title);
        if title_key.is_empty() {
            // No usable identity left; keep it.
            return true;
        }
        seen_titles.insert(title_key)
    });

    info!(
        before,
        after = merged.len(),
        removed = before - merged.len(),
        "merged and deduplicated citations"
    );
    merged
}
