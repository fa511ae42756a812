//! Record normalizer implementation.
//!
//! Maps a source-specific raw record (a loosely-typed JSON value, possibly
//! with missing keys) into the canonical [`Citation`] schema. Normalization
//! is a pure, best-effort transform: absent optional fields get
//! type-appropriate defaults, and a record that cannot yield even a title is
//! skipped with a log entry rather than propagated as an error.
//!
//! Collectors stamp a top-level `match_term` key onto each raw record with
//! the query term that produced the hit; every normalizer carries it into
//! [`Citation::match_term`] so provenance survives into the reports.
//!
//! # Example
//!
//! ```
//! use citetrack::{normalize, Source};
//! use serde_json::json;
//!
//! let raw = json!({
//!     "title": "Example Article",
//!     "doi": "10.1000/EXAMPLE",
//!     "publication_date": "2023 Jan 15",
//! });
//!
//! let citation = normalize(&raw, Source::PubMed).unwrap();
//! assert_eq!(citation.doi.as_deref(), Some("10.1000/example"));
//! assert_eq!(citation.year, Some(2023));
//! ```

use serde_json::Value;
use tracing::{debug, warn};

use crate::utils::{normalize_doi, year_from_value};
use crate::{Citation, Source};

/// Normalizes one raw source record into a [`Citation`].
///
/// Returns `None` when the record has no usable title; callers treat that as
/// a per-record skip, never a run failure. The same input always yields a
/// byte-identical output.
#[must_use]
pub fn normalize(raw: &Value, source: Source) -> Option<Citation> {
    let citation = match source {
        Source::PubMed => normalize_pubmed(raw),
        Source::OpenAlex => normalize_openalex(raw),
        Source::NihOcc => normalize_citation_graph(raw),
        Source::GoogleScholar => normalize_scholar(raw),
        Source::WebSearch => normalize_web(raw),
    };
    citation.filter(|c| !c.title.trim().is_empty())
}

/// Normalizes a batch of raw records, logging and dropping malformed ones.
///
/// Partial failures are expected, not exceptional: a skipped record never
/// affects its siblings.
#[must_use]
pub fn normalize_batch(records: &[Value], source: Source) -> Vec<Citation> {
    let mut citations = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for raw in records {
        match normalize(raw, source) {
            Some(citation) => citations.push(citation),
            None => {
                skipped += 1;
                debug!(%source, "skipping record without a usable title");
            }
        }
    }
    if skipped > 0 {
        warn!(%source, skipped, kept = citations.len(), "normalization skipped records");
    }
    citations
}

fn normalize_pubmed(raw: &Value) -> Option<Citation> {
    let pmid = text_field(raw, "pubmed_id");
    let url = if pmid.is_empty() {
        String::new()
    } else {
        format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/")
    };

    Some(Citation {
        title: text_field(raw, "title"),
        authors: pubmed_authors(raw.get("authors")),
        journal: text_field(raw, "journal"),
        year: raw.get("publication_date").and_then(year_from_value),
        doi: raw.get("doi").and_then(Value::as_str).and_then(normalize_doi),
        pmid: non_empty(pmid),
        abstract_text: text_field(raw, "abstract"),
        url,
        source: Source::PubMed,
        match_term: text_field(raw, "match_term"),
        ..Default::default()
    })
}

fn normalize_openalex(raw: &Value) -> Option<Citation> {
    let doi_field = text_field(raw, "doi");
    let authors = raw
        .get("authorships")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|a| a.pointer("/author/display_name"))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // Prefer the explicit OA URL, fall back to the primary location's
    // full-text URL when the work has one.
    let open_access_url = raw
        .pointer("/open_access/oa_url")
        .or_else(|| raw.pointer("/primary_location/source/fulltext_url"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(Citation {
        title: non_empty(text_field(raw, "title"))
            .unwrap_or_else(|| text_field(raw, "display_name")),
        authors,
        journal: raw
            .pointer("/host_venue/display_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        year: raw.get("publication_year").and_then(year_from_value),
        doi: normalize_doi(&doi_field),
        pmid: None,
        abstract_text: text_field(raw, "abstract"),
        url: doi_field,
        source: Source::OpenAlex,
        match_term: text_field(raw, "match_term"),
        cited_by_count: count_field(raw, "cited_by_count"),
        open_access_url,
        ..Default::default()
    })
}

fn normalize_citation_graph(raw: &Value) -> Option<Citation> {
    let pmid = id_field(raw, "pmid");
    let url = if pmid.is_empty() {
        String::new()
    } else {
        format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/")
    };

    Some(Citation {
        title: text_field(raw, "title"),
        journal: text_field(raw, "journal"),
        year: raw.get("year").and_then(year_from_value),
        doi: raw.get("doi").and_then(Value::as_str).and_then(normalize_doi),
        pmid: non_empty(pmid),
        url,
        source: Source::NihOcc,
        match_term: text_field(raw, "match_term"),
        cited_by_count: count_field(raw, "cited_by"),
        ..Default::default()
    })
}

fn normalize_scholar(raw: &Value) -> Option<Citation> {
    let bib = raw.get("bib").unwrap_or(raw);

    Some(Citation {
        title: text_field(bib, "title"),
        authors: scholar_authors(bib.get("author")),
        journal: text_field(bib, "venue"),
        year: bib.get("pub_year").and_then(year_from_value),
        doi: bib.get("doi").and_then(Value::as_str).and_then(normalize_doi),
        abstract_text: text_field(bib, "abstract"),
        url: text_field(raw, "pub_url"),
        source: Source::GoogleScholar,
        match_term: text_field(raw, "match_term"),
        cited_by_count: count_field(raw, "num_citations"),
        ..Default::default()
    })
}

fn normalize_web(raw: &Value) -> Option<Citation> {
    Some(Citation {
        title: text_field(raw, "title"),
        year: raw.get("published_date").and_then(year_from_value),
        abstract_text: text_field(raw, "snippet"),
        url: text_field(raw, "url"),
        source: Source::WebSearch,
        match_term: text_field(raw, "match_term"),
        ..Default::default()
    })
}

/// Author objects with `lastname` / `firstname`, as the PubMed API emits.
fn pubmed_authors(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|author| {
                    let last = author.get("lastname").and_then(Value::as_str).unwrap_or("");
                    let first = author.get("firstname").and_then(Value::as_str).unwrap_or("");
                    let name = format!("{last} {first}").trim().to_string();
                    non_empty(name)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Scholar emits either an `"A and B and C"` string or a list of names.
fn scholar_authors(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(" and ")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn text_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Identifier fields occasionally arrive as numbers instead of strings.
fn id_field(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn count_field(raw: &Value, key: &str) -> u32 {
    raw.get(key)
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_pubmed_record() {
        let raw = json!({
            "title": "Hospital consolidation and prices",
            "authors": [
                {"lastname": "Smith", "firstname": "Jane"},
                {"lastname": "Doe", "firstname": "John"},
            ],
            "journal": "Health Affairs",
            "publication_date": "2021 Mar 02",
            "doi": "10.1377/HLTHAFF.2020.01234",
            "pubmed_id": "33456789",
            "abstract": "We study consolidation.",
        });

        let citation = normalize(&raw, Source::PubMed).unwrap();
        assert_eq!(citation.title, "Hospital consolidation and prices");
        assert_eq!(citation.authors, vec!["Smith Jane", "Doe John"]);
        assert_eq!(citation.author_string(), "Smith Jane; Doe John");
        assert_eq!(citation.year, Some(2021));
        assert_eq!(citation.doi.as_deref(), Some("10.1377/hlthaff.2020.01234"));
        assert_eq!(citation.pmid.as_deref(), Some("33456789"));
        assert_eq!(citation.url, "https://pubmed.ncbi.nlm.nih.gov/33456789/");
        assert_eq!(citation.source, Source::PubMed);
    }

    #[test]
    fn test_openalex_record() {
        let raw = json!({
            "display_name": "Vertical integration of physicians",
            "authorships": [
                {"author": {"display_name": "A. Researcher"}},
                {"author": {"display_name": "B. Author"}},
            ],
            "host_venue": {"display_name": "Medical Care"},
            "publication_year": 2020,
            "doi": "https://doi.org/10.1097/MLR.0000000000001234",
            "open_access": {"oa_url": "https://europepmc.org/article/foo"},
            "cited_by_count": 42,
        });

        let citation = normalize(&raw, Source::OpenAlex).unwrap();
        assert_eq!(citation.title, "Vertical integration of physicians");
        assert_eq!(citation.authors, vec!["A. Researcher", "B. Author"]);
        assert_eq!(citation.journal, "Medical Care");
        assert_eq!(citation.year, Some(2020));
        assert_eq!(
            citation.doi.as_deref(),
            Some("10.1097/mlr.0000000000001234")
        );
        assert_eq!(citation.cited_by_count, 42);
        assert_eq!(
            citation.open_access_url.as_deref(),
            Some("https://europepmc.org/article/foo")
        );
    }

    #[test]
    fn test_match_term_stamp_survives_every_shape() {
        let stamped = [
            (Source::PubMed, json!({"title": "T", "match_term": "compendium of US health systems"})),
            (Source::OpenAlex, json!({"title": "T", "match_term": "compendium of US health systems"})),
            (Source::NihOcc, json!({"title": "T", "match_term": "Citation to PMID:30674227"})),
            (
                Source::GoogleScholar,
                json!({"bib": {"title": "T"}, "match_term": "compendium of US health systems"}),
            ),
            (Source::WebSearch, json!({"title": "T", "match_term": "compendium of US health systems"})),
        ];
        for (source, raw) in &stamped {
            let citation = normalize(raw, *source).unwrap();
            assert!(
                !citation.match_term.is_empty(),
                "match_term lost for {source}"
            );
        }

        // Unstamped records are still fine, the field just stays empty.
        let citation = normalize(&json!({"title": "T"}), Source::PubMed).unwrap();
        assert_eq!(citation.match_term, "");
    }

    #[test]
    fn test_citation_graph_record_with_numeric_pmid() {
        let raw = json!({
            "pmid": 30674227,
            "title": "Methods paper",
            "journal": "JAMA",
            "year": 2019,
            "cited_by": 310,
        });

        let citation = normalize(&raw, Source::NihOcc).unwrap();
        assert_eq!(citation.pmid.as_deref(), Some("30674227"));
        assert_eq!(citation.year, Some(2019));
        assert_eq!(citation.cited_by_count, 310);
        assert_eq!(citation.abstract_text, "");
        assert!(citation.authors.is_empty());
    }

    #[test]
    fn test_scholar_record() {
        let raw = json!({
            "bib": {
                "title": "Health system mergers",
                "author": "A One and B Two",
                "venue": "Health Services Research",
                "pub_year": "2022",
            },
            "pub_url": "https://example.com/paper",
            "num_citations": 7,
        });

        let citation = normalize(&raw, Source::GoogleScholar).unwrap();
        assert_eq!(citation.authors, vec!["A One", "B Two"]);
        assert_eq!(citation.year, Some(2022));
        assert_eq!(citation.url, "https://example.com/paper");
        assert_eq!(citation.cited_by_count, 7);
    }

    #[test]
    fn test_missing_title_is_skipped() {
        assert!(normalize(&json!({"doi": "10.1/x"}), Source::PubMed).is_none());
        assert!(normalize(&json!({"title": "   "}), Source::WebSearch).is_none());
        assert!(normalize(&json!(null), Source::OpenAlex).is_none());
    }

    #[test]
    fn test_batch_skips_malformed_without_failing() {
        let records = vec![
            json!({"title": "Good one"}),
            json!({"no_title": true}),
            json!({"title": "Another good one"}),
        ];
        let citations = normalize_batch(&records, Source::WebSearch);
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raw = json!({
            "title": "Stable Title",
            "doi": "10.1000/ABC",
            "publication_date": {"year": 2018},
        });
        let first = normalize(&raw, Source::PubMed).unwrap();
        let second = normalize(&raw, Source::PubMed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unparseable_year_is_absent_not_zero() {
        let raw = json!({"title": "No date", "publication_date": "in press"});
        let citation = normalize(&raw, Source::PubMed).unwrap();
        assert_eq!(citation.year, None);
    }
}
