//! CSV report writers.
//!
//! Two tables: the pre-classification snapshot (the merged, scored, pruned
//! set) and the final classified table. Headers are explicit and stable so
//! downstream spreadsheets and diffs do not move when struct fields do.
//! Derived columns are always present; empty means "absent", never a
//! sentinel value.

use csv::Writer;
use std::path::Path;

use crate::Result;
use crate::classify::ClassifiedCitation;
use crate::score::ScoredCitation;

const SNAPSHOT_HEADERS: [&str; 14] = [
    "title",
    "authors",
    "journal",
    "abstract",
    "year",
    "doi",
    "pmid",
    "url",
    "open_access_url",
    "source",
    "match_term",
    "cited_by_count",
    "relevance_score",
    "signal_flags",
];

const CITATION_HEADERS: [&str; 20] = [
    "title",
    "authors",
    "journal",
    "abstract",
    "year",
    "doi",
    "pmid",
    "url",
    "open_access_url",
    "source",
    "match_term",
    "cited_by_count",
    "relevance_score",
    "signal_flags",
    "fulltext_source",
    "content_hash",
    "uses_dataset",
    "classification_method",
    "evidence",
    "snippet",
];

fn scored_fields(scored: &ScoredCitation) -> Vec<String> {
    let citation = &scored.citation;
    vec![
        citation.title.clone(),
        citation.author_string(),
        citation.journal.clone(),
        citation.abstract_text.clone(),
        citation.year.map(|y| y.to_string()).unwrap_or_default(),
        citation.doi.clone().unwrap_or_default(),
        citation.pmid.clone().unwrap_or_default(),
        citation.url.clone(),
        citation.open_access_url.clone().unwrap_or_default(),
        citation.source.to_string(),
        citation.match_term.clone(),
        citation.cited_by_count.to_string(),
        scored.relevance_score.to_string(),
        scored.flags_string(),
    ]
}

/// Writes the merged, scored table as it stands before classification.
///
/// # Errors
///
/// Returns [`crate::TrackError::Io`] when the file cannot be created or
/// written.
pub fn write_snapshot_csv(rows: &[ScoredCitation], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = Writer::from_path(path.as_ref()).map_err(into_io)?;
    writer.write_record(SNAPSHOT_HEADERS).map_err(into_io)?;
    for row in rows {
        writer.write_record(scored_fields(row)).map_err(into_io)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the final classified table.
///
/// # Errors
///
/// Returns [`crate::TrackError::Io`] when the file cannot be created or
/// written.
pub fn write_citations_csv(rows: &[ClassifiedCitation], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = Writer::from_path(path.as_ref()).map_err(into_io)?;
    writer.write_record(CITATION_HEADERS).map_err(into_io)?;
    for row in rows {
        let mut fields = scored_fields(&row.scored);
        fields.extend([
            row.fulltext_source.to_string(),
            row.content_hash.clone(),
            row.uses_dataset.to_string(),
            row.classification_method.to_string(),
            row.evidence.clone(),
            row.snippet.clone(),
        ]);
        writer.write_record(fields).map_err(into_io)?;
    }
    writer.flush()?;
    Ok(())
}

fn into_io(err: csv::Error) -> crate::TrackError {
    crate::TrackError::Io(std::io::Error::other(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationMethod;
    use crate::fulltext::FulltextSource;
    use crate::{Citation, Source};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn sample_scored() -> ScoredCitation {
        let mut scored = ScoredCitation::unscored(Citation {
            title: "Private equity and health system ownership".to_string(),
            authors: vec!["Machta Rachel".to_string(), "Furukawa Michael F".to_string()],
            journal: "Health Affairs".to_string(),
            abstract_text: "We examine acquisitions of health systems.".to_string(),
            year: Some(2021),
            doi: Some("10.1377/hlthaff.2021.00714".to_string()),
            pmid: Some("34339240".to_string()),
            url: "https://pubmed.ncbi.nlm.nih.gov/34339240/".to_string(),
            source: Source::PubMed,
            match_term: "compendium of US health systems".to_string(),
            cited_by_count: 12,
            ..Default::default()
        });
        scored.relevance_score = 2.5;
        scored
    }

    #[test]
    fn test_snapshot_columns_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.csv");
        write_snapshot_csv(&[sample_scored()], &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), SNAPSHOT_HEADERS.join(","));
        let row = lines.next().unwrap();
        assert!(row.contains("Private equity and health system ownership"));
        assert!(row.contains("Machta Rachel; Furukawa Michael F"));
        assert!(row.contains("We examine acquisitions of health systems."));
        assert!(row.contains("2.5"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_citations_table_includes_analysis_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citations.csv");

        let record = ClassifiedCitation {
            scored: sample_scored(),
            fulltext: "full body".to_string(),
            fulltext_source: FulltextSource::Unpaywall,
            content_hash: "ab".repeat(32),
            uses_dataset: true,
            classification_method: ClassificationMethod::Regex,
            evidence: "we **used the Compendium** here".to_string(),
            snippet: "used the Compendium".to_string(),
        };
        write_citations_csv(&[record], &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(&CITATION_HEADERS.join(",")));
        assert!(text.contains("unpaywall"));
        assert!(text.contains("true"));
        assert!(text.contains("regex"));
        assert!(text.contains("used the Compendium"));
    }

    #[test]
    fn test_year_absent_writes_empty_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noyear.csv");

        let mut scored = sample_scored();
        scored.citation.year = None;
        write_snapshot_csv(&[scored], &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let row = text.lines().nth(1).unwrap();
        let fields: Vec<&str> = row.split(',').collect();
        let year_column = SNAPSHOT_HEADERS.iter().position(|h| *h == "year").unwrap();
        assert_eq!(fields[year_column], "");
    }
}
