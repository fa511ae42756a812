//! End-to-end orchestration: collect, normalize, score, merge, classify.
//!
//! The pipeline owns the stage ordering and the degradation policy. Every
//! per-source and per-record failure is logged and absorbed so a run always
//! produces a (possibly empty) result set; only a missing signal registry is
//! allowed to stop a run, and that happens before a [`Pipeline`] exists.
//!
//! Network access lives entirely behind the [`SourceCollector`] and
//! [`crate::FulltextProvider`] traits, which keeps every stage here testable
//! with in-memory stubs.

use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::classify::{ClassifiedCitation, SNIPPET_LENGTH, UsageClassifier};
use crate::fulltext::{FulltextCache, FulltextProvider, FulltextSource, content_hash};
use crate::merge::merge_and_dedupe;
use crate::normalize::normalize_batch;
use crate::registry::{SignalRegistry, TermCategory};
use crate::score::{RelevanceWeights, ScoredCitation, prune, score_batch};
use crate::{Result, Source};

/// A bibliographic source that can be searched for raw records.
///
/// Implementations wrap one upstream API each and return that API's raw JSON
/// records; shaping into [`crate::Citation`] is the normalizer's job, not
/// the collector's. The one annotation a collector adds is a top-level
/// `match_term` key on each record, naming the query term that produced the
/// hit (the citation-graph source uses a `Citation to PMID:<seed>` label).
pub trait SourceCollector {
    /// Which source this collector queries.
    fn source(&self) -> Source;

    /// Runs the given search terms and returns raw records.
    ///
    /// `terms` may be empty for sources that do not search by term (the
    /// citation-graph source traverses from its seed papers instead).
    ///
    /// # Errors
    ///
    /// Returns [`crate::TrackError::Source`] on any upstream failure. The
    /// pipeline treats this as an empty contribution, never as fatal.
    fn search(&self, terms: &[String]) -> Result<Vec<Value>>;
}

/// Which search terms a given source receives.
///
/// URL-shaped terms only produce hits on engines that index the open web;
/// handing them to a scholarly index wastes quota on guaranteed misses. The
/// citation-graph source does not search by term at all.
#[must_use]
pub fn terms_for_source(source: Source, registry: &SignalRegistry) -> Vec<String> {
    match source {
        Source::NihOcc => Vec::new(),
        Source::GoogleScholar | Source::WebSearch => registry
            .search_terms()
            .into_iter()
            .map(|(term, _)| term.to_string())
            .collect(),
        Source::PubMed | Source::OpenAlex => registry
            .search_terms()
            .into_iter()
            .filter(|(_, category)| {
                !matches!(category, TermCategory::ExactUrls | TermCategory::PdfUrls)
            })
            .map(|(term, _)| term.to_string())
            .collect(),
    }
}

/// Tuning knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Signal-class weights used by the scorer.
    pub weights: RelevanceWeights,
    /// Records scoring below this are pruned before merge.
    pub threshold: f64,
    /// When set, the merged pre-classification table is written here as CSV.
    pub snapshot_path: Option<PathBuf>,
    /// When false the full-text stage is skipped entirely and every record
    /// comes back unanalyzed.
    pub fetch_fulltext: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weights: RelevanceWeights::default(),
            threshold: 0.0,
            snapshot_path: None,
            fetch_fulltext: true,
        }
    }
}

/// The full collect-to-classify pipeline.
///
/// Borrow the registry, configure once, then [`run`](Pipeline::run) with any
/// set of collectors.
pub struct Pipeline<'a> {
    registry: &'a SignalRegistry,
    config: PipelineConfig,
    cache: Option<FulltextCache>,
    provider: Option<Box<dyn FulltextProvider>>,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(registry: &'a SignalRegistry, config: PipelineConfig) -> Self {
        Self {
            registry,
            config,
            cache: None,
            provider: None,
        }
    }

    /// Attaches a full-text cache, consulted before the provider and updated
    /// after every successful fetch.
    #[must_use]
    pub fn with_cache(mut self, cache: FulltextCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attaches a full-text provider, consulted on cache miss.
    #[must_use]
    pub fn with_provider(mut self, provider: Box<dyn FulltextProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Runs the pipeline over the given collectors.
    ///
    /// A collector that fails contributes nothing; a run in which every
    /// collector fails completes with an empty result set. Records whose
    /// full text cannot be obtained come back as
    /// [`ClassifiedCitation::unanalyzed`].
    ///
    /// # Errors
    ///
    /// Only IO failures writing the snapshot CSV propagate.
    pub fn run(&self, collectors: &[Box<dyn SourceCollector>]) -> Result<Vec<ClassifiedCitation>> {
        let mut batches = Vec::with_capacity(collectors.len());
        for collector in collectors {
            batches.push(self.collect_one(collector.as_ref()));
        }

        let merged = merge_and_dedupe(batches);

        if let Some(path) = &self.config.snapshot_path {
            #[cfg(feature = "csv")]
            {
                crate::report::write_snapshot_csv(&merged, path)?;
                info!(path = %path.display(), rows = merged.len(), "wrote snapshot");
            }
            #[cfg(not(feature = "csv"))]
            warn!(path = %path.display(), "snapshot requested but csv support is disabled");
        }

        let classifier = UsageClassifier::new(self.registry);
        let results: Vec<ClassifiedCitation> = merged
            .into_iter()
            .map(|scored| self.analyze_one(&classifier, scored))
            .collect();

        info!(
            total = results.len(),
            uses_dataset = results.iter().filter(|r| r.uses_dataset).count(),
            "pipeline run complete"
        );
        Ok(results)
    }

    /// One source's contribution: search, normalize, score, prune.
    fn collect_one(&self, collector: &dyn SourceCollector) -> Vec<ScoredCitation> {
        let source = collector.source();
        let terms = terms_for_source(source, self.registry);
        let raw = match collector.search(&terms) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = %source, error = %e, "collector failed, contributing nothing");
                return Vec::new();
            }
        };

        let citations = normalize_batch(&raw, source);
        let scored = score_batch(&citations, self.registry, &self.config.weights);
        let (kept, pruned) = prune(scored, self.config.threshold);
        for p in &pruned {
            debug!(
                source = %source,
                title = %p.citation.title,
                score = p.relevance_score,
                "pruned below threshold"
            );
        }
        info!(
            source = %source,
            raw = raw.len(),
            kept = kept.len(),
            pruned = pruned.len(),
            "source collected"
        );
        kept
    }

    /// Full-text stage for one merged record.
    fn analyze_one(
        &self,
        classifier: &UsageClassifier,
        scored: ScoredCitation,
    ) -> ClassifiedCitation {
        if !self.config.fetch_fulltext {
            return ClassifiedCitation::unanalyzed(scored);
        }
        let Some((fulltext, fulltext_source)) = self.fetch_text(&scored) else {
            return ClassifiedCitation::unanalyzed(scored);
        };

        let classification = classifier.classify(&fulltext);
        let snippet = classifier.extract_snippet(&fulltext, SNIPPET_LENGTH);
        ClassifiedCitation {
            content_hash: content_hash(&fulltext),
            uses_dataset: classification.uses_dataset,
            classification_method: classification.method,
            evidence: classification.evidence,
            snippet,
            fulltext,
            fulltext_source,
            scored,
        }
    }

    /// Cache first, provider second. Non-empty fetched text is cached by DOI.
    fn fetch_text(&self, scored: &ScoredCitation) -> Option<(String, FulltextSource)> {
        let doi = scored.citation.doi.as_deref();

        if let (Some(cache), Some(doi)) = (&self.cache, doi) {
            if let Some(text) = cache.get(doi) {
                debug!(doi, "full text served from cache");
                return Some((text, FulltextSource::Cache));
            }
        }

        let provider = self.provider.as_ref()?;
        let (text, source) = provider.fetch(&scored.citation)?;
        if text.is_empty() {
            return None;
        }

        if let (Some(cache), Some(doi)) = (&self.cache, doi) {
            if let Err(e) = cache.put(doi, &text) {
                warn!(doi, error = %e, "failed to cache full text");
            }
        }
        Some((text, source))
    }
}
