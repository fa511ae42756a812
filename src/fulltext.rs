//! Full-text provenance, content hashing, and the on-disk text cache.
//!
//! The core never fetches documents itself: an out-of-scope collaborator
//! implements [`FulltextProvider`] and hands the pipeline plain extracted
//! body text plus a provenance tag. This module supplies the pieces the core
//! does own: the [`FulltextSource`] tag vocabulary, the [`content_hash`] used
//! to skip reprocessing, and a [`FulltextCache`] keyed by DOI whose writes
//! are atomic (write-to-temp-then-rename), so re-fetching the same key is
//! idempotent and an interrupted run never leaves a corrupt entry.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Citation, Result};

/// Where a record's full text came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulltextSource {
    /// Previously fetched and cached on disk.
    Cache,
    /// The source's open-access URL.
    OpenAccessUrl,
    /// Resolved through the Unpaywall service.
    Unpaywall,
    /// Fell back to the article landing URL.
    ArticleUrl,
    /// A URL existed but could not be retrieved.
    Unreachable,
    /// Retrieved a PDF whose text was not extracted.
    Pdf,
    /// No full text was available at all.
    #[default]
    None,
}

impl FulltextSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FulltextSource::Cache => "cache",
            FulltextSource::OpenAccessUrl => "open_access_url",
            FulltextSource::Unpaywall => "unpaywall",
            FulltextSource::ArticleUrl => "article_url",
            FulltextSource::Unreachable => "unreachable",
            FulltextSource::Pdf => "pdf",
            FulltextSource::None => "none",
        }
    }
}

impl fmt::Display for FulltextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability for retrieving full text, implemented by I/O collaborators
/// (Unpaywall resolvers, OA-URL fetchers) outside the core.
///
/// `None` means the text is unavailable; the pipeline converts that into the
/// degenerate not-classified result without failing the record's siblings.
pub trait FulltextProvider {
    fn fetch(&self, citation: &Citation) -> Option<(String, FulltextSource)>;
}

/// Content-addressed digest of extracted full text.
///
/// Returns the sha256 hex digest; empty text hashes to the empty string so
/// "has a hash" doubles as "was successfully processed".
#[must_use]
pub fn content_hash(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    hex_digest(text.as_bytes())
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// On-disk cache of extracted full text, keyed by DOI.
///
/// File names are digests of the lowercased DOI, so keys are filesystem-safe.
/// Writes go to a temp file in the same directory and are renamed into
/// place, which makes re-puts idempotent and concurrent readers safe
/// without locking.
#[derive(Debug, Clone)]
pub struct FulltextCache {
    dir: PathBuf,
}

impl FulltextCache {
    /// Opens (and creates if needed) a cache directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, doi: &str) -> PathBuf {
        let key = hex_digest(doi.trim().to_lowercase().as_bytes());
        self.dir.join(format!("{key}.txt"))
    }

    /// Cached text for a DOI, if present.
    #[must_use]
    pub fn get(&self, doi: &str) -> Option<String> {
        let path = self.path_for(doi);
        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!(doi, "fulltext cache hit");
                Some(text)
            }
            Err(_) => None,
        }
    }

    /// Stores text for a DOI. All-or-nothing: the entry appears only after
    /// a successful rename, so interruption between records cannot leave a
    /// partial file under the final name.
    pub fn put(&self, doi: &str, text: &str) -> Result<()> {
        let path = self.path_for(doi);
        let tmp = path.with_extension("txt.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash("We used the Compendium dataset.");
        let b = content_hash("We used the Compendium dataset.");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash("Different text."));
    }

    #[test]
    fn test_empty_text_has_empty_hash() {
        assert_eq!(content_hash(""), "");
    }

    #[test]
    fn test_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FulltextCache::new(dir.path()).unwrap();

        assert_eq!(cache.get("10.1/abc"), None);
        cache.put("10.1/abc", "full text body").unwrap();
        assert_eq!(cache.get("10.1/abc").as_deref(), Some("full text body"));
    }

    #[test]
    fn test_cache_key_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FulltextCache::new(dir.path()).unwrap();

        cache.put("10.1/ABC", "text").unwrap();
        assert_eq!(cache.get("10.1/abc").as_deref(), Some("text"));
    }

    #[test]
    fn test_put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FulltextCache::new(dir.path()).unwrap();

        cache.put("10.1/abc", "same text").unwrap();
        cache.put("10.1/abc", "same text").unwrap();
        assert_eq!(cache.get("10.1/abc").as_deref(), Some("same text"));
        // No stray temp files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_source_tags() {
        assert_eq!(FulltextSource::OpenAccessUrl.to_string(), "open_access_url");
        assert_eq!(FulltextSource::None.as_str(), "none");
        assert_eq!(FulltextSource::default(), FulltextSource::None);
    }
}
