//! Multi-site dispatcher: a directory of rulesets keyed by URL patterns.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ConfigSection;
use crate::error::Error;
use crate::extractor::StructuredDataExtractor;

struct SiteEntry {
    config_name: String,
    patterns: Vec<Regex>,
    extractor: StructuredDataExtractor,
}

/// Holds one compiled extractor per rule file and picks the first whose URL
/// pattern matches a page. Immutable after loading; safe to share read-only
/// across threads.
pub struct MultiExtractor {
    entries: Vec<SiteEntry>,
}

impl MultiExtractor {
    /// Load every rule file in `dir` matching `file_pattern` (e.g. `*.json`).
    ///
    /// Files are processed in lexicographic file-name order, and the first
    /// loaded ruleset whose pattern matches a URL wins. Files without URL
    /// patterns are skipped; malformed files and patterns fail loading.
    pub fn from_directory(dir: &Path, file_pattern: &str) -> Result<MultiExtractor, Error> {
        let glob_pattern = dir.join(file_pattern);
        let glob_pattern = glob_pattern.to_string_lossy();
        let mut paths: Vec<PathBuf> = glob::glob(&glob_pattern)
            .map_err(|err| Error::Config(format!("invalid rule file pattern {glob_pattern}: {err}")))?
            .filter_map(Result::ok)
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        for path in paths {
            let config = ConfigSection::parse_file(&path)?;
            if config.url_patterns.is_empty() {
                debug!(path = %path.display(), "skipping rule file without URL patterns");
                continue;
            }

            let patterns = config
                .url_patterns
                .iter()
                .map(|pattern| {
                    Regex::new(pattern).map_err(|source| Error::UrlPattern {
                        pattern: pattern.clone(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;

            let extractor = StructuredDataExtractor::new(&config)?;
            info!(config = %config.config_name, path = %path.display(), "loaded ruleset");
            entries.push(SiteEntry {
                config_name: config.config_name,
                patterns,
                extractor,
            });
        }

        Ok(MultiExtractor { entries })
    }

    /// The first loaded extractor whose URL pattern matches, if any.
    pub fn find_first_extractor(&self, url: &str) -> Option<&StructuredDataExtractor> {
        self.entries
            .iter()
            .find(|entry| entry.patterns.iter().any(|pattern| pattern.is_match(url)))
            .map(|entry| &entry.extractor)
    }

    /// Name of the ruleset that would handle `url`, for diagnostics.
    pub fn find_config_name(&self, url: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.patterns.iter().any(|pattern| pattern.is_match(url)))
            .map(|entry| entry.config_name.as_str())
    }

    /// Dispatch on the URL, extract, and serialize. `None` when no ruleset
    /// matches or the extraction fails.
    pub fn parse_page(&self, url: &str, html: &str) -> Option<String> {
        let extractor = self.find_first_extractor(url)?;
        match extractor.extract(html) {
            Ok(value) => serde_json::to_string_pretty(&value).ok(),
            Err(err) => {
                warn!(%url, %err, "extraction failed");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
