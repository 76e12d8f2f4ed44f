//! Crate-wide error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading rulesets or extracting data.
///
/// Authoring mistakes (bad parameters, broken chains, bad URL patterns) are
/// hard errors; per-value parse failures inside transformations are not — they
/// degrade to `null` and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transformation chain broken at transformation type {0}")]
    ChainBroken(String),

    #[error("unknown transformation type {0}")]
    UnknownTransformation(String),

    #[error("invalid value for parameter {key}: {reason}")]
    BadParameter { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid URL pattern {pattern}: {source}")]
    UrlPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn bad_parameter(key: &str, reason: impl Into<String>) -> Self {
        Error::BadParameter {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
