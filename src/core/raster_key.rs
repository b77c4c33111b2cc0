/*!
 * Raster key derivation from filenames.
 *
 * A raster key is the short identifier that links an image to its reference
 * geometry in the catalog. It is cut out of the filename stem according to one
 * of four strategies chosen once per batch.
 */

use regex::Regex;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors raised while building a strategy or resolving a key
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("length of '{stem}' is not enough ({actual} characters, {required} required)")]
    InvalidKeyLength {
        stem: String,
        required: usize,
        actual: usize,
    },

    #[error("type of raster key '{0}' is not valid, only all, prefix, suffix, or regex allowed")]
    InvalidStrategy(String),

    #[error("{field}: number of raster key characters '{value}' is not valid")]
    InvalidCount { field: &'static str, value: String },

    #[error("raster key regex '{pattern}' is not valid: {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
}

/// How a raster key is cut out of a filename stem
#[derive(Debug, Clone)]
pub enum RasterKeyStrategy {
    /// The whole stem
    All,
    /// The first `count` characters
    Prefix { count: usize },
    /// The last `count` characters
    Suffix { count: usize },
    /// The first match of `pattern`, or empty when nothing matches
    Regex { pattern: Regex },
}

impl RasterKeyStrategy {
    /// Build a strategy from its selector and the raw parameter values.
    ///
    /// Only the parameter belonging to the selected variant is parsed; the
    /// others are ignored so a form may carry stale values for them.
    pub fn from_parts(
        selector: &str,
        prefix_chars: &str,
        suffix_chars: &str,
        regex: &str,
    ) -> Result<Self, KeyError> {
        match selector {
            "all" => Ok(RasterKeyStrategy::All),
            "prefix" => Ok(RasterKeyStrategy::Prefix {
                count: parse_count("raster_key_prefix_num_char", prefix_chars)?,
            }),
            "suffix" => Ok(RasterKeyStrategy::Suffix {
                count: parse_count("raster_key_suffix_num_char", suffix_chars)?,
            }),
            "regex" => {
                let pattern = Regex::new(regex).map_err(|e| KeyError::InvalidRegex {
                    pattern: regex.to_string(),
                    source: e,
                })?;
                Ok(RasterKeyStrategy::Regex { pattern })
            }
            other => Err(KeyError::InvalidStrategy(other.to_string())),
        }
    }

    /// Resolve the raster key for `filename` (extension is stripped first).
    ///
    /// An empty key from a non-matching regex is returned as `Ok`; the catalog
    /// lookup downstream is what fails for it.
    pub fn resolve(&self, filename: &str) -> Result<String, KeyError> {
        let stem = file_stem(filename);
        match self {
            RasterKeyStrategy::All => Ok(stem.to_string()),
            RasterKeyStrategy::Prefix { count } => {
                require_length(stem, *count)?;
                Ok(stem.chars().take(*count).collect())
            }
            RasterKeyStrategy::Suffix { count } => {
                let actual = require_length(stem, *count)?;
                Ok(stem.chars().skip(actual - count).collect())
            }
            RasterKeyStrategy::Regex { pattern } => Ok(pattern
                .find(stem)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()),
        }
    }
}

impl fmt::Display for RasterKeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterKeyStrategy::All => write!(f, "all"),
            RasterKeyStrategy::Prefix { count } => write!(f, "prefix({})", count),
            RasterKeyStrategy::Suffix { count } => write!(f, "suffix({})", count),
            RasterKeyStrategy::Regex { pattern } => write!(f, "regex({})", pattern.as_str()),
        }
    }
}

/// Filename without its directory and last extension
pub fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

fn parse_count(field: &'static str, value: &str) -> Result<usize, KeyError> {
    match value.trim().parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(KeyError::InvalidCount {
            field,
            value: value.to_string(),
        }),
    }
}

/// Character count of `stem`, or `InvalidKeyLength` when shorter than `required`
fn require_length(stem: &str, required: usize) -> Result<usize, KeyError> {
    let actual = stem.chars().count();
    if actual < required {
        return Err(KeyError::InvalidKeyLength {
            stem: stem.to_string(),
            required,
            actual,
        });
    }
    Ok(actual)
}
