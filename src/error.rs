//! Error types for the engine.
//!
//! Each component has its own enum. The public degrade-to-default entry
//! points (`MessageCatalog::load_or_empty`, `RotationStore::open_or_memory`,
//! `EngineConfig::load_or_default`) log these and fall back instead of
//! surfacing them to the caller.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("message catalog not found at {0}")]
    Missing(PathBuf),
    #[error("failed to read message catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("message catalog has no header row")]
    NoHeader,
    #[error("message catalog header is missing the {0} column")]
    MissingColumn(&'static str),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rotation store database error: {0}")]
    Db(#[from] sled::Error),
    #[error("rotation record codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read measurements from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode measurements: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid calibration: max ({max}) must be greater than min ({min})")]
    Calibration { min: f64, max: f64 },
    #[error("invalid thresholds: negative_below ({negative_below}) exceeds positive_above ({positive_above})")]
    Thresholds {
        negative_below: f64,
        positive_above: f64,
    },
    #[error("unknown classifier strategy {0:?} (expected peak, max_abs or mean)")]
    Strategy(String),
}
