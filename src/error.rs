use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::FieldKind;

/// Problems with the requested render, all detected before any pixel is computed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid {name} value: {value:?}")]
    Parse { name: &'static str, value: String },

    #[error("precision of {digits} digits outside 1..={maximum}")]
    Precision { digits: usize, maximum: usize },

    #[error("{available} digits cannot resolve the pixel spacing, {required} needed")]
    InsufficientPrecision { available: usize, required: usize },

    #[error("image size {width}x{height} is empty")]
    EmptyImage { width: usize, height: usize },

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("power {power} is not supported, {requirement}")]
    Power { power: u32, requirement: &'static str },

    #[error("escape radius {radius} is below {minimum}, where escaped orbits can return")]
    EscapeRadius { radius: f64, minimum: f64 },

    #[error("unknown field {0:?} requested")]
    UnknownField(String),

    #[error("field {field:?} requires {requirement}")]
    FieldRequirement { field: String, requirement: &'static str },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error
    },

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("run {0:?} has no finalized index")]
    NotFinalized(PathBuf),

    #[error("index of {path:?} is corrupt: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("unknown field {0:?}")]
    UnknownField(String),

    #[error("field {field:?} is stored as {stored:?}, not {requested:?}")]
    KindMismatch { field: String, stored: FieldKind, requested: FieldKind },

    #[error("chunk {rank} outside the {count} stored chunks")]
    ChunkOutOfRange { rank: usize, count: usize },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.into(),
            source
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
