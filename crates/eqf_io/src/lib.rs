//! crates/eqf_io/src/lib.rs
//! Local file I/O for the equity engine. Offline only: every path is a local
//! file, and anything that looks like a URL is rejected.
//!
//! - `dataset`: country table loader (JSON)
//! - `registry`: Indicator Registry config loader and the built-in registry
//! - `manifest`: run manifest (input paths, output dir, optional digest)
//! - `params`: request params file
//! - `canonical_json`: sorted-key compact JSON with atomic writes
//! - `hasher`: SHA-256 helpers
//! - `ledger`: robustness run-ledger persistence

#![forbid(unsafe_code)]

use thiserror::Error;

use eqf_core::{ConfigurationError, DomainError, EngineError};

pub mod canonical_json;
pub mod dataset;
pub mod hasher;
pub mod ledger;
pub mod manifest;
pub mod params;
pub mod registry;

pub use dataset::{load_dataset, parse_dataset};
pub use ledger::{ledger_file_name, write_run_ledger, PersistedLedger};
pub use manifest::{load_manifest, Manifest, ManifestError, ResolvedManifest};
pub use params::{load_params, parse_params};
pub use registry::{builtin_registry, load_registry, parse_registry};

/// Unified error for eqf_io.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (create_dir_all, rename, fsync, etc.)
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON parse or serialization failure; `context` names the file or value.
    #[error("json error in {context}: {msg}")]
    Json { context: String, msg: String },

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Loaded content violated a registry or dataset invariant.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Generic validation / invariants.
    #[error("invalid: {0}")]
    Invalid(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl IoError {
    pub(crate) fn json(context: impl Into<String>, e: serde_json::Error) -> Self {
        IoError::Json { context: context.into(), msg: e.to_string() }
    }

    /// True for errors that stem from bad input content rather than the filesystem.
    pub fn is_configuration(&self) -> bool {
        match self {
            IoError::Engine(e) => e.is_configuration(),
            IoError::Json { .. } | IoError::Manifest(_) | IoError::Invalid(_) => true,
            IoError::Path(_) => false,
        }
    }
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::json("<value>", e)
    }
}

impl From<ConfigurationError> for IoError {
    fn from(e: ConfigurationError) -> Self {
        IoError::Engine(e.into())
    }
}

impl From<DomainError> for IoError {
    fn from(e: DomainError) -> Self {
        IoError::Engine(e.into())
    }
}

/// Returns true if `s` looks like a URL (any `<scheme>://`, plus bare `http:`/`https:`).
#[inline]
pub fn looks_like_url(s: &str) -> bool {
    let t = s.trim();
    t.contains("://") || t.starts_with("http:") || t.starts_with("https:")
}

/// Read a local file fully, rejecting URL-like paths.
pub(crate) fn read_local(path: &std::path::Path) -> IoResult<Vec<u8>> {
    let shown = path.display().to_string();
    if looks_like_url(&shown) {
        return Err(IoError::Invalid(format!("path must be local (no scheme): {shown}")));
    }
    std::fs::read(path).map_err(|e| IoError::Path(format!("{shown}: {e}")))
}
