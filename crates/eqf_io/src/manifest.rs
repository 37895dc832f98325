// crates/eqf_io/src/manifest.rs
//
// Run manifest: names the dataset, the optional registry config and request
// params, the output directory for the run ledger, and an optional digest of
// the dataset bytes.
//
// • Offline-only: any path with a scheme ("://", "http:", "https:") is rejected.
// • Relative paths resolve against the manifest's own directory.
// • Inputs must exist and be files; `out_dir` may not exist yet.
// • `dataset_sha256`, if given, must be lowercase 64-hex and match the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::hasher::{is_lower_hex_64, sha256_file};
use crate::looks_like_url;

const MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;

/// External manifest accepted by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Optional user-provided identifier; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub dataset_path: String,

    /// Registry config; the built-in registry is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<String>,

    /// Request params (weights, metrics, quantum, contributor pool).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_path: Option<String>,

    /// Where the robustness ledger is written; defaults to the manifest directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,

    /// Expected SHA-256 of the raw dataset bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_sha256: Option<String>,
}

/// Paths resolved against the manifest's directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedManifest {
    pub dataset_path: PathBuf,
    pub registry_path: Option<PathBuf>,
    pub params_path: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub dataset_sha256: Option<String>,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("field must not be empty: {0}")]
    Empty(&'static str),
    #[error("path must be offline (no scheme) for {0}: {1}")]
    UrlPath(&'static str, String),
    #[error("cannot access {0}: {1}")]
    Io(&'static str, String),
    #[error("cannot parse manifest {0}: {1}")]
    Parse(String, String),
    #[error("path is not a file for {0}: {1}")]
    NotAFile(&'static str, String),
    #[error("invalid sha256 format for {0}: {1}")]
    DigestShape(&'static str, String),
    #[error("sha256 mismatch for {0}: {1}")]
    DigestMismatch(&'static str, String),
}

// ---------- validation (shape, offline policy; no I/O) ----------

pub fn validate_manifest(man: &Manifest) -> Result<(), ManifestError> {
    if man.dataset_path.trim().is_empty() {
        return Err(ManifestError::Empty("dataset_path"));
    }
    offline_check("dataset_path", &man.dataset_path)?;

    for (label, value) in [
        ("registry_path", &man.registry_path),
        ("params_path", &man.params_path),
        ("out_dir", &man.out_dir),
    ] {
        if let Some(s) = value {
            if s.trim().is_empty() {
                return Err(ManifestError::Empty(label));
            }
            offline_check(label, s)?;
        }
    }

    if let Some(h) = &man.dataset_sha256 {
        if !is_lower_hex_64(h) {
            return Err(ManifestError::DigestShape("dataset_sha256", h.clone()));
        }
    }
    Ok(())
}

fn offline_check(label: &'static str, path: &str) -> Result<(), ManifestError> {
    if looks_like_url(path) {
        return Err(ManifestError::UrlPath(label, path.to_string()));
    }
    Ok(())
}

#[inline]
fn join_under(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel.trim());
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn must_exist_file(label: &'static str, p: &Path) -> Result<(), ManifestError> {
    let md = std::fs::metadata(p)
        .map_err(|e| ManifestError::Io(label, format!("{} ({e})", p.display())))?;
    if !md.is_file() {
        return Err(ManifestError::NotAFile(label, p.display().to_string()));
    }
    Ok(())
}

// ---------- resolution ----------

/// Resolve paths under `base_dir` and check that every input is a file.
pub fn resolve_paths(base_dir: &Path, man: &Manifest) -> Result<ResolvedManifest, ManifestError> {
    let dataset = join_under(base_dir, &man.dataset_path);
    must_exist_file("dataset_path", &dataset)?;

    let registry = man.registry_path.as_deref().map(|s| join_under(base_dir, s));
    if let Some(p) = &registry {
        must_exist_file("registry_path", p)?;
    }
    let params = man.params_path.as_deref().map(|s| join_under(base_dir, s));
    if let Some(p) = &params {
        must_exist_file("params_path", p)?;
    }
    let out_dir = man
        .out_dir
        .as_deref()
        .map(|s| join_under(base_dir, s))
        .unwrap_or_else(|| base_dir.to_path_buf());

    Ok(ResolvedManifest {
        dataset_path: dataset,
        registry_path: registry,
        params_path: params,
        out_dir,
        dataset_sha256: man.dataset_sha256.clone(),
    })
}

/// Check the dataset digest if one was supplied.
pub fn verify_digest(resolved: &ResolvedManifest) -> Result<(), ManifestError> {
    let Some(want) = &resolved.dataset_sha256 else {
        return Ok(());
    };
    let got = sha256_file(&resolved.dataset_path)
        .map_err(|e| ManifestError::Io("dataset_path", e.to_string()))?;
    if &got != want {
        return Err(ManifestError::DigestMismatch(
            "dataset_path",
            format!("expected={want} got={got}"),
        ));
    }
    Ok(())
}

/// Load → validate → resolve → verify.
pub fn load_manifest(manifest_path: &Path) -> Result<ResolvedManifest, ManifestError> {
    use std::io::Read;

    let shown = manifest_path.display().to_string();
    offline_check("manifest", &shown)?;
    let f = std::fs::File::open(manifest_path)
        .map_err(|e| ManifestError::Io("manifest", format!("{shown} ({e})")))?;
    let mut buf = Vec::new();
    f.take(MAX_MANIFEST_BYTES)
        .read_to_end(&mut buf)
        .map_err(|e| ManifestError::Io("manifest", format!("{shown} ({e})")))?;

    let man: Manifest =
        serde_json::from_slice(&buf).map_err(|e| ManifestError::Parse(shown.clone(), e.to_string()))?;
    validate_manifest(&man)?;

    let base = match manifest_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let resolved = resolve_paths(&base, &man)?;
    verify_digest(&resolved)?;
    debug!(manifest = %shown, dataset = %resolved.dataset_path.display(), "manifest resolved");
    Ok(resolved)
}
