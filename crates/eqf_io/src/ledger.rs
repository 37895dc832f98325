//! Run-ledger persistence: one canonical JSON file per mode under an output
//! directory. A later sweep of the same mode replaces the file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use eqf_core::Mode;

use crate::canonical_json::write_canonical_file;
use crate::hasher::{sha256_file, sha256_hex};
use crate::IoResult;

/// Fixed file name of the ledger for `mode`.
pub const fn ledger_file_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Allocation => "robust_allocation_runs.json",
        Mode::Contribution => "robust_contribution_runs.json",
    }
}

/// Where a ledger landed and the digest of its bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PersistedLedger {
    pub path: PathBuf,
    pub sha256: String,
}

pub fn ledger_path(out_dir: &Path, mode: Mode) -> PathBuf {
    out_dir.join(ledger_file_name(mode))
}

/// Write `ledger` canonically and atomically to the fixed path for `mode`.
pub fn write_run_ledger<T: Serialize + ?Sized>(
    out_dir: &Path,
    mode: Mode,
    ledger: &T,
) -> IoResult<PersistedLedger> {
    let path = ledger_path(out_dir, mode);
    let bytes = write_canonical_file(&path, ledger)?;
    let sha256 = sha256_hex(&bytes);
    info!(path = %path.display(), %sha256, bytes = bytes.len(), "run ledger persisted");
    Ok(PersistedLedger { path, sha256 })
}

/// True when the file at `persisted.path` still hashes to `persisted.sha256`.
pub fn verify_run_ledger(persisted: &PersistedLedger) -> IoResult<bool> {
    Ok(sha256_file(&persisted.path)? == persisted.sha256)
}
