//! SHA-256 helpers. Hex digests are lowercase.
//!
//! - `sha256_canonical(..)` for JSON values/structs (goes through canonical_json).
//! - `sha256_hex(..)` / `sha256_file(..)` for raw bytes and files.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical_json::to_canonical_bytes;
use crate::{IoError, IoResult};

/// SHA-256 over raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over the canonical JSON bytes of any serializable value.
pub fn sha256_canonical<T: Serialize + ?Sized>(value: &T) -> IoResult<String> {
    Ok(sha256_hex(&to_canonical_bytes(value)?))
}

/// SHA-256 over a file's raw bytes, streamed.
pub fn sha256_file(path: &Path) -> IoResult<String> {
    let f = File::open(path).map_err(|e| IoError::Path(format!("{}: {e}", path.display())))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[inline]
pub fn is_lower_hex_64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
