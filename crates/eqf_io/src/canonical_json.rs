//! Canonical JSON utilities
//! - Objects: keys sorted lexicographically (UTF-8 codepoint order)
//! - Arrays: order preserved (caller is responsible for stable ordering)
//! - Non-finite floats serialize as `null`
//! - Output: compact (no extra spaces, no trailing newline)
//! - Atomic write: temp file in same dir + fsync(temp) + rename; fsync(dir) on Unix
//! - Fallback: if rename fails (e.g., cross-device), write directly to target,
//!   fsync(target), then remove temp, fsync(dir).

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::{IoError, IoResult};

/// Canonical bytes of any serializable value.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> IoResult<Vec<u8>> {
    let v = serde_json::to_value(value)?;
    to_canonical_json_bytes(&v)
}

/// Canonical bytes of an already-built JSON value.
pub fn to_canonical_json_bytes(v: &Value) -> IoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(1024);
    write_canonical_value(v, &mut out)?;
    Ok(out)
}

/// Serialize `value` canonically and write it to `path` atomically.
pub fn write_canonical_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> IoResult<Vec<u8>> {
    let bytes = to_canonical_bytes(value)?;
    write_bytes_atomic(path, &bytes)
        .map_err(|e| IoError::Path(format!("{}: {e}", path.display())))?;
    Ok(bytes)
}

fn write_canonical_value(v: &Value, out: &mut Vec<u8>) -> IoResult<()> {
    match v {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        // serde_json produces a correctly escaped string literal.
        Value::String(s) => serde_json::to_writer(&mut *out, s)?,
        Value::Array(arr) => {
            out.push(b'[');
            for (i, elem) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical_value(elem, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            out.push(b'{');
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            for (i, (k, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, k)?;
                out.push(b':');
                write_canonical_value(val, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

/// Write `bytes` to `path` atomically (with safe cross-device fallback).
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    // Unique temp next to the destination (same directory).
    let tmp = make_unique_tmp_path(path);
    let mut tf = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
    tf.write_all(bytes)?;
    tf.sync_all()?;
    drop(tf);

    match fs::rename(&tmp, path) {
        Ok(()) => {
            let _ = fsync_dir(&parent);
            Ok(())
        }
        Err(_) => {
            let res: io::Result<()> = (|| {
                let mut f = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
                f.write_all(bytes)?;
                f.sync_all()
            })();
            let _ = fs::remove_file(&tmp);
            res?;
            let _ = fsync_dir(&parent);
            Ok(())
        }
    }
}

/// "<filename>.<pid>.<counter>.tmp" next to `target`.
fn make_unique_tmp_path(target: &Path) -> PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let pid = std::process::id();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let fname = target.file_name().and_then(|s| s.to_str()).unwrap_or("file");
    let tmp_name = format!("{fname}.{pid}.{n}.tmp");

    match target.parent() {
        Some(dir) => dir.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> io::Result<()> {
    let df = OpenOptions::new().read(true).open(dir)?;
    df.sync_all()
}

#[cfg(not(unix))]
#[inline]
fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_are_sorted_arrays_preserved() {
        let v = json!({
            "b": 1,
            "a": { "y": 1, "x": 2 },
            "arr": [ {"k":2,"j":1}, 3, "z" ]
        });
        let s = String::from_utf8(to_canonical_json_bytes(&v).unwrap()).unwrap();
        assert_eq!(s, r#"{"a":{"x":2,"y":1},"arr":[{"j":1,"k":2},3,"z"],"b":1}"#);
    }

    #[test]
    fn nan_becomes_null_and_no_trailing_newline() {
        let bytes = to_canonical_bytes(&vec![1.5, f64::NAN]).unwrap();
        assert_eq!(bytes, b"[1.5,null]");
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_canonical_file(&path, &json!({"v": 1})).unwrap();
        write_canonical_file(&path, &json!({"v": 2})).unwrap();
        assert_eq!(fs::read(&path).unwrap(), br#"{"v":2}"#);
        let leftovers = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
