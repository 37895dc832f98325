//! Request params file (`RequestParams` as JSON).

use std::path::Path;

use eqf_core::RequestParams;

use crate::{read_local, IoError, IoResult};

pub fn parse_params(bytes: &[u8]) -> IoResult<RequestParams> {
    serde_json::from_slice(bytes).map_err(|e| IoError::json("params", e))
}

pub fn load_params(path: &Path) -> IoResult<RequestParams> {
    let bytes = read_local(path)?;
    serde_json::from_slice(&bytes).map_err(|e| IoError::json(path.display().to_string(), e))
}
