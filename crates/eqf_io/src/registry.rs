//! Indicator Registry config loading.
//!
//! The registry is plain JSON so indicators can be added or removed without a
//! rebuild. A default config ships inside the binary.

use std::path::Path;

use tracing::debug;

use eqf_core::{Dimension, IndicatorRegistry, RegistryConfig};

use crate::{read_local, IoError, IoResult};

const BUILTIN_REGISTRY: &str = include_str!("../config/indicator_registry.json");

/// Parse and validate a registry config document.
pub fn parse_registry(bytes: &[u8]) -> IoResult<IndicatorRegistry> {
    let cfg: RegistryConfig =
        serde_json::from_slice(bytes).map_err(|e| IoError::json("registry", e))?;
    let registry = IndicatorRegistry::from_config(cfg)?;
    debug!(
        responsibility = registry.metrics_for(Dimension::Responsibility).len(),
        capacity = registry.metrics_for(Dimension::Capacity).len(),
        needs = registry.metrics_for(Dimension::Needs).len(),
        engagement = registry.metrics_for(Dimension::Engagement).len(),
        "indicator registry built"
    );
    Ok(registry)
}

pub fn load_registry(path: &Path) -> IoResult<IndicatorRegistry> {
    let bytes = read_local(path)?;
    parse_registry(&bytes).map_err(|e| match e {
        IoError::Json { msg, .. } => IoError::Json { context: path.display().to_string(), msg },
        other => other,
    })
}

/// The registry shipped with the engine.
pub fn builtin_registry() -> IoResult<IndicatorRegistry> {
    parse_registry(BUILTIN_REGISTRY.as_bytes())
}
