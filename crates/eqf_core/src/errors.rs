//! Error taxonomy.
//!
//! `ConfigurationError` is always fatal to a request. `DomainError` is fatal to
//! the single computation that raised it; the robustness sweep records it and
//! moves on to the next run. Neither is ever retried.

use thiserror::Error;

use crate::dimension::Dimension;

/// Unknown or malformed names, registries and datasets.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("unknown metric: {0:?}")]
    UnknownMetric(String),

    #[error("unknown dimension: {0:?}")]
    UnknownDimension(String),

    #[error("dimension {0} has no metrics")]
    EmptyDimension(Dimension),

    #[error("dimension {0} is configured more than once")]
    DuplicateDimension(Dimension),

    #[error("metric name {0:?} is registered more than once")]
    DuplicateMetric(String),

    #[error("metric {metric:?} belongs to {actual}, not {expected}")]
    MetricDimensionMismatch {
        metric: String,
        expected: Dimension,
        actual: Dimension,
    },

    #[error("field must not be empty: {0}")]
    EmptyField(&'static str),

    #[error("duplicate ISO code in dataset: {0}")]
    DuplicateIsoCode(String),

    #[error("indicator column {0:?} is not present in the dataset")]
    MissingColumn(String),

    #[error("unknown country: {0:?}")]
    UnknownCountry(String),

    #[error("grid resolution must be at least 2, got {0}")]
    InvalidGridResolution(usize),

    #[error("indicator column {column:?} is registered with both polarities")]
    ConflictingPolarity { column: String },

    #[error("sweep at grid resolution {resolution} has too many runs to enumerate")]
    SweepTooLarge { resolution: usize },
}

/// Numeric preconditions violated by the data or the request.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DomainError {
    #[error("non-positive value in reciprocal-based indicator {column:?} for {country}: {value}")]
    NonPositiveReciprocal {
        column: String,
        country: String,
        value: f64,
    },

    #[error("negative value in indicator {column:?} for {country}: {value}")]
    NegativeValue {
        column: String,
        country: String,
        value: f64,
    },

    #[error("non-finite value in indicator {column:?} for {country}")]
    NonFiniteValue { column: String, country: String },

    #[error("indicator {column:?} has a zero total over the eligible countries")]
    ZeroTotal { column: String },

    #[error("cannot normalize by zero total weight")]
    ZeroTotalWeight,

    #[error("weight for {dimension} must be finite and non-negative, got {value}")]
    InvalidWeight { dimension: Dimension, value: f64 },

    #[error("quantum must be finite and non-negative, got {0}")]
    InvalidQuantum(f64),

    #[error("no eligible countries for {0}")]
    EmptyUniverse(&'static str),

    #[error("cannot normalize an empty table")]
    EmptyTable,
}

/// Umbrella error for engine operations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
}

impl EngineError {
    pub fn is_domain(&self) -> bool {
        matches!(self, EngineError::Domain(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, EngineError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weight_message_is_stable() {
        let e: EngineError = DomainError::ZeroTotalWeight.into();
        assert!(e.is_domain());
        assert_eq!(e.to_string(), "domain error: cannot normalize by zero total weight");
    }

    #[test]
    fn reciprocal_message_names_the_indicator() {
        let e = DomainError::NonPositiveReciprocal {
            column: "gni_per_capita_usd".into(),
            country: "Atlantis".into(),
            value: 0.0,
        };
        assert!(e.to_string().starts_with("non-positive value in reciprocal-based indicator"));
    }
}
