//! eqf_core: Core types shared across the equity engine.
//!
//! This crate is **I/O-free**. It defines the stable types used by `eqf_io`,
//! `eqf_algo`, `eqf_pipeline` and `eqf_cli`:
//!
//! - Equity dimensions and metric polarity (`Dimension`, `Polarity`, `Orientation`)
//! - The immutable Indicator Registry (dimension → metrics → column/polarity)
//! - Country records and the in-memory country table
//! - Request variables: weight vectors, metric selections, contributor pool
//! - Derived result tables (`ResultTable`)
//! - The error taxonomy (`ConfigurationError`, `DomainError`, `EngineError`)
//!
//! Serialization derives are gated behind the `serde` feature.

#![forbid(unsafe_code)]

pub mod dimension;
pub mod errors;
pub mod registry;
pub mod result;
pub mod table;
pub mod variables;

pub use dimension::{Dimension, Mode, Orientation, Polarity};
pub use errors::{ConfigurationError, DomainError, EngineError};
pub use registry::{
    DimensionConfig, IndicatorRegistry, MetricConfig, MetricSpec, RegistryConfig,
};
pub use result::{ResultRow, ResultTable};
pub use table::{share_column_name, CountryRecord, CountryTable, ShareTable};
pub use variables::{ContributorPool, MetricSelection, RequestParams, WeightVector};
