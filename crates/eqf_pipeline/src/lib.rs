//! eqf_pipeline: orchestration surface of the equity engine
//! (eligibility → normalize → weighted score → amounts; regions; robustness sweep).
//!
//! Math lives in `eqf_algo`, file access in `eqf_io`. `EquityEngine` bundles a
//! validated registry with a loaded country table; every operation on it is a
//! pure function of its inputs apart from the sweep's ledger write.

#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use eqf_core::{
    ConfigurationError, ContributorPool, CountryTable, DomainError, EngineError, IndicatorRegistry,
    MetricSelection, Mode, RequestParams, ResultTable, WeightVector,
};
use eqf_io::{IoError, ResolvedManifest};

pub mod aggregate;
pub mod allocate;
pub mod eligibility;
pub mod robustness;

pub use aggregate::aggregate_by_region;
pub use allocate::{allocate, contribute};
pub use robustness::{
    run_sensitivity, CancelToken, LedgerRow, ProgressFn, RobustRow, RunLedger, RunStatus, SweepOptions,
    SweepOutcome, SweepRequest, SweepStats,
};

/// Single error surface for pipeline orchestration.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Io(#[from] IoError),
}

impl From<ConfigurationError> for PipelineError {
    fn from(e: ConfigurationError) -> Self {
        PipelineError::Engine(e.into())
    }
}

impl From<DomainError> for PipelineError {
    fn from(e: DomainError) -> Self {
        PipelineError::Engine(e.into())
    }
}

impl PipelineError {
    pub fn is_configuration(&self) -> bool {
        match self {
            PipelineError::Engine(e) => e.is_configuration(),
            PipelineError::Io(e) => e.is_configuration(),
        }
    }

    pub fn is_domain(&self) -> bool {
        matches!(self, PipelineError::Engine(e) if e.is_domain())
            || matches!(self, PipelineError::Io(IoError::Engine(e)) if e.is_domain())
    }
}

/// Everything a manifest points at, loaded and validated.
#[derive(Debug)]
pub struct LoadedInputs {
    pub engine: EquityEngine,
    pub params: Option<RequestParams>,
    pub out_dir: PathBuf,
}

/// A validated registry and the country table it reads.
#[derive(Clone, Debug)]
pub struct EquityEngine {
    registry: IndicatorRegistry,
    table: CountryTable,
}

impl EquityEngine {
    /// Every registry column must be present in the table.
    pub fn new(registry: IndicatorRegistry, table: CountryTable) -> Result<Self, EngineError> {
        table.validate_columns(&registry)?;
        Ok(Self { registry, table })
    }

    /// Load dataset, registry (built-in when absent) and params from a resolved manifest.
    pub fn load(manifest: &ResolvedManifest) -> Result<LoadedInputs, PipelineError> {
        let registry = match &manifest.registry_path {
            Some(p) => eqf_io::load_registry(p)?,
            None => eqf_io::builtin_registry()?,
        };
        let table = eqf_io::load_dataset(&manifest.dataset_path)?;
        let params = manifest.params_path.as_deref().map(eqf_io::load_params).transpose()?;
        let engine = Self::new(registry, table)?;
        debug!(countries = engine.table.len(), "engine loaded");
        Ok(LoadedInputs { engine, params, out_dir: manifest.out_dir.clone() })
    }

    pub fn registry(&self) -> &IndicatorRegistry {
        &self.registry
    }

    pub fn table(&self) -> &CountryTable {
        &self.table
    }

    pub fn allocate(
        &self,
        weights: &WeightVector,
        metrics: &MetricSelection,
        quantum: f64,
    ) -> Result<ResultTable, EngineError> {
        allocate::allocate(&self.registry, &self.table, weights, metrics, quantum)
    }

    pub fn contribute(
        &self,
        weights: &WeightVector,
        metrics: &MetricSelection,
        quantum: f64,
        pool: &ContributorPool,
    ) -> Result<ResultTable, EngineError> {
        allocate::contribute(&self.registry, &self.table, weights, metrics, quantum, pool)
    }

    /// Dispatch a full request for `mode`; unset metrics default to the first per dimension.
    pub fn score(&self, mode: Mode, params: &RequestParams) -> Result<ResultTable, EngineError> {
        let metrics = params.selection(&self.registry);
        match mode {
            Mode::Allocation => self.allocate(&params.weights, &metrics, params.quantum),
            Mode::Contribution => {
                self.contribute(&params.weights, &metrics, params.quantum, &params.contributors)
            }
        }
    }

    /// `score` followed by regional aggregation.
    pub fn regions(&self, mode: Mode, params: &RequestParams) -> Result<ResultTable, EngineError> {
        self.score(mode, params).map(|t| aggregate_by_region(&t))
    }

    pub fn run_sensitivity(
        &self,
        request: &SweepRequest,
        options: &SweepOptions,
    ) -> Result<SweepOutcome, PipelineError> {
        robustness::run_sensitivity(&self.registry, &self.table, request, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        let e: PipelineError = ConfigurationError::InvalidGridResolution(1).into();
        assert!(e.is_configuration());
        assert!(!e.is_domain());
        let e: PipelineError = DomainError::ZeroTotalWeight.into();
        assert!(e.is_domain());
        let e: PipelineError = IoError::Path("gone".into()).into();
        assert!(!e.is_configuration() && !e.is_domain());
    }
}
