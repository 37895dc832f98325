//! Allocation and contribution: one weighted score per eligible country,
//! scaled by the monetary quantum.
//!
//! Both operations share `score_universe`; they differ only in the universe
//! (recipients vs contributors), the active dimensions, and the polarity
//! orientation carried by `Mode`.

use tracing::debug;

use eqf_algo::{combine, normalize, scale, WeightedTerm};
use eqf_core::{
    ContributorPool, CountryTable, DomainError, EngineError, IndicatorRegistry, MetricSelection, Mode,
    ResultRow, ResultTable, ShareTable, WeightVector,
};

use crate::eligibility;

/// Quantum must be a finite, non-negative amount.
pub fn check_quantum(quantum: f64) -> Result<(), DomainError> {
    if !quantum.is_finite() || quantum < 0.0 {
        return Err(DomainError::InvalidQuantum(quantum));
    }
    Ok(())
}

/// Recipient allocation over all four dimensions.
pub fn allocate(
    registry: &IndicatorRegistry,
    table: &CountryTable,
    weights: &WeightVector,
    metrics: &MetricSelection,
    quantum: f64,
) -> Result<ResultTable, EngineError> {
    let universe = eligibility::recipients(table);
    score_universe(Mode::Allocation, registry, universe, weights, metrics, quantum)
}

/// Donor contribution over Responsibility and Capacity, polarity inverted.
pub fn contribute(
    registry: &IndicatorRegistry,
    table: &CountryTable,
    weights: &WeightVector,
    metrics: &MetricSelection,
    quantum: f64,
    pool: &ContributorPool,
) -> Result<ResultTable, EngineError> {
    let universe = eligibility::contributors(table, pool)?;
    score_universe(Mode::Contribution, registry, universe, weights, metrics, quantum)
}

/// Score an already-filtered universe for `mode`.
///
/// Checks run before any normalization so that a bad request yields no
/// partial output: metric selection, quantum, weight total, then universe.
pub fn score_universe(
    mode: Mode,
    registry: &IndicatorRegistry,
    universe: CountryTable,
    weights: &WeightVector,
    metrics: &MetricSelection,
    quantum: f64,
) -> Result<ResultTable, EngineError> {
    let dims = mode.dimensions();
    let specs = metrics.resolve(registry, dims)?;
    check_quantum(quantum)?;
    if weights.total(dims) <= 0.0 {
        return Err(DomainError::ZeroTotalWeight.into());
    }
    if universe.is_empty() {
        return Err(DomainError::EmptyUniverse(mode.token()).into());
    }

    let orientation = mode.orientation();
    let mut shares = ShareTable::new(universe);
    for spec in &specs {
        shares = normalize(shares, registry, &spec.name, orientation)?;
    }

    let terms: Vec<WeightedTerm<'_>> = dims
        .iter()
        .zip(&specs)
        .filter_map(|(&d, spec)| {
            shares
                .share(&spec.column)
                .map(|s| WeightedTerm { weight: weights.get(d), shares: s })
        })
        .collect();
    let scores = combine(&terms, shares.len())?;
    let amounts = scale(&scores, quantum);

    let rows = shares
        .base()
        .rows()
        .iter()
        .enumerate()
        .map(|(i, r)| ResultRow {
            country: r.country.clone(),
            iso_code: r.iso_code.clone(),
            region: r.region.clone(),
            shares: shares.share_columns().map(|(k, v)| (k.to_string(), v[i])).collect(),
            weighted_score: scores[i],
            amount: amounts[i],
        })
        .collect();

    let table = ResultTable { mode, quantum, rows };
    debug!(%mode, rows = table.len(), total = table.total(), "scored universe");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eqf_core::{ConfigurationError, CountryRecord, Dimension, DimensionConfig, MetricConfig, RegistryConfig};
    use std::collections::BTreeMap;

    fn registry() -> IndicatorRegistry {
        let dim = |d: Dimension, name: &str, column: &str| DimensionConfig {
            dimension: d,
            metrics: vec![MetricConfig { name: name.into(), column: column.into(), polarity: None }],
        };
        IndicatorRegistry::from_config(RegistryConfig {
            dimensions: vec![
                dim(Dimension::Responsibility, "Emissions", "emissions"),
                dim(Dimension::Capacity, "Income", "income"),
                dim(Dimension::Needs, "Risk", "risk"),
                dim(Dimension::Engagement, "Engagement", "engagement"),
            ],
        })
        .unwrap()
    }

    fn rec(iso: &str, donor: bool, v: [f64; 4]) -> CountryRecord {
        CountryRecord {
            country: iso.into(),
            iso_code: iso.into(),
            region: "R".into(),
            annex_ii: donor,
            upper_middle_income: false,
            indicators: BTreeMap::from([
                ("emissions".to_string(), v[0]),
                ("income".to_string(), v[1]),
                ("risk".to_string(), v[2]),
                ("engagement".to_string(), v[3]),
            ]),
        }
    }

    fn table() -> CountryTable {
        CountryTable::new(vec![
            rec("AAA", false, [100.0, 50.0, 5.0, 2.0]),
            rec("BBB", false, [50.0, 100.0, 10.0, 8.0]),
            rec("DDD", true, [400.0, 300.0, 1.0, 1.0]),
        ])
        .unwrap()
    }

    #[test]
    fn allocation_skips_donors_and_sums_to_quantum() {
        let reg = registry();
        let out = allocate(&reg, &table(), &WeightVector::uniform(), &reg.default_selection(), 300.0).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.get("DDD").is_none());
        assert!((out.total() - 300.0).abs() < 1e-6);
        assert_eq!(out.rows[0].shares.len(), 4);
    }

    #[test]
    fn contribution_uses_two_inverted_dimensions() {
        let reg = registry();
        let pool = ContributorPool::default();
        let out = contribute(&reg, &table(), &WeightVector::uniform(), &reg.default_selection(), 10.0, &pool)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows[0].iso_code, "DDD");
        assert_eq!(out.rows[0].amount, 10.0);
        assert_eq!(out.rows[0].shares.len(), 2);
        assert_eq!(out.amount_column(), "Contribution");
    }

    #[test]
    fn invalid_requests_fail_before_any_work() {
        let reg = registry();
        let sel = reg.default_selection();
        let zero = WeightVector::new(0.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(
            allocate(&reg, &table(), &zero, &sel, 1.0).unwrap_err(),
            EngineError::Domain(DomainError::ZeroTotalWeight)
        );
        assert_eq!(
            allocate(&reg, &table(), &WeightVector::uniform(), &sel, -1.0).unwrap_err(),
            EngineError::Domain(DomainError::InvalidQuantum(-1.0))
        );
        let bad = sel.clone().with(Dimension::Needs, "Rainfall");
        assert_eq!(
            allocate(&reg, &table(), &WeightVector::uniform(), &bad, 1.0).unwrap_err(),
            EngineError::Configuration(ConfigurationError::UnknownMetric("Rainfall".into()))
        );
    }

    #[test]
    fn empty_universe_is_a_domain_error() {
        let reg = registry();
        let donors_only = table().filter(|r| r.annex_ii);
        assert_eq!(
            allocate(&reg, &donors_only, &WeightVector::uniform(), &reg.default_selection(), 1.0).unwrap_err(),
            EngineError::Domain(DomainError::EmptyUniverse("allocation"))
        );
    }

    #[test]
    fn contribution_weights_ignore_allocation_only_dimensions() {
        let reg = registry();
        let only_needs = WeightVector::new(0.0, 0.0, 1.0, 1.0).unwrap();
        assert_eq!(
            contribute(&reg, &table(), &only_needs, &reg.default_selection(), 1.0, &ContributorPool::default())
                .unwrap_err(),
            EngineError::Domain(DomainError::ZeroTotalWeight)
        );
    }
}
