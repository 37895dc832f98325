//! Share normalization of one raw indicator column.
//!
//! Contract:
//! - Ascending:  share_i = v_i / Σ v_j
//! - Descending: share_i = (1/v_i) / Σ (1/v_j)
//! - The total runs over finite values only; a NaN raw value yields a NaN
//!   share for that row and is excluded from the total. Callers filter
//!   eligibility beforehand.
//! - Negative values are rejected for both polarities; zero is rejected only
//!   when the reciprocal is taken.
//! - Postcondition: the non-NaN shares sum to 1 and are each ≥ 0.

use tracing::debug;

use eqf_core::{
    CountryTable, DomainError, EngineError, IndicatorRegistry, MetricSpec, Orientation, Polarity,
    ShareTable,
};

/// Share vector for `spec` over `table`, in row order.
pub fn share_column(
    table: &CountryTable,
    spec: &MetricSpec,
    orientation: Orientation,
) -> Result<Vec<f64>, DomainError> {
    if table.is_empty() {
        return Err(DomainError::EmptyTable);
    }
    let polarity = orientation.apply(spec.polarity);

    let mut terms = Vec::with_capacity(table.len());
    for row in table.rows() {
        let v = row.value(&spec.column);
        terms.push(oriented_term(v, polarity, &spec.column, &row.country)?);
    }

    let total: f64 = terms.iter().filter(|t| !t.is_nan()).sum();
    if total.is_nan() || total <= 0.0 || total.is_infinite() {
        return Err(DomainError::ZeroTotal { column: spec.column.clone() });
    }

    debug!(
        metric = %spec.name,
        column = %spec.column,
        %polarity,
        rows = terms.len(),
        total,
        "normalized indicator"
    );
    Ok(terms.into_iter().map(|t| t / total).collect())
}

/// Validate one raw value and map it to its proportional term.
fn oriented_term(v: f64, polarity: Polarity, column: &str, country: &str) -> Result<f64, DomainError> {
    if v.is_nan() {
        return Ok(f64::NAN);
    }
    if v.is_infinite() {
        return Err(DomainError::NonFiniteValue {
            column: column.to_string(),
            country: country.to_string(),
        });
    }
    match polarity {
        Polarity::Ascending => {
            if v < 0.0 {
                return Err(DomainError::NegativeValue {
                    column: column.to_string(),
                    country: country.to_string(),
                    value: v,
                });
            }
            Ok(v)
        }
        Polarity::Descending => {
            if v <= 0.0 {
                return Err(DomainError::NonPositiveReciprocal {
                    column: column.to_string(),
                    country: country.to_string(),
                    value: v,
                });
            }
            Ok(v.recip())
        }
    }
}

/// Add the `<column>_share` field for `metric` to every row of `table`.
/// Unknown metric names fail with a configuration error.
pub fn normalize(
    table: ShareTable,
    registry: &IndicatorRegistry,
    metric: &str,
    orientation: Orientation,
) -> Result<ShareTable, EngineError> {
    let spec = registry.spec(metric)?;
    let shares = share_column(table.base(), spec, orientation)?;
    Ok(table.with_share(&spec.column, shares))
}
