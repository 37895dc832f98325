//! Weighted combination of per-metric shares into one score.
//!
//! score_i = Σ_d (w_d × share_{d,i}) / Σ_d w_d
//!
//! Terms with zero weight are left out of the numerator, so a NaN share under
//! a zero weight does not reach the score. The weight sum must be positive.

use eqf_core::DomainError;

/// One dimension's contribution: its weight and the share column it scales.
#[derive(Clone, Copy, Debug)]
pub struct WeightedTerm<'a> {
    pub weight: f64,
    pub shares: &'a [f64],
}

/// Weighted mean of the share columns in `terms`, over `rows` rows.
pub fn combine(terms: &[WeightedTerm<'_>], rows: usize) -> Result<Vec<f64>, DomainError> {
    let total_weight: f64 = terms.iter().map(|t| t.weight).sum();
    if total_weight.is_nan() || total_weight <= 0.0 {
        return Err(DomainError::ZeroTotalWeight);
    }

    let mut scores = vec![0.0f64; rows];
    for t in terms.iter().filter(|t| t.weight != 0.0) {
        debug_assert_eq!(t.shares.len(), rows, "share column length must match row count");
        for (acc, &s) in scores.iter_mut().zip(t.shares) {
            *acc += t.weight * s;
        }
    }
    for acc in &mut scores {
        *acc /= total_weight;
    }
    Ok(scores)
}

/// Monetary amount per row: `score × quantum`.
pub fn scale(scores: &[f64], quantum: f64) -> Vec<f64> {
    scores.iter().map(|s| s * quantum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn weighted_mean_of_two_columns() {
        let a = [0.5, 0.5];
        let b = [0.2, 0.8];
        let s = combine(
            &[WeightedTerm { weight: 1.0, shares: &a }, WeightedTerm { weight: 3.0, shares: &b }],
            2,
        )
        .unwrap();
        assert!((s[0] - 0.275).abs() < 1e-12);
        assert!((s[1] - 0.725).abs() < 1e-12);
    }

    #[test]
    fn zero_total_weight_fails() {
        let a = [1.0];
        assert_eq!(
            combine(&[WeightedTerm { weight: 0.0, shares: &a }], 1),
            Err(DomainError::ZeroTotalWeight)
        );
        assert_eq!(combine(&[], 3), Err(DomainError::ZeroTotalWeight));
    }

    #[test]
    fn zero_weight_hides_nan_column() {
        let a = [0.4, 0.6];
        let nan = [f64::NAN, f64::NAN];
        let s = combine(
            &[WeightedTerm { weight: 2.0, shares: &a }, WeightedTerm { weight: 0.0, shares: &nan }],
            2,
        )
        .unwrap();
        assert_eq!(s, vec![0.4, 0.6]);
    }

    #[test]
    fn scale_multiplies_by_quantum() {
        assert_eq!(scale(&[0.25, 0.75], 300.0), vec![75.0, 225.0]);
    }

    proptest! {
        #[test]
        fn weight_scaling_is_invariant(
            w in prop::collection::vec(0.0f64..10.0, 4),
            k in 0.01f64..100.0,
        ) {
            prop_assume!(w.iter().sum::<f64>() > 1e-6);
            let cols = [[0.1, 0.9], [0.3, 0.7], [0.6, 0.4], [0.5, 0.5]];
            let terms: Vec<WeightedTerm<'_>> = w.iter().zip(cols.iter())
                .map(|(&weight, c)| WeightedTerm { weight, shares: c })
                .collect();
            let scaled: Vec<WeightedTerm<'_>> = w.iter().zip(cols.iter())
                .map(|(&weight, c)| WeightedTerm { weight: weight * k, shares: c })
                .collect();
            let a = combine(&terms, 2).unwrap();
            let b = combine(&scaled, 2).unwrap();
            for (x, y) in a.iter().zip(&b) {
                prop_assert!((x - y).abs() < 1e-9);
            }
            prop_assert!((a.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
