//! Per-request variables: dimension weights, metric selection, contributor pool.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dimension::Dimension;
use crate::errors::{ConfigurationError, DomainError};
use crate::registry::{IndicatorRegistry, MetricSpec};

// ----------------------------- WeightVector -----------------------------

/// Non-negative weight per dimension. Need not sum to 1; the aggregator
/// divides by the sum over the dimensions it uses.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawWeights", into = "RawWeights"))]
pub struct WeightVector {
    weights: [f64; 4],
}

/// Wire shape of `WeightVector`: absent dimensions default to 0.
#[cfg(feature = "serde")]
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWeights {
    #[serde(default)]
    responsibility: f64,
    #[serde(default)]
    capacity: f64,
    #[serde(default)]
    needs: f64,
    #[serde(default)]
    engagement: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawWeights> for WeightVector {
    type Error = DomainError;
    fn try_from(r: RawWeights) -> Result<Self, Self::Error> {
        WeightVector::new(r.responsibility, r.capacity, r.needs, r.engagement)
    }
}

#[cfg(feature = "serde")]
impl From<WeightVector> for RawWeights {
    fn from(w: WeightVector) -> Self {
        RawWeights {
            responsibility: w.weights[0],
            capacity: w.weights[1],
            needs: w.weights[2],
            engagement: w.weights[3],
        }
    }
}

impl WeightVector {
    pub fn new(
        responsibility: f64,
        capacity: f64,
        needs: f64,
        engagement: f64,
    ) -> Result<Self, DomainError> {
        Self::from_array([responsibility, capacity, needs, engagement])
    }

    /// Weights in `Dimension::ALL` order.
    pub fn from_array(weights: [f64; 4]) -> Result<Self, DomainError> {
        for d in Dimension::ALL {
            let value = weights[d.index()];
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::InvalidWeight { dimension: d, value });
            }
        }
        Ok(Self { weights })
    }

    /// Equal weight 1 on every dimension.
    pub fn uniform() -> Self {
        Self { weights: [1.0; 4] }
    }

    #[inline]
    pub fn get(&self, d: Dimension) -> f64 {
        self.weights[d.index()]
    }

    pub fn as_array(&self) -> [f64; 4] {
        self.weights
    }

    /// Sum of weights over `dims`.
    pub fn total(&self, dims: &[Dimension]) -> f64 {
        dims.iter().map(|&d| self.get(d)).sum()
    }

    /// Every weight multiplied by `k` (`k` finite and non-negative).
    pub fn scaled(&self, k: f64) -> Result<Self, DomainError> {
        Self::from_array(self.weights.map(|w| w * k))
    }

    /// All weights over `dims` are zero.
    pub fn is_degenerate(&self, dims: &[Dimension]) -> bool {
        dims.iter().all(|&d| self.get(d) == 0.0)
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::uniform()
    }
}

// ----------------------------- MetricSelection -----------------------------

/// One metric display name per dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricSelection {
    pub responsibility: String,
    pub capacity: String,
    pub needs: String,
    pub engagement: String,
}

impl MetricSelection {
    pub fn new(
        responsibility: impl Into<String>,
        capacity: impl Into<String>,
        needs: impl Into<String>,
        engagement: impl Into<String>,
    ) -> Self {
        Self {
            responsibility: responsibility.into(),
            capacity: capacity.into(),
            needs: needs.into(),
            engagement: engagement.into(),
        }
    }

    pub fn get(&self, d: Dimension) -> &str {
        match d {
            Dimension::Responsibility => &self.responsibility,
            Dimension::Capacity => &self.capacity,
            Dimension::Needs => &self.needs,
            Dimension::Engagement => &self.engagement,
        }
    }

    /// Copy with the metric for `d` replaced.
    pub fn with(mut self, d: Dimension, metric: impl Into<String>) -> Self {
        let m = metric.into();
        match d {
            Dimension::Responsibility => self.responsibility = m,
            Dimension::Capacity => self.capacity = m,
            Dimension::Needs => self.needs = m,
            Dimension::Engagement => self.engagement = m,
        }
        self
    }

    /// Resolve the selected metrics of `dims` against the registry,
    /// checking each one belongs to its dimension.
    pub fn resolve<'r>(
        &self,
        registry: &'r IndicatorRegistry,
        dims: &[Dimension],
    ) -> Result<Vec<&'r MetricSpec>, ConfigurationError> {
        dims.iter().map(|&d| registry.spec_in(d, self.get(d))).collect()
    }
}

// ----------------------------- Contributor pool -----------------------------

/// Who is asked to contribute, beyond Annex II donors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContributorPool {
    /// Extend the pool with upper-middle/high-income countries.
    #[cfg_attr(feature = "serde", serde(default))]
    pub include_upper_middle_income: bool,
    /// Country name or ISO code to leave out of the pool.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub exclude: Option<String>,
}

// ----------------------------- Request params -----------------------------

/// A complete request as supplied by a caller or a params file.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RequestParams {
    #[cfg_attr(feature = "serde", serde(default))]
    pub weights: WeightVector,
    /// `None` selects the first registered metric of each dimension.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub metrics: Option<MetricSelection>,
    /// Total monetary quantum (e.g. USD bn).
    pub quantum: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub contributors: ContributorPool,
}

impl RequestParams {
    pub fn selection(&self, registry: &IndicatorRegistry) -> MetricSelection {
        self.metrics.clone().unwrap_or_else(|| registry.default_selection())
    }
}
