//! Indicator Registry: dimension → ordered metrics → (column, polarity).
//!
//! Built once from a `RegistryConfig` and read-only afterwards. Lookups by
//! metric display name are unambiguous because names are unique across all
//! dimensions.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dimension::{Dimension, Polarity};
use crate::errors::ConfigurationError;
use crate::variables::MetricSelection;

/// One selectable metric, backed by one raw data column.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MetricSpec {
    pub name: String,
    pub column: String,
    pub polarity: Polarity,
    pub dimension: Dimension,
}

// ----------------------------- Config (wire shape) -----------------------------

/// Externally editable registry description.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegistryConfig {
    pub dimensions: Vec<DimensionConfig>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DimensionConfig {
    pub dimension: Dimension,
    pub metrics: Vec<MetricConfig>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricConfig {
    pub name: String,
    pub column: String,
    /// Falls back to `Dimension::default_polarity()` when omitted.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub polarity: Option<Polarity>,
}

// ----------------------------- Registry -----------------------------

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RegistryConfig"))]
pub struct IndicatorRegistry {
    /// Indexed by `Dimension::index()`.
    by_dimension: [Vec<MetricSpec>; 4],
    /// Metric name → (dimension, position within that dimension).
    by_name: BTreeMap<String, (Dimension, usize)>,
}

impl IndicatorRegistry {
    /// Validate and build. Fails if a dimension is missing, repeated or empty,
    /// if a name/column is blank, if two metrics share a display name, or if
    /// one column is registered with two polarities (its `<column>_share`
    /// would be ambiguous).
    pub fn from_config(cfg: RegistryConfig) -> Result<Self, ConfigurationError> {
        let mut slots: [Option<Vec<MetricSpec>>; 4] = [None, None, None, None];
        let mut by_name = BTreeMap::new();
        let mut column_polarity: BTreeMap<String, Polarity> = BTreeMap::new();

        for dc in cfg.dimensions {
            let slot = &mut slots[dc.dimension.index()];
            if slot.is_some() {
                return Err(ConfigurationError::DuplicateDimension(dc.dimension));
            }
            let mut specs = Vec::with_capacity(dc.metrics.len());
            for mc in dc.metrics {
                let name = mc.name.trim().to_string();
                let column = mc.column.trim().to_string();
                if name.is_empty() {
                    return Err(ConfigurationError::EmptyField("metric.name"));
                }
                if column.is_empty() {
                    return Err(ConfigurationError::EmptyField("metric.column"));
                }
                if by_name.contains_key(&name) {
                    return Err(ConfigurationError::DuplicateMetric(name));
                }
                let polarity = mc.polarity.unwrap_or_else(|| dc.dimension.default_polarity());
                match column_polarity.get(&column) {
                    Some(&p) if p != polarity => {
                        return Err(ConfigurationError::ConflictingPolarity { column });
                    }
                    Some(_) => {}
                    None => {
                        column_polarity.insert(column.clone(), polarity);
                    }
                }
                by_name.insert(name.clone(), (dc.dimension, specs.len()));
                specs.push(MetricSpec { name, column, polarity, dimension: dc.dimension });
            }
            *slot = Some(specs);
        }

        let mut by_dimension: [Vec<MetricSpec>; 4] = Default::default();
        for d in Dimension::ALL {
            match slots[d.index()].take() {
                Some(specs) if !specs.is_empty() => by_dimension[d.index()] = specs,
                _ => return Err(ConfigurationError::EmptyDimension(d)),
            }
        }

        Ok(Self { by_dimension, by_name })
    }

    /// Ordered metric specs of one dimension (never empty).
    pub fn metrics_for(&self, d: Dimension) -> &[MetricSpec] {
        &self.by_dimension[d.index()]
    }

    /// Ordered metric names of one dimension.
    pub fn metric_names(&self, d: Dimension) -> Vec<&str> {
        self.metrics_for(d).iter().map(|m| m.name.as_str()).collect()
    }

    pub fn spec(&self, metric: &str) -> Result<&MetricSpec, ConfigurationError> {
        self.by_name
            .get(metric)
            .map(|&(d, i)| &self.by_dimension[d.index()][i])
            .ok_or_else(|| ConfigurationError::UnknownMetric(metric.to_string()))
    }

    pub fn column_for(&self, metric: &str) -> Result<&str, ConfigurationError> {
        self.spec(metric).map(|m| m.column.as_str())
    }

    pub fn polarity_for(&self, metric: &str) -> Result<Polarity, ConfigurationError> {
        self.spec(metric).map(|m| m.polarity)
    }

    /// Spec of `metric`, checked to belong to `expected`.
    pub fn spec_in(&self, expected: Dimension, metric: &str) -> Result<&MetricSpec, ConfigurationError> {
        let spec = self.spec(metric)?;
        if spec.dimension != expected {
            return Err(ConfigurationError::MetricDimensionMismatch {
                metric: metric.to_string(),
                expected,
                actual: spec.dimension,
            });
        }
        Ok(spec)
    }

    /// All specs in canonical order (dimension, then registration order).
    pub fn iter(&self) -> impl Iterator<Item = &MetricSpec> {
        self.by_dimension.iter().flatten()
    }

    /// Distinct raw columns referenced by the registry.
    pub fn columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.iter().map(|m| m.column.as_str()).collect();
        cols.sort_unstable();
        cols.dedup();
        cols
    }

    /// First metric of every dimension.
    pub fn default_selection(&self) -> MetricSelection {
        let pick = |d: Dimension| self.by_dimension[d.index()][0].name.clone();
        MetricSelection::new(
            pick(Dimension::Responsibility),
            pick(Dimension::Capacity),
            pick(Dimension::Needs),
            pick(Dimension::Engagement),
        )
    }

    /// Number of one-metric-per-dimension combinations over `dims` (saturating).
    pub fn combination_count(&self, dims: &[Dimension]) -> usize {
        dims.iter().fold(1usize, |acc, &d| acc.saturating_mul(self.metrics_for(d).len()))
    }

    /// Back to the editable wire shape (polarity always explicit).
    pub fn to_config(&self) -> RegistryConfig {
        RegistryConfig {
            dimensions: Dimension::ALL
                .into_iter()
                .map(|d| DimensionConfig {
                    dimension: d,
                    metrics: self
                        .metrics_for(d)
                        .iter()
                        .map(|m| MetricConfig {
                            name: m.name.clone(),
                            column: m.column.clone(),
                            polarity: Some(m.polarity),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<RegistryConfig> for IndicatorRegistry {
    type Error = ConfigurationError;

    fn try_from(cfg: RegistryConfig) -> Result<Self, Self::Error> {
        IndicatorRegistry::from_config(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(name: &str, column: &str) -> MetricConfig {
        MetricConfig { name: name.into(), column: column.into(), polarity: None }
    }

    fn config() -> RegistryConfig {
        RegistryConfig {
            dimensions: vec![
                DimensionConfig {
                    dimension: Dimension::Responsibility,
                    metrics: vec![metric("Cumulative emissions", "emissions")],
                },
                DimensionConfig {
                    dimension: Dimension::Capacity,
                    metrics: vec![metric("Income", "income"), metric("HDI", "hdi")],
                },
                DimensionConfig {
                    dimension: Dimension::Needs,
                    metrics: vec![metric("Climate risk", "risk")],
                },
                DimensionConfig {
                    dimension: Dimension::Engagement,
                    metrics: vec![metric("Engagement", "engagement")],
                },
            ],
        }
    }

    #[test]
    fn polarity_defaults_follow_dimension() {
        let reg = IndicatorRegistry::from_config(config()).unwrap();
        assert_eq!(reg.polarity_for("Income").unwrap(), Polarity::Descending);
        assert_eq!(reg.polarity_for("Climate risk").unwrap(), Polarity::Ascending);
        assert_eq!(reg.column_for("HDI").unwrap(), "hdi");
        assert_eq!(reg.metric_names(Dimension::Capacity), vec!["Income", "HDI"]);
    }

    #[test]
    fn explicit_polarity_wins() {
        let mut cfg = config();
        cfg.dimensions[2].metrics[0].polarity = Some(Polarity::Descending);
        let reg = IndicatorRegistry::from_config(cfg).unwrap();
        assert_eq!(reg.polarity_for("Climate risk").unwrap(), Polarity::Descending);
    }

    #[test]
    fn empty_dimension_is_rejected() {
        let mut cfg = config();
        cfg.dimensions[3].metrics.clear();
        assert_eq!(
            IndicatorRegistry::from_config(cfg).unwrap_err(),
            ConfigurationError::EmptyDimension(Dimension::Engagement)
        );
    }

    #[test]
    fn missing_dimension_is_rejected() {
        let mut cfg = config();
        cfg.dimensions.remove(1);
        assert_eq!(
            IndicatorRegistry::from_config(cfg).unwrap_err(),
            ConfigurationError::EmptyDimension(Dimension::Capacity)
        );
    }

    #[test]
    fn names_must_be_unique_across_dimensions() {
        let mut cfg = config();
        cfg.dimensions[3].metrics.push(metric("Income", "other_income"));
        assert_eq!(
            IndicatorRegistry::from_config(cfg).unwrap_err(),
            ConfigurationError::DuplicateMetric("Income".into())
        );
    }

    #[test]
    fn column_with_two_polarities_is_rejected() {
        // "income" read descending under Capacity and ascending under Needs.
        let mut cfg = config();
        cfg.dimensions[2].metrics.push(metric("Income need", "income"));
        assert_eq!(
            IndicatorRegistry::from_config(cfg).unwrap_err(),
            ConfigurationError::ConflictingPolarity { column: "income".into() }
        );

        // Same column, same polarity: one share column serves both metrics.
        let mut cfg = config();
        cfg.dimensions[0].metrics.push(metric("Income burden", "income"));
        let reg = IndicatorRegistry::from_config(cfg).unwrap();
        assert_eq!(reg.column_for("Income burden").unwrap(), "income");
    }

    #[test]
    fn unknown_metric_lookup_fails() {
        let reg = IndicatorRegistry::from_config(config()).unwrap();
        assert!(matches!(reg.spec("GDP"), Err(ConfigurationError::UnknownMetric(_))));
        assert!(matches!(
            reg.spec_in(Dimension::Needs, "Income"),
            Err(ConfigurationError::MetricDimensionMismatch { .. })
        ));
    }

    #[test]
    fn default_selection_and_combinations() {
        let reg = IndicatorRegistry::from_config(config()).unwrap();
        let sel = reg.default_selection();
        assert_eq!(sel.get(Dimension::Capacity), "Income");
        assert_eq!(reg.combination_count(&Dimension::ALL), 2);
        assert_eq!(reg.columns().len(), 5);
    }

    #[test]
    fn config_round_trip_keeps_lookups() {
        let reg = IndicatorRegistry::from_config(config()).unwrap();
        let again = IndicatorRegistry::from_config(reg.to_config()).unwrap();
        assert_eq!(again.iter().count(), reg.iter().count());
        assert_eq!(again.polarity_for("HDI").unwrap(), Polarity::Descending);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_through_validation() {
        let json = r#"{"dimensions":[
            {"dimension":"responsibility","metrics":[{"name":"E","column":"e"}]},
            {"dimension":"capacity","metrics":[{"name":"I","column":"i","polarity":"descending"}]},
            {"dimension":"needs","metrics":[{"name":"R","column":"r"}]}
        ]}"#;
        let err = serde_json::from_str::<IndicatorRegistry>(json).unwrap_err();
        assert!(err.to_string().contains("Engagement has no metrics"));
    }
}
