//! In-memory country table and the derived share table.
//!
//! Tables are values: filtering and adding share columns return new tables
//! and never touch the input.

use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::errors::ConfigurationError;
use crate::registry::IndicatorRegistry;

/// One row per country. Indicator values that are missing in the source are NaN.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CountryRecord {
    pub country: String,
    pub iso_code: String,
    pub region: String,
    /// Annex II / historical donor flag.
    pub annex_ii: bool,
    /// Upper-middle or high income, outside Annex II.
    pub upper_middle_income: bool,
    pub indicators: BTreeMap<String, f64>,
}

impl CountryRecord {
    /// Raw value of `column`; NaN when the column is absent for this row.
    #[inline]
    pub fn value(&self, column: &str) -> f64 {
        self.indicators.get(column).copied().unwrap_or(f64::NAN)
    }

    /// Case-insensitive match on country name or ISO code.
    pub fn matches(&self, key: &str) -> bool {
        let k = key.trim();
        self.country.eq_ignore_ascii_case(k) || self.iso_code.eq_ignore_ascii_case(k)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CountryTable {
    rows: Vec<CountryRecord>,
}

impl CountryTable {
    /// Identity fields must be non-empty and ISO codes unique.
    pub fn new(rows: Vec<CountryRecord>) -> Result<Self, ConfigurationError> {
        let mut seen = BTreeSet::new();
        for r in &rows {
            if r.country.trim().is_empty() {
                return Err(ConfigurationError::EmptyField("country"));
            }
            if r.iso_code.trim().is_empty() {
                return Err(ConfigurationError::EmptyField("iso_code"));
            }
            if r.region.trim().is_empty() {
                return Err(ConfigurationError::EmptyField("region"));
            }
            if !seen.insert(r.iso_code.to_ascii_uppercase()) {
                return Err(ConfigurationError::DuplicateIsoCode(r.iso_code.clone()));
            }
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[CountryRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows satisfying `keep`, in original order.
    pub fn filter<F>(&self, mut keep: F) -> CountryTable
    where
        F: FnMut(&CountryRecord) -> bool,
    {
        CountryTable {
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Values of one raw column in row order.
    pub fn column(&self, column: &str) -> Vec<f64> {
        self.rows.iter().map(|r| r.value(column)).collect()
    }

    pub fn find(&self, key: &str) -> Option<&CountryRecord> {
        self.rows.iter().find(|r| r.matches(key))
    }

    /// Every column the registry names must exist on at least one row.
    pub fn validate_columns(&self, registry: &IndicatorRegistry) -> Result<(), ConfigurationError> {
        for col in registry.columns() {
            if !self.rows.iter().any(|r| r.indicators.contains_key(col)) {
                return Err(ConfigurationError::MissingColumn(col.to_string()));
            }
        }
        Ok(())
    }
}

/// Name of the derived share column for a raw column.
pub fn share_column_name(column: &str) -> String {
    format!("{column}_share")
}

/// Eligible rows extended with `<column>_share` columns.
#[derive(Clone, Debug, PartialEq)]
pub struct ShareTable {
    base: CountryTable,
    shares: BTreeMap<String, Vec<f64>>,
}

impl ShareTable {
    pub fn new(base: CountryTable) -> Self {
        Self { base, shares: BTreeMap::new() }
    }

    pub fn base(&self) -> &CountryTable {
        &self.base
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// New table with the share column for raw `column` set to `values`.
    pub fn with_share(mut self, column: &str, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.base.len());
        self.shares.insert(share_column_name(column), values);
        self
    }

    /// Share values keyed by raw column name.
    pub fn share(&self, column: &str) -> Option<&[f64]> {
        self.shares.get(&share_column_name(column)).map(Vec::as_slice)
    }

    /// `(share column name, values)` in name order.
    pub fn share_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.shares.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
