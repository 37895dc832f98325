//! Scored result tables (`Weighted_Score` plus `Allocation` or `Contribution`).
//!
//! Region tables reuse the same shape: a region row carries the region name
//! in place of both country name and ISO code.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::dimension::Mode;

#[derive(Clone, Debug, PartialEq)]
pub struct ResultRow {
    pub country: String,
    pub iso_code: String,
    pub region: String,
    /// Keyed by share column name (`<column>_share`).
    pub shares: BTreeMap<String, f64>,
    pub weighted_score: f64,
    /// `weighted_score × quantum`.
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    pub mode: Mode,
    pub quantum: f64,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn amount_column(&self) -> &'static str {
        self.mode.amount_column()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of the amount column (NaN rows skipped).
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.amount).filter(|a| !a.is_nan()).sum()
    }

    pub fn get(&self, key: &str) -> Option<&ResultRow> {
        let k = key.trim();
        self.rows
            .iter()
            .find(|r| r.country.eq_ignore_ascii_case(k) || r.iso_code.eq_ignore_ascii_case(k))
    }

    /// Rows by amount descending, ties by ISO code; NaN amounts last.
    pub fn ranked(&self) -> Vec<&ResultRow> {
        let mut out: Vec<&ResultRow> = self.rows.iter().collect();
        out.sort_by(|a, b| match (a.amount.is_nan(), b.amount.is_nan()) {
            (false, false) => b
                .amount
                .partial_cmp(&a.amount)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.iso_code.cmp(&b.iso_code)),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => a.iso_code.cmp(&b.iso_code),
        });
        out
    }
}

#[cfg(feature = "serde")]
mod wire {
    //! Rows serialize with their column names, as the dashboard reads them.

    use serde::ser::{SerializeMap, SerializeStruct};
    use serde::{Serialize, Serializer};

    use super::{ResultRow, ResultTable};

    struct RowView<'a> {
        row: &'a ResultRow,
        amount_column: &'static str,
    }

    impl Serialize for RowView<'_> {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            let r = self.row;
            let mut m = s.serialize_map(Some(5 + r.shares.len()))?;
            m.serialize_entry("Country", &r.country)?;
            m.serialize_entry("ISO Code", &r.iso_code)?;
            m.serialize_entry("Region", &r.region)?;
            for (k, v) in &r.shares {
                m.serialize_entry(k, v)?;
            }
            m.serialize_entry("Weighted_Score", &r.weighted_score)?;
            m.serialize_entry(self.amount_column, &r.amount)?;
            m.end()
        }
    }

    impl Serialize for ResultTable {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            let amount_column = self.amount_column();
            let rows: Vec<RowView<'_>> = self
                .rows
                .iter()
                .map(|row| RowView { row, amount_column })
                .collect();
            let mut st = s.serialize_struct("ResultTable", 4)?;
            st.serialize_field("mode", &self.mode)?;
            st.serialize_field("quantum", &self.quantum)?;
            st.serialize_field("amount_column", amount_column)?;
            st.serialize_field("rows", &rows)?;
            st.end()
        }
    }
}
