//! Regional aggregation: one country-shaped row per region.
//!
//! Numeric columns (shares, `Weighted_Score`, amount) are summed per region,
//! skipping NaN. The region name stands in for both country name and ISO code.
//! Region rows come out in region-name order.

use std::collections::BTreeMap;

use eqf_core::{ResultRow, ResultTable};

fn add_finite(acc: &mut f64, v: f64) {
    if !v.is_nan() {
        *acc += v;
    }
}

pub fn aggregate_by_region(result: &ResultTable) -> ResultTable {
    let mut groups: BTreeMap<&str, ResultRow> = BTreeMap::new();
    for row in &result.rows {
        let g = groups.entry(row.region.as_str()).or_insert_with(|| ResultRow {
            country: row.region.clone(),
            iso_code: row.region.clone(),
            region: row.region.clone(),
            shares: BTreeMap::new(),
            weighted_score: 0.0,
            amount: 0.0,
        });
        for (k, &v) in &row.shares {
            add_finite(g.shares.entry(k.clone()).or_insert(0.0), v);
        }
        add_finite(&mut g.weighted_score, row.weighted_score);
        add_finite(&mut g.amount, row.amount);
    }

    ResultTable {
        mode: result.mode,
        quantum: result.quantum,
        rows: groups.into_values().collect(),
    }
}
