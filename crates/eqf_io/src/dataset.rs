//! Country dataset loader.
//!
//! Wire shape:
//! `{ "countries": [ { "country", "iso_code", "region", "annex_ii",
//!    "upper_middle_income", "indicators": { "<column>": number | null } } ] }`
//!
//! `null` indicator values load as NaN and propagate as NaN shares.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use eqf_core::{CountryRecord, CountryTable};

use crate::{read_local, IoError, IoResult};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDataset {
    countries: Vec<RawCountry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCountry {
    country: String,
    iso_code: String,
    region: String,
    #[serde(default)]
    annex_ii: bool,
    #[serde(default)]
    upper_middle_income: bool,
    #[serde(default)]
    indicators: BTreeMap<String, Option<f64>>,
}

impl From<RawCountry> for CountryRecord {
    fn from(r: RawCountry) -> Self {
        CountryRecord {
            country: r.country.trim().to_string(),
            iso_code: r.iso_code.trim().to_string(),
            region: r.region.trim().to_string(),
            annex_ii: r.annex_ii,
            upper_middle_income: r.upper_middle_income,
            indicators: r
                .indicators
                .into_iter()
                .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
                .collect(),
        }
    }
}

/// Parse and validate a dataset document.
pub fn parse_dataset(bytes: &[u8]) -> IoResult<CountryTable> {
    let raw: RawDataset =
        serde_json::from_slice(bytes).map_err(|e| IoError::json("dataset", e))?;
    if raw.countries.is_empty() {
        return Err(IoError::Invalid("dataset has no countries".into()));
    }
    let table = CountryTable::new(raw.countries.into_iter().map(CountryRecord::from).collect())?;
    debug!(rows = table.len(), "dataset parsed");
    Ok(table)
}

pub fn load_dataset(path: &Path) -> IoResult<CountryTable> {
    let bytes = read_local(path)?;
    parse_dataset(&bytes).map_err(|e| match e {
        IoError::Json { msg, .. } => IoError::Json { context: path.display().to_string(), msg },
        other => other,
    })
}
