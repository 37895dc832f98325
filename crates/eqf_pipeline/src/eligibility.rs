//! Universe selection per mode.
//!
//! Recipients are every country outside Annex II. Contributors are Annex II
//! donors, optionally joined by upper-middle/high-income countries, minus at
//! most one named country.

use eqf_core::{ConfigurationError, ContributorPool, CountryTable, Mode};

pub fn recipients(table: &CountryTable) -> CountryTable {
    table.filter(|r| !r.annex_ii)
}

/// Contributor-eligible rows. Naming a country that is not in the dataset
/// is an error; naming one that is present but not eligible is a no-op.
pub fn contributors(table: &CountryTable, pool: &ContributorPool) -> Result<CountryTable, ConfigurationError> {
    let exclude = pool.exclude.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(key) = exclude {
        if table.find(key).is_none() {
            return Err(ConfigurationError::UnknownCountry(key.to_string()));
        }
    }
    Ok(table.filter(|r| {
        let pooled = r.annex_ii || (pool.include_upper_middle_income && r.upper_middle_income);
        pooled && !exclude.is_some_and(|key| r.matches(key))
    }))
}

/// Eligible rows for `mode`. The pool only applies to contribution.
pub fn universe(mode: Mode, table: &CountryTable, pool: &ContributorPool) -> Result<CountryTable, ConfigurationError> {
    match mode {
        Mode::Allocation => Ok(recipients(table)),
        Mode::Contribution => contributors(table, pool),
    }
}
