#![allow(dead_code)]

use eqf_core::{CountryTable, IndicatorRegistry};
use eqf_pipeline::EquityEngine;

/// Eight countries over the built-in registry columns: three Annex II donors,
/// two upper-middle-income countries and three recipients.
pub const DATASET: &str = r#"{"countries":[
  {"country":"United States","iso_code":"USA","region":"North America","annex_ii":true,
   "indicators":{"cumulative_co2_mt":509000,"co2_per_capita_t":14.9,"cumulative_co2_per_capita_t":1540,
                 "gni_per_capita_usd":76370,"gdp_per_capita_ppp_usd":76400,"hdi":0.921,
                 "nd_gain_vulnerability":0.33,"inform_risk":3.4,"ndc_ambition_score":2.0}},
  {"country":"Germany","iso_code":"DEU","region":"Europe","annex_ii":true,
   "indicators":{"cumulative_co2_mt":93000,"co2_per_capita_t":8.0,"cumulative_co2_per_capita_t":1110,
                 "gni_per_capita_usd":53390,"gdp_per_capita_ppp_usd":66000,"hdi":0.942,
                 "nd_gain_vulnerability":0.30,"inform_risk":2.1,"ndc_ambition_score":3.5}},
  {"country":"Japan","iso_code":"JPN","region":"Asia","annex_ii":true,
   "indicators":{"cumulative_co2_mt":66000,"co2_per_capita_t":8.5,"cumulative_co2_per_capita_t":530,
                 "gni_per_capita_usd":42440,"gdp_per_capita_ppp_usd":48800,"hdi":0.925,
                 "nd_gain_vulnerability":0.31,"inform_risk":2.4,"ndc_ambition_score":3.0}},
  {"country":"China","iso_code":"CHN","region":"Asia","upper_middle_income":true,
   "indicators":{"cumulative_co2_mt":260000,"co2_per_capita_t":8.0,"cumulative_co2_per_capita_t":180,
                 "gni_per_capita_usd":12850,"gdp_per_capita_ppp_usd":21500,"hdi":0.768,
                 "nd_gain_vulnerability":0.37,"inform_risk":4.1,"ndc_ambition_score":2.5}},
  {"country":"Brazil","iso_code":"BRA","region":"Latin America","upper_middle_income":true,
   "indicators":{"cumulative_co2_mt":17000,"co2_per_capita_t":2.2,"cumulative_co2_per_capita_t":80,
                 "gni_per_capita_usd":8140,"gdp_per_capita_ppp_usd":17800,"hdi":0.760,
                 "nd_gain_vulnerability":0.38,"inform_risk":4.6,"ndc_ambition_score":2.8}},
  {"country":"Kenya","iso_code":"KEN","region":"Africa",
   "indicators":{"cumulative_co2_mt":600,"co2_per_capita_t":0.4,"cumulative_co2_per_capita_t":11,
                 "gni_per_capita_usd":2010,"gdp_per_capita_ppp_usd":5800,"hdi":0.601,
                 "nd_gain_vulnerability":0.52,"inform_risk":5.9,"ndc_ambition_score":3.2}},
  {"country":"Bangladesh","iso_code":"BGD","region":"Asia",
   "indicators":{"cumulative_co2_mt":1900,"co2_per_capita_t":0.6,"cumulative_co2_per_capita_t":11,
                 "gni_per_capita_usd":2820,"gdp_per_capita_ppp_usd":7400,"hdi":0.670,
                 "nd_gain_vulnerability":0.55,"inform_risk":5.6,"ndc_ambition_score":2.9}},
  {"country":"Fiji","iso_code":"FJI","region":"Oceania",
   "indicators":{"cumulative_co2_mt":40,"co2_per_capita_t":1.4,"cumulative_co2_per_capita_t":44,
                 "gni_per_capita_usd":5390,"gdp_per_capita_ppp_usd":14700,"hdi":0.729,
                 "nd_gain_vulnerability":0.47,"inform_risk":3.1,"ndc_ambition_score":3.8}}
]}"#;

pub fn registry() -> IndicatorRegistry {
    eqf_io::builtin_registry().unwrap()
}

pub fn table() -> CountryTable {
    eqf_io::parse_dataset(DATASET.as_bytes()).unwrap()
}

pub fn engine() -> EquityEngine {
    EquityEngine::new(registry(), table()).unwrap()
}

/// Same data with one indicator value replaced (`null` for missing).
pub fn engine_with(iso: &str, column: &str, value: &str) -> EquityEngine {
    let mut doc: serde_json::Value = serde_json::from_str(DATASET).unwrap();
    let rows = doc["countries"].as_array_mut().unwrap();
    let row = rows.iter_mut().find(|r| r["iso_code"] == iso).unwrap();
    row["indicators"][column] = serde_json::from_str(value).unwrap();
    let table = eqf_io::parse_dataset(&serde_json::to_vec(&doc).unwrap()).unwrap();
    EquityEngine::new(registry(), table).unwrap()
}
