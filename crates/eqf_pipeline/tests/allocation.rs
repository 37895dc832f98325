mod common;

use eqf_core::{
    ConfigurationError, ContributorPool, Dimension, DomainError, EngineError, Mode, RequestParams,
    WeightVector,
};
use eqf_pipeline::{aggregate_by_region, EquityEngine};
use proptest::prelude::*;

const REGISTRY_AB: &str = r#"{"dimensions":[
  {"dimension":"responsibility","metrics":[{"name":"Emissions","column":"emissions"}]},
  {"dimension":"capacity","metrics":[{"name":"Income","column":"income"}]},
  {"dimension":"needs","metrics":[{"name":"Risk","column":"risk"}]},
  {"dimension":"engagement","metrics":[{"name":"Engagement","column":"engagement"}]}
]}"#;

const DATASET_AB: &str = r#"{"countries":[
  {"country":"A","iso_code":"AAA","region":"North",
   "indicators":{"emissions":100,"income":50,"risk":5,"engagement":2}},
  {"country":"B","iso_code":"BBB","region":"South",
   "indicators":{"emissions":50,"income":100,"risk":10,"engagement":8}}
]}"#;

#[test]
fn two_country_example() {
    let registry = eqf_io::parse_registry(REGISTRY_AB.as_bytes()).unwrap();
    let table = eqf_io::parse_dataset(DATASET_AB.as_bytes()).unwrap();
    let engine = EquityEngine::new(registry, table).unwrap();
    let sel = engine.registry().default_selection();

    let out = engine.allocate(&WeightVector::uniform(), &sel, 300.0).unwrap();
    let a = out.get("AAA").unwrap();
    let b = out.get("BBB").unwrap();

    // Lower emissions → larger reciprocal share.
    assert!(b.shares["emissions_share"] > a.shares["emissions_share"]);
    // Higher income → smaller reciprocal share.
    assert!(a.shares["income_share"] > b.shares["income_share"]);
    // Higher risk and engagement → larger direct share.
    assert!(b.shares["risk_share"] > a.shares["risk_share"]);
    assert!(b.shares["engagement_share"] > a.shares["engagement_share"]);

    assert!(b.amount > a.amount);
    assert!((a.amount + b.amount - 300.0).abs() < 1e-6);
    assert!((a.amount - 115.0).abs() < 1e-9);
    assert!((b.amount - 185.0).abs() < 1e-9);
}

#[test]
fn allocation_covers_recipients_and_sums_to_quantum() {
    let engine = common::engine();
    let sel = engine.registry().default_selection();
    let out = engine.allocate(&WeightVector::uniform(), &sel, 100.0).unwrap();

    let mut isos: Vec<&str> = out.rows.iter().map(|r| r.iso_code.as_str()).collect();
    isos.sort_unstable();
    assert_eq!(isos, vec!["BGD", "BRA", "CHN", "FJI", "KEN"]);
    assert!((out.total() - 100.0).abs() < 1e-6);
    for (col, _) in out.rows[0].shares.iter() {
        let sum: f64 = out.rows.iter().map(|r| r.shares[col]).sum();
        assert!((sum - 1.0).abs() < 1e-9, "{col} sums to {sum}");
    }
}

#[test]
fn allocation_is_idempotent() {
    let engine = common::engine();
    let sel = engine.registry().default_selection();
    let w = WeightVector::new(0.3, 1.2, 2.0, 0.5).unwrap();
    let first = engine.allocate(&w, &sel, 250.0).unwrap();
    let second = engine.allocate(&w, &sel, 250.0).unwrap();
    assert_eq!(first, second);
    for (x, y) in first.rows.iter().zip(&second.rows) {
        assert_eq!(x.amount.to_bits(), y.amount.to_bits());
    }
}

#[test]
fn zero_weight_sum_fails_without_output() {
    let engine = common::engine();
    let sel = engine.registry().default_selection();
    let zero = WeightVector::new(0.0, 0.0, 0.0, 0.0).unwrap();
    assert_eq!(
        engine.allocate(&zero, &sel, 100.0).unwrap_err(),
        EngineError::Domain(DomainError::ZeroTotalWeight)
    );
}

#[test]
fn metric_from_wrong_dimension_is_rejected() {
    let engine = common::engine();
    let sel = engine
        .registry()
        .default_selection()
        .with(Dimension::Needs, "GNI per capita");
    assert!(matches!(
        engine.allocate(&WeightVector::uniform(), &sel, 1.0),
        Err(EngineError::Configuration(ConfigurationError::MetricDimensionMismatch { .. }))
    ));
}

#[test]
fn contribution_pool_and_inversion() {
    let engine = common::engine();
    let sel = engine.registry().default_selection();
    let w = WeightVector::uniform();

    let donors = engine.contribute(&w, &sel, 100.0, &ContributorPool::default()).unwrap();
    assert_eq!(donors.len(), 3);
    assert!((donors.total() - 100.0).abs() < 1e-6);
    // Largest historical emitter and richest donor pays the most.
    assert_eq!(donors.ranked()[0].iso_code, "USA");
    assert!(donors.rows.iter().all(|r| r.shares.len() == 2));

    let wide = ContributorPool { include_upper_middle_income: true, exclude: Some("United States".into()) };
    let out = engine.contribute(&w, &sel, 100.0, &wide).unwrap();
    let mut isos: Vec<&str> = out.rows.iter().map(|r| r.iso_code.as_str()).collect();
    isos.sort_unstable();
    assert_eq!(isos, vec!["BRA", "CHN", "DEU", "JPN"]);
    assert!((out.total() - 100.0).abs() < 1e-6);
}

#[test]
fn contribution_rejects_unknown_excluded_country() {
    let engine = common::engine();
    let pool = ContributorPool { include_upper_middle_income: false, exclude: Some("Atlantis".into()) };
    assert_eq!(
        engine
            .contribute(&WeightVector::uniform(), &engine.registry().default_selection(), 1.0, &pool)
            .unwrap_err(),
        EngineError::Configuration(ConfigurationError::UnknownCountry("Atlantis".into()))
    );
}

#[test]
fn dataset_without_donors_has_no_contributors() {
    let registry = eqf_io::parse_registry(REGISTRY_AB.as_bytes()).unwrap();
    let table = eqf_io::parse_dataset(DATASET_AB.as_bytes()).unwrap();
    let engine = EquityEngine::new(registry, table).unwrap();
    let err = engine
        .contribute(&WeightVector::uniform(), &engine.registry().default_selection(), 1.0, &ContributorPool::default())
        .unwrap_err();
    assert_eq!(err, EngineError::Domain(DomainError::EmptyUniverse("contribution")));
}

#[test]
fn reciprocal_zero_is_reported() {
    let engine = common::engine_with("KEN", "gni_per_capita_usd", "0");
    let err = engine
        .allocate(&WeightVector::uniform(), &engine.registry().default_selection(), 1.0)
        .unwrap_err();
    assert!(err.is_domain());
    assert!(err.to_string().contains("non-positive value in reciprocal-based indicator"));
}

#[test]
fn missing_value_propagates_as_nan() {
    let engine = common::engine_with("FJI", "nd_gain_vulnerability", "null");
    let out = engine
        .allocate(&WeightVector::uniform(), &engine.registry().default_selection(), 100.0)
        .unwrap();
    assert!(out.get("FJI").unwrap().amount.is_nan());
    assert!(out.rows.iter().filter(|r| r.iso_code != "FJI").all(|r| r.amount.is_finite()));
    assert_eq!(out.ranked().last().unwrap().iso_code, "FJI");

    // With Needs weighted zero the missing value no longer reaches the score.
    let w = WeightVector::new(1.0, 1.0, 0.0, 1.0).unwrap();
    let out = engine.allocate(&w, &engine.registry().default_selection(), 100.0).unwrap();
    assert!(out.get("FJI").unwrap().amount.is_finite());
    assert!((out.total() - 100.0).abs() < 1e-6);
}

#[test]
fn regions_preserve_the_total() {
    let engine = common::engine();
    let params = RequestParams {
        weights: WeightVector::uniform(),
        metrics: None,
        quantum: 100.0,
        contributors: ContributorPool::default(),
    };
    let countries = engine.score(Mode::Allocation, &params).unwrap();
    let regions = engine.regions(Mode::Allocation, &params).unwrap();
    assert_eq!(regions, aggregate_by_region(&countries));

    let names: Vec<&str> = regions.rows.iter().map(|r| r.country.as_str()).collect();
    assert_eq!(names, vec!["Africa", "Asia", "Latin America", "Oceania"]);
    assert!((regions.total() - countries.total()).abs() < 1e-9);
    let asia = regions.get("Asia").unwrap();
    let expected = countries.get("CHN").unwrap().amount + countries.get("BGD").unwrap().amount;
    assert!((asia.amount - expected).abs() < 1e-9);
}

#[test]
fn result_rows_serialize_with_column_names() {
    let engine = common::engine();
    let out = engine
        .allocate(&WeightVector::uniform(), &engine.registry().default_selection(), 10.0)
        .unwrap();
    let v = serde_json::to_value(&out).unwrap();
    assert_eq!(v["amount_column"], "Allocation");
    let row = &v["rows"][0];
    for key in ["Country", "ISO Code", "Region", "Weighted_Score", "Allocation", "nd_gain_vulnerability_share"] {
        assert!(row.get(key).is_some(), "missing {key}");
    }
    // Only the selected metric of each dimension is normalized.
    assert!(row.get("inform_risk_share").is_none());
}

#[test]
fn loads_through_a_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("countries.json"), common::DATASET).unwrap();
    std::fs::write(
        dir.path().join("params.json"),
        r#"{"quantum": 300, "weights": {"responsibility": 1, "capacity": 1, "needs": 2, "engagement": 0}}"#,
    )
    .unwrap();
    let digest = eqf_io::hasher::sha256_hex(common::DATASET.as_bytes());
    std::fs::write(
        dir.path().join("manifest.json"),
        format!(
            r#"{{"dataset_path":"countries.json","params_path":"params.json","out_dir":"out","dataset_sha256":"{digest}"}}"#
        ),
    )
    .unwrap();

    let resolved = eqf_io::load_manifest(&dir.path().join("manifest.json")).unwrap();
    let loaded = EquityEngine::load(&resolved).unwrap();
    assert_eq!(loaded.out_dir, dir.path().join("out"));
    let params = loaded.params.unwrap();
    let out = loaded.engine.score(Mode::Allocation, &params).unwrap();
    assert!((out.total() - 300.0).abs() < 1e-6);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn weight_scaling_leaves_scores_unchanged(
        w in prop::array::uniform4(0.0f64..5.0),
        k in 0.001f64..1000.0,
    ) {
        prop_assume!(w.iter().sum::<f64>() > 1e-3);
        let engine = common::engine();
        let sel = engine.registry().default_selection();
        let base = WeightVector::from_array(w).unwrap();
        let scaled = base.scaled(k).unwrap();
        let a = engine.allocate(&base, &sel, 100.0).unwrap();
        let b = engine.allocate(&scaled, &sel, 100.0).unwrap();
        for (x, y) in a.rows.iter().zip(&b.rows) {
            prop_assert!((x.weighted_score - y.weighted_score).abs() < 1e-9);
        }
        prop_assert!((a.total() - 100.0).abs() < 1e-6);
    }
}
