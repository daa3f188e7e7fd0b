//! Catalog file to outcome, across every crate

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use ecalc_model::{FieldValues, Value};
use ecalc_resolver::{FormulaValidator, MissingFieldPolicy, ResolverConfig};
use ecalc_runtime::{
    CachedRepository, CatalogRepository, EngineConfig, ExecutionRequest, FileCatalogRepository,
    FormulaExecutor,
};
use ecalc_test_utils::{energy_snapshot_json, sample_submission};

fn catalog_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(energy_snapshot_json().as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn savings_scenario_from_catalog_file() {
    let file = catalog_file();
    let repo = CachedRepository::new(FileCatalogRepository::new(file.path()), Duration::from_secs(60));
    let catalog = repo.load_catalog().await.unwrap();
    let executor = FormulaExecutor::new(Arc::new(catalog), &EngineConfig::default());

    let outcome = executor
        .run(
            "admin",
            ExecutionRequest::Template(
                "round(([field:current_consumption] - [field:new_consumption]) * [field:energy_price])"
                    .into(),
            ),
            sample_submission(),
        )
        .await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.result, Some(Value::Number(1440.0)));

    let outcome = executor
        .test_formula("admin", "payback_years", sample_submission())
        .await;
    assert_eq!(outcome.result, Some(Value::Number(10.4)));
}

#[tokio::test]
async fn configured_policy_reaches_the_resolver() {
    let file = catalog_file();
    let catalog = FileCatalogRepository::new(file.path())
        .load_catalog()
        .await
        .unwrap();

    let config = EngineConfig::from_toml_str(
        "[resolver]\nmissing_field_policy = \"type-default\"\n",
    )
    .unwrap();
    assert_eq!(
        config.resolver,
        ResolverConfig::new().with_missing_field_policy(MissingFieldPolicy::TypeDefault)
    );
    let executor = FormulaExecutor::new(Arc::new(catalog), &config);

    // energy_price declares a default of 0.12
    let fields = FieldValues::new()
        .with("current_consumption", 20000)
        .with("new_consumption", 8000);
    let value = executor
        .execute("admin", ExecutionRequest::Template("round([calc:annual_savings])".into()), fields)
        .await
        .unwrap();
    assert_eq!(value, Value::Number(1440.0));

    // current_consumption is required, so it never falls back
    let outcome = executor
        .test_formula("admin", "annual_savings", FieldValues::new())
        .await;
    assert_eq!(outcome.error_kind.as_deref(), Some("missing_field"));
}

#[tokio::test]
async fn every_stored_formula_validates() {
    let file = catalog_file();
    let catalog = FileCatalogRepository::new(file.path())
        .load_catalog()
        .await
        .unwrap();
    let validator = FormulaValidator::with_catalog(&catalog);

    for formula in catalog.formulas() {
        let report = validator.validate_formula(formula);
        assert!(report.is_valid(), "{}: {:?}", formula.name, report.errors);
    }
    for lookup in catalog.lookups() {
        assert!(validator.validate_lookup(lookup).is_valid());
    }
}
