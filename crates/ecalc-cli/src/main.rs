//! `ecalc` command-line tool
//!
//! Evaluates templates and stored formulas against a catalog file, validates
//! formula text, and checks whole catalogs before they are published.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use ecalc_model::{FieldValues, MemoryCatalog};
use ecalc_resolver::{FormulaValidator, ValidationReport};
use ecalc_runtime::{
    telemetry, CachedRepository, CatalogRepository, EngineConfig, ExecutionRequest,
    FileCatalogRepository, FormulaExecutor,
};

fn cli() -> Command {
    let catalog = Arg::new("catalog")
        .long("catalog")
        .value_parser(value_parser!(PathBuf))
        .help("Catalog file (.json, .yaml); defaults to [catalog].path from the config");
    let fields = Arg::new("fields")
        .long("fields")
        .conflicts_with("fields-file")
        .help("Submitted field values as a JSON object");
    let fields_file = Arg::new("fields-file")
        .long("fields-file")
        .value_parser(value_parser!(PathBuf))
        .help("File containing the field values JSON object");
    let caller = Arg::new("caller")
        .long("caller")
        .default_value("cli")
        .help("Caller key used for rate limiting");

    Command::new("ecalc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Shortcode and formula engine for the energy-savings calculator")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .env("ECALC_CONFIG")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("Log filter directive, e.g. debug or ecalc_resolver=trace"),
        )
        .subcommand(
            Command::new("eval")
                .about("Resolve a template and print the value")
                .arg(Arg::new("template").required(true).help("Template text"))
                .arg(catalog.clone())
                .arg(fields.clone())
                .arg(fields_file.clone())
                .arg(caller.clone()),
        )
        .subcommand(
            Command::new("render")
                .about("Substitute shortcodes in free text")
                .arg(Arg::new("template").required(true).help("Template text"))
                .arg(catalog.clone())
                .arg(fields.clone())
                .arg(fields_file.clone())
                .arg(caller.clone()),
        )
        .subcommand(
            Command::new("test-formula")
                .about("Run a stored formula and print the JSON outcome")
                .arg(Arg::new("name").required(true).help("Formula name"))
                .arg(catalog.clone())
                .arg(fields)
                .arg(fields_file)
                .arg(caller),
        )
        .subcommand(
            Command::new("validate")
                .about("Statically check formula text")
                .arg(Arg::new("text").required(true).help("Formula text"))
                .arg(
                    Arg::new("name")
                        .long("name")
                        .help("Formula name, enables self and circular reference checks"),
                )
                .arg(catalog)
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("check-catalog")
                .about("Validate a catalog file and every formula and lookup in it")
                .arg(
                    Arg::new("file")
                        .value_parser(value_parser!(PathBuf))
                        .help("Catalog file; defaults to the configured one"),
                ),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    match run(&matches).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<i32> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let level = matches.get_one::<String>("log-level").map(String::as_str);
    telemetry::init_with(&config.logging, level)?;

    match matches.subcommand() {
        Some(("eval", args)) => execute(&config, args, Mode::Eval).await,
        Some(("render", args)) => execute(&config, args, Mode::Render).await,
        Some(("test-formula", args)) => execute(&config, args, Mode::TestFormula).await,
        Some(("validate", args)) => validate(&config, args).await,
        Some(("check-catalog", args)) => {
            check_catalog(&config, args.get_one::<PathBuf>("file")).await
        }
        _ => Ok(0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Eval,
    Render,
    TestFormula,
}

async fn execute(config: &EngineConfig, args: &ArgMatches, mode: Mode) -> Result<i32> {
    let path = args.get_one::<PathBuf>("catalog");
    let catalog = if path.is_none() && config.catalog.path.is_none() && mode != Mode::TestFormula {
        // Plain arithmetic and field substitution need no stored records
        MemoryCatalog::new()
    } else {
        load_catalog(config, path).await?
    };
    let fields = read_fields(args).await?;
    let caller = args.get_one::<String>("caller").map_or("cli", String::as_str);
    let executor = FormulaExecutor::new(Arc::new(catalog), config);

    let request = match mode {
        Mode::Eval => ExecutionRequest::Template(required(args, "template")?),
        Mode::Render => ExecutionRequest::Render(required(args, "template")?),
        Mode::TestFormula => ExecutionRequest::Formula(required(args, "name")?),
    };
    let outcome = executor.run(caller, request, fields).await;

    if mode == Mode::TestFormula {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let Some(value) = &outcome.result {
        println!("{}", value.to_display_string(config.resolver.render_precision));
    } else if let Some(error) = &outcome.error {
        eprintln!("error: {error}");
    }
    Ok(if outcome.success { 0 } else { 1 })
}

async fn validate(config: &EngineConfig, args: &ArgMatches) -> Result<i32> {
    let text = required(args, "text")?;
    let path = args
        .get_one::<PathBuf>("catalog")
        .or(config.catalog.path.as_ref());
    let catalog = match path {
        Some(path) => Some(load_catalog(config, Some(path)).await?),
        None => None,
    };

    let validator = match &catalog {
        Some(catalog) => FormulaValidator::with_catalog(catalog),
        None => FormulaValidator::new(),
    };
    let report = match args.get_one::<String>("name") {
        Some(name) => validator.validate_formula(&ecalc_model::Formula::new(name.as_str(), text)),
        None => validator.validate(&text),
    };

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report("formula", &report);
    }
    Ok(if report.is_valid() { 0 } else { 1 })
}

async fn check_catalog(config: &EngineConfig, file: Option<&PathBuf>) -> Result<i32> {
    let catalog = load_catalog(config, file).await?;
    let validator = FormulaValidator::with_catalog(&catalog);
    let mut failed = 0usize;
    let mut checked = 0usize;

    for formula in catalog.formulas() {
        let report = validator.validate_formula(formula);
        print_report(&format!("[calc:{}]", formula.name), &report);
        failed += usize::from(!report.is_valid());
        checked += 1;
    }
    for lookup in catalog.lookups() {
        let report = validator.validate_lookup(lookup);
        print_report(&format!("[lookup:{}]", lookup.name), &report);
        failed += usize::from(!report.is_valid());
        checked += 1;
    }

    println!();
    println!("Checked {checked} records, {failed} with errors");
    Ok(if failed == 0 { 0 } else { 1 })
}

fn print_report(label: &str, report: &ValidationReport) {
    let status = if report.is_valid() { "OK" } else { "FAILED" };
    println!("{label}: {status}");
    for issue in &report.errors {
        println!("  error: {issue}");
    }
    for issue in &report.warnings {
        println!("  warning: {issue}");
    }
}

async fn load_catalog(config: &EngineConfig, path: Option<&PathBuf>) -> Result<MemoryCatalog> {
    let Some(path) = path.or(config.catalog.path.as_ref()) else {
        bail!("no catalog given; pass --catalog or set [catalog].path in the config");
    };
    let repo = CachedRepository::new(FileCatalogRepository::new(path), config.catalog.cache_ttl());
    let catalog = repo
        .load_catalog()
        .await
        .with_context(|| format!("loading catalog {}", path.display()))?;
    tracing::debug!("Catalog ready: {} formulas", catalog.formulas().count());
    Ok(catalog)
}

async fn read_fields(args: &ArgMatches) -> Result<FieldValues> {
    if let Some(json) = args.get_one::<String>("fields") {
        return parse_fields(json, Path::new("--fields"));
    }
    if let Some(path) = args.get_one::<PathBuf>("fields-file") {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        return parse_fields(&text, path);
    }
    Ok(FieldValues::new())
}

fn parse_fields(json: &str, origin: &Path) -> Result<FieldValues> {
    FieldValues::from_json_str(json)
        .with_context(|| format!("{} is not a JSON object of field values", origin.display()))
}

fn required(args: &ArgMatches, id: &str) -> Result<String> {
    match args.get_one::<String>(id) {
        Some(value) => Ok(value.clone()),
        None => bail!("missing argument <{id}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecalc_model::Value;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn parses_subcommands_and_globals() {
        let matches = cli()
            .try_get_matches_from([
                "ecalc",
                "eval",
                "[field:a] + 1",
                "--fields",
                r#"{"a": 2}"#,
                "--log-level",
                "debug",
            ])
            .unwrap();
        assert_eq!(matches.get_one::<String>("log-level").map(String::as_str), Some("debug"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "eval");
        assert_eq!(required(args, "template").unwrap(), "[field:a] + 1");
        assert_eq!(args.get_one::<String>("caller").map(String::as_str), Some("cli"));
    }

    #[test]
    fn fields_and_fields_file_conflict() {
        let result = cli().try_get_matches_from([
            "ecalc",
            "eval",
            "1",
            "--fields",
            "{}",
            "--fields-file",
            "f.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn field_json_parsing() {
        let fields = parse_fields(r#"{"a": 2, "kind": "oil"}"#, Path::new("--fields")).unwrap();
        assert_eq!(fields.get("a"), Some(&Value::Number(2.0)));
        assert_eq!(fields.get("kind"), Some(&Value::from("oil")));

        let err = parse_fields("[1, 2]", Path::new("--fields")).unwrap_err();
        assert!(err.to_string().contains("--fields"));
    }

    #[tokio::test]
    async fn check_catalog_passes_on_fixture() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(ecalc_test_utils::energy_snapshot_json().as_bytes())
            .unwrap();

        let code = check_catalog(&EngineConfig::default(), Some(&file.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn missing_catalog_is_reported() {
        let err = load_catalog(&EngineConfig::default(), None).await.unwrap_err();
        assert!(err.to_string().contains("no catalog given"));
    }
}
