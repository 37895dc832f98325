// crates/eqf_cli/src/main.rs
//
// Exit codes, typed error mapping, input loading and one handler per
// subcommand. Results go to stdout as pretty JSON; logs and the progress bar
// go to stderr.

mod args;

mod exitcodes {
    pub const OK: i32 = 0;
    /// Bad flags, malformed files, registry/metric/manifest problems.
    pub const CONFIG: i32 = 2;
    /// Numeric failures in the data (reciprocal of zero, zero totals, bad weights).
    pub const DOMAIN: i32 = 3;
    pub const IO: i32 = 4;
    /// Sweep stopped before every run was accounted for.
    pub const CANCELLED: i32 = 5;
}

use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eqf_core::{
    ConfigurationError, ContributorPool, Dimension, DomainError, EngineError, Mode, RequestParams,
    WeightVector,
};
use eqf_io::{IoError, ManifestError};
use eqf_pipeline::{CancelToken, EquityEngine, PipelineError, SweepOptions, SweepRequest};

use args::{Cli, Command, FundingArgs, InputArgs, RequestArgs, SweepArgs};

/// Quantum used when neither params nor flags provide one (USD bn).
const DEFAULT_QUANTUM: f64 = 300.0;

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    Config(String),
    Domain(String),
    Io(String),
    Cancelled(String),
}

impl fmt::Display for MainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MainError::Config(m) => write!(f, "configuration: {m}"),
            MainError::Domain(m) => write!(f, "domain: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Cancelled(m) => write!(f, "cancelled: {m}"),
        }
    }
}

impl From<EngineError> for MainError {
    fn from(e: EngineError) -> Self {
        if e.is_domain() {
            MainError::Domain(e.to_string())
        } else {
            MainError::Config(e.to_string())
        }
    }
}

impl From<IoError> for MainError {
    fn from(e: IoError) -> Self {
        match e {
            IoError::Path(m) => MainError::Io(m),
            IoError::Manifest(m @ (ManifestError::Io(..) | ManifestError::NotAFile(..))) => {
                MainError::Io(m.to_string())
            }
            IoError::Engine(inner) => inner.into(),
            other => MainError::Config(other.to_string()),
        }
    }
}

impl From<ManifestError> for MainError {
    fn from(e: ManifestError) -> Self {
        IoError::Manifest(e).into()
    }
}

impl From<PipelineError> for MainError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Engine(inner) => inner.into(),
            PipelineError::Io(inner) => inner.into(),
        }
    }
}

impl From<DomainError> for MainError {
    fn from(e: DomainError) -> Self {
        EngineError::from(e).into()
    }
}

impl From<ConfigurationError> for MainError {
    fn from(e: ConfigurationError) -> Self {
        EngineError::from(e).into()
    }
}

fn map_error(e: &MainError) -> i32 {
    use exitcodes::*;
    match e {
        MainError::Config(_) => CONFIG,
        MainError::Domain(_) => DOMAIN,
        MainError::Io(_) => IO,
        MainError::Cancelled(_) => CANCELLED,
    }
}

fn main() -> ExitCode {
    let cli = match args::parse_and_validate() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("eqf: error: {e}");
            let rc = match e {
                args::CliError::NotFound(_) => exitcodes::IO,
                args::CliError::NonLocalPath(_) => exitcodes::CONFIG,
            };
            return ExitCode::from(rc as u8);
        }
    };
    init_tracing(cli.verbose);

    let rc = match run(&cli) {
        Ok(()) => exitcodes::OK,
        Err(e) => {
            eprintln!("eqf: error: {e}");
            map_error(&e)
        }
    };
    ExitCode::from(rc as u8)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<(), MainError> {
    match &cli.command {
        Command::Allocate { inputs, request } => score(Mode::Allocation, inputs, request, false),
        Command::Contribute { inputs, request } => score(Mode::Contribution, inputs, request, false),
        Command::Regions { mode, inputs, request } => score((*mode).into(), inputs, request, true),
        Command::Sweep(s) => sweep(s),
        Command::Validate { inputs } => validate(inputs),
    }
}

// ----------------------------- Inputs -----------------------------

struct Inputs {
    engine: EquityEngine,
    params: Option<RequestParams>,
    /// Only set when a manifest names one.
    out_dir: Option<PathBuf>,
}

fn load_inputs(a: &InputArgs) -> Result<Inputs, MainError> {
    if let Some(manifest) = &a.manifest {
        let resolved = eqf_io::load_manifest(manifest)?;
        let loaded = EquityEngine::load(&resolved)?;
        return Ok(Inputs { engine: loaded.engine, params: loaded.params, out_dir: Some(loaded.out_dir) });
    }

    // clap guarantees --dataset when --manifest is absent.
    let dataset = a
        .dataset
        .as_deref()
        .ok_or_else(|| MainError::Config("missing required flag: --dataset".into()))?;
    let registry = match &a.registry {
        Some(p) => eqf_io::load_registry(p)?,
        None => eqf_io::builtin_registry()?,
    };
    let table = eqf_io::load_dataset(dataset)?;
    let params = a.params.as_deref().map(eqf_io::load_params).transpose()?;
    let engine = EquityEngine::new(registry, table)?;
    Ok(Inputs { engine, params, out_dir: None })
}

fn base_params(params: Option<RequestParams>) -> RequestParams {
    params.unwrap_or_else(|| RequestParams {
        weights: WeightVector::uniform(),
        metrics: None,
        quantum: DEFAULT_QUANTUM,
        contributors: ContributorPool::default(),
    })
}

fn apply_funding(p: &mut RequestParams, f: &FundingArgs) {
    if let Some(q) = f.quantum {
        p.quantum = q;
    }
    if f.include_upper_middle_income {
        p.contributors.include_upper_middle_income = true;
    }
    if let Some(ex) = &f.exclude {
        p.contributors.exclude = Some(ex.clone());
    }
}

/// Params file (or defaults) with command-line flags layered on top.
fn merge_request(engine: &EquityEngine, params: Option<RequestParams>, r: &RequestArgs) -> Result<RequestParams, MainError> {
    let mut p = base_params(params);
    if let Some(w) = r.weights {
        p.weights = WeightVector::from_array(w.0)?;
    }
    if !r.metrics.is_empty() {
        let mut sel = p.selection(engine.registry());
        for (dim, name) in &r.metrics {
            sel = sel.with(*dim, name.clone());
        }
        p.metrics = Some(sel);
    }
    apply_funding(&mut p, &r.funding);
    Ok(p)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), MainError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| MainError::Io(format!("encode output: {e}")))?;
    println!("{text}");
    Ok(())
}

// ----------------------------- Handlers -----------------------------

fn score(mode: Mode, inputs: &InputArgs, request: &RequestArgs, by_region: bool) -> Result<(), MainError> {
    let Inputs { engine, params, .. } = load_inputs(inputs)?;
    let params = merge_request(&engine, params, request)?;
    debug!(%mode, quantum = params.quantum, by_region, "scoring request");
    let table = if by_region {
        engine.regions(mode, &params)?
    } else {
        engine.score(mode, &params)?
    };
    print_json(&table)
}

fn validate(inputs: &InputArgs) -> Result<(), MainError> {
    let Inputs { engine, params, .. } = load_inputs(inputs)?;
    let registry = engine.registry();
    if let Some(p) = &params {
        p.selection(registry).resolve(registry, &Dimension::ALL)?;
    }
    let metrics: serde_json::Map<String, serde_json::Value> = Dimension::ALL
        .iter()
        .map(|&d| (d.token().to_string(), json!(registry.metric_names(d))))
        .collect();
    print_json(&json!({
        "status": "ok",
        "countries": engine.table().len(),
        "metrics": metrics,
        "params": params.is_some(),
        "sweep_combinations": {
            "allocation": registry.combination_count(Mode::Allocation.dimensions()),
            "contribution": registry.combination_count(Mode::Contribution.dimensions()),
        },
    }))
}

fn sweep(a: &SweepArgs) -> Result<(), MainError> {
    let mode: Mode = a.mode.into();
    let Inputs { engine, params, out_dir } = load_inputs(&a.inputs)?;
    let mut p = base_params(params);
    apply_funding(&mut p, &a.funding);
    let request = SweepRequest { mode, quantum: p.quantum, contributors: p.contributors };

    let cancel = CancelToken::new();
    let mut options = SweepOptions::new(a.resolution)
        .threads(a.threads)
        .retain_run_scores(a.retain_scores)
        .cancel_token(cancel.clone());
    if let Some(dir) = a.out.clone().or(out_dir) {
        options = options.out_dir(dir);
    }
    if let Some(secs) = a.time_limit {
        let token = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            token.cancel();
        });
    }
    let bar = progress_bar(a.progress, &engine, mode, a.resolution);
    if let Some(f) = bar.callback() {
        options = options.progress(f);
    }

    let outcome = engine.run_sensitivity(&request, &options)?;
    bar.finish();

    let stats = *outcome.stats();
    if let Some(p) = &outcome.persisted {
        info!(path = %p.path.display(), sha256 = %p.sha256, "ledger written");
    }
    print_json(&json!({
        "mode": outcome.mode,
        "quantum": outcome.quantum,
        "stats": stats,
        "failures": outcome.ledger.failures,
        "rows": outcome.rows,
        "ledger": outcome.persisted,
    }))?;

    if !stats.is_complete() {
        return Err(MainError::Cancelled(format!(
            "{} of {} runs accounted for",
            stats.accounted(),
            stats.planned
        )));
    }
    Ok(())
}

// ----------------------------- Progress -----------------------------

#[cfg(feature = "progress")]
struct Progress(Option<indicatif::ProgressBar>);

#[cfg(feature = "progress")]
fn progress_bar(enabled: bool, engine: &EquityEngine, mode: Mode, resolution: usize) -> Progress {
    use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

    if !enabled {
        return Progress(None);
    }
    let dims = mode.dimensions();
    let planned = engine
        .registry()
        .combination_count(dims)
        .saturating_mul(resolution.saturating_pow(dims.len() as u32));
    let pb = ProgressBar::with_draw_target(Some(planned as u64), ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} runs ({eta})") {
        pb.set_style(style);
    }
    Progress(Some(pb))
}

#[cfg(feature = "progress")]
impl Progress {
    fn callback(&self) -> Option<eqf_pipeline::ProgressFn> {
        let pb = self.0.clone()?;
        Some(std::sync::Arc::new(move |n| pb.inc(n as u64)))
    }

    fn finish(&self) {
        if let Some(pb) = &self.0 {
            pb.finish_and_clear();
        }
    }
}

#[cfg(not(feature = "progress"))]
struct Progress;

#[cfg(not(feature = "progress"))]
fn progress_bar(_enabled: bool, _engine: &EquityEngine, _mode: Mode, _resolution: usize) -> Progress {
    Progress
}

#[cfg(not(feature = "progress"))]
impl Progress {
    fn callback(&self) -> Option<eqf_pipeline::ProgressFn> {
        None
    }

    fn finish(&self) {}
}
