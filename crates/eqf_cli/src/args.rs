// crates/eqf_cli/src/args.rs
//
// Offline CLI argument surface: one subcommand per engine operation.
// Input files come either from a manifest or from explicit flags, never both.
// All paths must be local (no scheme://).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use eqf_core::{Dimension, Mode};

/// Parsed CLI arguments.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "eqf",
    version,
    disable_help_subcommand = true,
    about = "Offline climate-finance equity engine"
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Allocate the quantum across recipient countries.
    Allocate {
        #[command(flatten)]
        inputs: InputArgs,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Split the quantum across the contributor pool.
    Contribute {
        #[command(flatten)]
        inputs: InputArgs,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Allocation or contribution summed per region.
    Regions {
        #[arg(long, value_enum, default_value_t = ModeArg::Allocation)]
        mode: ModeArg,
        #[command(flatten)]
        inputs: InputArgs,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Robustness sweep over every metric combination and grid weight vector.
    Sweep(SweepArgs),
    /// Load and cross-check inputs without computing anything.
    Validate {
        #[command(flatten)]
        inputs: InputArgs,
    },
}

impl Command {
    pub fn inputs(&self) -> &InputArgs {
        match self {
            Command::Allocate { inputs, .. }
            | Command::Contribute { inputs, .. }
            | Command::Regions { inputs, .. }
            | Command::Validate { inputs } => inputs,
            Command::Sweep(s) => &s.inputs,
        }
    }
}

#[derive(Debug, ClapArgs, Clone)]
pub struct InputArgs {
    /// Manifest JSON describing inputs (mutually exclusive with the file flags).
    #[arg(long, conflicts_with_all = ["dataset", "registry", "params"])]
    pub manifest: Option<PathBuf>,

    /// Country dataset JSON.
    #[arg(long, required_unless_present = "manifest")]
    pub dataset: Option<PathBuf>,

    /// Indicator registry JSON; the built-in registry is used when omitted.
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Request params JSON; flags given on the command line override it.
    #[arg(long)]
    pub params: Option<PathBuf>,
}

#[derive(Debug, ClapArgs, Clone)]
pub struct RequestArgs {
    /// Weights as responsibility,capacity,needs,engagement.
    #[arg(long, value_parser = parse_weights)]
    pub weights: Option<Weights>,

    /// Metric for a dimension, e.g. `capacity=HDI`. Repeatable.
    #[arg(long = "metric", value_name = "DIM=NAME", value_parser = parse_metric)]
    pub metrics: Vec<(Dimension, String)>,

    #[command(flatten)]
    pub funding: FundingArgs,
}

#[derive(Debug, ClapArgs, Clone)]
pub struct FundingArgs {
    /// Total quantum (USD bn).
    #[arg(long)]
    pub quantum: Option<f64>,

    /// Add upper-middle/high-income countries to the contributor pool.
    #[arg(long)]
    pub include_upper_middle_income: bool,

    /// Country name or ISO code to leave out of the contributor pool.
    #[arg(long)]
    pub exclude: Option<String>,
}

#[derive(Debug, ClapArgs, Clone)]
pub struct SweepArgs {
    #[arg(long, value_enum, default_value_t = ModeArg::Allocation)]
    pub mode: ModeArg,

    #[command(flatten)]
    pub inputs: InputArgs,

    #[command(flatten)]
    pub funding: FundingArgs,

    /// Grid points per dimension (>= 2).
    #[arg(long, default_value_t = 6)]
    pub resolution: usize,

    /// Worker threads; 0 uses available parallelism.
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Directory for the run ledger (default: manifest out_dir, else none).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Keep every run's score vector in the ledger.
    #[arg(long)]
    pub retain_scores: bool,

    /// Stop after this many seconds and report what finished.
    #[arg(long, value_name = "SECS")]
    pub time_limit: Option<u64>,

    /// Show a progress bar on stderr.
    #[arg(long)]
    pub progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Allocation,
    Contribution,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Allocation => Mode::Allocation,
            ModeArg::Contribution => Mode::Contribution,
        }
    }
}

/// Four weights in canonical dimension order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights(pub [f64; 4]);

/// Errors surfaced by argument validation. Messages are short and stable.
#[derive(Debug)]
pub enum CliError {
    NonLocalPath(String),
    NotFound(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            CliError::NotFound(p) => write!(f, "file not found: {p}"),
        }
    }
}

impl std::error::Error for CliError {}

/// Entry point used by main.rs.
pub fn parse_and_validate() -> Result<Cli, CliError> {
    let cli = Cli::parse();
    validate(&cli)?;
    Ok(cli)
}

fn validate(cli: &Cli) -> Result<(), CliError> {
    let inputs = cli.command.inputs();
    let files = [
        ("--manifest", inputs.manifest.as_deref()),
        ("--dataset", inputs.dataset.as_deref()),
        ("--registry", inputs.registry.as_deref()),
        ("--params", inputs.params.as_deref()),
    ];
    for (label, path) in files {
        if let Some(p) = path {
            ensure_local_exists(p, label)?;
        }
    }
    if let Command::Sweep(SweepArgs { out: Some(out), .. }) = &cli.command {
        ensure_local_path(out)?;
    }
    Ok(())
}

fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    let s = p.to_string_lossy();
    if eqf_io::looks_like_url(&s) {
        return Err(CliError::NonLocalPath(s.into_owned()));
    }
    Ok(())
}

fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    ensure_local_path(p)?;
    match fs::metadata(p) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(CliError::NotFound(format!("{label} {}", p.display()))),
    }
}

/// `r,c,n,e` as four non-negative numbers.
pub fn parse_weights(s: &str) -> Result<Weights, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected 4 comma-separated weights, got {}", parts.len()));
    }
    let mut out = [0.0; 4];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part.parse::<f64>().map_err(|_| format!("not a number: {part:?}"))?;
    }
    Ok(Weights(out))
}

/// `dimension=metric name`; the dimension accepts its token or label.
pub fn parse_metric(s: &str) -> Result<(Dimension, String), String> {
    let (dim, name) = s.split_once('=').ok_or_else(|| format!("expected DIM=NAME, got {s:?}"))?;
    let dim: Dimension = dim.trim().parse().map_err(|e| format!("{e}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty metric name for {dim}"));
    }
    Ok((dim, name.to_string()))
}
