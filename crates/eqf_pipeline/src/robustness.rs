//! Robustness sweep: every metric combination × every grid weight vector.
//!
//! Each run reads the shared, immutable universe and its precomputed share
//! vectors and produces its own score vector; nothing is written back. Runs
//! are grouped into fixed-size chunks that worker threads pull from a shared
//! counter. Chunk results are merged in chunk order, so the outcome does not
//! depend on the number of workers.
//!
//! Policies:
//! - all-zero weight vectors are skipped before execution and counted;
//! - a run that hits a `DomainError` is recorded as failed and the sweep goes on;
//! - configuration errors abort before any run starts;
//! - cancellation returns whatever finished, flagged `cancelled`, and the
//!   ledger is only persisted for complete sweeps.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use tracing::{info, warn};

use eqf_algo::{combine, share_column, RunPlan, RunSpec, WeightedTerm};
use eqf_core::{
    ContributorPool, CountryTable, Dimension, DomainError, IndicatorRegistry, Mode,
};
use eqf_io::{write_run_ledger, PersistedLedger};

use crate::allocate::check_quantum;
use crate::{eligibility, PipelineError};

/// Runs per work unit.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Distinct failure reasons logged at `warn`; the rest are only counted.
const WARN_LIMIT: usize = 5;

// ----------------------------- Cancellation & progress -----------------------------

/// Cooperative cancellation flag shared between the caller and the workers.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Called after each chunk with the number of runs it accounted for.
pub type ProgressFn = Arc<dyn Fn(usize) + Send + Sync>;

// ----------------------------- Request & options -----------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct SweepRequest {
    pub mode: Mode,
    /// Scales `Robust_Score` into a robust amount.
    pub quantum: f64,
    /// Only read in contribution mode.
    pub contributors: ContributorPool,
}

#[derive(Clone)]
pub struct SweepOptions {
    pub resolution: usize,
    /// Worker threads; `0` means available parallelism.
    pub threads: usize,
    pub chunk_size: usize,
    /// Keep each run's score vector in the ledger.
    pub retain_run_scores: bool,
    /// Persist the ledger here when the sweep completes.
    pub out_dir: Option<PathBuf>,
    pub cancel: CancelToken,
    pub progress: Option<ProgressFn>,
}

impl SweepOptions {
    pub fn new(resolution: usize) -> Self {
        Self {
            resolution,
            threads: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retain_run_scores: false,
            out_dir: None,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    pub fn retain_run_scores(mut self, yes: bool) -> Self {
        self.retain_run_scores = yes;
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn progress(mut self, f: ProgressFn) -> Self {
        self.progress = Some(f);
        self
    }

    fn worker_count(&self, chunks: usize) -> usize {
        let wanted = if self.threads == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            self.threads
        };
        wanted.clamp(1, chunks.max(1))
    }
}

impl fmt::Debug for SweepOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepOptions")
            .field("resolution", &self.resolution)
            .field("threads", &self.threads)
            .field("chunk_size", &self.chunk_size)
            .field("retain_run_scores", &self.retain_run_scores)
            .field("out_dir", &self.out_dir)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

// ----------------------------- Outputs -----------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    /// Every enumerated run, degenerate ones included.
    pub planned: usize,
    pub completed: usize,
    pub skipped_degenerate: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl SweepStats {
    /// Runs the sweep accounted for (completed, skipped or failed).
    pub fn accounted(&self) -> usize {
        self.completed + self.skipped_degenerate + self.failed
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.accounted() == self.planned
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Failed,
}

/// One executed run: its parameters and, optionally, its scores.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LedgerRow {
    pub run_id: u64,
    pub metrics: BTreeMap<Dimension, String>,
    pub weights: BTreeMap<Dimension, f64>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-country scores in `RunLedger::countries` order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<f64>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    pub message: String,
    pub count: usize,
    pub first_run_id: u64,
}

/// The persisted parameter table of a sweep.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunLedger {
    pub mode: Mode,
    pub resolution: usize,
    pub dimensions: Vec<Dimension>,
    pub grid: Vec<f64>,
    /// ISO codes of the universe, in row order.
    pub countries: Vec<String>,
    pub stats: SweepStats,
    pub failures: Vec<FailureSummary>,
    pub runs: Vec<LedgerRow>,
}

/// Per-country summary over all successful runs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RobustRow {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "ISO Code")]
    pub iso_code: String,
    #[serde(rename = "Region")]
    pub region: String,
    /// Mean over finite run scores.
    #[serde(rename = "Robust_Score")]
    pub robust_score: f64,
    #[serde(rename = "Min_Score")]
    pub min_score: f64,
    #[serde(rename = "Max_Score")]
    pub max_score: f64,
    /// Runs that produced a finite score for this country.
    #[serde(rename = "Runs")]
    pub runs: usize,
    /// `Robust_Score × quantum`.
    #[serde(rename = "Robust_Amount")]
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepOutcome {
    pub mode: Mode,
    pub quantum: f64,
    pub rows: Vec<RobustRow>,
    pub ledger: RunLedger,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<PersistedLedger>,
}

impl SweepOutcome {
    pub fn stats(&self) -> &SweepStats {
        &self.ledger.stats
    }

    pub fn get(&self, key: &str) -> Option<&RobustRow> {
        let k = key.trim();
        self.rows
            .iter()
            .find(|r| r.iso_code.eq_ignore_ascii_case(k) || r.country.eq_ignore_ascii_case(k))
    }
}

// ----------------------------- Accumulation -----------------------------

#[derive(Clone, Copy, Debug)]
struct ScoreAcc {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl Default for ScoreAcc {
    fn default() -> Self {
        Self { sum: 0.0, count: 0, min: f64::INFINITY, max: f64::NEG_INFINITY }
    }
}

impl ScoreAcc {
    fn push(&mut self, v: f64) {
        if v.is_finite() {
            self.sum += v;
            self.count += 1;
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
    }

    fn merge(&mut self, o: &ScoreAcc) {
        self.sum += o.sum;
        self.count += o.count;
        self.min = self.min.min(o.min);
        self.max = self.max.max(o.max);
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }

    fn bound(v: f64) -> f64 {
        if v.is_finite() {
            v
        } else {
            f64::NAN
        }
    }
}

#[derive(Debug)]
struct ChunkResult {
    index: usize,
    rows: Vec<LedgerRow>,
    acc: Vec<ScoreAcc>,
    completed: usize,
    skipped: usize,
    failed: usize,
    /// message → (count, first run id)
    failures: BTreeMap<String, (usize, u64)>,
}

// ----------------------------- Execution -----------------------------

struct SweepContext<'a> {
    plan: RunPlan<'a>,
    rows: usize,
    /// Share vector per metric name over the universe, or why it failed.
    shares: BTreeMap<&'a str, Result<Vec<f64>, DomainError>>,
    chunk_size: usize,
    retain_scores: bool,
    cancel: &'a CancelToken,
    progress: Option<&'a ProgressFn>,
}

impl SweepContext<'_> {
    fn execute(&self, run: &RunSpec<'_>) -> Result<Vec<f64>, DomainError> {
        let mut terms = Vec::with_capacity(4);
        for &d in self.plan.dimensions() {
            let Some(spec) = run.metric(d) else { continue };
            let shares = match self.shares.get(spec.name.as_str()) {
                Some(Ok(s)) => s.as_slice(),
                Some(Err(e)) => return Err(e.clone()),
                None => continue,
            };
            terms.push(WeightedTerm { weight: run.weight(d), shares });
        }
        combine(&terms, self.rows)
    }

    fn run_chunk(&self, index: usize) -> ChunkResult {
        let start = index * self.chunk_size;
        let end = start + self.chunk_size;
        let mut out = ChunkResult {
            index,
            rows: Vec::new(),
            acc: vec![ScoreAcc::default(); self.rows],
            completed: 0,
            skipped: 0,
            failed: 0,
            failures: BTreeMap::new(),
        };

        for run in self.plan.range(start..end) {
            if self.cancel.is_cancelled() {
                break;
            }
            if run.is_degenerate() {
                out.skipped += 1;
                continue;
            }
            let metrics: BTreeMap<Dimension, String> = self
                .plan
                .dimensions()
                .iter()
                .filter_map(|&d| run.metric(d).map(|m| (d, m.name.clone())))
                .collect();
            let weights: BTreeMap<Dimension, f64> = self.plan.dimensions().iter().map(|&d| (d, run.weight(d))).collect();

            match self.execute(&run) {
                Ok(scores) => {
                    for (acc, &s) in out.acc.iter_mut().zip(&scores) {
                        acc.push(s);
                    }
                    out.completed += 1;
                    out.rows.push(LedgerRow {
                        run_id: run.run_id,
                        metrics,
                        weights,
                        status: RunStatus::Ok,
                        error: None,
                        scores: self.retain_scores.then_some(scores),
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    out.failures
                        .entry(message.clone())
                        .and_modify(|(n, _)| *n += 1)
                        .or_insert((1, run.run_id));
                    out.failed += 1;
                    out.rows.push(LedgerRow {
                        run_id: run.run_id,
                        metrics,
                        weights,
                        status: RunStatus::Failed,
                        error: Some(message),
                        scores: None,
                    });
                }
            }
        }

        if let Some(p) = self.progress {
            p(out.completed + out.skipped + out.failed);
        }
        out
    }
}

/// Sweep `request.mode` over the full metric × weight grid.
pub fn run_sensitivity(
    registry: &IndicatorRegistry,
    table: &CountryTable,
    request: &SweepRequest,
    options: &SweepOptions,
) -> Result<SweepOutcome, PipelineError> {
    let mode = request.mode;
    let plan = RunPlan::new(registry, mode.dimensions(), options.resolution)?;
    check_quantum(request.quantum)?;
    let universe = eligibility::universe(mode, table, &request.contributors)?;
    if universe.is_empty() {
        return Err(DomainError::EmptyUniverse(mode.token()).into());
    }

    // Every metric of every active dimension, normalized once for the universe.
    let orientation = mode.orientation();
    let shares: BTreeMap<&str, Result<Vec<f64>, DomainError>> = mode
        .dimensions()
        .iter()
        .flat_map(|&d| registry.metrics_for(d))
        .map(|spec| (spec.name.as_str(), share_column(&universe, spec, orientation)))
        .collect();

    let chunk_size = options.chunk_size.max(1);
    let chunks = plan.len().div_ceil(chunk_size);
    let workers = options.worker_count(chunks);
    info!(
        %mode,
        planned = plan.len(),
        metric_combinations = plan.metric_combinations(),
        weight_combinations = plan.weight_combinations(),
        countries = universe.len(),
        workers,
        "robustness sweep started"
    );

    let ctx = SweepContext {
        plan,
        rows: universe.len(),
        shares,
        chunk_size,
        retain_scores: options.retain_run_scores,
        cancel: &options.cancel,
        progress: options.progress.as_ref(),
    };

    let next = AtomicUsize::new(0);
    let mut results: Vec<ChunkResult> = thread::scope(|s| {
        let ctx = &ctx;
        let next = &next;
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                s.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        if ctx.cancel.is_cancelled() {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        if index >= chunks {
                            break;
                        }
                        done.push(ctx.run_chunk(index));
                    }
                    done
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(done) => done,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });
    results.sort_by_key(|c| c.index);

    let outcome = merge(mode, request.quantum, &ctx, &universe, results, options.cancel.is_cancelled());

    let stats = outcome.ledger.stats;
    if stats.cancelled {
        warn!(%mode, accounted = stats.accounted(), planned = stats.planned, "robustness sweep cancelled");
    } else {
        info!(
            %mode,
            planned = stats.planned,
            completed = stats.completed,
            skipped_degenerate = stats.skipped_degenerate,
            failed = stats.failed,
            "robustness sweep finished"
        );
    }

    persist(outcome, options)
}

fn merge(
    mode: Mode,
    quantum: f64,
    ctx: &SweepContext<'_>,
    universe: &CountryTable,
    results: Vec<ChunkResult>,
    cancelled: bool,
) -> SweepOutcome {
    let mut acc = vec![ScoreAcc::default(); ctx.rows];
    let mut stats = SweepStats { planned: ctx.plan.len(), ..SweepStats::default() };
    let mut failures: BTreeMap<String, (usize, u64)> = BTreeMap::new();
    let mut runs = Vec::new();

    for chunk in results {
        for (a, c) in acc.iter_mut().zip(&chunk.acc) {
            a.merge(c);
        }
        stats.completed += chunk.completed;
        stats.skipped_degenerate += chunk.skipped;
        stats.failed += chunk.failed;
        for (msg, (n, first)) in chunk.failures {
            let e = failures.entry(msg).or_insert((0, first));
            e.0 += n;
            e.1 = e.1.min(first);
        }
        runs.extend(chunk.rows);
    }
    // A cancel that lands after the last chunk leaves a complete sweep.
    stats.cancelled = cancelled && stats.accounted() < stats.planned;

    let mut failures: Vec<FailureSummary> = failures
        .into_iter()
        .map(|(message, (count, first_run_id))| FailureSummary { message, count, first_run_id })
        .collect();
    failures.sort_by_key(|f| f.first_run_id);
    for f in failures.iter().take(WARN_LIMIT) {
        warn!(%mode, runs = f.count, first_run_id = f.first_run_id, reason = %f.message, "sweep runs failed");
    }

    let rows = universe
        .rows()
        .iter()
        .zip(&acc)
        .map(|(r, a)| {
            let robust_score = a.mean();
            RobustRow {
                country: r.country.clone(),
                iso_code: r.iso_code.clone(),
                region: r.region.clone(),
                robust_score,
                min_score: ScoreAcc::bound(a.min),
                max_score: ScoreAcc::bound(a.max),
                runs: a.count,
                amount: robust_score * quantum,
            }
        })
        .collect();

    SweepOutcome {
        mode,
        quantum,
        rows,
        ledger: RunLedger {
            mode,
            resolution: ctx.plan.grid().len(),
            dimensions: ctx.plan.dimensions().to_vec(),
            grid: ctx.plan.grid().to_vec(),
            countries: universe.rows().iter().map(|r| r.iso_code.clone()).collect(),
            stats,
            failures,
            runs,
        },
        persisted: None,
    }
}

fn persist(mut outcome: SweepOutcome, options: &SweepOptions) -> Result<SweepOutcome, PipelineError> {
    let Some(dir) = &options.out_dir else {
        return Ok(outcome);
    };
    if !outcome.ledger.stats.is_complete() {
        warn!(dir = %dir.display(), "sweep incomplete; run ledger not persisted");
        return Ok(outcome);
    }
    outcome.persisted = Some(write_run_ledger(dir, outcome.mode, &outcome.ledger)?);
    Ok(outcome)
}
