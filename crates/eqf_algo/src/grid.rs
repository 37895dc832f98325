//! Run enumeration for the robustness sweep.
//!
//! A sweep is the Cartesian product of one metric per active dimension and
//! one grid weight per active dimension. `RunPlan` never materializes that
//! product: run `i` is decoded from its index in mixed radix (metric
//! combination outer, weight combination inner, last dimension fastest), so
//! the sequence is lazy, restartable from any index and splits into
//! independent chunks.

use std::ops::Range;

use eqf_core::{ConfigurationError, Dimension, IndicatorRegistry, MetricSpec};

/// `resolution` evenly spaced points in [0, 1], both ends included.
pub fn weight_grid(resolution: usize) -> Result<Vec<f64>, ConfigurationError> {
    if resolution < 2 {
        return Err(ConfigurationError::InvalidGridResolution(resolution));
    }
    let last = (resolution - 1) as f64;
    Ok((0..resolution).map(|i| i as f64 / last).collect())
}

/// One decoded run. Inactive dimensions carry no metric and weight 0.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSpec<'r> {
    pub run_id: u64,
    pub metrics: [Option<&'r MetricSpec>; 4],
    pub weights: [f64; 4],
}

impl<'r> RunSpec<'r> {
    pub fn metric(&self, d: Dimension) -> Option<&'r MetricSpec> {
        self.metrics[d.index()]
    }

    pub fn weight(&self, d: Dimension) -> f64 {
        self.weights[d.index()]
    }

    /// Every weight is zero; such a run cannot be normalized.
    pub fn is_degenerate(&self) -> bool {
        self.weights.iter().all(|&w| w == 0.0)
    }
}

#[derive(Clone, Debug)]
pub struct RunPlan<'r> {
    dims: Vec<Dimension>,
    metric_sets: Vec<&'r [MetricSpec]>,
    grid: Vec<f64>,
    metric_combinations: usize,
    weight_combinations: usize,
}

impl<'r> RunPlan<'r> {
    pub fn new(
        registry: &'r IndicatorRegistry,
        dims: &[Dimension],
        resolution: usize,
    ) -> Result<Self, ConfigurationError> {
        if resolution < 2 {
            return Err(ConfigurationError::InvalidGridResolution(resolution));
        }
        let too_large = || ConfigurationError::SweepTooLarge { resolution };
        let metric_sets: Vec<&'r [MetricSpec]> = dims.iter().map(|&d| registry.metrics_for(d)).collect();
        let metric_combinations = metric_sets
            .iter()
            .try_fold(1usize, |acc, s| acc.checked_mul(s.len()))
            .ok_or_else(too_large)?;
        let exponent = u32::try_from(dims.len()).map_err(|_| too_large())?;
        let weight_combinations = resolution.checked_pow(exponent).ok_or_else(too_large)?;
        // `len()` and run ids must fit as well.
        metric_combinations
            .checked_mul(weight_combinations)
            .filter(|&n| u64::try_from(n).is_ok())
            .ok_or_else(too_large)?;
        let grid = weight_grid(resolution)?;
        Ok(Self {
            dims: dims.to_vec(),
            metric_sets,
            grid,
            metric_combinations,
            weight_combinations,
        })
    }

    /// Total number of runs, degenerate ones included.
    pub fn len(&self) -> usize {
        self.metric_combinations * self.weight_combinations
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    pub fn metric_combinations(&self) -> usize {
        self.metric_combinations
    }

    pub fn weight_combinations(&self) -> usize {
        self.weight_combinations
    }

    /// Runs whose weights are all zero: one per metric combination.
    pub fn degenerate_count(&self) -> usize {
        self.metric_combinations
    }

    /// Decode run `index`; `None` past the end.
    pub fn get(&self, index: usize) -> Option<RunSpec<'r>> {
        if index >= self.len() {
            return None;
        }
        let mut metric_idx = index / self.weight_combinations;
        let mut weight_idx = index % self.weight_combinations;

        let mut metrics = [None; 4];
        let mut weights = [0.0; 4];
        for (pos, &d) in self.dims.iter().enumerate().rev() {
            let set = self.metric_sets[pos];
            metrics[d.index()] = Some(&set[metric_idx % set.len()]);
            metric_idx /= set.len();

            weights[d.index()] = self.grid[weight_idx % self.grid.len()];
            weight_idx /= self.grid.len();
        }
        Some(RunSpec { run_id: index as u64, metrics, weights })
    }

    /// Runs in `range` (clamped to the plan).
    pub fn range(&self, range: Range<usize>) -> impl Iterator<Item = RunSpec<'r>> + '_ {
        let end = range.end.min(self.len());
        (range.start..end).filter_map(move |i| self.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = RunSpec<'r>> + '_ {
        self.range(0..self.len())
    }

    /// Metric names of combination `index`, in plan dimension order.
    pub fn metric_combination(&self, index: usize) -> Option<Vec<&'r str>> {
        if index >= self.metric_combinations {
            return None;
        }
        let run = self.get(index * self.weight_combinations)?;
        Some(
            self.dims
                .iter()
                .filter_map(|&d| run.metric(d).map(|m| m.name.as_str()))
                .collect(),
        )
    }
}
