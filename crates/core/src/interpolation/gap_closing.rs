//! Multi-resolution gap closing
//!
//! No-data holes are filled by a coarse-to-fine relaxation. At each level
//! the grid is viewed at a power-of-two node spacing `step`:
//!
//! 1. Nodes whose `step` x `step` block holds source data are fixed to the
//!    block average (or to the source value itself when the node has one).
//! 2. Free nodes start from the previous, coarser level: its value at the
//!    node, else the mean of its coarser neighbours.
//! 3. Jacobi sweeps replace every free node with the distance-weighted mean
//!    of its 8 neighbours at the current spacing until the largest change of
//!    a sweep drops below the threshold.
//!
//! The finest level (`step = 1`) covers every cell, so the result keeps all
//! source data and fills every hole reachable from it.

use crate::cancel::CancelFlag;
use crate::error::{Result, RiskError};
use crate::grid::Raster;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Default stop threshold for the largest per-sweep change
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Neighbour offsets with their inverse unit distance
const NEIGHBOURS: [(i64, i64, f64); 8] = [
    (0, 1, 1.0),
    (1, 1, std::f64::consts::FRAC_1_SQRT_2),
    (1, 0, 1.0),
    (1, -1, std::f64::consts::FRAC_1_SQRT_2),
    (0, -1, 1.0),
    (-1, -1, std::f64::consts::FRAC_1_SQRT_2),
    (-1, 0, 1.0),
    (-1, 1, std::f64::consts::FRAC_1_SQRT_2),
];

/// Work done by one gap-closing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GapClosingReport {
    /// Multigrid levels processed
    pub levels: usize,
    /// Relaxation sweeps over all levels
    pub sweeps: usize,
}

/// Tension-relaxation gap filler
#[derive(Debug, Clone)]
pub struct GapClosingInterpolator {
    threshold: f64,
    cancel: CancelFlag,
}

impl Default for GapClosingInterpolator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl GapClosingInterpolator {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            cancel: CancelFlag::new(),
        }
    }

    /// Observe a cancel flag between sweeps
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fill the no-data cells of a raster
    ///
    /// The result shares the input's grid and no-data value. Cells with
    /// data are copied unchanged. A raster without any data cells is
    /// returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] for a non-positive threshold
    /// and [`RiskError::Cancelled`] when the cancel flag is raised.
    pub fn close_gaps(&self, input: &Raster) -> Result<(Raster, GapClosingReport)> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(RiskError::invalid_parameter(
                "gap_closing_threshold",
                self.threshold,
                "must be finite and positive",
            ));
        }

        let data_cells = input.data_cells();
        if data_cells == 0 {
            warn!("Gap closing skipped: raster has no data cells to interpolate from");
            return Ok((input.clone(), GapClosingReport::default()));
        }
        if data_cells == input.as_slice().len() {
            debug!("Gap closing skipped: raster has no gaps");
            return Ok((input.clone(), GapClosingReport::default()));
        }

        let width = input.width();
        let height = input.height();
        let source: Vec<f64> = input
            .as_slice()
            .iter()
            .map(|&v| if input.is_no_data_value(v) { f64::NAN } else { v })
            .collect();

        let mut arena = Arena::new(width, height, source);
        let mut report = GapClosingReport::default();

        let mut step = coarsest_step(width.max(height));
        loop {
            let sweeps = arena.run_level(step, self.threshold, &self.cancel)?;
            report.levels += 1;
            report.sweeps += sweeps;
            info!("Gap closing level step={} converged after {} sweeps", step, sweeps);

            if step == 1 {
                break;
            }
            step /= 2;
        }

        let mut output = Raster::no_data_like(*input.system(), input.no_data_value());
        for (cell, &value) in output.as_mut_slice().iter_mut().zip(arena.result()) {
            if !value.is_nan() {
                *cell = value;
            }
        }

        Ok((output, report))
    }
}

/// Largest power of two not above `extent`
fn coarsest_step(extent: usize) -> usize {
    if extent <= 1 {
        1
    } else {
        1 << (usize::BITS - 1 - extent.leading_zeros())
    }
}

/// Buffers shared by every level; NaN marks no-data
struct Arena {
    width: usize,
    height: usize,
    source: Vec<f64>,
    previous: Vec<f64>,
    current: Vec<f64>,
    scratch: Vec<f64>,
    fixed: Vec<bool>,
}

impl Arena {
    fn new(width: usize, height: usize, source: Vec<f64>) -> Self {
        let cells = source.len();
        Self {
            width,
            height,
            source,
            previous: vec![f64::NAN; cells],
            current: vec![f64::NAN; cells],
            scratch: vec![f64::NAN; cells],
            fixed: vec![false; cells],
        }
    }

    fn result(&self) -> &[f64] {
        &self.previous
    }

    fn nodes(&self, step: usize) -> impl Iterator<Item = (usize, usize)> {
        let (width, height) = (self.width, self.height);
        (0..height)
            .step_by(step)
            .flat_map(move |y| (0..width).step_by(step).map(move |x| (x, y)))
    }

    fn neighbour(&self, x: usize, y: usize, dx: i64, dy: i64, step: usize) -> Option<usize> {
        let nx = x as i64 + dx * step as i64;
        let ny = y as i64 + dy * step as i64;
        if nx >= 0 && ny >= 0 && (nx as usize) < self.width && (ny as usize) < self.height {
            Some(ny as usize * self.width + nx as usize)
        } else {
            None
        }
    }

    /// Average of source data in the block starting at a node
    fn block_mean(&self, x: usize, y: usize, step: usize) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for by in y..(y + step).min(self.height) {
            let row = by * self.width;
            for bx in x..(x + step).min(self.width) {
                let value = self.source[row + bx];
                if !value.is_nan() {
                    sum += value;
                    count += 1;
                }
            }
        }
        (count > 0).then_some(sum / count as f64)
    }

    /// Initialize, relax, and store one level; returns the sweep count
    fn run_level(&mut self, step: usize, threshold: f64, cancel: &CancelFlag) -> Result<usize> {
        self.current.fill(f64::NAN);
        self.scratch.fill(f64::NAN);
        let nodes: Vec<(usize, usize)> = self.nodes(step).collect();

        for &(x, y) in &nodes {
            let index = y * self.width + x;
            let own = self.source[index];
            let fixed_value = if own.is_nan() {
                self.block_mean(x, y, step)
            } else {
                Some(own)
            };

            match fixed_value {
                Some(value) => {
                    self.current[index] = value;
                    self.fixed[index] = true;
                }
                None => {
                    self.fixed[index] = false;
                    self.current[index] = self.warm_start(x, y, step);
                }
            }
        }

        let mut sweeps = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RiskError::Cancelled { partial: None });
            }

            let max_change = self.sweep(&nodes, step);
            sweeps += 1;
            debug!("step={} sweep={} max_change={}", step, sweeps, max_change);
            if max_change < threshold {
                break;
            }
        }

        std::mem::swap(&mut self.previous, &mut self.current);
        Ok(sweeps)
    }

    /// Starting value of a free node from the coarser level
    fn warm_start(&self, x: usize, y: usize, step: usize) -> f64 {
        let index = y * self.width + x;
        let inherited = self.previous[index];
        if !inherited.is_nan() {
            return inherited;
        }

        let mut sum = 0.0;
        let mut count = 0usize;
        for &(dx, dy, _) in &NEIGHBOURS {
            if let Some(n) = self.neighbour(x, y, dx, dy, step) {
                let value = self.previous[n];
                if !value.is_nan() {
                    sum += value;
                    count += 1;
                }
            }
        }
        if count > 0 {
            sum / count as f64
        } else {
            self.source[index]
        }
    }

    /// One Jacobi sweep over the free nodes; returns the largest change
    fn sweep(&mut self, nodes: &[(usize, usize)], step: usize) -> f64 {
        let mut max_change: f64 = 0.0;

        for &(x, y) in nodes {
            let index = y * self.width + x;
            let old = self.current[index];
            if self.fixed[index] {
                self.scratch[index] = old;
                continue;
            }

            let mut sum = 0.0;
            let mut weights = 0.0;
            for &(dx, dy, weight) in &NEIGHBOURS {
                if let Some(n) = self.neighbour(x, y, dx, dy, step) {
                    let value = self.current[n];
                    if !value.is_nan() {
                        sum += weight * value;
                        weights += weight;
                    }
                }
            }

            let new = if weights > 0.0 { sum / weights } else { old };
            let change = match (old.is_nan(), new.is_nan()) {
                (true, false) => f64::INFINITY,
                (false, false) => (new - old).abs(),
                _ => 0.0,
            };
            max_change = max_change.max(change);
            self.scratch[index] = new;
        }

        std::mem::swap(&mut self.current, &mut self.scratch);
        max_change
    }
}
