//! Monte-Carlo risk driver
//!
//! Repeatedly ignites the landscape at random cells and simulates each fire
//! with the wavefront simulator. The burned value of each fire is recorded
//! at its seed cell (danger), and every cell the fire reached counts toward
//! its ignition frequency (compound probability). After all trials the
//! sparse danger raster is gap-closed and combined with the probability into
//! a priority index.
//!
//! # Determinism
//!
//! All random draws come from one caller-supplied generator, in trial
//! order, three per trial: column, row, acceptance. The parallel path makes
//! the same draws up front, simulates accepted ignitions in batches, and
//! records each batch in trial order, so both paths produce identical
//! rasters for the same generator state. A cancelled run only ever holds a
//! contiguous prefix of trials.

use crate::cancel::CancelFlag;
use crate::config::{RiskConfig, SeedPolicy};
use crate::error::{Result, RiskError};
use crate::grid::Raster;
use crate::interpolation::{GapClosingInterpolator, GapClosingReport};
use crate::landscape::Landscape;
use crate::oracle::SpreadOracle;
use crate::simulation::wavefront::WavefrontSimulator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Burned cells per grid cell (summed over trials) below which the event
/// count is considered too small for stable statistics
pub const MIN_BURNT_AREA_RATIO: f64 = 2.0;

/// No-data value of the danger raster
pub const DANGER_NO_DATA: f64 = 0.0;

/// Accepted ignitions simulated concurrently before their results are recorded
const PARALLEL_BATCH: usize = 256;

/// Statistics of a completed (or cancelled) run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Trials drawn
    pub trials: usize,
    /// Trials whose ignition passed the base-probability test
    pub accepted_ignitions: usize,
    /// Accepted trials whose fire burned a non-zero value
    pub productive_ignitions: usize,
    /// Ignited cells summed over all trials
    pub burned_cells: usize,
    /// `burned_cells` as area in hectares
    pub burned_area_ha: f64,
    /// `burned_cells` divided by the grid cell count
    pub burnt_area_ratio: f64,
    /// Suggested event count when the burnt area ratio is too small
    pub recommended_events: Option<usize>,
    pub gap_closing: GapClosingReport,
}

/// Result rasters of a risk run
#[derive(Debug, Clone)]
pub struct RiskOutputs {
    /// Burned value of fires seeded at each cell, gap-closed; no-data 0
    pub danger: Raster,
    /// Fraction of trials in which each cell ignited
    pub compound_probability: Raster,
    /// Compound probability times danger
    pub priority_index: Raster,
    pub summary: RunSummary,
}

/// One accepted ignition of the parallel path
#[derive(Debug, Clone, Copy)]
struct Ignition {
    trial: usize,
    cell: usize,
}

/// Fire simulated by a parallel worker, waiting to be recorded
#[derive(Debug)]
struct SimulatedFire {
    value: f64,
    burned: Vec<usize>,
}

/// Burned value recorded for a seed cell by one trial
#[derive(Debug, Clone, Copy)]
struct SeedRecord {
    trial: usize,
    cell: usize,
    value: f64,
}

/// Per-run accumulation state, filled in trial order
#[derive(Debug, Clone, Default)]
struct Accumulator {
    seeds: Vec<SeedRecord>,
    /// Trials in which each cell ignited; empty until first use
    ignition_counts: Vec<u32>,
    productive: usize,
    burned_cells: usize,
}

impl Accumulator {
    fn record(&mut self, trial: usize, cell: usize, value: f64, burned: &[usize], cells: usize) {
        if self.ignition_counts.is_empty() {
            self.ignition_counts = vec![0; cells];
        }
        for &index in burned {
            self.ignition_counts[index] += 1;
        }
        self.burned_cells += burned.len();
        if value != 0.0 {
            self.productive += 1;
        }
        self.seeds.push(SeedRecord { trial, cell, value });
    }
}

/// Driver of the Monte-Carlo risk forecast
///
/// Borrows a prepared landscape and an oracle; both are shared read-only by
/// all trials.
pub struct MonteCarloRiskDriver<'a, O: SpreadOracle + ?Sized> {
    landscape: &'a Landscape,
    oracle: &'a O,
    config: RiskConfig,
    cancel: CancelFlag,
}

impl<'a, O: SpreadOracle + ?Sized> MonteCarloRiskDriver<'a, O> {
    /// Create a driver
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] if the configuration is out
    /// of range.
    pub fn new(landscape: &'a Landscape, oracle: &'a O, config: RiskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            landscape,
            oracle,
            config,
            cancel: CancelFlag::new(),
        })
    }

    /// Observe a cancel flag once per trial and once per relaxation sweep
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Run with a generator seeded from the configuration, or from OS
    /// entropy when no seed is configured
    ///
    /// # Errors
    ///
    /// Same as [`MonteCarloRiskDriver::run`].
    pub fn run_seeded(&self) -> Result<RiskOutputs> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self.run(&mut rng)
    }

    /// Run all trials and derive the output rasters
    ///
    /// # Errors
    ///
    /// - [`RiskError::NoBurnedArea`] if no fire burned any value
    /// - [`RiskError::Cancelled`] with the partial rasters when the cancel
    ///   flag is raised
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RiskOutputs> {
        let trials = self.config.event_count;
        info!(
            "Starting risk run: {} events, {} min fire duration, {}",
            trials,
            self.config.fire_duration_minutes,
            if self.config.parallel {
                "parallel"
            } else {
                "sequential"
            }
        );

        let (accumulator, accepted, completed) = if self.config.parallel {
            self.run_parallel(rng)
        } else {
            self.run_sequential(rng)
        };

        let mut danger = self.danger_raster(&accumulator.seeds);
        let mut summary = self.summarize(completed, accepted, &accumulator);

        if completed < trials {
            return Err(self.cancelled(danger, &accumulator, summary));
        }

        self.advise(&mut summary);

        if danger.data_cells() == 0 {
            warn!("No simulated fire burned any value");
            return Err(RiskError::NoBurnedArea);
        }

        let interpolator = GapClosingInterpolator::new(self.config.gap_closing_threshold)
            .with_cancel_flag(self.cancel.clone());
        match interpolator.close_gaps(&danger) {
            Ok((filled, report)) => {
                danger = filled;
                summary.gap_closing = report;
            }
            Err(RiskError::Cancelled { .. }) => {
                return Err(self.cancelled(danger, &accumulator, summary));
            }
            Err(e) => return Err(e),
        }

        let compound_probability = self.probability_raster(&accumulator, completed);
        let priority_index = priority_raster(&compound_probability, &danger);

        info!(
            "Risk run complete: {} accepted ignitions, {:.1} ha burned in total",
            summary.accepted_ignitions, summary.burned_area_ha
        );

        Ok(RiskOutputs {
            danger,
            compound_probability,
            priority_index,
            summary,
        })
    }

    /// Draw one trial's ignition; `None` when the acceptance test fails
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let system = self.landscape.system();
        let x = rng.random_range(0..system.width);
        let y = rng.random_range(0..system.height);
        let p: f64 = rng.random();
        let cell = system.index(x, y);
        (self.landscape.base_probability_at(cell) >= p).then_some(cell)
    }

    fn progress_interval(&self) -> usize {
        (self.config.event_count / 10).max(1)
    }

    /// Returns the accumulator, accepted trial count and completed trial count
    fn run_sequential<R: Rng + ?Sized>(&self, rng: &mut R) -> (Accumulator, usize, usize) {
        let trials = self.config.event_count;
        let cells = self.landscape.cell_count();
        let interval = self.progress_interval();

        let mut simulator = WavefrontSimulator::for_landscape(self.landscape);
        let mut accumulator = Accumulator::default();
        let mut accepted = 0;

        for trial in 0..trials {
            if self.cancel.is_cancelled() {
                warn!("Risk run cancelled after {} of {} trials", trial, trials);
                return (accumulator, accepted, trial);
            }

            if let Some(cell) = self.draw(rng) {
                accepted += 1;
                let seed = self.landscape.system().coords(cell);
                let outcome = simulator.simulate(
                    self.landscape,
                    self.oracle,
                    seed,
                    self.config.fire_duration_minutes,
                );
                debug!(
                    "Trial {}: seed {:?} burned {} cells, value {}",
                    trial, seed, outcome.burned_cells, outcome.burned_value
                );
                accumulator.record(
                    trial,
                    cell,
                    outcome.burned_value,
                    simulator.burned_cells(),
                    cells,
                );
            }

            if (trial + 1) % interval == 0 {
                info!("Trials {}/{} ({} accepted)", trial + 1, trials, accepted);
            }
        }

        (accumulator, accepted, trials)
    }

    fn run_parallel<R: Rng + ?Sized>(&self, rng: &mut R) -> (Accumulator, usize, usize) {
        let trials = self.config.event_count;
        let cells = self.landscape.cell_count();
        let duration = self.config.fire_duration_minutes;

        let ignitions: Vec<Ignition> = (0..trials)
            .filter_map(|trial| self.draw(rng).map(|cell| Ignition { trial, cell }))
            .collect();
        info!("Drew {} accepted ignitions of {} trials", ignitions.len(), trials);

        let mut accumulator = Accumulator::default();
        let mut accepted = 0;
        for batch in ignitions.chunks(PARALLEL_BATCH) {
            let fires: Vec<Option<SimulatedFire>> = batch
                .par_iter()
                .map_init(
                    || WavefrontSimulator::for_landscape(self.landscape),
                    |simulator, ignition| {
                        if self.cancel.is_cancelled() {
                            return None;
                        }
                        let seed = self.landscape.system().coords(ignition.cell);
                        let outcome =
                            simulator.simulate(self.landscape, self.oracle, seed, duration);
                        Some(SimulatedFire {
                            value: outcome.burned_value,
                            burned: simulator.burned_cells().to_vec(),
                        })
                    },
                )
                .collect();

            for (ignition, fire) in batch.iter().zip(fires) {
                // Fires after the first skipped one are discarded
                let Some(fire) = fire else {
                    warn!(
                        "Risk run cancelled after {} of {} trials",
                        ignition.trial, trials
                    );
                    return (accumulator, accepted, ignition.trial);
                };
                accepted += 1;
                accumulator.record(ignition.trial, ignition.cell, fire.value, &fire.burned, cells);
            }

            if let Some(last) = batch.last() {
                info!("Trials {}/{} ({} accepted)", last.trial + 1, trials, accepted);
            }
        }

        (accumulator, accepted, trials)
    }

    /// Apply seed records in trial order according to the seed policy
    fn danger_raster(&self, seeds: &[SeedRecord]) -> Raster {
        let mut ordered: Vec<&SeedRecord> = seeds.iter().collect();
        ordered.sort_by_key(|s| s.trial);

        let mut danger = Raster::no_data_like(*self.landscape.system(), DANGER_NO_DATA);
        let values = danger.as_mut_slice();
        for seed in ordered {
            match self.config.seed_policy {
                SeedPolicy::Overwrite => values[seed.cell] = seed.value,
                SeedPolicy::Accumulate => values[seed.cell] += seed.value,
            }
        }
        danger
    }

    fn probability_raster(&self, accumulator: &Accumulator, completed: usize) -> Raster {
        let system = *self.landscape.system();
        let mut probability = Raster::filled(system, 0.0);
        if completed == 0 || accumulator.ignition_counts.is_empty() {
            return probability;
        }
        let trials = completed as f64;
        for (cell, &count) in probability
            .as_mut_slice()
            .iter_mut()
            .zip(&accumulator.ignition_counts)
        {
            *cell = f64::from(count) / trials;
        }
        probability
    }

    fn summarize(&self, completed: usize, accepted: usize, accumulator: &Accumulator) -> RunSummary {
        let system = self.landscape.system();
        let burned_cells = accumulator.burned_cells;
        RunSummary {
            trials: completed,
            accepted_ignitions: accepted,
            productive_ignitions: accumulator.productive,
            burned_cells,
            burned_area_ha: burned_cells as f64 * system.cell_area() / 10_000.0,
            burnt_area_ratio: burned_cells as f64 / system.cell_count() as f64,
            recommended_events: None,
            gap_closing: GapClosingReport::default(),
        }
    }

    /// Warn when too little area burned for stable statistics
    fn advise(&self, summary: &mut RunSummary) {
        let ratio = summary.burnt_area_ratio;
        if ratio >= MIN_BURNT_AREA_RATIO {
            return;
        }
        if ratio > 0.0 {
            let recommended =
                (self.config.event_count as f64 * MIN_BURNT_AREA_RATIO / ratio).ceil() as usize;
            warn!(
                "Burnt area ratio {:.3} is below {}; consider at least {} events",
                ratio, MIN_BURNT_AREA_RATIO, recommended
            );
            summary.recommended_events = Some(recommended);
        } else {
            warn!("No area burned; increase the event count or fire duration");
        }
    }

    fn cancelled(&self, danger: Raster, accumulator: &Accumulator, summary: RunSummary) -> RiskError {
        let compound_probability = self.probability_raster(accumulator, summary.trials);
        let priority_index = priority_raster(&compound_probability, &danger);
        RiskError::Cancelled {
            partial: Some(Box::new(RiskOutputs {
                danger,
                compound_probability,
                priority_index,
                summary,
            })),
        }
    }
}

/// Pointwise product of probability and danger; 0 where danger has no data
fn priority_raster(probability: &Raster, danger: &Raster) -> Raster {
    let mut priority = Raster::filled(*danger.system(), 0.0);
    for (index, cell) in priority.as_mut_slice().iter_mut().enumerate() {
        if let (Some(p), Some(d)) = (probability.get_index(index), danger.get_index(index)) {
            *cell = p * d;
        }
    }
    priority
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridSystem, DEFAULT_NO_DATA};
    use crate::landscape::LandscapeInputs;
    use crate::oracle::{ConstantSpreadOracle, Moisture, SpreadBase};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Constant-rate oracle that raises a cancel flag during its n-th fire
    struct CancellingOracle {
        inner: ConstantSpreadOracle,
        calls: AtomicUsize,
        cancel_at: usize,
        cancel: CancelFlag,
    }

    impl CancellingOracle {
        fn new(cancel_at: usize, cancel: CancelFlag) -> Self {
            Self {
                inner: ConstantSpreadOracle::new(1.0),
                calls: AtomicUsize::new(0),
                cancel_at,
                cancel,
            }
        }
    }

    impl SpreadOracle for CancellingOracle {
        fn no_wind_no_slope(&self, fuel_model: u32, moisture: &Moisture) -> Option<SpreadBase> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_at {
                self.cancel.cancel();
            }
            self.inner.no_wind_no_slope(fuel_model, moisture)
        }
    }

    fn landscape(width: usize, height: usize) -> Landscape {
        let system = GridSystem::new(width, height, 10.0).unwrap();
        Landscape::prepare(LandscapeInputs::calm_and_dry(
            Raster::filled(system, 0.0),
            Raster::filled(system, 1.0),
        ))
        .unwrap()
    }

    fn config(events: usize) -> RiskConfig {
        RiskConfig {
            event_count: events,
            seed: Some(7),
            ..RiskConfig::default()
        }
    }

    #[test]
    fn test_accumulator_record() {
        let mut acc = Accumulator::default();
        acc.record(0, 1, 2.0, &[1, 2], 4);
        acc.record(3, 2, 0.0, &[2], 4);

        assert_eq!(acc.ignition_counts, vec![0, 1, 2, 0]);
        assert_eq!(acc.burned_cells, 3);
        assert_eq!(acc.productive, 1);
        assert_eq!(acc.seeds.len(), 2);
    }

    #[test]
    fn test_seed_policies() {
        let land = landscape(2, 2);
        let oracle = ConstantSpreadOracle::new(1.0);
        let seeds = [
            SeedRecord { trial: 2, cell: 0, value: 5.0 },
            SeedRecord { trial: 0, cell: 0, value: 1.0 },
            SeedRecord { trial: 1, cell: 3, value: 4.0 },
        ];

        let overwrite = MonteCarloRiskDriver::new(&land, &oracle, config(1)).unwrap();
        let danger = overwrite.danger_raster(&seeds);
        assert_eq!(danger.get_index(0), Some(5.0));
        assert_eq!(danger.get_index(3), Some(4.0));
        assert!(danger.get_index(1).is_none());

        let accumulate = MonteCarloRiskDriver::new(
            &land,
            &oracle,
            RiskConfig {
                seed_policy: SeedPolicy::Accumulate,
                ..config(1)
            },
        )
        .unwrap();
        assert_eq!(accumulate.danger_raster(&seeds).get_index(0), Some(6.0));
    }

    #[test]
    fn test_advisory_recommends_more_events() {
        let land = landscape(10, 10);
        let oracle = ConstantSpreadOracle::new(0.0);
        let driver = MonteCarloRiskDriver::new(&land, &oracle, config(10)).unwrap();
        let outputs = driver.run_seeded().unwrap();

        // Each fire burns only its seed: ratio = 10 / 100
        assert_eq!(outputs.summary.burned_cells, 10);
        assert_eq!(outputs.summary.recommended_events, Some(200));
    }

    #[test]
    fn test_priority_is_product() {
        let system = GridSystem::new(2, 1, 1.0).unwrap();
        let probability = Raster::from_vec(system, vec![0.5, 0.25], DEFAULT_NO_DATA).unwrap();
        let danger = Raster::from_vec(system, vec![4.0, 0.0], DANGER_NO_DATA).unwrap();
        let priority = priority_raster(&probability, &danger);
        assert_eq!(priority.as_slice(), &[2.0, 0.0]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let land = landscape(2, 2);
        let oracle = ConstantSpreadOracle::new(1.0);
        assert!(MonteCarloRiskDriver::new(&land, &oracle, config(0)).is_err());
    }

    #[test]
    fn test_cancelled_run_returns_partial() {
        let land = landscape(3, 3);
        let oracle = ConstantSpreadOracle::new(1.0);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let driver = MonteCarloRiskDriver::new(&land, &oracle, config(5))
            .unwrap()
            .with_cancel_flag(cancel);

        match driver.run_seeded() {
            Err(RiskError::Cancelled { partial: Some(partial) }) => {
                assert_eq!(partial.summary.trials, 0);
                assert_eq!(partial.danger.data_cells(), 0);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_sequential_run_keeps_completed_trials() {
        // Single cell: every fire calls the oracle once and burns only its seed
        let land = landscape(1, 1);
        let cancel = CancelFlag::new();
        let oracle = CancellingOracle::new(51, cancel.clone());
        let driver = MonteCarloRiskDriver::new(&land, &oracle, config(2000))
            .unwrap()
            .with_cancel_flag(cancel);

        match driver.run_seeded() {
            Err(RiskError::Cancelled { partial: Some(partial) }) => {
                assert_eq!(partial.summary.trials, 51);
                assert_eq!(partial.summary.accepted_ignitions, 51);
                assert_eq!(partial.summary.burned_cells, 51);
                assert_eq!(partial.compound_probability.get_index(0), Some(1.0));
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_parallel_run_stays_within_completed_trials() {
        let land = landscape(1, 1);
        let cancel = CancelFlag::new();
        let oracle = CancellingOracle::new(51, cancel.clone());
        let driver = MonteCarloRiskDriver::new(
            &land,
            &oracle,
            RiskConfig {
                parallel: true,
                ..config(2000)
            },
        )
        .unwrap()
        .with_cancel_flag(cancel);

        match driver.run_seeded() {
            Err(RiskError::Cancelled { partial: Some(partial) }) => {
                let summary = &partial.summary;
                assert!(summary.trials < 2000);
                assert_eq!(summary.accepted_ignitions, summary.trials);
                assert_eq!(summary.burned_cells, summary.trials);
                assert_eq!(summary.productive_ignitions, summary.trials);

                for &p in partial.compound_probability.as_slice() {
                    assert!((0.0..=1.0).contains(&p), "probability {p} out of range");
                }
                if summary.trials > 0 {
                    assert_eq!(partial.compound_probability.get_index(0), Some(1.0));
                    assert_eq!(partial.danger.get_index(0), Some(1.0));
                }
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
