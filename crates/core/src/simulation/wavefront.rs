//! Wavefront fire spread from a single ignition
//!
//! Fire expands outward in rounds. Each round visits every cell of the
//! current frontier, asks the spread oracle how fast fire leaves that cell
//! toward each of its 8 neighbours, and records the earliest arrival time
//! at each neighbour. A neighbour whose arrival improves joins the next
//! frontier, so later rounds correct arrival times when a faster path is
//! found. Arrivals at or beyond the burn duration are dropped, which bounds
//! every fire.
//!
//! # Coordinates
//!
//! Row 0 is the southern edge. Neighbour `k` lies at compass azimuth
//! `45 * k` degrees: N, NE, E, SE, S, SW, W, NW.

use crate::grid::{GridSystem, Raster};
use crate::landscape::Landscape;
use crate::oracle::{SpreadOracle, FT_PER_MIN_TO_M_PER_MIN, KMH_TO_FT_PER_MIN, SMIDGEN};

/// Grid offsets of the 8 neighbours, clockwise from north
pub const NEIGHBOUR_OFFSETS: [(i64, i64); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Lifecycle of one simulated fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadPhase {
    /// No fire simulated yet
    Idle,
    /// Scratch cleared, seed being placed
    Seeding,
    /// Frontier rounds in progress
    Expanding,
    /// Last fire finished
    Done,
}

/// Result of one simulated fire
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpreadOutcome {
    /// Sum of the value of every ignited cell
    pub burned_value: f64,
    /// Number of ignited cells, seed included
    pub burned_cells: usize,
}

/// Reusable simulator holding the per-fire scratch state
///
/// One instance simulates many fires in turn; scratch buffers are sized to
/// the grid once and reset between fires.
#[derive(Debug, Clone)]
pub struct WavefrontSimulator {
    system: GridSystem,
    /// Minutes from ignition of the seed, valid where `ignited` is set
    time_to_ignite: Vec<f64>,
    ignited: Vec<bool>,
    /// Ignited cells in order of first ignition
    burned: Vec<usize>,
    frontier: Vec<usize>,
    next_frontier: Vec<usize>,
    in_next: Vec<bool>,
    phase: SpreadPhase,
}

impl WavefrontSimulator {
    /// Create a simulator with scratch space for a grid
    #[must_use]
    pub fn new(system: GridSystem) -> Self {
        let cells = system.cell_count();
        Self {
            system,
            time_to_ignite: vec![0.0; cells],
            ignited: vec![false; cells],
            burned: Vec::new(),
            frontier: Vec::new(),
            next_frontier: Vec::new(),
            in_next: vec![false; cells],
            phase: SpreadPhase::Idle,
        }
    }

    /// Create a simulator sized for a landscape
    #[must_use]
    pub fn for_landscape(landscape: &Landscape) -> Self {
        Self::new(*landscape.system())
    }

    #[must_use]
    pub fn phase(&self) -> SpreadPhase {
        self.phase
    }

    /// Simulate one fire seeded at `(x, y)`
    ///
    /// # Arguments
    ///
    /// * `landscape` - Prepared landscape on the simulator's grid
    /// * `oracle` - Spread-rate provider
    /// * `seed` - Ignition cell
    /// * `duration` - Burn duration limit in minutes
    ///
    /// # Returns
    ///
    /// Burned value and cell count. A seed off the grid or without
    /// elevation or fuel burns nothing.
    pub fn simulate<O: SpreadOracle + ?Sized>(
        &mut self,
        landscape: &Landscape,
        oracle: &O,
        seed: (usize, usize),
        duration: f64,
    ) -> SpreadOutcome {
        debug_assert!(self.system.matches(landscape.system()));

        self.reset();
        self.phase = SpreadPhase::Seeding;

        let (sx, sy) = seed;
        if sx >= self.system.width || sy >= self.system.height {
            self.phase = SpreadPhase::Done;
            return SpreadOutcome::default();
        }
        let seed_index = self.system.index(sx, sy);
        if !landscape.is_burnable(seed_index) {
            self.phase = SpreadPhase::Done;
            return SpreadOutcome::default();
        }

        let mut burned_value = landscape.value_at(seed_index);
        self.ignited[seed_index] = true;
        self.time_to_ignite[seed_index] = 0.0;
        self.burned.push(seed_index);
        self.frontier.push(seed_index);

        self.phase = SpreadPhase::Expanding;
        while !self.frontier.is_empty() {
            self.next_frontier.clear();
            for i in 0..self.frontier.len() {
                let cell = self.frontier[i];
                burned_value += self.expand_cell(landscape, oracle, cell, duration);
            }
            for &cell in &self.next_frontier {
                self.in_next[cell] = false;
            }
            std::mem::swap(&mut self.frontier, &mut self.next_frontier);
        }

        self.phase = SpreadPhase::Done;
        SpreadOutcome {
            burned_value,
            burned_cells: self.burned.len(),
        }
    }

    /// Spread from one burning cell to its neighbours
    ///
    /// Returns the value of neighbours ignited for the first time.
    fn expand_cell<O: SpreadOracle + ?Sized>(
        &mut self,
        landscape: &Landscape,
        oracle: &O,
        cell: usize,
        duration: f64,
    ) -> f64 {
        let Some(fuel) = landscape.fuel_code_at(cell) else {
            return 0.0;
        };
        let Some(base) = oracle.no_wind_no_slope(fuel, &landscape.moisture_at(cell)) else {
            return 0.0;
        };
        let (wind_kmh, wind_dir) = landscape.wind_at(cell);
        let (slope, aspect) = landscape.terrain_at(cell);
        let profile = oracle.wind_slope_max(
            &base,
            wind_kmh * KMH_TO_FT_PER_MIN,
            wind_dir,
            slope.tan(),
            aspect,
        );

        let (x, y) = self.system.coords(cell);
        let cell_time = self.time_to_ignite[cell];
        let mut gained = 0.0;

        for (k, &(dx, dy)) in NEIGHBOUR_OFFSETS.iter().enumerate() {
            let (nx, ny) = (x as i64 + dx, y as i64 + dy);
            if !self.system.is_in_bounds(nx, ny) {
                continue;
            }
            let neighbour = self.system.index(nx as usize, ny as usize);
            if !landscape.is_burnable(neighbour) {
                continue;
            }

            let azimuth = 45.0 * k as f64;
            let rate = profile.at_azimuth(azimuth) * FT_PER_MIN_TO_M_PER_MIN;
            if rate <= SMIDGEN {
                continue;
            }

            let distance = if k % 2 == 0 {
                self.system.cell_size
            } else {
                self.system.cell_size * std::f64::consts::SQRT_2
            };
            let arrival = cell_time + distance / rate;
            if arrival >= duration {
                continue;
            }

            if !self.ignited[neighbour] {
                self.ignited[neighbour] = true;
                self.burned.push(neighbour);
                gained += landscape.value_at(neighbour);
            } else if arrival >= self.time_to_ignite[neighbour] {
                continue;
            }

            self.time_to_ignite[neighbour] = arrival;
            if !self.in_next[neighbour] {
                self.in_next[neighbour] = true;
                self.next_frontier.push(neighbour);
            }
        }

        gained
    }

    fn reset(&mut self) {
        for &cell in &self.burned {
            self.ignited[cell] = false;
            self.time_to_ignite[cell] = 0.0;
        }
        for &cell in &self.next_frontier {
            self.in_next[cell] = false;
        }
        self.burned.clear();
        self.frontier.clear();
        self.next_frontier.clear();
    }

    /// Cells ignited by the last fire, in order of first ignition
    #[must_use]
    pub fn burned_cells(&self) -> &[usize] {
        &self.burned
    }

    /// Whether a cell ignited in the last fire
    #[must_use]
    pub fn is_ignited(&self, x: usize, y: usize) -> bool {
        x < self.system.width && y < self.system.height && self.ignited[self.system.index(x, y)]
    }

    /// Arrival time (minutes) of the last fire at a cell, if it ignited
    #[must_use]
    pub fn time_to_ignite(&self, x: usize, y: usize) -> Option<f64> {
        self.is_ignited(x, y)
            .then(|| self.time_to_ignite[self.system.index(x, y)])
    }

    /// Arrival times of the last fire as a raster; unignited cells are no-data
    #[must_use]
    pub fn time_to_ignite_raster(&self) -> Raster {
        let mut raster = Raster::no_data_like(self.system, crate::grid::DEFAULT_NO_DATA);
        let times = raster.as_mut_slice();
        for &cell in &self.burned {
            times[cell] = self.time_to_ignite[cell];
        }
        raster
    }
}
