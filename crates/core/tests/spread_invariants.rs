//! Invariant checks on a windy, sloped landscape with the elliptical oracle
//!
//! - Arrival times are non-negative and every ignited cell other than the
//!   seed is reached from an earlier-burning neighbour
//! - No neighbour could have been reached earlier than its recorded time
//! - Each ignited cell is credited once
//! - Seeded runs are reproducible, and the parallel path matches the
//!   sequential one exactly

use fire_risk_core::oracle::{FT_PER_MIN_TO_M_PER_MIN, KMH_TO_FT_PER_MIN, SMIDGEN};
use fire_risk_core::simulation::NEIGHBOUR_OFFSETS;
use fire_risk_core::{
    EllipticalSpreadOracle, GridSystem, Landscape, LandscapeInputs, MonteCarloRiskDriver, Raster,
    RiskConfig, SeedPolicy, SpreadOracle, WavefrontSimulator,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing_subscriber::EnvFilter;

const DURATION: f64 = 60.0;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 14x10 hillside rising to the north with a south-westerly wind and
/// patchy fuel
fn hillside() -> Landscape {
    let grid = GridSystem::new(14, 10, 30.0).unwrap();
    let mut elevation = Raster::filled(grid, 0.0);
    let mut fuel = Raster::filled(grid, 1.0);
    let mut value = Raster::filled(grid, 1.0);
    for y in 0..10 {
        for x in 0..14 {
            elevation.set(x, y, 200.0 + 6.0 * y as f64 + 1.5 * x as f64);
            let model = match (x + 2 * y) % 5 {
                0 => 2.0,
                1 => 4.0,
                2 => 8.0,
                _ => 1.0,
            };
            fuel.set(x, y, model);
            value.set(x, y, 1.0 + ((x * 7 + y * 3) % 4) as f64);
        }
    }
    // A rock outcrop with no fuel
    fuel.set_no_data(6, 4);
    fuel.set_no_data(7, 4);
    fuel.set_no_data(6, 5);

    let mut inputs = LandscapeInputs::calm_and_dry(elevation, fuel).with_value(value);
    inputs.wind_speed = Raster::filled(grid, 15.0);
    inputs.wind_direction = Raster::filled(grid, 45.0);
    inputs.moisture_1h = Raster::filled(grid, 6.0);
    inputs.moisture_10h = Raster::filled(grid, 7.0);
    inputs.moisture_100h = Raster::filled(grid, 8.0);
    inputs.moisture_herb = Raster::filled(grid, 90.0);
    inputs.moisture_wood = Raster::filled(grid, 120.0);
    Landscape::prepare(inputs).unwrap()
}

/// Directional spread rate (m/min) from `cell` toward neighbour `k`
fn rate_toward(landscape: &Landscape, oracle: &EllipticalSpreadOracle, cell: usize, k: usize) -> f64 {
    let Some(fuel) = landscape.fuel_code_at(cell) else {
        return 0.0;
    };
    let Some(base) = oracle.no_wind_no_slope(fuel, &landscape.moisture_at(cell)) else {
        return 0.0;
    };
    let (wind, dir) = landscape.wind_at(cell);
    let (slope, aspect) = landscape.terrain_at(cell);
    let profile = oracle.wind_slope_max(&base, wind * KMH_TO_FT_PER_MIN, dir, slope.tan(), aspect);
    profile.at_azimuth(45.0 * k as f64) * FT_PER_MIN_TO_M_PER_MIN
}

#[test]
fn test_arrival_times_are_shortest_paths() {
    init_tracing();
    let landscape = hillside();
    let oracle = EllipticalSpreadOracle::default();
    let grid = *landscape.system();
    let mut simulator = WavefrontSimulator::for_landscape(&landscape);

    let seed = (3, 2);
    let outcome = simulator.simulate(&landscape, &oracle, seed, DURATION);
    assert!(outcome.burned_cells > 10, "fire should spread beyond the seed");
    assert_eq!(simulator.time_to_ignite(seed.0, seed.1), Some(0.0));

    for y in 0..grid.height {
        for x in 0..grid.width {
            let Some(time) = simulator.time_to_ignite(x, y) else {
                continue;
            };
            assert!((0.0..DURATION).contains(&time));

            let cell = grid.index(x, y);
            let mut has_predecessor = (x, y) == seed;
            for (k, &(dx, dy)) in NEIGHBOUR_OFFSETS.iter().enumerate() {
                let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                if !grid.is_in_bounds(nx, ny) {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                let neighbour = grid.index(nx, ny);
                if !landscape.is_burnable(neighbour) {
                    continue;
                }

                let rate = rate_toward(&landscape, &oracle, cell, k);
                if rate <= SMIDGEN {
                    continue;
                }
                let distance = if k % 2 == 0 {
                    grid.cell_size
                } else {
                    grid.cell_size * std::f64::consts::SQRT_2
                };
                let via_cell = time + distance / rate;
                if via_cell < DURATION {
                    let recorded = simulator
                        .time_to_ignite(nx, ny)
                        .expect("reachable neighbour must ignite");
                    assert!(
                        recorded <= via_cell + 1e-9,
                        "({nx}, {ny}) recorded {recorded} but reachable at {via_cell}"
                    );
                }

                // Some neighbour must have delivered this cell's time
                if let Some(neighbour_time) = simulator.time_to_ignite(nx, ny) {
                    let back = (k + 4) % 8;
                    let back_rate = rate_toward(&landscape, &oracle, neighbour, back);
                    if back_rate > SMIDGEN
                        && neighbour_time < time
                        && (neighbour_time + distance / back_rate - time).abs() < 1e-9
                    {
                        has_predecessor = true;
                    }
                }
            }
            assert!(has_predecessor, "({x}, {y}) has no predecessor");
        }
    }
}

#[test]
fn test_value_credited_once_per_cell() {
    let landscape = hillside();
    let oracle = EllipticalSpreadOracle::default();
    let mut simulator = WavefrontSimulator::for_landscape(&landscape);

    for seed in [(0, 0), (13, 9), (5, 5)] {
        let outcome = simulator.simulate(&landscape, &oracle, seed, DURATION);
        let burned = simulator.burned_cells();
        let unique: HashSet<usize> = burned.iter().copied().collect();
        assert_eq!(unique.len(), burned.len());
        assert_eq!(outcome.burned_cells, burned.len());

        let expected: f64 = burned.iter().map(|&i| landscape.value_at(i)).sum();
        assert!((outcome.burned_value - expected).abs() < 1e-9);
    }
}

#[test]
fn test_outcrop_never_ignites() {
    let landscape = hillside();
    let oracle = EllipticalSpreadOracle::default();
    let mut simulator = WavefrontSimulator::for_landscape(&landscape);
    simulator.simulate(&landscape, &oracle, (5, 4), 10_000.0);
    assert!(!simulator.is_ignited(6, 4));
    assert!(!simulator.is_ignited(7, 4));
    assert!(!simulator.is_ignited(6, 5));
}

fn run(config: RiskConfig, seed: u64) -> fire_risk_core::RiskOutputs {
    let landscape = hillside();
    let oracle = EllipticalSpreadOracle::default();
    let driver = MonteCarloRiskDriver::new(&landscape, &oracle, config).unwrap();
    driver.run(&mut StdRng::seed_from_u64(seed)).unwrap()
}

fn base_config() -> RiskConfig {
    RiskConfig {
        event_count: 60,
        fire_duration_minutes: DURATION,
        ..RiskConfig::default()
    }
}

#[test]
fn test_seeded_runs_are_reproducible() {
    init_tracing();
    let first = run(base_config(), 2024);
    let second = run(base_config(), 2024);
    assert_eq!(first.danger, second.danger);
    assert_eq!(first.compound_probability, second.compound_probability);
    assert_eq!(first.priority_index, second.priority_index);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn test_parallel_matches_sequential() {
    for policy in [SeedPolicy::Overwrite, SeedPolicy::Accumulate] {
        let sequential = run(
            RiskConfig {
                seed_policy: policy,
                ..base_config()
            },
            77,
        );
        let parallel = run(
            RiskConfig {
                seed_policy: policy,
                parallel: true,
                ..base_config()
            },
            77,
        );
        assert_eq!(sequential.danger, parallel.danger);
        assert_eq!(
            sequential.compound_probability,
            parallel.compound_probability
        );
        assert_eq!(sequential.priority_index, parallel.priority_index);
        assert_eq!(sequential.summary, parallel.summary);
    }
}

#[test]
fn test_probability_is_bounded() {
    for events in [3, 7, 60] {
        let outputs = run(
            RiskConfig {
                event_count: events,
                ..base_config()
            },
            5,
        );
        for &p in outputs.compound_probability.as_slice() {
            assert!((0.0..=1.0).contains(&p), "probability {p} out of range");
        }
        assert_eq!(outputs.summary.trials, events);
    }
}

#[test]
fn test_priority_combines_probability_and_danger() {
    let outputs = run(base_config(), 11);
    for index in 0..outputs.danger.as_slice().len() {
        let p = outputs.compound_probability.get_index(index).unwrap();
        let expected = outputs.danger.get_index(index).map_or(0.0, |d| p * d);
        assert_eq!(outputs.priority_index.get_index(index), Some(expected));
    }
}
