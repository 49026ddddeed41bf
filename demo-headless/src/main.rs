use clap::{Parser, ValueEnum};
use fire_risk_core::{
    read_ascii_grid, write_ascii_grid, EllipticalSpreadOracle, FuelTable, GridSystem, Landscape,
    LandscapeInputs, MonteCarloRiskDriver, Raster, Result, RiskConfig, RunPreset, RunSummary,
    SeedPolicy,
};
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Monte-Carlo wildfire risk forecast over ESRI ASCII grids
#[derive(Parser, Debug)]
#[command(name = "fire-risk")]
#[command(about = "Wildfire danger, burn probability and priority forecast", long_about = None)]
struct Args {
    /// Elevation grid (m)
    #[arg(long)]
    dem: PathBuf,

    /// Fuel model grid (integer codes)
    #[arg(long)]
    fuel: PathBuf,

    /// Wind speed grid (km/h)
    #[arg(long)]
    wind_speed: PathBuf,

    /// Wind direction grid (compass degrees the wind blows toward)
    #[arg(long)]
    wind_direction: PathBuf,

    /// 1-h dead fuel moisture grid (%)
    #[arg(long)]
    m1h: PathBuf,

    /// 10-h dead fuel moisture grid (%)
    #[arg(long)]
    m10h: PathBuf,

    /// 100-h dead fuel moisture grid (%), also used for the 1000-h class
    #[arg(long)]
    m100h: PathBuf,

    /// Live herbaceous moisture grid (%)
    #[arg(long)]
    mherb: PathBuf,

    /// Live woody moisture grid (%)
    #[arg(long)]
    mwood: PathBuf,

    /// Asset value grid (default 1 everywhere)
    #[arg(long)]
    value: Option<PathBuf>,

    /// Ignition acceptance probability grid (default 1 everywhere)
    #[arg(long)]
    base_probability: Option<PathBuf>,

    /// Event-count preset (overridden by --events)
    #[arg(long, value_enum)]
    preset: Option<PresetArg>,

    /// Number of simulated ignitions
    #[arg(short, long)]
    events: Option<usize>,

    /// Fire duration limit in minutes
    #[arg(short, long)]
    duration: Option<f64>,

    /// Seed for the ignition generator (random when absent)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Run trials on all cores
    #[arg(short, long)]
    parallel: bool,

    /// Handling of trials seeded on the same cell
    #[arg(long, value_enum)]
    seed_policy: Option<SeedPolicyArg>,

    /// Gap-closing convergence threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Fuel model table (JSON array); the 13 standard models when absent
    #[arg(long)]
    fuel_table: Option<PathBuf>,

    /// Run configuration (JSON); command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output danger grid
    #[arg(long)]
    danger: Option<PathBuf>,

    /// Output compound probability grid
    #[arg(long)]
    probability: Option<PathBuf>,

    /// Output priority index grid
    #[arg(long)]
    priority: Option<PathBuf>,

    /// Output run report (JSON)
    #[arg(short, long)]
    report: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PresetArg {
    Quick,
    Standard,
    Thorough,
}

impl From<PresetArg> for RunPreset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Quick => RunPreset::Quick,
            PresetArg::Standard => RunPreset::Standard,
            PresetArg::Thorough => RunPreset::Thorough,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SeedPolicyArg {
    Overwrite,
    Accumulate,
}

impl From<SeedPolicyArg> for SeedPolicy {
    fn from(arg: SeedPolicyArg) -> Self {
        match arg {
            SeedPolicyArg::Overwrite => SeedPolicy::Overwrite,
            SeedPolicyArg::Accumulate => SeedPolicy::Accumulate,
        }
    }
}

/// Output file locations recorded in the report
#[derive(Serialize)]
struct OutputPaths<'a> {
    danger: Option<&'a Path>,
    probability: Option<&'a Path>,
    priority: Option<&'a Path>,
}

#[derive(Serialize)]
struct RunReport<'a> {
    config: &'a RiskConfig,
    grid: &'a GridSystem,
    danger_unit: &'static str,
    summary: &'a RunSummary,
    outputs: OutputPaths<'a>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("fire-risk: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Merge the config file, preset and flags into one configuration
fn build_config(args: &Args) -> Result<RiskConfig> {
    let mut config = match &args.config {
        Some(path) => RiskConfig::from_json_file(path)?,
        None => RiskConfig::default(),
    };

    if let Some(preset) = args.preset {
        config.event_count = RunPreset::from(preset).event_count();
    }
    if let Some(events) = args.events {
        config.event_count = events;
    }
    if let Some(duration) = args.duration {
        config.fire_duration_minutes = duration;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if args.parallel {
        config.parallel = true;
    }
    if let Some(policy) = args.seed_policy {
        config.seed_policy = policy.into();
    }
    if let Some(threshold) = args.threshold {
        config.gap_closing_threshold = threshold;
    }

    // Fix the seed up front so the report can reproduce the run
    if config.seed.is_none() {
        config.seed = Some(rand::rng().random());
    }

    config.validate()?;
    Ok(config)
}

fn load(path: &Path) -> Result<Raster> {
    info!("Reading {}", path.display());
    read_ascii_grid(path)
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;

    let inputs = LandscapeInputs {
        elevation: load(&args.dem)?,
        fuel_model: load(&args.fuel)?,
        wind_speed: load(&args.wind_speed)?,
        wind_direction: load(&args.wind_direction)?,
        moisture_1h: load(&args.m1h)?,
        moisture_10h: load(&args.m10h)?,
        moisture_100h: load(&args.m100h)?,
        moisture_herb: load(&args.mherb)?,
        moisture_wood: load(&args.mwood)?,
        value: args.value.as_deref().map(load).transpose()?,
        base_probability: args.base_probability.as_deref().map(load).transpose()?,
    };
    let landscape = Landscape::prepare(inputs)?;

    let table = match &args.fuel_table {
        Some(path) => FuelTable::from_json_file(path)?,
        None => FuelTable::standard(),
    };
    info!("Fuel table with {} models", table.len());
    let oracle = EllipticalSpreadOracle::new(table);

    let driver = MonteCarloRiskDriver::new(&landscape, &oracle, config)?;
    let outputs = driver.run_seeded()?;

    let targets = [
        (&args.danger, &outputs.danger),
        (&args.probability, &outputs.compound_probability),
        (&args.priority, &outputs.priority_index),
    ];
    for (path, raster) in targets
        .into_iter()
        .filter_map(|(path, raster)| path.as_ref().map(|p| (p, raster)))
    {
        write_ascii_grid(raster, path)?;
        info!("Wrote {}", path.display());
    }

    let summary = &outputs.summary;
    println!("=== Fire Risk Forecast ===");
    println!("Events: {} ({} accepted)", summary.trials, summary.accepted_ignitions);
    println!(
        "Burned: {} cells, {:.1} ha (ratio {:.2})",
        summary.burned_cells, summary.burned_area_ha, summary.burnt_area_ratio
    );
    if let Some(recommended) = summary.recommended_events {
        println!("Advisory: consider at least {} events", recommended);
    }
    println!(
        "Gap closing: {} levels, {} sweeps",
        summary.gap_closing.levels, summary.gap_closing.sweeps
    );

    if let Some(path) = &args.report {
        let report = RunReport {
            config: driver.config(),
            grid: landscape.system(),
            danger_unit: "m²/h",
            summary,
            outputs: OutputPaths {
                danger: args.danger.as_deref(),
                probability: args.probability.as_deref(),
                priority: args.priority.as_deref(),
            },
        };
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &report)?;
        info!("Wrote {}", path.display());
    }

    Ok(())
}
