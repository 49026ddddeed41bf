//! Wildfire Risk Forecasting Core Library
//!
//! Estimates fire danger, burn probability, and a management priority index
//! over a landscape by simulating many randomly ignited fires.
//!
//! ## Pipeline
//!
//! 1. Input rasters are validated and preprocessed into a [`Landscape`]
//! 2. [`MonteCarloRiskDriver`] draws random ignitions and runs the
//!    [`WavefrontSimulator`] for each accepted one, asking a
//!    [`SpreadOracle`] for directional spread rates
//! 3. The sparse danger raster is filled by the [`GapClosingInterpolator`]
//! 4. Compound probability and priority index are derived cell by cell
//!
//! ## Example
//!
//! ```rust,ignore
//! use fire_risk_core::{
//!     EllipticalSpreadOracle, Landscape, LandscapeInputs, MonteCarloRiskDriver, RiskConfig,
//! };
//!
//! let landscape = Landscape::prepare(inputs)?;
//! let oracle = EllipticalSpreadOracle::default();
//! let driver = MonteCarloRiskDriver::new(&landscape, &oracle, RiskConfig::default())?;
//! let outputs = driver.run_seeded()?;
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod grid;
pub mod interpolation;
pub mod io;
pub mod landscape;
pub mod oracle;
pub mod simulation;

// Re-export main types
pub use cancel::CancelFlag;
pub use config::{RiskConfig, RunPreset, SeedPolicy};
pub use error::{Result, RiskError};
pub use grid::{GridSystem, Raster, DEFAULT_NO_DATA};
pub use interpolation::{GapClosingInterpolator, GapClosingReport};
pub use io::{read_ascii_grid, write_ascii_grid};
pub use landscape::{Landscape, LandscapeInputs};
pub use oracle::{
    ConstantSpreadOracle, EllipticalSpreadOracle, FuelModelParams, FuelTable, Moisture,
    SpreadBase, SpreadOracle, SpreadProfile,
};
pub use simulation::{
    MonteCarloRiskDriver, RiskOutputs, RunSummary, SpreadOutcome, SpreadPhase,
    WavefrontSimulator,
};
