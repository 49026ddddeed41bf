//! Fire spread simulation and Monte-Carlo risk estimation
//!
//! - [`wavefront`]: one fire from one ignition cell, bounded by a burn duration
//! - [`monte_carlo`]: many randomized fires folded into danger, probability,
//!   and priority rasters

pub mod monte_carlo;
pub mod wavefront;

// Re-exports
pub use monte_carlo::{
    MonteCarloRiskDriver, RiskOutputs, RunSummary, DANGER_NO_DATA, MIN_BURNT_AREA_RATIO,
};
pub use wavefront::{SpreadOutcome, SpreadPhase, WavefrontSimulator, NEIGHBOUR_OFFSETS};
