//! Post-processing interpolation of sparse result rasters

pub mod gap_closing;

pub use gap_closing::{GapClosingInterpolator, GapClosingReport, DEFAULT_THRESHOLD};
