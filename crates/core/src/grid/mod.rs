//! Raster storage and terrain derivatives

pub mod gradient;
pub mod raster;

// Re-export main types
pub use gradient::{gradient, slope_aspect};
pub use raster::{GridSystem, Raster, DEFAULT_NO_DATA};
