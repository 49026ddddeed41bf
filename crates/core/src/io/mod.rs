//! Raster file formats

pub mod ascii;

pub use ascii::{read_ascii_grid, write_ascii_grid};
