//! Raster grids with a no-data sentinel
//!
//! Cells are stored as a flat `Vec<f64>` in row-major order (`y * width + x`).
//! Row 0 is the southern edge of the grid, so `y` grows northward the same
//! way map coordinates do, and the neighbour offset `(0, 1)` points north.

use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};

/// No-data sentinel used when a raster is created without one
pub const DEFAULT_NO_DATA: f64 = -9999.0;

/// Largest cell count a raster of `f64` can allocate
const MAX_CELLS: usize = isize::MAX as usize / std::mem::size_of::<f64>();

/// Geometry shared by every raster in a forecast
///
/// `x_min`/`y_min` locate the lower-left corner of the lower-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSystem {
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
    /// Edge length of a square cell in map units (meters)
    pub cell_size: f64,
    /// Western edge of the grid in map units
    pub x_min: f64,
    /// Southern edge of the grid in map units
    pub y_min: f64,
}

impl GridSystem {
    /// Create a grid system anchored at the origin
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidDimensions`] for an empty grid or one
    /// whose cells could not be addressed in memory, and
    /// [`RiskError::InvalidParameter`] for a non-positive cell size.
    pub fn new(width: usize, height: usize, cell_size: f64) -> Result<Self> {
        let addressable = width
            .checked_mul(height)
            .is_some_and(|cells| cells <= MAX_CELLS);
        if width == 0 || height == 0 || !addressable {
            return Err(RiskError::InvalidDimensions { width, height });
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(RiskError::invalid_parameter(
                "cell_size",
                cell_size,
                "must be finite and positive",
            ));
        }
        Ok(Self {
            width,
            height,
            cell_size,
            x_min: 0.0,
            y_min: 0.0,
        })
    }

    /// Move the lower-left corner to the given map coordinates
    #[must_use]
    pub fn with_origin(mut self, x_min: f64, y_min: f64) -> Self {
        self.x_min = x_min;
        self.y_min = y_min;
        self
    }

    /// Total number of cells
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Area of one cell in square map units
    #[must_use]
    pub fn cell_area(&self) -> f64 {
        self.cell_size * self.cell_size
    }

    /// Whether signed grid coordinates fall inside the grid
    #[must_use]
    pub fn is_in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Row-major index of a cell
    #[inline]
    #[must_use]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Column and row of a row-major index
    #[inline]
    #[must_use]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    /// Map coordinates of a cell center
    #[must_use]
    pub fn cell_center(&self, x: usize, y: usize) -> (f64, f64) {
        (
            self.x_min + (x as f64 + 0.5) * self.cell_size,
            self.y_min + (y as f64 + 0.5) * self.cell_size,
        )
    }

    /// Cell containing a map coordinate, if any
    #[must_use]
    pub fn world_to_cell(&self, wx: f64, wy: f64) -> Option<(usize, usize)> {
        let fx = ((wx - self.x_min) / self.cell_size).floor();
        let fy = ((wy - self.y_min) / self.cell_size).floor();
        if !(fx.is_finite() && fy.is_finite()) {
            return None;
        }
        let (x, y) = (fx as i64, fy as i64);
        self.is_in_bounds(x, y).then_some((x as usize, y as usize))
    }

    /// Whether two grid systems describe the same cells
    ///
    /// Origins and cell sizes are compared with a tolerance of a
    /// thousandth of a cell.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        let tolerance = self.cell_size * 1e-3;
        self.width == other.width
            && self.height == other.height
            && (self.cell_size - other.cell_size).abs() <= tolerance
            && (self.x_min - other.x_min).abs() <= tolerance
            && (self.y_min - other.y_min).abs() <= tolerance
    }
}

/// A 2D grid of `f64` cells with a no-data sentinel
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    system: GridSystem,
    no_data: f64,
    data: Vec<f64>,
}

impl Raster {
    /// Create a raster on the given grid with every cell set to `value`
    #[must_use]
    pub fn filled(system: GridSystem, value: f64) -> Self {
        Self {
            system,
            no_data: DEFAULT_NO_DATA,
            data: vec![value; system.cell_count()],
        }
    }

    /// Create a `width` x `height` raster of zeros anchored at the origin
    ///
    /// # Errors
    ///
    /// Fails when the dimensions or the cell size are invalid.
    pub fn new(width: usize, height: usize, cell_size: f64) -> Result<Self> {
        Ok(Self::filled(GridSystem::new(width, height, cell_size)?, 0.0))
    }

    /// Create a raster where every cell is no-data
    #[must_use]
    pub fn no_data_like(system: GridSystem, no_data: f64) -> Self {
        Self {
            system,
            no_data,
            data: vec![no_data; system.cell_count()],
        }
    }

    /// Create a raster from row-major values (row 0 = south)
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidDimensions`] if `data` does not hold
    /// exactly one value per cell.
    pub fn from_vec(system: GridSystem, data: Vec<f64>, no_data: f64) -> Result<Self> {
        if data.len() != system.cell_count() {
            return Err(RiskError::InvalidDimensions {
                width: system.width,
                height: system.height,
            });
        }
        Ok(Self {
            system,
            no_data,
            data,
        })
    }

    #[must_use]
    pub fn system(&self) -> &GridSystem {
        &self.system
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.system.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.system.height
    }

    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.system.cell_size
    }

    #[must_use]
    pub fn no_data_value(&self) -> f64 {
        self.no_data
    }

    /// Whether a raw value represents no-data for this raster
    #[inline]
    #[must_use]
    pub fn is_no_data_value(&self, value: f64) -> bool {
        value.is_nan() || value == self.no_data
    }

    /// Whether another raster lies on the same grid system
    #[must_use]
    pub fn same_grid(&self, other: &Raster) -> bool {
        self.system.matches(&other.system)
    }

    /// Whether signed grid coordinates fall inside the raster
    #[inline]
    #[must_use]
    pub fn is_in_bounds(&self, x: i64, y: i64) -> bool {
        self.system.is_in_bounds(x, y)
    }

    /// Value at a cell, or `None` for no-data and out-of-bounds cells
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.system.width || y >= self.system.height {
            return None;
        }
        let value = self.data[self.system.index(x, y)];
        (!self.is_no_data_value(value)).then_some(value)
    }

    /// Value at a row-major index, or `None` for no-data
    #[inline]
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<f64> {
        let value = *self.data.get(index)?;
        (!self.is_no_data_value(value)).then_some(value)
    }

    /// Whether a cell holds no-data
    ///
    /// Out-of-bounds cells are reported as no-data.
    #[inline]
    #[must_use]
    pub fn is_no_data(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_none()
    }

    /// Set the value at a cell
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        assert!(
            x < self.system.width && y < self.system.height,
            "Coordinates out of bounds"
        );
        let index = self.system.index(x, y);
        self.data[index] = value;
    }

    /// Mark a cell as no-data
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    pub fn set_no_data(&mut self, x: usize, y: usize) {
        let no_data = self.no_data;
        self.set(x, y, no_data);
    }

    /// Mark every cell as no-data
    pub fn assign_no_data(&mut self) {
        self.data.fill(self.no_data);
    }

    /// Replace every no-data cell with `value`; returns how many were replaced
    pub fn replace_no_data(&mut self, value: f64) -> usize {
        let no_data = self.no_data;
        let mut replaced = 0;
        for cell in &mut self.data {
            if cell.is_nan() || *cell == no_data {
                *cell = value;
                replaced += 1;
            }
        }
        replaced
    }

    /// Number of cells holding data
    #[must_use]
    pub fn data_cells(&self) -> usize {
        self.data
            .iter()
            .filter(|&&v| !self.is_no_data_value(v))
            .count()
    }

    /// Raw row-major cell values, sentinel included
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable raw row-major cell values
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster = Raster::new(10, 20, 5.0).unwrap();
        assert_eq!(raster.width(), 10);
        assert_eq!(raster.height(), 20);
        assert_eq!(raster.as_slice().len(), 200);
        assert!(raster.as_slice().iter().all(|&v| v == 0.0));
        assert_eq!(raster.no_data_value(), DEFAULT_NO_DATA);
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        assert!(matches!(
            Raster::new(0, 5, 1.0),
            Err(RiskError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            Raster::new(5, 5, -1.0),
            Err(RiskError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_oversized_grid_rejected() {
        assert!(matches!(
            GridSystem::new(usize::MAX, 2, 1.0),
            Err(RiskError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            GridSystem::new(1 << 31, 1 << 31, 1.0),
            Err(RiskError::InvalidDimensions { .. })
        ));
        assert!(GridSystem::new(1 << 20, 1 << 20, 1.0).is_ok());
    }

    #[test]
    fn test_get_set_and_no_data() {
        let mut raster = Raster::new(4, 3, 1.0).unwrap();
        raster.set(3, 2, 7.5);
        assert_eq!(raster.get(3, 2), Some(7.5));

        // Row-major, row 0 first
        assert_eq!(raster.as_slice()[2 * 4 + 3], 7.5);

        raster.set_no_data(3, 2);
        assert!(raster.is_no_data(3, 2));
        assert_eq!(raster.get(3, 2), None);

        // NaN always counts as no-data
        raster.set(0, 0, f64::NAN);
        assert!(raster.is_no_data(0, 0));

        // Out of bounds reads are no-data rather than a panic
        assert_eq!(raster.get(4, 0), None);
        assert!(raster.is_no_data(0, 3));
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_set_bounds_check() {
        let mut raster = Raster::new(3, 3, 1.0).unwrap();
        raster.set(3, 0, 1.0);
    }

    #[test]
    fn test_replace_no_data_counts_cells() {
        let system = GridSystem::new(2, 2, 1.0).unwrap();
        let mut raster = Raster::from_vec(system, vec![1.0, -1.0, f64::NAN, -1.0], -1.0).unwrap();
        assert_eq!(raster.data_cells(), 1);
        assert_eq!(raster.replace_no_data(0.0), 3);
        assert_eq!(raster.as_slice(), &[1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let system = GridSystem::new(3, 3, 1.0).unwrap();
        assert!(Raster::from_vec(system, vec![0.0; 8], DEFAULT_NO_DATA).is_err());
    }

    #[test]
    fn test_world_mapping() {
        let system = GridSystem::new(10, 5, 30.0)
            .unwrap()
            .with_origin(1000.0, 2000.0);
        assert_eq!(system.world_to_cell(1000.0, 2000.0), Some((0, 0)));
        assert_eq!(system.world_to_cell(1299.0, 2149.0), Some((9, 4)));
        assert_eq!(system.world_to_cell(1300.0, 2000.0), None);
        assert_eq!(system.world_to_cell(999.0, 2000.0), None);
        assert_eq!(system.cell_center(1, 1), (1045.0, 2045.0));
    }

    #[test]
    fn test_grid_matching_tolerance() {
        let a = GridSystem::new(10, 10, 25.0).unwrap();
        let b = a.with_origin(0.001, 0.0);
        let c = a.with_origin(5.0, 0.0);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
        assert!(!a.matches(&GridSystem::new(10, 11, 25.0).unwrap()));
    }
}
