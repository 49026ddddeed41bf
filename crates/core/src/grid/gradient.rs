//! Slope and aspect from an elevation raster
//!
//! Uses Horn's 3x3 kernel. Neighbours that are missing (off-grid or
//! no-data) are replaced by the center elevation, so the gradient is only
//! undefined where the center cell itself has no elevation.
//!
//! # References
//!
//! Horn, B.K.P. (1981). "Hill Shading and the Reflectance Map."
//! Proceedings of the IEEE 69(1), 14-47.

use super::raster::Raster;

/// Slope (radians) and aspect (compass degrees, direction of steepest
/// descent, 0 = North, clockwise) at a cell
///
/// Flat cells report aspect 0. Returns `None` where elevation is no-data.
#[must_use]
pub fn gradient(dem: &Raster, x: usize, y: usize) -> Option<(f64, f64)> {
    let center = dem.get(x, y)?;
    let d = dem.cell_size();

    let sample = |dx: i64, dy: i64| -> f64 {
        let (nx, ny) = (x as i64 + dx, y as i64 + dy);
        if dem.is_in_bounds(nx, ny) {
            dem.get(nx as usize, ny as usize).unwrap_or(center)
        } else {
            center
        }
    };

    // z[0] z[1] z[2]   (NW) (N) (NE)
    // z[3] z[4] z[5]   (W)  (C) (E)
    // z[6] z[7] z[8]   (SW) (S) (SE)
    let z = [
        sample(-1, 1),
        sample(0, 1),
        sample(1, 1),
        sample(-1, 0),
        center,
        sample(1, 0),
        sample(-1, -1),
        sample(0, -1),
        sample(1, -1),
    ];

    // Rise toward east and toward north
    let dz_east = ((z[2] + 2.0 * z[5] + z[8]) - (z[0] + 2.0 * z[3] + z[6])) / (8.0 * d);
    let dz_north = ((z[0] + 2.0 * z[1] + z[2]) - (z[6] + 2.0 * z[7] + z[8])) / (8.0 * d);

    let slope = dz_east.hypot(dz_north).atan();
    let aspect = if dz_east == 0.0 && dz_north == 0.0 {
        0.0
    } else {
        // Downslope vector is the negated gradient
        (-dz_east).atan2(-dz_north).to_degrees().rem_euclid(360.0)
    };

    Some((slope, aspect))
}

/// Derive slope and aspect rasters for a whole elevation grid
///
/// Cells with an undefined gradient are no-data in both outputs.
#[must_use]
pub fn slope_aspect(dem: &Raster) -> (Raster, Raster) {
    let system = *dem.system();
    let mut slope = Raster::no_data_like(system, dem.no_data_value());
    let mut aspect = Raster::no_data_like(system, dem.no_data_value());

    for y in 0..system.height {
        for x in 0..system.width {
            if let Some((s, a)) = gradient(dem, x, y) {
                slope.set(x, y, s);
                aspect.set(x, y, a);
            }
        }
    }

    (slope, aspect)
}
