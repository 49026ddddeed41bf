//! Fire spread-rate oracles
//!
//! The wavefront simulator never computes fire behaviour itself. For every
//! burning cell it asks a [`SpreadOracle`] two questions:
//!
//! 1. [`SpreadOracle::no_wind_no_slope`]: the base spread rate of the cell's
//!    fuel model at its moisture content, packaged with the fuel-specific
//!    wind and slope coefficients as a [`SpreadBase`].
//! 2. [`SpreadOracle::wind_slope_max`]: the fire ellipse once wind and slope
//!    are applied, as a [`SpreadProfile`] that answers the directional rate
//!    toward any azimuth.
//!
//! All rates are in feet per minute, the unit of the fuel-model literature.
//! Callers convert with [`FT_PER_MIN_TO_M_PER_MIN`].

mod constant;
mod elliptical;

pub use constant::ConstantSpreadOracle;
pub use elliptical::{EllipticalSpreadOracle, FuelModelParams, FuelTable};

/// Smallest rate/coefficient treated as non-zero
pub const SMIDGEN: f64 = 1e-6;

/// Number of fuel moisture classes: 1-h, 10-h, 100-h, 1000-h dead, herb, wood
pub const MOISTURE_CLASSES: usize = 6;

/// Fuel moisture content by class, as fractions of dry weight
pub type Moisture = [f64; MOISTURE_CLASSES];

/// Wind speed conversion from km/h to ft/min
pub const KMH_TO_FT_PER_MIN: f64 = 1000.0 / 0.3048 / 60.0;

/// Spread rate conversion from ft/min to m/min
pub const FT_PER_MIN_TO_M_PER_MIN: f64 = 0.3048;

/// Length-to-width growth of the fire ellipse per ft/min of effective wind
const LW_RATIO_PER_FT_MIN: f64 = 0.002840909;

/// Base spread of one fuel model under given moisture
///
/// The coefficients follow the Rothermel wind/slope factor forms:
/// `phi_wind = wind_k * U^wind_b`, `phi_slope = slope_k * tan²(slope)`,
/// and the effective wind of a combined factor is `(phi * wind_e)^(1/wind_b)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadBase {
    pub fuel_model: u32,
    /// No-wind, no-slope spread rate (ft/min)
    pub spread0: f64,
    pub wind_k: f64,
    pub wind_b: f64,
    pub wind_e: f64,
    pub slope_k: f64,
}

impl SpreadBase {
    /// A base with no wind or slope response, spreading at `spread0` everywhere
    #[must_use]
    pub fn isotropic(fuel_model: u32, spread0: f64) -> Self {
        Self {
            fuel_model,
            spread0,
            wind_k: 0.0,
            wind_b: 0.0,
            wind_e: 0.0,
            slope_k: 0.0,
        }
    }

    /// Combine wind and slope into the fire ellipse
    ///
    /// Handles the six cases of the classic fire-behaviour combination:
    /// no spread, neither wind nor slope, wind only, slope only, wind
    /// blowing upslope, and wind blowing across the slope (vector sum).
    ///
    /// # Arguments
    ///
    /// * `wind_ft_min` - Midflame wind speed (ft/min)
    /// * `wind_dir_deg` - Compass bearing the wind blows toward
    /// * `slope_tan` - Slope as rise over reach
    /// * `aspect_deg` - Compass direction of steepest descent
    #[must_use]
    pub fn combine_wind_slope(
        &self,
        wind_ft_min: f64,
        wind_dir_deg: f64,
        slope_tan: f64,
        aspect_deg: f64,
    ) -> SpreadProfile {
        let spread0 = self.spread0;
        if spread0 < SMIDGEN {
            return SpreadProfile::none();
        }

        let phi_slope = self.slope_k * slope_tan * slope_tan;
        let phi_wind = if wind_ft_min < SMIDGEN {
            0.0
        } else {
            self.wind_k * wind_ft_min.powf(self.wind_b)
        };
        let mut phi_ew = phi_slope + phi_wind;
        if phi_ew < SMIDGEN {
            return SpreadProfile::uniform(spread0);
        }

        let upslope = if aspect_deg >= 180.0 {
            aspect_deg - 180.0
        } else {
            aspect_deg + 180.0
        };

        let spread_max;
        let azimuth_max;
        let mut effective_wind = 0.0;
        let mut derive_effective_wind = true;

        if slope_tan < SMIDGEN {
            // Wind only
            effective_wind = wind_ft_min;
            derive_effective_wind = false;
            spread_max = spread0 * (1.0 + phi_ew);
            azimuth_max = wind_dir_deg;
        } else if wind_ft_min < SMIDGEN || (upslope - wind_dir_deg).abs() < SMIDGEN {
            // Slope only, or wind aligned with the slope
            spread_max = spread0 * (1.0 + phi_ew);
            azimuth_max = upslope;
        } else {
            // Cross-slope wind: add the slope and wind spread vectors
            let split_deg = if upslope <= wind_dir_deg {
                wind_dir_deg - upslope
            } else {
                360.0 - upslope + wind_dir_deg
            };
            let split = split_deg.to_radians();
            let slope_rate = spread0 * phi_slope;
            let wind_rate = spread0 * phi_wind;
            let x = slope_rate + wind_rate * split.cos();
            let y = wind_rate * split.sin();
            let resultant = x.hypot(y);

            spread_max = spread0 + resultant;
            phi_ew = spread_max / spread0 - 1.0;
            derive_effective_wind = phi_ew > SMIDGEN;

            azimuth_max = if resultant < SMIDGEN {
                upslope
            } else {
                let al = (y.abs() / resultant).asin();
                let a = match (x >= 0.0, y >= 0.0) {
                    (true, true) => al,
                    (true, false) => 2.0 * std::f64::consts::PI - al,
                    (false, true) => std::f64::consts::PI - al,
                    (false, false) => std::f64::consts::PI + al,
                };
                let azimuth = upslope + a.to_degrees();
                if azimuth > 360.0 {
                    azimuth - 360.0
                } else {
                    azimuth
                }
            };
        }

        if derive_effective_wind && self.wind_b > SMIDGEN {
            effective_wind = (phi_ew * self.wind_e).powf(1.0 / self.wind_b);
        }

        let (lw_ratio, eccentricity) = if effective_wind > SMIDGEN {
            let lw = 1.0 + LW_RATIO_PER_FT_MIN * effective_wind;
            (lw, (lw * lw - 1.0).sqrt() / lw)
        } else {
            (1.0, 0.0)
        };

        SpreadProfile {
            spread_max,
            azimuth_max,
            phi_eff_wind: phi_ew,
            effective_wind,
            lw_ratio,
            eccentricity,
        }
    }
}

/// Fire ellipse of one cell after wind and slope are applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadProfile {
    /// Head-fire spread rate (ft/min)
    pub spread_max: f64,
    /// Compass azimuth of maximum spread
    pub azimuth_max: f64,
    /// Combined wind/slope factor
    pub phi_eff_wind: f64,
    /// Effective midflame wind (ft/min)
    pub effective_wind: f64,
    /// Length-to-width ratio of the ellipse
    pub lw_ratio: f64,
    pub eccentricity: f64,
}

impl SpreadProfile {
    /// A cell that cannot spread fire
    #[must_use]
    pub fn none() -> Self {
        Self::uniform(0.0)
    }

    /// Circular spread at `rate` ft/min in every direction
    #[must_use]
    pub fn uniform(rate: f64) -> Self {
        Self {
            spread_max: rate,
            azimuth_max: 0.0,
            phi_eff_wind: 0.0,
            effective_wind: 0.0,
            lw_ratio: 1.0,
            eccentricity: 0.0,
        }
    }

    /// Spread rate (ft/min) toward a compass azimuth
    #[must_use]
    pub fn at_azimuth(&self, azimuth_deg: f64) -> f64 {
        if self.spread_max < SMIDGEN {
            return 0.0;
        }
        if self.phi_eff_wind < SMIDGEN || (self.azimuth_max - azimuth_deg).abs() < SMIDGEN {
            return self.spread_max;
        }

        let mut dir = (self.azimuth_max - azimuth_deg).abs();
        if dir > 180.0 {
            dir = 360.0 - dir;
        }
        let e = self.eccentricity;
        self.spread_max * (1.0 - e) / (1.0 - e * dir.to_radians().cos())
    }
}

/// Provider of fire spread rates for the wavefront simulator
///
/// Implementations must be pure: the same inputs always give the same
/// answer, which keeps seeded runs reproducible and lets trials run on
/// several threads against one shared oracle.
pub trait SpreadOracle: Send + Sync {
    /// Base spread for a fuel model at the given moisture content
    ///
    /// Returns `None` for fuel codes the oracle does not know; such cells
    /// never spread fire.
    fn no_wind_no_slope(&self, fuel_model: u32, moisture: &Moisture) -> Option<SpreadBase>;

    /// Fire ellipse under wind and slope
    fn wind_slope_max(
        &self,
        base: &SpreadBase,
        wind_ft_min: f64,
        wind_dir_deg: f64,
        slope_tan: f64,
        aspect_deg: f64,
    ) -> SpreadProfile {
        base.combine_wind_slope(wind_ft_min, wind_dir_deg, slope_tan, aspect_deg)
    }
}

/// Convert a fuel raster value to a fuel model code
///
/// Fuel rasters store integer codes as floats; negative or non-finite
/// values have no model.
#[must_use]
pub fn fuel_code(value: f64) -> Option<u32> {
    let rounded = value.round();
    (rounded.is_finite() && rounded >= 0.0 && rounded <= f64::from(u32::MAX))
        .then_some(rounded as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn windy_base() -> SpreadBase {
        SpreadBase {
            fuel_model: 1,
            spread0: 10.0,
            wind_k: 0.01,
            wind_b: 1.0,
            wind_e: 100.0,
            slope_k: 20.0,
        }
    }

    #[test]
    fn test_no_spread_without_base_rate() {
        let profile = SpreadBase::isotropic(1, 0.0).combine_wind_slope(500.0, 90.0, 0.3, 0.0);
        assert_eq!(profile.at_azimuth(90.0), 0.0);
    }

    #[test]
    fn test_isotropic_is_uniform() {
        let profile = SpreadBase::isotropic(1, 4.0).combine_wind_slope(500.0, 90.0, 0.3, 0.0);
        for az in [0.0, 45.0, 90.0, 180.0, 315.0] {
            assert_eq!(profile.at_azimuth(az), 4.0);
        }
    }

    #[test]
    fn test_wind_only_heads_downwind() {
        let profile = windy_base().combine_wind_slope(100.0, 90.0, 0.0, 0.0);
        // phi_wind = 0.01 * 100 = 1 -> head rate doubles
        assert_relative_eq!(profile.spread_max, 20.0, epsilon = 1e-9);
        assert_eq!(profile.azimuth_max, 90.0);
        assert_relative_eq!(profile.at_azimuth(90.0), 20.0, epsilon = 1e-9);

        let backing = profile.at_azimuth(270.0);
        let flank = profile.at_azimuth(0.0);
        assert!(backing < flank && flank < 20.0);
        assert!(backing > 0.0);
    }

    #[test]
    fn test_slope_only_heads_upslope() {
        // Aspect 180 (south-facing) means upslope is north
        let profile = windy_base().combine_wind_slope(0.0, 0.0, 0.5, 180.0);
        assert_eq!(profile.azimuth_max, 0.0);
        // phi_slope = 20 * 0.25 = 5
        assert_relative_eq!(profile.spread_max, 60.0, epsilon = 1e-9);
        assert!(profile.eccentricity > 0.0 && profile.eccentricity < 1.0);
    }

    #[test]
    fn test_cross_slope_direction_between_wind_and_upslope() {
        // Upslope north (0 deg), wind toward east (90 deg)
        let profile = windy_base().combine_wind_slope(100.0, 90.0, 0.5, 180.0);
        assert!(profile.azimuth_max > 0.0 && profile.azimuth_max < 90.0);
        // Slope factor (5) dominates wind factor (1)
        assert!(profile.azimuth_max < 45.0);
        assert!(profile.spread_max > 10.0);
    }

    #[test]
    fn test_fuel_code_conversion() {
        assert_eq!(fuel_code(3.0), Some(3));
        assert_eq!(fuel_code(2.9999), Some(3));
        assert_eq!(fuel_code(-1.0), None);
        assert_eq!(fuel_code(f64::NAN), None);
    }
}
