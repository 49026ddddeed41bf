//! Constant-rate oracle
//!
//! Every known fuel model spreads at the same rate in every direction,
//! regardless of moisture, wind, and slope. Used to check the simulator and
//! driver against hand-computed arrival times.

use super::{Moisture, SpreadBase, SpreadOracle, SpreadProfile, FT_PER_MIN_TO_M_PER_MIN};

/// Oracle returning one fixed spread rate
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantSpreadOracle {
    rate_ft_min: f64,
    /// Fuel codes that carry fire; `None` means every code does
    burnable: Option<Vec<u32>>,
}

impl ConstantSpreadOracle {
    /// Create an oracle spreading at `rate_ft_min` feet per minute
    #[must_use]
    pub fn new(rate_ft_min: f64) -> Self {
        Self {
            rate_ft_min,
            burnable: None,
        }
    }

    /// Create an oracle spreading at `rate_m_min` meters per minute
    #[must_use]
    pub fn from_meters_per_minute(rate_m_min: f64) -> Self {
        Self::new(rate_m_min / FT_PER_MIN_TO_M_PER_MIN)
    }

    /// Restrict spread to the listed fuel codes
    #[must_use]
    pub fn with_burnable_models(mut self, models: Vec<u32>) -> Self {
        self.burnable = Some(models);
        self
    }

    #[must_use]
    pub fn rate_ft_min(&self) -> f64 {
        self.rate_ft_min
    }
}

impl SpreadOracle for ConstantSpreadOracle {
    fn no_wind_no_slope(&self, fuel_model: u32, _moisture: &Moisture) -> Option<SpreadBase> {
        if let Some(models) = &self.burnable {
            if !models.contains(&fuel_model) {
                return None;
            }
        }
        Some(SpreadBase::isotropic(fuel_model, self.rate_ft_min))
    }

    fn wind_slope_max(
        &self,
        base: &SpreadBase,
        _wind_ft_min: f64,
        _wind_dir_deg: f64,
        _slope_tan: f64,
        _aspect_deg: f64,
    ) -> SpreadProfile {
        SpreadProfile::uniform(base.spread0)
    }
}
