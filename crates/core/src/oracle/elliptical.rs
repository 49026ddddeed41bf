//! Table-driven elliptical spread oracle
//!
//! Base spread rates come from a per-fuel-model table of dry-fuel rates,
//! damped by the 1-h dead moisture relative to the model's moisture of
//! extinction. Wind and slope coefficients are derived from the model's
//! surface-area-to-volume ratio and packing ratio with the Rothermel (1972)
//! correlations, and the directional spread follows the fire ellipse of
//! [`SpreadBase::combine_wind_slope`].
//!
//! # References
//!
//! Rothermel, R.C. (1972). "A mathematical model for predicting fire spread
//! in wildland fuels." USDA Forest Service Research Paper INT-115.
//!
//! Anderson, H.E. (1982). "Aids to determining fuel models for estimating
//! fire behavior." USDA Forest Service General Technical Report INT-122.

use super::{Moisture, SpreadBase, SpreadOracle};
use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of one fuel model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelModelParams {
    pub model: u32,
    pub name: String,
    pub base_spread_ft_min: f64, // Spread rate in fully cured fuel, no wind or slope
    pub savr: f64,               // Characteristic surface-area-to-volume ratio (1/ft)
    pub packing_ratio: f64,      // Mean packing ratio of the fuel bed
    pub moisture_of_extinction: f64, // Dead fuel moisture (fraction) that stops spread
}

impl FuelModelParams {
    fn new(
        model: u32,
        name: &str,
        base_spread_ft_min: f64,
        savr: f64,
        packing_ratio: f64,
        moisture_of_extinction: f64,
    ) -> Self {
        Self {
            model,
            name: name.to_string(),
            base_spread_ft_min,
            savr,
            packing_ratio,
            moisture_of_extinction,
        }
    }

    /// Rothermel moisture damping coefficient for a dead fuel moisture
    ///
    /// `1 - 2.59 r + 5.11 r² - 3.52 r³` with `r = moisture / extinction`,
    /// clamped to `[0, 1]`.
    #[must_use]
    pub fn moisture_damping(&self, moisture: f64) -> f64 {
        if self.moisture_of_extinction <= 0.0 {
            return 0.0;
        }
        let r = (moisture / self.moisture_of_extinction).max(0.0);
        if r >= 1.0 {
            return 0.0;
        }
        (1.0 - 2.59 * r + 5.11 * r * r - 3.52 * r * r * r).clamp(0.0, 1.0)
    }

    fn validate(&self) -> Result<()> {
        let positive = |name: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(RiskError::invalid_parameter(
                    name,
                    value,
                    format!("fuel model {} needs a positive value", self.model),
                ))
            }
        };
        positive("savr", self.savr)?;
        positive("packing_ratio", self.packing_ratio)?;
        positive("moisture_of_extinction", self.moisture_of_extinction)?;
        if !(self.base_spread_ft_min.is_finite() && self.base_spread_ft_min >= 0.0) {
            return Err(RiskError::invalid_parameter(
                "base_spread_ft_min",
                self.base_spread_ft_min,
                format!("fuel model {} needs a non-negative rate", self.model),
            ));
        }
        Ok(())
    }
}

/// Catalog of fuel models keyed by fuel code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FuelTable {
    models: Vec<FuelModelParams>,
}

impl Default for FuelTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl FuelTable {
    /// Build a table from explicit models
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] for non-physical parameters
    /// or a duplicated fuel code.
    pub fn new(models: Vec<FuelModelParams>) -> Result<Self> {
        for (i, params) in models.iter().enumerate() {
            params.validate()?;
            if models[..i].iter().any(|m| m.model == params.model) {
                return Err(RiskError::invalid_parameter(
                    "model",
                    params.model,
                    "fuel code listed twice",
                ));
            }
        }
        Ok(Self { models })
    }

    /// The 13 standard surface fuel models
    #[must_use]
    pub fn standard() -> Self {
        let p = FuelModelParams::new;
        Self {
            models: vec![
                p(1, "Short grass", 78.0, 3500.0, 0.00106, 0.12),
                p(2, "Timber grass and understory", 35.0, 2784.0, 0.00575, 0.15),
                p(3, "Tall grass", 104.0, 1500.0, 0.00234, 0.25),
                p(4, "Chaparral", 75.0, 1739.0, 0.00497, 0.20),
                p(5, "Brush", 18.0, 1683.0, 0.00464, 0.20),
                p(6, "Dormant brush", 32.0, 1564.0, 0.00570, 0.25),
                p(7, "Southern rough", 20.0, 1552.0, 0.00560, 0.40),
                p(8, "Short needle litter", 1.6, 1889.0, 0.03009, 0.30),
                p(9, "Long needle or hardwood litter", 7.5, 2484.0, 0.01320, 0.25),
                p(10, "Timber litter and understory", 7.9, 1764.0, 0.01767, 0.25),
                p(11, "Light logging slash", 6.0, 1182.0, 0.01218, 0.15),
                p(12, "Medium logging slash", 13.0, 1145.0, 0.02137, 0.20),
                p(13, "Heavy logging slash", 14.0, 1159.0, 0.02745, 0.25),
            ],
        }
    }

    /// Load a table from a JSON array of fuel models
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::Io`], [`RiskError::Config`] or
    /// [`RiskError::InvalidParameter`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let models: Vec<FuelModelParams> = serde_json::from_str(&contents)?;
        Self::new(models)
    }

    #[must_use]
    pub fn get(&self, model: u32) -> Option<&FuelModelParams> {
        self.models.iter().find(|m| m.model == model)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Oracle combining a fuel table with the fire ellipse
#[derive(Debug, Clone, Default)]
pub struct EllipticalSpreadOracle {
    table: FuelTable,
}

impl EllipticalSpreadOracle {
    #[must_use]
    pub fn new(table: FuelTable) -> Self {
        Self { table }
    }
}

impl SpreadOracle for EllipticalSpreadOracle {
    fn no_wind_no_slope(&self, fuel_model: u32, moisture: &Moisture) -> Option<SpreadBase> {
        let params = self.table.get(fuel_model)?;

        let sigma = params.savr;
        let beta = params.packing_ratio;
        let beta_opt = 3.348 * sigma.powf(-0.8189);
        let ratio = beta / beta_opt;

        let c = 7.47 * (-0.133 * sigma.powf(0.55)).exp();
        let b = 0.02526 * sigma.powf(0.54);
        let e = 0.715 * (-3.59e-4 * sigma).exp();

        Some(SpreadBase {
            fuel_model,
            spread0: params.base_spread_ft_min * params.moisture_damping(moisture[0]),
            wind_k: c * ratio.powf(-e),
            wind_b: b,
            wind_e: ratio.powf(e) / c,
            slope_k: 5.275 * beta.powf(-0.3),
        })
    }
}
