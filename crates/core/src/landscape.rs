//! Landscape rasters prepared for simulation
//!
//! [`LandscapeInputs`] holds the rasters as they were loaded. Preparing them
//! into a [`Landscape`] checks that they all share the elevation grid,
//! replaces no-data in the weather and value layers with 0, fills in
//! defaults for the optional layers, and derives slope and aspect once.
//! After preparation every layer is data-complete wherever elevation and
//! fuel are, and the landscape is read-only for the rest of the run.

use crate::error::{Result, RiskError};
use crate::grid::{slope_aspect, GridSystem, Raster};
use crate::oracle::{fuel_code, Moisture};
use tracing::{debug, info};

/// Input rasters of a forecast
///
/// Wind speed is in km/h, wind direction in compass degrees toward which
/// the wind blows, moisture in percent of dry weight. Value and base
/// probability default to 1 everywhere when absent.
#[derive(Debug, Clone)]
pub struct LandscapeInputs {
    pub elevation: Raster,
    pub fuel_model: Raster,
    pub wind_speed: Raster,
    pub wind_direction: Raster,
    pub moisture_1h: Raster,
    pub moisture_10h: Raster,
    pub moisture_100h: Raster,
    pub moisture_herb: Raster,
    pub moisture_wood: Raster,
    pub value: Option<Raster>,
    pub base_probability: Option<Raster>,
}

impl LandscapeInputs {
    /// Inputs with no wind and fully dry fuel on the elevation grid
    #[must_use]
    pub fn calm_and_dry(elevation: Raster, fuel_model: Raster) -> Self {
        let zeros = Raster::filled(*elevation.system(), 0.0);
        Self {
            wind_speed: zeros.clone(),
            wind_direction: zeros.clone(),
            moisture_1h: zeros.clone(),
            moisture_10h: zeros.clone(),
            moisture_100h: zeros.clone(),
            moisture_herb: zeros.clone(),
            moisture_wood: zeros,
            elevation,
            fuel_model,
            value: None,
            base_probability: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: Raster) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_base_probability(mut self, base_probability: Raster) -> Self {
        self.base_probability = Some(base_probability);
        self
    }
}

/// Validated, preprocessed landscape shared by every trial
#[derive(Debug, Clone)]
pub struct Landscape {
    system: GridSystem,
    elevation: Raster,
    fuel_model: Raster,
    wind_speed: Raster,
    wind_direction: Raster,
    /// 1-h, 10-h, 100-h, herb, wood
    moisture: [Raster; 5],
    value: Raster,
    base_probability: Raster,
    slope: Raster,
    aspect: Raster,
}

impl Landscape {
    /// Validate and preprocess input rasters
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::GridMismatch`] naming the first raster whose
    /// grid differs from the elevation grid.
    pub fn prepare(inputs: LandscapeInputs) -> Result<Self> {
        let LandscapeInputs {
            elevation,
            fuel_model,
            wind_speed,
            wind_direction,
            moisture_1h,
            moisture_10h,
            moisture_100h,
            moisture_herb,
            moisture_wood,
            value,
            base_probability,
        } = inputs;
        let system = *elevation.system();

        let check = |name: &str, raster: &Raster| -> Result<()> {
            if elevation.same_grid(raster) {
                Ok(())
            } else {
                Err(RiskError::GridMismatch {
                    name: name.to_string(),
                })
            }
        };
        check("fuel_model", &fuel_model)?;
        check("wind_speed", &wind_speed)?;
        check("wind_direction", &wind_direction)?;
        check("moisture_1h", &moisture_1h)?;
        check("moisture_10h", &moisture_10h)?;
        check("moisture_100h", &moisture_100h)?;
        check("moisture_herb", &moisture_herb)?;
        check("moisture_wood", &moisture_wood)?;
        if let Some(value) = &value {
            check("value", value)?;
        }
        if let Some(base_probability) = &base_probability {
            check("base_probability", base_probability)?;
        }

        let zero_filled = |name: &str, mut raster: Raster| {
            let replaced = raster.replace_no_data(0.0);
            if replaced > 0 {
                debug!("{}: {} no-data cells set to 0", name, replaced);
            }
            raster
        };

        let wind_speed = zero_filled("wind_speed", wind_speed);
        let wind_direction = zero_filled("wind_direction", wind_direction);
        let moisture = [
            zero_filled("moisture_1h", moisture_1h),
            zero_filled("moisture_10h", moisture_10h),
            zero_filled("moisture_100h", moisture_100h),
            zero_filled("moisture_herb", moisture_herb),
            zero_filled("moisture_wood", moisture_wood),
        ];
        let value = value.map_or_else(
            || Raster::filled(system, 1.0),
            |r| zero_filled("value", r),
        );
        let base_probability = base_probability.map_or_else(
            || Raster::filled(system, 1.0),
            |r| zero_filled("base_probability", r),
        );

        let (slope, aspect) = slope_aspect(&elevation);

        let landscape = Self {
            system,
            elevation,
            fuel_model,
            wind_speed,
            wind_direction,
            moisture,
            value,
            base_probability,
            slope,
            aspect,
        };

        info!(
            "Landscape prepared: {}x{} cells of {} m, {} burnable",
            system.width,
            system.height,
            system.cell_size,
            landscape.burnable_cells()
        );

        Ok(landscape)
    }

    #[must_use]
    pub fn system(&self) -> &GridSystem {
        &self.system
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.system.cell_count()
    }

    /// Whether fire can exist at a cell (elevation and fuel both have data)
    #[inline]
    #[must_use]
    pub fn is_burnable(&self, index: usize) -> bool {
        self.elevation.get_index(index).is_some() && self.fuel_model.get_index(index).is_some()
    }

    /// Number of cells where fire can exist
    #[must_use]
    pub fn burnable_cells(&self) -> usize {
        (0..self.cell_count()).filter(|&i| self.is_burnable(i)).count()
    }

    /// Fuel model code at a cell
    #[must_use]
    pub fn fuel_code_at(&self, index: usize) -> Option<u32> {
        self.fuel_model.get_index(index).and_then(fuel_code)
    }

    /// Fuel moisture fractions at a cell
    ///
    /// The 1000-h class is taken from the 100-h raster.
    #[must_use]
    pub fn moisture_at(&self, index: usize) -> Moisture {
        let m = |layer: usize| self.moisture[layer].as_slice()[index] / 100.0;
        [m(0), m(1), m(2), m(2), m(3), m(4)]
    }

    /// Wind speed (km/h) and direction (compass degrees) at a cell
    #[must_use]
    pub fn wind_at(&self, index: usize) -> (f64, f64) {
        (
            self.wind_speed.as_slice()[index],
            self.wind_direction.as_slice()[index],
        )
    }

    /// Slope (radians) and aspect (degrees) at a cell; flat where undefined
    #[must_use]
    pub fn terrain_at(&self, index: usize) -> (f64, f64) {
        (
            self.slope.get_index(index).unwrap_or(0.0),
            self.aspect.get_index(index).unwrap_or(0.0),
        )
    }

    #[must_use]
    pub fn value_at(&self, index: usize) -> f64 {
        self.value.as_slice()[index]
    }

    #[must_use]
    pub fn base_probability_at(&self, index: usize) -> f64 {
        self.base_probability.as_slice()[index]
    }
}
