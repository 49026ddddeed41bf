//! Error types for the risk engine

use crate::simulation::RiskOutputs;
use thiserror::Error;

/// Errors raised while preparing or running a risk forecast
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Raster '{name}' does not share the elevation grid system")]
    GridMismatch { name: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Malformed grid file at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Every accepted ignition burned nothing; the outputs would be empty.
    #[error("No simulated fire produced burned value; increase the event count or fire duration")]
    NoBurnedArea,

    /// The run was stopped through its cancel flag.
    ///
    /// `partial` holds whatever the driver had accumulated when the flag
    /// was observed, without gap closing applied.
    #[error("Run cancelled")]
    Cancelled { partial: Option<Box<RiskOutputs>> },
}

impl RiskError {
    pub(crate) fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for risk engine operations
pub type Result<T> = std::result::Result<T, RiskError>;
