//! Failure taxonomy for a single pipeline invocation.
//!
//! Every runtime failure carries the coordinate, the resolved month and the
//! [`Stage`] that gave up, so a caller can decide whether a whole-pipeline
//! retry is worthwhile. Transient source errors never show up here: they are
//! absorbed as "no data" by the stage that made the call.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::geo::Coordinate;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    Climate,
    Soil,
    Assembly,
    Pipeline,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Climate => "climate",
            Stage::Soil => "soil",
            Stage::Assembly => "assembly",
            Stage::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bad coordinate or month, rejected before any external call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every year in the window was skipped.
    #[error("No valid climate data found for month {month} at {coordinate}")]
    NoClimateData { coordinate: Coordinate, month: u32 },

    /// No soil nearby and the climate looks non-agricultural.
    #[error(
        "Location {coordinate} is unresolvable for month {month}: no soil data and mean temperature {temperature_c}°C"
    )]
    UnresolvableLocation {
        coordinate: Coordinate,
        month: u32,
        temperature_c: f64,
    },

    /// No soil nearby under the strict policy.
    #[error("No soil data found at or near {coordinate} (month {month})")]
    MissingSoilData { coordinate: Coordinate, month: u32 },

    #[error("Feature vector for {coordinate} (month {month}) is incomplete: {reason}")]
    IncompleteVector {
        coordinate: Coordinate,
        month: u32,
        reason: String,
    },

    #[error("{stage} stage timed out after {elapsed:?} for {coordinate} (month {month})")]
    Timeout {
        stage: Stage,
        coordinate: Coordinate,
        month: u32,
        elapsed: Duration,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::Config(message.into())
    }

    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Validation(_) | PipelineError::Config(_) => Stage::Validation,
            PipelineError::NoClimateData { .. } => Stage::Climate,
            PipelineError::UnresolvableLocation { .. } | PipelineError::MissingSoilData { .. } => {
                Stage::Soil
            }
            PipelineError::IncompleteVector { .. } => Stage::Assembly,
            PipelineError::Timeout { stage, .. } => *stage,
        }
    }

    /// Coordinate the failed invocation was working on, when one was validated.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            PipelineError::NoClimateData { coordinate, .. }
            | PipelineError::UnresolvableLocation { coordinate, .. }
            | PipelineError::MissingSoilData { coordinate, .. }
            | PipelineError::IncompleteVector { coordinate, .. }
            | PipelineError::Timeout { coordinate, .. } => Some(*coordinate),
            PipelineError::Validation(_) | PipelineError::Config(_) => None,
        }
    }
}
