//! Geographic value types shared by every stage of the pipeline.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Metres per degree of latitude, close enough for buffer stencils.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// A validated (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting anything outside [-90,90] x [-180,180]
    /// or non-finite.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] when either component is out of range.
    pub fn new(lat: f64, lon: f64) -> Result<Self, PipelineError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(PipelineError::validation(format!(
                "latitude {lat} is outside [-90, 90]"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(PipelineError::validation(format!(
                "longitude {lon} is outside [-180, 180]"
            )));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Shifts the coordinate by the given degree offsets. Returns `None` when
    /// the shifted point leaves the valid range.
    pub fn offset(&self, d_lat: f64, d_lon: f64) -> Option<Self> {
        Self::new(self.lat + d_lat, self.lon + d_lon).ok()
    }
}

/// Unchecked wire form; deserialization goes through [`Coordinate::new`].
#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = PipelineError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// Calendar month requested by the caller. `0` means "the current month",
/// resolved once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32")]
pub struct TargetMonth(u32);

impl TargetMonth {
    pub const CURRENT: TargetMonth = TargetMonth(0);

    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for values above 12.
    pub fn new(month: u32) -> Result<Self, PipelineError> {
        if month > 12 {
            return Err(PipelineError::validation(format!(
                "month {month} is outside [0, 12]"
            )));
        }
        Ok(Self(month))
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Resolves the sentinel against the local calendar.
    pub fn resolve(&self) -> u32 {
        self.resolve_on(Local::now().date_naive())
    }

    /// Resolves the sentinel against a fixed date.
    pub fn resolve_on(&self, today: NaiveDate) -> u32 {
        if self.0 == 0 { today.month() } else { self.0 }
    }
}

impl TryFrom<u32> for TargetMonth {
    type Error = PipelineError;

    fn try_from(month: u32) -> Result<Self, Self::Error> {
        TargetMonth::new(month)
    }
}

/// Half-open one-month window `[start, end)`; December rolls into January.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MonthWindow {
    /// Returns `None` only for a month outside 1..=12 or a year chrono
    /// cannot represent.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self { start, end })
    }

    /// Last day contained in the window.
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.start)
    }
}

/// Circular buffer around a coordinate plus the sampling scale, both in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRegion {
    pub center: Coordinate,
    pub radius_m: f64,
    pub scale_m: f64,
}

impl BoundingRegion {
    pub fn new(center: Coordinate, radius_m: f64, scale_m: f64) -> Self {
        Self {
            center,
            radius_m,
            scale_m,
        }
    }

    /// Centre plus the four cardinal points on the buffer edge. Edge points
    /// that fall off the globe are dropped.
    pub fn stencil(&self) -> Vec<Coordinate> {
        let d_lat = self.radius_m / METRES_PER_DEGREE;
        let cos_lat = self.center.lat().to_radians().cos().abs().max(1e-6);
        let d_lon = (self.radius_m / (METRES_PER_DEGREE * cos_lat)).min(180.0);

        let mut points = vec![self.center];
        points.extend(
            [(d_lat, 0.0), (-d_lat, 0.0), (0.0, d_lon), (0.0, -d_lon)]
                .into_iter()
                .filter_map(|(dy, dx)| self.center.offset(dy, dx)),
        );
        points
    }
}
