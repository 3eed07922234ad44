use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PipelineError;
use crate::pipeline::types::{Resolution, SoilProvenance};

/// One flat row per resolution attempt, successful or not.
#[derive(Debug, Default, Serialize)]
pub struct ResolutionRecord {
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub requested_month: u32,
    pub month: Option<u32>,
    pub location_name: Option<String>,

    // vector
    pub soil_type: Option<String>,
    pub soil_type_code: Option<usize>,
    pub ph: Option<f64>,
    pub k: Option<f64>,
    pub p: Option<f64>,
    pub n: Option<f64>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,

    // soil provenance
    pub soil_source: Option<String>,
    pub fallback_radius_deg: Option<f64>,

    // error tracking
    pub error_stage: Option<String>,
    pub error_message: Option<String>,
}

impl ResolutionRecord {
    pub fn from_resolution(requested_month: u32, res: &Resolution) -> Self {
        let v = &res.vector;
        let (soil_source, fallback_radius_deg) = match res.provenance {
            SoilProvenance::Exact => ("exact", None),
            SoilProvenance::Fallback { radius_deg, .. } => ("fallback", Some(radius_deg)),
            SoilProvenance::Defaulted => ("defaulted", None),
        };

        ResolutionRecord {
            timestamp: Utc::now(),
            lat: res.coordinate.lat(),
            lon: res.coordinate.lon(),
            requested_month,
            month: Some(res.month),
            location_name: res.location_name.clone(),
            soil_type: Some(res.soil_type.name().to_string()),
            soil_type_code: Some(v.soil_type_code()),
            ph: Some(v.ph()),
            k: Some(v.k()),
            p: Some(v.p()),
            n: Some(v.n()),
            temperature_c: Some(v.temperature_c()),
            humidity_pct: Some(v.humidity_pct()),
            soil_source: Some(soil_source.to_string()),
            fallback_radius_deg,
            error_stage: None,
            error_message: None,
        }
    }

    /// Error row for raw inputs that never produced a vector.
    pub fn from_error(lat: f64, lon: f64, requested_month: u32, err: &PipelineError) -> Self {
        ResolutionRecord {
            timestamp: Utc::now(),
            lat,
            lon,
            requested_month,
            error_stage: Some(err.stage().to_string()),
            error_message: Some(err.to_string()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_stage.is_some()
    }
}
