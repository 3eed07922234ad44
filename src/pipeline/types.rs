//! Data types flowing through the resolution pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::geo::Coordinate;

/// One year's buffer-mean temperature and dewpoint over the month window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimateSample {
    pub temperature_k: f64,
    pub dewpoint_k: f64,
}

/// Recency-weighted climate estimate, both values rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedClimateResult {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

/// Raw soil chemistry and texture at one point. Every field is independently
/// nullable; `texture_class` is an optional externally supplied label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoilSample {
    pub ph: Option<f64>,
    pub n: Option<f64>,
    pub p: Option<f64>,
    pub k: Option<f64>,
    pub clay_pct: Option<f64>,
    pub sand_pct: Option<f64>,
    pub silt_pct: Option<f64>,
    pub texture_class: Option<String>,
}

impl SoilSample {
    /// True when at least one numeric property is present.
    pub fn has_any_property(&self) -> bool {
        [
            self.ph,
            self.n,
            self.p,
            self.k,
            self.clay_pct,
            self.sand_pct,
            self.silt_pct,
        ]
        .iter()
        .any(Option::is_some)
    }
}

/// Closed set of soil-type labels. `Unknown` doubles as the encoder fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SoilTypeLabel {
    Black,
    Clay,
    Loamy,
    Peaty,
    Red,
    Saline,
    Sandy,
    Silty,
    Unknown,
}

impl SoilTypeLabel {
    pub const ALL: [SoilTypeLabel; 9] = [
        SoilTypeLabel::Black,
        SoilTypeLabel::Red,
        SoilTypeLabel::Peaty,
        SoilTypeLabel::Saline,
        SoilTypeLabel::Sandy,
        SoilTypeLabel::Clay,
        SoilTypeLabel::Loamy,
        SoilTypeLabel::Silty,
        SoilTypeLabel::Unknown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SoilTypeLabel::Black => "Black",
            SoilTypeLabel::Clay => "Clay",
            SoilTypeLabel::Loamy => "Loamy",
            SoilTypeLabel::Peaty => "Peaty",
            SoilTypeLabel::Red => "Red",
            SoilTypeLabel::Saline => "Saline",
            SoilTypeLabel::Sandy => "Sandy",
            SoilTypeLabel::Silty => "Silty",
            SoilTypeLabel::Unknown => "Unknown",
        }
    }

    /// Case-insensitive exact match on the label name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SoilTypeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Column names of the feature vector, in order.
pub const FEATURE_NAMES: [&str; FeatureVector::LEN] =
    ["soil_type", "ph", "k", "p", "n", "temperature", "humidity"];

#[derive(Error, Debug, PartialEq)]
pub enum VectorShapeError {
    #[error("expected {len} values, got {0}", len = FeatureVector::LEN)]
    WrongLength(usize),
    #[error("'{0}' is unset")]
    Unset(&'static str),
}

/// `[soil_type_code, ph, k, p, n, temperature_c, humidity_pct]`.
///
/// Only constructible through validation, so every instance has exactly
/// seven finite values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FeatureVector::LEN]);

impl FeatureVector {
    pub const LEN: usize = 7;

    /// Validates a slot array where `None` (or a non-finite value) marks a
    /// field that never got resolved.
    pub fn try_from_slots(slots: [Option<f64>; Self::LEN]) -> Result<Self, VectorShapeError> {
        let mut values = [0.0; Self::LEN];
        for (i, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(v) if v.is_finite() => values[i] = v,
                _ => return Err(VectorShapeError::Unset(FEATURE_NAMES[i])),
            }
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }

    pub fn soil_type_code(&self) -> usize {
        self.0[0] as usize
    }

    pub fn ph(&self) -> f64 {
        self.0[1]
    }

    pub fn k(&self) -> f64 {
        self.0[2]
    }

    pub fn p(&self) -> f64 {
        self.0[3]
    }

    pub fn n(&self) -> f64 {
        self.0[4]
    }

    pub fn temperature_c(&self) -> f64 {
        self.0[5]
    }

    pub fn humidity_pct(&self) -> f64 {
        self.0[6]
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = VectorShapeError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        let slots: [Option<f64>; Self::LEN] = values
            .iter()
            .copied()
            .map(Some)
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| VectorShapeError::WrongLength(values.len()))?;
        Self::try_from_slots(slots)
    }
}

/// Where the soil sample behind a vector came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoilProvenance {
    Exact,
    Fallback { radius_deg: f64, location: Coordinate },
    Defaulted,
}

impl fmt::Display for SoilProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoilProvenance::Exact => f.write_str("exact"),
            SoilProvenance::Fallback {
                radius_deg,
                location,
            } => write!(f, "fallback r={radius_deg:.2} at {location}"),
            SoilProvenance::Defaulted => f.write_str("defaulted"),
        }
    }
}

/// A feature vector together with the intermediate results that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub coordinate: Coordinate,
    pub month: u32,
    pub vector: FeatureVector,
    pub soil_type: SoilTypeLabel,
    pub climate: WeightedClimateResult,
    pub soil: SoilSample,
    pub provenance: SoilProvenance,
    pub location_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_any_property_ignores_texture_class() {
        let sample = SoilSample {
            texture_class: Some("Loamy".into()),
            ..Default::default()
        };
        assert!(!sample.has_any_property());

        let sample = SoilSample {
            silt_pct: Some(0.0),
            ..Default::default()
        };
        assert!(sample.has_any_property());
    }

    #[test]
    fn test_label_from_name_is_case_insensitive() {
        assert_eq!(SoilTypeLabel::from_name("loamy"), Some(SoilTypeLabel::Loamy));
        assert_eq!(SoilTypeLabel::from_name(" SANDY "), Some(SoilTypeLabel::Sandy));
        assert_eq!(SoilTypeLabel::from_name("Chernozem"), None);
    }

    #[test]
    fn test_vector_rejects_unset_slot() {
        let err = FeatureVector::try_from_slots([
            Some(2.0),
            Some(6.5),
            None,
            Some(20.0),
            Some(12.0),
            Some(22.0),
            Some(65.0),
        ])
        .unwrap_err();
        assert_eq!(err, VectorShapeError::Unset("k"));
    }

    #[test]
    fn test_vector_rejects_nan() {
        let slots = [Some(0.0), Some(f64::NAN), Some(1.0), Some(1.0), Some(1.0), Some(1.0), Some(1.0)];
        assert_eq!(
            FeatureVector::try_from_slots(slots).unwrap_err(),
            VectorShapeError::Unset("ph")
        );
    }

    #[test]
    fn test_vector_length_checked() {
        assert_eq!(
            FeatureVector::try_from(vec![1.0; 6]).unwrap_err(),
            VectorShapeError::WrongLength(6)
        );
        let v = FeatureVector::try_from(vec![2.0, 6.8, 150.0, 20.0, 12.0, 22.0, 65.0]).unwrap();
        assert_eq!(v.as_slice().len(), 7);
        assert_eq!(v.soil_type_code(), 2);
        assert_eq!(v.k(), 150.0);
    }
}
