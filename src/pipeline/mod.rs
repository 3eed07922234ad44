//! Feature-vector pipeline: climate aggregation, soil lookup, texture
//! classification, label encoding and final assembly.

pub mod climate;
pub mod encoding;
pub mod soil;
pub mod texture;
pub mod types;
pub mod utility;
pub mod vector;

pub use climate::ClimateAggregator;
pub use encoding::SoilTypeEncoder;
pub use soil::{SoilMatch, SoilResolver, probe_plan};
pub use texture::classify;
pub use types::{
    ClimateSample, FEATURE_NAMES, FeatureVector, Resolution, SoilProvenance, SoilSample,
    SoilTypeLabel, WeightedClimateResult,
};
pub use vector::FeatureVectorBuilder;

/// The assembled pipeline; the builder is the long-lived object callers hold.
pub type Pipeline = FeatureVectorBuilder;
