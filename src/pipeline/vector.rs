//! Assembles the seven-element feature vector for one coordinate and month.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::climate::ClimateAggregator;
use super::encoding::SoilTypeEncoder;
use super::soil::SoilResolver;
use super::texture::classify;
use super::types::{FeatureVector, Resolution, SoilProvenance, SoilSample};
use crate::config::{ChemistryDefaults, PipelineConfig, SoilPolicy};
use crate::error::{PipelineError, Stage};
use crate::geo::{Coordinate, TargetMonth};
use crate::services::{ClimateDataSource, ReverseGeocoder, SoilDataSource, UNKNOWN_LOCATION};

pub struct FeatureVectorBuilder {
    climate: ClimateAggregator,
    soil: SoilResolver,
    encoder: Arc<SoilTypeEncoder>,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    policy: SoilPolicy,
    defaults: ChemistryDefaults,
    cold_threshold_c: f64,
    request_timeout: Duration,
    deadline: Duration,
}

impl FeatureVectorBuilder {
    pub fn new(
        climate_source: Arc<dyn ClimateDataSource>,
        soil_source: Arc<dyn SoilDataSource>,
        encoder: Arc<SoilTypeEncoder>,
        config: &PipelineConfig,
    ) -> Self {
        Self::from_parts(
            ClimateAggregator::new(climate_source, config),
            SoilResolver::new(soil_source, config),
            encoder,
            config,
        )
    }

    /// Builds around pre-configured stages.
    pub fn from_parts(
        climate: ClimateAggregator,
        soil: SoilResolver,
        encoder: Arc<SoilTypeEncoder>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            climate,
            soil,
            encoder,
            geocoder: None,
            policy: config.soil_policy,
            defaults: config.chemistry_defaults,
            cold_threshold_c: config.cold_threshold_c,
            request_timeout: config.request_timeout(),
            deadline: config.pipeline_deadline(),
        }
    }

    /// Attaches a display name to every [`Resolution`].
    pub fn with_geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Validates raw inputs, then resolves the vector alone.
    pub async fn resolve_feature_vector(
        &self,
        lat: f64,
        lon: f64,
        month: u32,
    ) -> Result<FeatureVector, PipelineError> {
        Ok(self.resolve(lat, lon, month).await?.vector)
    }

    /// Validates raw inputs before any network activity, then builds.
    pub async fn resolve(&self, lat: f64, lon: f64, month: u32) -> Result<Resolution, PipelineError> {
        let coordinate = Coordinate::new(lat, lon)?;
        let month = TargetMonth::new(month)?;
        self.build(coordinate, month).await
    }

    /// Resolves the month sentinel once, then runs every stage under the
    /// pipeline deadline.
    pub async fn build(
        &self,
        coordinate: Coordinate,
        month: TargetMonth,
    ) -> Result<Resolution, PipelineError> {
        let month = month.resolve();
        tokio::time::timeout(self.deadline, self.assemble(coordinate, month))
            .await
            .map_err(|_| PipelineError::Timeout {
                stage: Stage::Pipeline,
                coordinate,
                month,
                elapsed: self.deadline,
            })?
    }

    #[tracing::instrument(
        name = "feature_vector",
        skip(self, coordinate),
        fields(lat = coordinate.lat(), lon = coordinate.lon())
    )]
    async fn assemble(&self, coordinate: Coordinate, month: u32) -> Result<Resolution, PipelineError> {
        let (climate, soil, location_name) = tokio::join!(
            self.climate.resolve_month(coordinate, month),
            self.soil.resolve(coordinate),
            self.describe(coordinate),
        );
        let climate = climate?;

        let (sample, provenance) = match soil {
            Some(found) if found.radius_deg == 0.0 => (found.sample, SoilProvenance::Exact),
            Some(found) => (
                found.sample,
                SoilProvenance::Fallback {
                    radius_deg: found.radius_deg,
                    location: found.location,
                },
            ),
            None if climate.temperature_c < self.cold_threshold_c => {
                warn!(
                    temperature_c = climate.temperature_c,
                    "No soil and sub-threshold temperature, rejecting as non-agricultural"
                );
                return Err(PipelineError::UnresolvableLocation {
                    coordinate,
                    month,
                    temperature_c: climate.temperature_c,
                });
            }
            None => match self.policy {
                SoilPolicy::Strict => {
                    return Err(PipelineError::MissingSoilData { coordinate, month });
                }
                SoilPolicy::Defaulted => {
                    warn!("No soil data, substituting default sample");
                    (SoilSample::default(), SoilProvenance::Defaulted)
                }
            },
        };

        let soil_type = classify(
            sample.clay_pct,
            sample.sand_pct,
            sample.silt_pct,
            sample.texture_class.as_deref(),
        );
        let code = self.encoder.encode(soil_type);

        let d = self.defaults;
        let chem = |value: Option<f64>, default: f64| value.filter(|v| v.is_finite()).unwrap_or(default);
        let slots = [
            Some(code as f64),
            Some(chem(sample.ph, d.ph)),
            Some(chem(sample.k, d.k)),
            Some(chem(sample.p, d.p)),
            Some(chem(sample.n, d.n)),
            Some(climate.temperature_c),
            Some(climate.humidity_pct),
        ];
        let vector =
            FeatureVector::try_from_slots(slots).map_err(|e| PipelineError::IncompleteVector {
                coordinate,
                month,
                reason: e.to_string(),
            })?;

        info!(
            soil_type = %soil_type,
            code,
            provenance = %provenance,
            vector = ?vector.as_slice(),
            "Feature vector assembled"
        );

        Ok(Resolution {
            coordinate,
            month,
            vector,
            soil_type,
            climate,
            soil: sample,
            provenance,
            location_name,
        })
    }

    async fn describe(&self, coordinate: Coordinate) -> Option<String> {
        let geocoder = self.geocoder.as_ref()?;
        let name = tokio::time::timeout(self.request_timeout, geocoder.describe(coordinate))
            .await
            .unwrap_or_else(|_| UNKNOWN_LOCATION.to_string());
        Some(name)
    }
}
