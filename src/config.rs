//! Read-only pipeline configuration.
//!
//! Built once at startup from defaults, an optional JSON file and the
//! environment, then shared by reference with every component:
//!
//! ```json
//! {
//!   "soil_policy": "strict",
//!   "max_radius_deg": 0.5,
//!   "climate_concurrency": 5,
//!   "chemistry_defaults": { "ph": 6.5, "n": 15.0, "p": 25.0, "k": 180.0 }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;

/// What to do when no soil sample exists anywhere in the search area and
/// the climate does not mark the location as non-agricultural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoilPolicy {
    /// Fail with `MissingSoilData`.
    Strict,
    /// Substitute the default sample.
    #[default]
    Defaulted,
}

impl FromStr for SoilPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SoilPolicy::Strict),
            "defaulted" | "default" => Ok(SoilPolicy::Defaulted),
            other => Err(PipelineError::config(format!(
                "unknown soil policy '{other}' (expected 'strict' or 'defaulted')"
            ))),
        }
    }
}

/// Per-field substitutes for missing soil chemistry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChemistryDefaults {
    pub ph: f64,
    pub n: f64,
    pub p: f64,
    pub k: f64,
}

impl Default for ChemistryDefaults {
    fn default() -> Self {
        Self {
            ph: 6.5,
            n: 15.0,
            p: 25.0,
            k: 180.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub soil_policy: SoilPolicy,
    pub chemistry_defaults: ChemistryDefaults,

    pub first_year: i32,
    pub last_year: i32,
    pub buffer_radius_m: f64,
    pub sample_scale_m: f64,
    pub climate_concurrency: usize,

    pub max_radius_deg: f64,
    pub radius_step_deg: f64,

    /// Mean temperature (°C) below which a soil-less location is rejected
    /// as non-agricultural.
    pub cold_threshold_c: f64,

    pub request_timeout_secs: u64,
    pub climate_deadline_secs: u64,
    pub pipeline_deadline_secs: u64,

    pub open_meteo_base_url: String,
    pub open_meteo_api_key: Option<String>,
    pub soilgrids_base_url: String,
    pub nominatim_base_url: String,
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            soil_policy: SoilPolicy::default(),
            chemistry_defaults: ChemistryDefaults::default(),
            first_year: 2000,
            last_year: 2024,
            buffer_radius_m: 5000.0,
            sample_scale_m: 1000.0,
            climate_concurrency: 5,
            max_radius_deg: 0.5,
            radius_step_deg: 0.1,
            cold_threshold_c: -5.0,
            request_timeout_secs: 30,
            // Both deadlines sit below the sum of per-call timeouts (25 years
            // in waves of 5 is 150 s, 41 soil lookups is 1230 s). Hitting one
            // fails the stage with a timeout instead of waiting out every call.
            climate_deadline_secs: 120,
            pipeline_deadline_secs: 180,
            open_meteo_base_url: "https://archive-api.open-meteo.com".to_string(),
            open_meteo_api_key: None,
            soilgrids_base_url: "https://rest.isric.org".to_string(),
            nominatim_base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("agro_features/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config file. Missing keys keep their defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config '{path}'"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>>
        where
            T::Err: std::fmt::Display,
        {
            raw.map(|v| {
                v.trim()
                    .parse::<T>()
                    .map_err(|e| anyhow::anyhow!("{key}='{v}': {e}"))
            })
            .transpose()
        }

        if let Some(policy) = parsed::<SoilPolicy>("AGRO_SOIL_POLICY", lookup("AGRO_SOIL_POLICY"))? {
            self.soil_policy = policy;
        }
        if let Some(v) = parsed("AGRO_MAX_RADIUS_DEG", lookup("AGRO_MAX_RADIUS_DEG"))? {
            self.max_radius_deg = v;
        }
        if let Some(v) = parsed("AGRO_RADIUS_STEP_DEG", lookup("AGRO_RADIUS_STEP_DEG"))? {
            self.radius_step_deg = v;
        }
        if let Some(v) = parsed("AGRO_CLIMATE_CONCURRENCY", lookup("AGRO_CLIMATE_CONCURRENCY"))? {
            self.climate_concurrency = v;
        }
        if let Some(v) = parsed("AGRO_REQUEST_TIMEOUT_SECS", lookup("AGRO_REQUEST_TIMEOUT_SECS"))? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = parsed(
            "AGRO_CLIMATE_DEADLINE_SECS",
            lookup("AGRO_CLIMATE_DEADLINE_SECS"),
        )? {
            self.climate_deadline_secs = v;
        }
        if let Some(v) = parsed(
            "AGRO_PIPELINE_DEADLINE_SECS",
            lookup("AGRO_PIPELINE_DEADLINE_SECS"),
        )? {
            self.pipeline_deadline_secs = v;
        }
        if let Some(v) = parsed("AGRO_COLD_THRESHOLD_C", lookup("AGRO_COLD_THRESHOLD_C"))? {
            self.cold_threshold_c = v;
        }
        if let Some(v) = lookup("OPEN_METEO_BASE_URL") {
            self.open_meteo_base_url = v;
        }
        if let Some(v) = lookup("OPEN_METEO_API_KEY").filter(|k| !k.is_empty()) {
            self.open_meteo_api_key = Some(v);
        }
        if let Some(v) = lookup("SOILGRIDS_BASE_URL") {
            self.soilgrids_base_url = v;
        }
        if let Some(v) = lookup("NOMINATIM_BASE_URL") {
            self.nominatim_base_url = v;
        }
        if let Some(v) = lookup("AGRO_USER_AGENT") {
            self.user_agent = v;
        }

        self.validate()?;
        Ok(self)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.radius_step_deg > 0.0) {
            return Err(PipelineError::config("radius_step_deg must be positive"));
        }
        if !(self.max_radius_deg >= 0.0) {
            return Err(PipelineError::config("max_radius_deg must not be negative"));
        }
        if self.climate_concurrency == 0 {
            return Err(PipelineError::config("climate_concurrency must be at least 1"));
        }
        if self.first_year > self.last_year {
            return Err(PipelineError::config(format!(
                "first_year {} is after last_year {}",
                self.first_year, self.last_year
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(PipelineError::config("request_timeout_secs must be at least 1"));
        }
        if self.climate_deadline_secs < self.request_timeout_secs {
            return Err(PipelineError::config(format!(
                "climate_deadline_secs {} is shorter than one request ({} s)",
                self.climate_deadline_secs, self.request_timeout_secs
            )));
        }
        if self.pipeline_deadline_secs < self.climate_deadline_secs {
            return Err(PipelineError::config(format!(
                "pipeline_deadline_secs {} is shorter than climate_deadline_secs {}",
                self.pipeline_deadline_secs, self.climate_deadline_secs
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn climate_deadline(&self) -> Duration {
        Duration::from_secs(self.climate_deadline_secs)
    }

    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline_deadline_secs)
    }

    /// Time the yearly climate fetches take if every call runs out its timeout.
    pub fn climate_worst_case(&self) -> Duration {
        let years = (self.last_year - self.first_year + 1).max(0) as u64;
        let waves = years.div_ceil(self.climate_concurrency.max(1) as u64);
        Duration::from_secs(waves * self.request_timeout_secs)
    }
}
