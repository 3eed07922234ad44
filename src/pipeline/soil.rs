//! Soil lookup with an expanding, nearest-first fallback search.
//!
//! The exact point is tried first, then eight compass offsets at each radius
//! `step, 2*step, ..., max_radius`. Probing is strictly sequential and stops
//! at the first hit.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::types::SoilSample;
use crate::config::PipelineConfig;
use crate::geo::Coordinate;
use crate::services::{SoilDataSource, SourceOutcome, with_timeout};

/// A soil sample and where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilMatch {
    pub sample: SoilSample,
    pub location: Coordinate,
    /// `0.0` for the exact point.
    pub radius_deg: f64,
}

/// One probe of the search: `(radius, d_lat, d_lon)` in degrees.
pub type Probe = (f64, f64, f64);

/// The full probe order for a search, excluding the exact point.
pub fn probe_plan(max_radius: f64, step: f64) -> Vec<Probe> {
    if !(step > 0.0) || !(max_radius >= 0.0) {
        return Vec::new();
    }
    // Tolerance keeps 0.5 / 0.1 from flooring to 4.
    let rings = (max_radius / step + 1e-9).floor() as usize;
    (1..=rings)
        .flat_map(|i| {
            let r = step * i as f64;
            [
                (r, 0.0),
                (-r, 0.0),
                (0.0, r),
                (0.0, -r),
                (r, r),
                (-r, -r),
                (r, -r),
                (-r, r),
            ]
            .into_iter()
            .map(move |(d_lat, d_lon)| (r, d_lat, d_lon))
        })
        .collect()
}

pub struct SoilResolver {
    source: Arc<dyn SoilDataSource>,
    max_radius: f64,
    step: f64,
    request_timeout: Duration,
}

impl SoilResolver {
    pub fn new(source: Arc<dyn SoilDataSource>, config: &PipelineConfig) -> Self {
        Self {
            source,
            max_radius: config.max_radius_deg,
            step: config.radius_step_deg,
            request_timeout: config.request_timeout(),
        }
    }

    pub fn with_search(mut self, max_radius: f64, step: f64) -> Self {
        self.max_radius = max_radius;
        self.step = step;
        self
    }

    /// Returns the nearest sample with at least one property, or `None` when
    /// the whole search area is empty.
    #[tracing::instrument(
        name = "soil",
        skip(self, coordinate),
        fields(lat = coordinate.lat(), lon = coordinate.lon())
    )]
    pub async fn resolve(&self, coordinate: Coordinate) -> Option<SoilMatch> {
        if let Some(sample) = self.probe(coordinate).await {
            info!("Soil data found at exact location");
            return Some(SoilMatch {
                sample,
                location: coordinate,
                radius_deg: 0.0,
            });
        }

        for (radius, d_lat, d_lon) in probe_plan(self.max_radius, self.step) {
            let Some(location) = coordinate.offset(d_lat, d_lon) else {
                debug!(radius, d_lat, d_lon, "Probe leaves valid range, skipping");
                continue;
            };
            if let Some(sample) = self.probe(location).await {
                info!(
                    radius,
                    probe_lat = location.lat(),
                    probe_lon = location.lon(),
                    "Soil data found nearby"
                );
                return Some(SoilMatch {
                    sample,
                    location,
                    radius_deg: radius,
                });
            }
        }

        warn!(max_radius = self.max_radius, "No soil data at or near location");
        None
    }

    async fn probe(&self, location: Coordinate) -> Option<SoilSample> {
        match with_timeout(self.request_timeout, self.source.properties(location)).await {
            SourceOutcome::Found(sample) if sample.has_any_property() => Some(sample),
            SourceOutcome::Found(_) | SourceOutcome::Absent => {
                debug!(%location, "No soil data at probe");
                None
            }
            SourceOutcome::TransientError(e) => {
                warn!(%location, error = %e, "Soil fetch failed, treating as no data");
                None
            }
        }
    }
}
