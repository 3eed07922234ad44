use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::fetch::{HttpClient, fetch_json};
use crate::geo::{BoundingRegion, Coordinate, MonthWindow};
use crate::pipeline::types::ClimateSample;
use crate::pipeline::utility::{celsius_to_kelvin, mean};
use crate::services::{ClimateDataSource, SourceOutcome};

const HOURLY_VARIABLES: &str = "temperature_2m,dew_point_2m";

#[derive(Debug, Deserialize)]
struct Hourly {
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    dew_point_2m: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct Location {
    hourly: Option<Hourly>,
}

/// The archive answers with a bare object for one point and an array for
/// several.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArchiveResponse {
    Many(Vec<Location>),
    One(Location),
}

impl ArchiveResponse {
    fn locations(self) -> Vec<Location> {
        match self {
            ArchiveResponse::Many(locations) => locations,
            ArchiveResponse::One(location) => vec![location],
        }
    }

    /// Mean of every non-null hourly value across all points, in Kelvin.
    fn summarize(self) -> Option<ClimateSample> {
        let mut temps = Vec::new();
        let mut dews = Vec::new();
        for hourly in self.locations().into_iter().filter_map(|l| l.hourly) {
            temps.extend(hourly.temperature_2m.into_iter().flatten());
            dews.extend(hourly.dew_point_2m.into_iter().flatten());
        }
        debug!(temperature_n = temps.len(), dewpoint_n = dews.len(), "Archive values collected");

        Some(ClimateSample {
            temperature_k: celsius_to_kelvin(mean(&temps)?),
            dewpoint_k: celsius_to_kelvin(mean(&dews)?),
        })
    }
}

/// ERA5-Land reanalysis through the Open-Meteo historical archive.
pub struct OpenMeteoArchive<C> {
    client: C,
    base_url: String,
}

impl<C: HttpClient> OpenMeteoArchive<C> {
    pub fn new(client: C, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn archive_url(
        &self,
        region: &BoundingRegion,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<reqwest::Url> {
        let points = region.stencil();
        let join = |f: fn(&Coordinate) -> f64| {
            points
                .iter()
                .map(|p| format!("{:.5}", f(p)))
                .collect::<Vec<_>>()
                .join(",")
        };
        let last_day = MonthWindow { start, end }.last_day();

        reqwest::Url::parse_with_params(
            &format!("{}/v1/archive", self.base_url),
            &[
                ("latitude", join(|c| c.lat())),
                ("longitude", join(|c| c.lon())),
                ("start_date", start.format("%Y-%m-%d").to_string()),
                ("end_date", last_day.format("%Y-%m-%d").to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("models", "era5_land".to_string()),
                ("timezone", "UTC".to_string()),
            ],
        )
        .context("invalid Open-Meteo base URL")
    }
}

#[async_trait]
impl<C: HttpClient> ClimateDataSource for OpenMeteoArchive<C> {
    #[tracing::instrument(
        name = "open_meteo",
        skip(self, region),
        fields(lat = region.center.lat(), lon = region.center.lon(), start = %start)
    )]
    async fn mean_temperature_and_dewpoint(
        &self,
        region: &BoundingRegion,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SourceOutcome<ClimateSample> {
        let url = match self.archive_url(region, start, end) {
            Ok(url) => url,
            Err(e) => return SourceOutcome::TransientError(format!("{e:#}")),
        };
        let fetched = fetch_json::<C, ArchiveResponse>(&self.client, url)
            .await
            .map(|body| body.and_then(ArchiveResponse::summarize));
        SourceOutcome::from_fetch(fetched)
    }
}
