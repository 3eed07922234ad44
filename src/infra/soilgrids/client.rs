use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::fetch::{HttpClient, fetch_json};
use crate::geo::Coordinate;
use crate::pipeline::types::SoilSample;
use crate::services::{SoilDataSource, SourceOutcome};

const PROPERTIES: [&str; 5] = ["phh2o", "nitrogen", "clay", "sand", "silt"];
const TOPSOIL: &str = "0-5cm";

#[derive(Debug, Deserialize)]
struct QueryResponse {
    properties: Option<Properties>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    #[serde(default)]
    layers: Vec<Layer>,
}

#[derive(Debug, Deserialize)]
struct Layer {
    name: String,
    unit_measure: Option<UnitMeasure>,
    #[serde(default)]
    depths: Vec<Depth>,
}

#[derive(Debug, Deserialize)]
struct UnitMeasure {
    d_factor: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Depth {
    label: String,
    values: Option<Values>,
}

#[derive(Debug, Deserialize)]
struct Values {
    mean: Option<f64>,
}

impl Layer {
    /// Topsoil mean in conventional units (raw mean over `d_factor`).
    fn topsoil_mean(&self) -> Option<f64> {
        let raw = self
            .depths
            .iter()
            .find(|d| d.label == TOPSOIL)?
            .values
            .as_ref()?
            .mean?;
        let factor = self
            .unit_measure
            .as_ref()
            .and_then(|u| u.d_factor)
            .filter(|f| *f != 0.0)
            .unwrap_or(1.0);
        Some(raw / factor)
    }
}

impl QueryResponse {
    /// `None` when no layer yields a value.
    fn into_sample(self) -> Option<SoilSample> {
        let mut sample = SoilSample::default();
        for layer in self.properties.map(|p| p.layers).unwrap_or_default() {
            let value = layer.topsoil_mean();
            debug!(property = %layer.name, ?value, "SoilGrids layer");
            match layer.name.as_str() {
                "phh2o" => sample.ph = value,
                "nitrogen" => sample.n = value,
                "clay" => sample.clay_pct = value,
                "sand" => sample.sand_pct = value,
                "silt" => sample.silt_pct = value,
                _ => {}
            }
        }
        sample.has_any_property().then_some(sample)
    }
}

/// ISRIC SoilGrids v2 point query for topsoil chemistry and texture.
///
/// SoilGrids publishes no phosphorus or potassium layers, so `p` and `k`
/// are always `None` here.
pub struct SoilGridsClient<C> {
    client: C,
    base_url: String,
}

impl<C: HttpClient> SoilGridsClient<C> {
    pub fn new(client: C, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn query_url(&self, coordinate: Coordinate) -> Result<reqwest::Url> {
        let mut params = vec![
            ("lon", coordinate.lon().to_string()),
            ("lat", coordinate.lat().to_string()),
        ];
        params.extend(PROPERTIES.iter().map(|p| ("property", p.to_string())));
        params.push(("depth", TOPSOIL.to_string()));
        params.push(("value", "mean".to_string()));

        reqwest::Url::parse_with_params(
            &format!("{}/soilgrids/v2.0/properties/query", self.base_url),
            &params,
        )
        .context("invalid SoilGrids base URL")
    }
}

#[async_trait]
impl<C: HttpClient> SoilDataSource for SoilGridsClient<C> {
    #[tracing::instrument(
        name = "soilgrids",
        skip(self, coordinate),
        fields(lat = coordinate.lat(), lon = coordinate.lon())
    )]
    async fn properties(&self, coordinate: Coordinate) -> SourceOutcome<SoilSample> {
        let url = match self.query_url(coordinate) {
            Ok(url) => url,
            Err(e) => return SourceOutcome::TransientError(format!("{e:#}")),
        };
        let fetched = fetch_json::<C, QueryResponse>(&self.client, url)
            .await
            .map(|body| body.and_then(QueryResponse::into_sample));
        SourceOutcome::from_fetch(fetched)
    }
}
