use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::fetch::{HttpClient, fetch_json};
use crate::geo::Coordinate;
use crate::services::{ReverseGeocoder, UNKNOWN_LOCATION};

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Address,
}

impl ReverseResponse {
    fn display_name(self) -> String {
        let Address {
            city,
            town,
            village,
            country,
        } = self.address;
        let city = city
            .or(town)
            .or(village)
            .unwrap_or_else(|| "Unknown City".to_string());
        let country = country.unwrap_or_else(|| "Unknown Country".to_string());
        format!("{city}, {country}")
    }
}

/// OpenStreetMap Nominatim reverse geocoding.
///
/// Nominatim rejects anonymous clients, so wrap the transport in
/// [`Header::user_agent`](crate::fetch::middleware::Header::user_agent).
pub struct NominatimClient<C> {
    client: C,
    base_url: String,
}

impl<C: HttpClient> NominatimClient<C> {
    pub fn new(client: C, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn reverse_url(&self, coordinate: Coordinate) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(
            &format!("{}/reverse", self.base_url),
            &[
                ("lat", coordinate.lat().to_string()),
                ("lon", coordinate.lon().to_string()),
                ("format", "json".to_string()),
            ],
        )
        .context("invalid Nominatim base URL")
    }

    async fn lookup(&self, coordinate: Coordinate) -> Result<Option<String>> {
        let url = self.reverse_url(coordinate)?;
        let body: Option<ReverseResponse> = fetch_json(&self.client, url).await?;
        Ok(body.map(ReverseResponse::display_name))
    }
}

#[async_trait]
impl<C: HttpClient> ReverseGeocoder for NominatimClient<C> {
    async fn describe(&self, coordinate: Coordinate) -> String {
        match self.lookup(coordinate).await {
            Ok(Some(name)) => {
                debug!(%coordinate, name = %name, "Reverse geocoded");
                name
            }
            Ok(None) => UNKNOWN_LOCATION.to_string(),
            Err(e) => {
                warn!(%coordinate, error = %e, "Reverse geocoding failed");
                UNKNOWN_LOCATION.to_string()
            }
        }
    }
}
