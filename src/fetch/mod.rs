mod basic;
mod client;
pub mod middleware;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

/// GETs `url` and decodes the body as JSON.
///
/// `Ok(None)` means the upstream answered but has nothing for this request
/// (400 or 404). Every other non-success status, network failure or decode
/// failure is an error.
pub async fn fetch_json<C, T>(client: &C, url: reqwest::Url) -> Result<Option<T>>
where
    C: HttpClient + ?Sized,
    T: DeserializeOwned,
{
    let req = reqwest::Request::new(reqwest::Method::GET, url);
    let resp = client.execute(req).await?;
    let status = resp.status();

    if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND {
        let body = resp.text().await.unwrap_or_default();
        debug!(%status, body = %truncate(&body, 300), "Upstream has no data for request");
        return Ok(None);
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!(
            "upstream returned status {}: {}",
            status,
            truncate(&body, 300)
        ));
    }

    let value = resp
        .json::<T>()
        .await
        .context("failed to decode upstream JSON")?;
    Ok(Some(value))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_char_boundaries() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("°C°C", 2), "°C");
    }
}
