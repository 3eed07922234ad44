//! Capability traits for the remote data sources the pipeline consumes.
//!
//! Each source answers with a [`SourceOutcome`] rather than a bare `Result`,
//! so "nothing there" and "the call failed" stay distinguishable for logs
//! even though the pipeline treats both as missing data.

mod climate_source;
mod geocoder;
mod soil_source;

pub use climate_source::ClimateDataSource;
pub use geocoder::{ReverseGeocoder, UNKNOWN_LOCATION};
pub use soil_source::SoilDataSource;

use std::future::Future;
use std::time::Duration;

/// Result of one external lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome<T> {
    Found(T),
    /// The source answered but holds no data for the request.
    Absent,
    /// Network failure, timeout or malformed response.
    TransientError(String),
}

impl<T> SourceOutcome<T> {
    /// Folds a fetch result where `Ok(None)` already means "no data".
    pub fn from_fetch(result: anyhow::Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => SourceOutcome::Found(value),
            Ok(None) => SourceOutcome::Absent,
            Err(e) => SourceOutcome::TransientError(format!("{e:#}")),
        }
    }
}

/// Runs a source call under a timeout; running out of time is a transient error.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> SourceOutcome<T>
where
    F: Future<Output = SourceOutcome<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(outcome) => outcome,
        Err(_) => SourceOutcome::TransientError(format!("timed out after {limit:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fetch_mapping() {
        assert_eq!(SourceOutcome::from_fetch(Ok(Some(1))), SourceOutcome::Found(1));
        assert_eq!(SourceOutcome::<i32>::from_fetch(Ok(None)), SourceOutcome::Absent);
        let err = SourceOutcome::<i32>::from_fetch(Err(anyhow::anyhow!("boom")));
        assert!(matches!(err, SourceOutcome::TransientError(msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn test_with_timeout_turns_elapsed_into_transient() {
        let outcome = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            SourceOutcome::Found(1)
        })
        .await;
        assert!(matches!(outcome, SourceOutcome::TransientError(_)));

        let outcome = with_timeout(Duration::from_secs(1), async { SourceOutcome::Found(7) }).await;
        assert_eq!(outcome, SourceOutcome::Found(7));
    }
}
