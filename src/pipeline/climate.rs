//! Recency-weighted multi-year climate estimate.
//!
//! One request per year, fanned out under a semaphore and folded into
//! [`WeightedSums`]. Years that fail or come back empty are skipped; only an
//! empty total is an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, warn};

use super::types::{ClimateSample, WeightedClimateResult};
use super::utility::{WeightedSums, dewpoint_to_humidity, kelvin_to_celsius, round2, year_weight};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Stage};
use crate::geo::{BoundingRegion, Coordinate, MonthWindow, TargetMonth};
use crate::services::{ClimateDataSource, SourceOutcome, with_timeout};

pub struct ClimateAggregator {
    source: Arc<dyn ClimateDataSource>,
    years: Vec<i32>,
    first_year: i32,
    last_year: i32,
    buffer_radius_m: f64,
    sample_scale_m: f64,
    concurrency: usize,
    request_timeout: Duration,
    deadline: Duration,
}

impl ClimateAggregator {
    pub fn new(source: Arc<dyn ClimateDataSource>, config: &PipelineConfig) -> Self {
        Self {
            source,
            years: (config.first_year..=config.last_year).collect(),
            first_year: config.first_year,
            last_year: config.last_year,
            buffer_radius_m: config.buffer_radius_m,
            sample_scale_m: config.sample_scale_m,
            concurrency: config.climate_concurrency.max(1),
            request_timeout: config.request_timeout(),
            deadline: config.climate_deadline(),
        }
    }

    /// Overrides the order years are dispatched in. Weights still come from
    /// the configured first/last year.
    pub fn with_years(mut self, years: Vec<i32>) -> Self {
        self.years = years;
        self
    }

    pub fn with_request_timeout(mut self, limit: Duration) -> Self {
        self.request_timeout = limit;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Resolves the month sentinel, then aggregates.
    pub async fn resolve(
        &self,
        coordinate: Coordinate,
        month: TargetMonth,
    ) -> Result<WeightedClimateResult, PipelineError> {
        self.resolve_month(coordinate, month.resolve()).await
    }

    /// Aggregates for an already-resolved month (1..=12).
    #[tracing::instrument(
        name = "climate",
        skip(self, coordinate),
        fields(lat = coordinate.lat(), lon = coordinate.lon())
    )]
    pub async fn resolve_month(
        &self,
        coordinate: Coordinate,
        month: u32,
    ) -> Result<WeightedClimateResult, PipelineError> {
        if !(1..=12).contains(&month) {
            return Err(PipelineError::validation(format!(
                "month {month} is outside [1, 12]"
            )));
        }

        let sums = tokio::time::timeout(self.deadline, self.collect(coordinate, month))
            .await
            .map_err(|_| PipelineError::Timeout {
                stage: Stage::Climate,
                coordinate,
                month,
                elapsed: self.deadline,
            })?;

        let Some(means) = sums.means() else {
            warn!("No climate samples for any year");
            return Err(PipelineError::NoClimateData { coordinate, month });
        };

        let temp_c = kelvin_to_celsius(means.temperature_k);
        let dew_c = kelvin_to_celsius(means.dewpoint_k);
        let result = WeightedClimateResult {
            temperature_c: round2(temp_c),
            humidity_pct: round2(dewpoint_to_humidity(temp_c, dew_c)),
        };

        info!(
            years_used = sums.years,
            years_total = self.years.len(),
            temperature_c = result.temperature_c,
            humidity_pct = result.humidity_pct,
            "Weighted climate resolved"
        );
        Ok(result)
    }

    /// Fans out one fetch per year and folds the successful samples in
    /// ascending year order, so completion order never changes the sums.
    async fn collect(&self, coordinate: Coordinate, month: u32) -> WeightedSums {
        let region = BoundingRegion::new(coordinate, self.buffer_radius_m, self.sample_scale_m);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for &year in &self.years {
            let Some(window) = MonthWindow::new(year, month) else {
                debug!(year, "Skipping year without a valid month window");
                continue;
            };
            let sem = semaphore.clone();
            let source = self.source.clone();
            let limit = self.request_timeout;
            let span = tracing::debug_span!("climate_year", year);

            tasks.spawn(
                async move {
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return (year, SourceOutcome::Absent);
                    };
                    let outcome = with_timeout(
                        limit,
                        source.mean_temperature_and_dewpoint(&region, window.start, window.end),
                    )
                    .await;
                    (year, outcome)
                }
                .instrument(span),
            );
        }

        let mut samples: Vec<(i32, ClimateSample)> = Vec::with_capacity(self.years.len());
        while let Some(joined) = tasks.join_next().await {
            let (year, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Climate worker panicked or was cancelled");
                    continue;
                }
            };
            match outcome {
                SourceOutcome::Found(sample) => {
                    debug!(
                        year,
                        temperature_k = sample.temperature_k,
                        dewpoint_k = sample.dewpoint_k,
                        "Climate sample"
                    );
                    samples.push((year, sample));
                }
                SourceOutcome::Absent => debug!(year, "No climate data for year"),
                SourceOutcome::TransientError(e) => {
                    warn!(year, error = %e, "Climate fetch failed, skipping year")
                }
            }
        }

        samples.sort_by_key(|(year, _)| *year);
        let mut sums = WeightedSums::default();
        for (year, sample) in samples {
            sums.add(sample, year_weight(year, self.first_year, self.last_year));
        }
        sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedClimate, climate_config};
    use approx::assert_relative_eq;
    use chrono::{Datelike, Local};

    fn istanbul() -> Coordinate {
        Coordinate::new(41.0082, 28.9784).unwrap()
    }

    #[tokio::test]
    async fn test_constant_samples_convert_once() {
        let source = ScriptedClimate::constant(295.15, 249.02);
        let agg = ClimateAggregator::new(Arc::new(source), &climate_config());

        let result = agg.resolve_month(istanbul(), 6).await.unwrap();
        assert_eq!(result.temperature_c, 22.0);
        assert_eq!(result.humidity_pct, 65.0);
    }

    #[tokio::test]
    async fn test_recent_years_dominate() {
        // 2000 is cold, 2024 is warm; the estimate must lean warm.
        let source = ScriptedClimate::new(|year, _| {
            let t = if year == 2024 { 300.0 } else if year == 2000 { 280.0 } else { return None };
            Some(ClimateSample { temperature_k: t, dewpoint_k: t - 10.0 })
        });
        let agg = ClimateAggregator::new(Arc::new(source), &climate_config());

        let result = agg.resolve_month(istanbul(), 1).await.unwrap();
        // (280*0.1 + 300*1.0) / 1.1 = 298.18 K
        assert_relative_eq!(result.temperature_c, 25.03, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_all_absent_is_no_climate_data() {
        let source = ScriptedClimate::new(|_, _| None);
        let agg = ClimateAggregator::new(Arc::new(source), &climate_config());

        let err = agg.resolve_month(istanbul(), 3).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoClimateData { month: 3, .. }));
    }

    #[tokio::test]
    async fn test_transient_errors_are_skipped() {
        let source = ScriptedClimate::new(|year, _| {
            (year % 2 == 0).then_some(ClimateSample { temperature_k: 290.0, dewpoint_k: 280.0 })
        })
        .failing_years(|year| year % 2 == 1);
        let agg = ClimateAggregator::new(Arc::new(source), &climate_config());

        let result = agg.resolve_month(istanbul(), 5).await.unwrap();
        assert_relative_eq!(result.temperature_c, 16.85, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_shuffled_year_order_is_identical() {
        let make = || {
            ScriptedClimate::new(|year, _| {
                let t = 270.0 + f64::from(year - 2000) * 1.37;
                Some(ClimateSample { temperature_k: t, dewpoint_k: t - 7.5 })
            })
        };
        let config = climate_config();
        let ordered = ClimateAggregator::new(Arc::new(make()), &config);
        let mut shuffled_years: Vec<i32> = (2000..=2024).rev().collect();
        shuffled_years.swap(3, 17);
        shuffled_years.swap(0, 11);
        let shuffled = ClimateAggregator::new(Arc::new(make()), &config).with_years(shuffled_years);

        let a = ordered.resolve_month(istanbul(), 8).await.unwrap();
        let b = shuffled.resolve_month(istanbul(), 8).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_december_window_requested() {
        let source = Arc::new(ScriptedClimate::constant(280.0, 275.0));
        let agg = ClimateAggregator::new(source.clone(), &climate_config());
        agg.resolve_month(istanbul(), 12).await.unwrap();

        let windows = source.windows();
        assert_eq!(windows.len(), 25);
        assert!(windows.iter().all(|(s, e)| s.month() == 12 && e.month() == 1 && e.year() == s.year() + 1));
    }

    #[tokio::test]
    async fn test_month_zero_matches_current_month() {
        let source = Arc::new(ScriptedClimate::new(|_, month| {
            let t = 270.0 + f64::from(month);
            Some(ClimateSample { temperature_k: t, dewpoint_k: t - 5.0 })
        }));
        let agg = ClimateAggregator::new(source.clone(), &climate_config());

        let current = Local::now().month();
        let via_sentinel = agg.resolve(istanbul(), TargetMonth::CURRENT).await.unwrap();
        let explicit = agg.resolve(istanbul(), TargetMonth::new(current).unwrap()).await.unwrap();
        assert_eq!(via_sentinel, explicit);
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let source = Arc::new(
            ScriptedClimate::constant(290.0, 280.0).with_delay(Duration::from_millis(20)),
        );
        let mut config = climate_config();
        config.climate_concurrency = 3;
        let agg = ClimateAggregator::new(source.clone(), &config);

        agg.resolve_month(istanbul(), 4).await.unwrap();
        // 25 slow fetches saturate the cap; a serial loop would stay at 1
        assert_eq!(source.max_in_flight(), 3);
        assert_eq!(source.calls(), 25);
    }

    #[tokio::test]
    async fn test_slow_years_are_timed_out_and_skipped() {
        let source = ScriptedClimate::constant(290.0, 280.0)
            .with_delay(Duration::from_millis(300))
            .delayed_years(|year| year < 2010);
        let mut config = climate_config();
        config.request_timeout_secs = 1;
        let agg = ClimateAggregator::new(Arc::new(source), &config)
            .with_request_timeout(Duration::from_millis(50));

        let result = agg.resolve_month(istanbul(), 4).await.unwrap();
        assert_relative_eq!(result.temperature_c, 16.85, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_overall_deadline_surfaces_as_timeout() {
        let source = ScriptedClimate::constant(290.0, 280.0).with_delay(Duration::from_millis(500));
        let agg = ClimateAggregator::new(Arc::new(source), &climate_config())
            .with_deadline(Duration::from_millis(50));

        let err = agg.resolve_month(istanbul(), 4).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { stage: Stage::Climate, .. }));
    }

    #[tokio::test]
    async fn test_invalid_resolved_month_rejected() {
        let agg = ClimateAggregator::new(Arc::new(ScriptedClimate::constant(1.0, 1.0)), &climate_config());
        assert!(agg.resolve_month(istanbul(), 13).await.is_err());
    }
}
