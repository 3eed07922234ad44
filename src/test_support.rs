//! In-memory sources for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};

use crate::config::PipelineConfig;
use crate::geo::{BoundingRegion, Coordinate};
use crate::pipeline::types::{ClimateSample, SoilSample};
use crate::services::{ClimateDataSource, ReverseGeocoder, SoilDataSource, SourceOutcome};

type ClimateScript = Box<dyn Fn(i32, u32) -> Option<ClimateSample> + Send + Sync>;
type YearFilter = Box<dyn Fn(i32) -> bool + Send + Sync>;

pub fn climate_config() -> PipelineConfig {
    PipelineConfig {
        request_timeout_secs: 5,
        climate_deadline_secs: 10,
        pipeline_deadline_secs: 20,
        ..PipelineConfig::default()
    }
}

/// Climate source answering from a `(year, month) -> sample` closure.
pub struct ScriptedClimate {
    script: ClimateScript,
    failing: YearFilter,
    delayed: YearFilter,
    delay: Option<Duration>,
    windows: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClimate {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(i32, u32) -> Option<ClimateSample> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            failing: Box::new(|_| false),
            delayed: Box::new(|_| true),
            delay: None,
            windows: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn constant(temperature_k: f64, dewpoint_k: f64) -> Self {
        Self::new(move |_, _| {
            Some(ClimateSample {
                temperature_k,
                dewpoint_k,
            })
        })
    }

    pub fn failing_years<F>(mut self, filter: F) -> Self
    where
        F: Fn(i32) -> bool + Send + Sync + 'static,
    {
        self.failing = Box::new(filter);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn delayed_years<F>(mut self, filter: F) -> Self
    where
        F: Fn(i32) -> bool + Send + Sync + 'static,
    {
        self.delayed = Box::new(filter);
        self
    }

    pub fn windows(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.windows.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ClimateDataSource for ScriptedClimate {
    async fn mean_temperature_and_dewpoint(
        &self,
        _region: &BoundingRegion,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SourceOutcome<ClimateSample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push((start, end));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let year = start.year();
        if let Some(delay) = self.delay.filter(|_| (self.delayed)(year)) {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if (self.failing)(year) {
            return SourceOutcome::TransientError("scripted failure".into());
        }
        match (self.script)(year, start.month()) {
            Some(sample) => SourceOutcome::Found(sample),
            None => SourceOutcome::Absent,
        }
    }
}

type SoilScript = Box<dyn Fn(Coordinate) -> Option<SoilSample> + Send + Sync>;

/// Soil source answering from a `coordinate -> sample` closure and recording
/// every probe in order.
pub struct ScriptedSoil {
    script: SoilScript,
    fail_first: usize,
    probed: Mutex<Vec<Coordinate>>,
}

impl ScriptedSoil {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(Coordinate) -> Option<SoilSample> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            fail_first: 0,
            probed: Mutex::new(Vec::new()),
        }
    }

    /// The first `n` calls fail with a transient error.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn probed(&self) -> Vec<Coordinate> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SoilDataSource for ScriptedSoil {
    async fn properties(&self, coordinate: Coordinate) -> SourceOutcome<SoilSample> {
        let call = {
            let mut probed = self.probed.lock().unwrap();
            probed.push(coordinate);
            probed.len()
        };
        if call <= self.fail_first {
            return SourceOutcome::TransientError("scripted failure".into());
        }
        match (self.script)(coordinate) {
            Some(sample) => SourceOutcome::Found(sample),
            None => SourceOutcome::Absent,
        }
    }
}

pub struct FixedGeocoder(pub String);

#[async_trait::async_trait]
impl ReverseGeocoder for FixedGeocoder {
    async fn describe(&self, _coordinate: Coordinate) -> String {
        self.0.clone()
    }
}
