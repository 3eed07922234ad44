use chrono::NaiveDate;

use super::SourceOutcome;
use crate::geo::BoundingRegion;
use crate::pipeline::types::ClimateSample;

/// Historical reanalysis source for near-surface temperature and dewpoint.
#[async_trait::async_trait]
pub trait ClimateDataSource: Send + Sync {
    /// Mean temperature and dewpoint (Kelvin) over `region` for the half-open
    /// date range `[start, end)`. `Absent` when either value is missing.
    async fn mean_temperature_and_dewpoint(
        &self,
        region: &BoundingRegion,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SourceOutcome<ClimateSample>;
}
