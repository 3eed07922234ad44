use super::SourceOutcome;
use crate::geo::Coordinate;
use crate::pipeline::types::SoilSample;

/// Point lookup of topsoil chemistry and texture.
#[async_trait::async_trait]
pub trait SoilDataSource: Send + Sync {
    /// Properties at `coordinate`. Sources should answer `Absent` rather than
    /// a sample with every field null.
    async fn properties(&self, coordinate: Coordinate) -> SourceOutcome<SoilSample>;
}
