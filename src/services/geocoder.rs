use crate::geo::Coordinate;

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Human-readable place names, for display metadata only.
#[async_trait::async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// A display name such as `"Istanbul, Türkiye"`, or [`UNKNOWN_LOCATION`].
    async fn describe(&self, coordinate: Coordinate) -> String;
}
