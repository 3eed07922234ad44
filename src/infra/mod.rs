//! HTTP-backed implementations of the source traits in [`crate::services`].

pub mod nominatim;
pub mod open_meteo;
pub mod soilgrids;

pub use nominatim::NominatimClient;
pub use open_meteo::OpenMeteoArchive;
pub use soilgrids::SoilGridsClient;
