mod client;

pub use client::SoilGridsClient;
