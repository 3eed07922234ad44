mod client;

pub use client::OpenMeteoArchive;
