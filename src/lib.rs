pub mod config;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod infra;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod services;

#[cfg(test)]
mod test_support;
