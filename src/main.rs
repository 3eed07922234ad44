//! CLI entry point for the agro_features tool.
//!
//! Resolves crop-recommendation feature vectors for single coordinates or
//! whole CSV batches, and exposes the offline texture classifier and the
//! soil-type code table.

use agro_features::{
    config::{PipelineConfig, SoilPolicy},
    error::PipelineError,
    fetch::{
        BasicClient,
        middleware::{Header, UrlParam},
    },
    infra::{NominatimClient, OpenMeteoArchive, SoilGridsClient},
    output::{append_record, print_json, print_pretty},
    pipeline::{FEATURE_NAMES, Pipeline, SoilTypeEncoder, classify},
    report::ResolutionRecord,
    services::{ClimateDataSource, SoilDataSource},
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "agro_features")]
#[command(about = "Build crop-recommendation feature vectors from coordinates", long_about = None)]
struct Cli {
    /// JSON config file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the soil policy ("strict" or "defaulted")
    #[arg(long, global = true)]
    soil_policy: Option<SoilPolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the feature vector for one coordinate
    Resolve {
        #[arg(allow_negative_numbers = true)]
        lat: f64,

        #[arg(allow_negative_numbers = true)]
        lon: f64,

        /// Month 1-12, or 0 for the current month
        #[arg(short, long, default_value_t = 0)]
        month: u32,

        /// Print the full resolution as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// CSV file to append the result to
        #[arg(short, long)]
        output: Option<String>,

        /// Skip reverse geocoding
        #[arg(long, default_value_t = false)]
        no_geocode: bool,
    },
    /// Resolve every `lat,lon,month` row of a CSV file
    Batch {
        /// Input CSV with a `lat,lon,month` header
        #[arg(value_name = "FILE")]
        input: String,

        /// CSV file to append one record per row to
        #[arg(short, long, default_value = "resolutions.csv")]
        output: String,

        /// Maximum number of pipelines running at once
        #[arg(short = 'j', long, default_value_t = 4)]
        concurrency: usize,

        /// Skip reverse geocoding
        #[arg(long, default_value_t = false)]
        no_geocode: bool,
    },
    /// Classify a soil texture offline
    Classify {
        #[arg(long)]
        clay: Option<f64>,

        #[arg(long)]
        sand: Option<f64>,

        #[arg(long)]
        silt: Option<f64>,

        /// Free-form texture class used when percentages are incomplete
        #[arg(long)]
        hint: Option<String>,
    },
    /// Print the soil-type code table
    Labels {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Debug, Deserialize)]
struct BatchRow {
    lat: f64,
    lon: f64,
    #[serde(default)]
    month: u32,
}

#[derive(Serialize)]
struct LabelRow {
    code: usize,
    label: &'static str,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/agro_features.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("agro_features.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            lat,
            lon,
            month,
            json,
            output,
            no_geocode,
        } => {
            let config = load_config(cli.config.as_deref(), cli.soil_policy)?;
            let pipeline = build_pipeline(&config, !no_geocode)?;

            let record = match pipeline.resolve(lat, lon, month).await {
                Ok(resolution) => {
                    if json {
                        print_json(&resolution)?;
                    }
                    ResolutionRecord::from_resolution(month, &resolution)
                }
                Err(e) => {
                    error!(stage = %e.stage(), error = %e, "Resolution failed");
                    ResolutionRecord::from_error(lat, lon, month, &e)
                }
            };

            if !json {
                print_pretty(&record);
            }
            if let Some(path) = output {
                append_record(&path, &record)?;
            }
            if record.is_error() {
                anyhow::bail!(
                    "resolution failed: {}",
                    record.error_message.unwrap_or_default()
                );
            }
        }
        Commands::Batch {
            input,
            output,
            concurrency,
            no_geocode,
        } => {
            let config = load_config(cli.config.as_deref(), cli.soil_policy)?;
            let pipeline = Arc::new(build_pipeline(&config, !no_geocode)?);
            run_batch(pipeline, &input, &output, concurrency).await?;
        }
        Commands::Classify {
            clay,
            sand,
            silt,
            hint,
        } => {
            let label = classify(clay, sand, silt, hint.as_deref());
            let code = SoilTypeEncoder::standard().encode(label);
            println!("{label} (code {code})");
        }
        Commands::Labels { json } => {
            let encoder = SoilTypeEncoder::standard();
            if json {
                let rows: Vec<LabelRow> = encoder
                    .table()
                    .map(|(code, label)| LabelRow {
                        code,
                        label: label.name(),
                    })
                    .collect();
                print_json(&rows)?;
            } else {
                for (code, label) in encoder.table() {
                    println!("{code}\t{label}");
                }
                println!("vector order: {}", FEATURE_NAMES.join(", "));
            }
        }
    }

    Ok(())
}

/// Defaults, then the optional JSON file, then the environment, then flags.
fn load_config(path: Option<&str>, soil_policy: Option<SoilPolicy>) -> Result<PipelineConfig> {
    let base = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let mut config = base.with_env()?;
    if let Some(policy) = soil_policy {
        config.soil_policy = policy;
    }
    info!(
        soil_policy = ?config.soil_policy,
        max_radius_deg = config.max_radius_deg,
        climate_concurrency = config.climate_concurrency,
        "Configuration loaded"
    );
    if config.climate_deadline() < config.climate_worst_case() {
        info!(
            climate_deadline_secs = config.climate_deadline_secs,
            worst_case_secs = config.climate_worst_case().as_secs(),
            "Climate deadline is tighter than the per-call worst case"
        );
    }
    Ok(config)
}

/// Wires the HTTP sources into a pipeline.
fn build_pipeline(config: &PipelineConfig, geocode: bool) -> Result<Pipeline> {
    let timeout = config.request_timeout();

    let climate: Arc<dyn ClimateDataSource> = match &config.open_meteo_api_key {
        Some(key) => Arc::new(OpenMeteoArchive::new(
            UrlParam {
                inner: BasicClient::new(timeout)?,
                param_name: "apikey".to_string(),
                key: key.clone(),
            },
            &config.open_meteo_base_url,
        )),
        None => Arc::new(OpenMeteoArchive::new(
            BasicClient::new(timeout)?,
            &config.open_meteo_base_url,
        )),
    };

    let soil: Arc<dyn SoilDataSource> = Arc::new(SoilGridsClient::new(
        Header::user_agent(BasicClient::new(timeout)?, &config.user_agent)?,
        &config.soilgrids_base_url,
    ));

    let pipeline = Pipeline::new(climate, soil, Arc::new(SoilTypeEncoder::standard()), config);
    if !geocode {
        return Ok(pipeline);
    }

    let geocoder = NominatimClient::new(
        Header::user_agent(BasicClient::new(timeout)?, &config.user_agent)?,
        &config.nominatim_base_url,
    );
    Ok(pipeline.with_geocoder(Arc::new(geocoder)))
}

/// Resolves every row with at most `concurrency` pipelines in flight. Rows
/// that fail are recorded with their error; only I/O on the files is fatal.
#[tracing::instrument(skip(pipeline))]
async fn run_batch(
    pipeline: Arc<Pipeline>,
    input: &str,
    output: &str,
    concurrency: usize,
) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(input)
        .with_context(|| format!("opening batch input '{input}'"))?;

    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut tasks = vec![];

    for (index, row) in reader.deserialize::<BatchRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(row = index + 1, error = %e, "Skipping malformed batch row");
                continue;
            }
        };

        let sem = semaphore.clone();
        let pipeline = pipeline.clone();
        let row_span = tracing::info_span!(
            "resolve_row",
            row = index + 1,
            lat = row.lat,
            lon = row.lon,
            month = row.month,
        );

        let task = tokio::spawn(
            async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    let err = PipelineError::config("batch semaphore closed");
                    return ResolutionRecord::from_error(row.lat, row.lon, row.month, &err);
                };
                match pipeline.resolve(row.lat, row.lon, row.month).await {
                    Ok(resolution) => {
                        info!(soil_type = %resolution.soil_type, "Row resolved");
                        ResolutionRecord::from_resolution(row.month, &resolution)
                    }
                    Err(e) => {
                        warn!(stage = %e.stage(), error = %e, "Row failed");
                        ResolutionRecord::from_error(row.lat, row.lon, row.month, &e)
                    }
                }
            }
            .instrument(row_span),
        );

        tasks.push(task);
    }

    info!(rows = tasks.len(), "Batch dispatched");

    let mut resolved = 0usize;
    let mut failed = 0usize;
    // Awaiting in dispatch order keeps the output rows in input order.
    for task in tasks {
        match task.await {
            Ok(record) => {
                if record.is_error() {
                    failed += 1;
                } else {
                    resolved += 1;
                }
                append_record(output, &record)?;
            }
            Err(e) => {
                failed += 1;
                error!(error = %e, "Batch worker panicked");
            }
        }
    }

    info!(resolved, failed, output, "Batch finished");
    Ok(())
}
