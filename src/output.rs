//! Output formatting and persistence for resolution records.
//!
//! Records go to stdout as pretty text or JSON, or get appended to a CSV file.

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::report::ResolutionRecord;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Human-readable summary of one record.
pub fn format_pretty(record: &ResolutionRecord) -> String {
    let place = record.location_name.as_deref().unwrap_or("-");
    if let (Some(stage), Some(message)) = (&record.error_stage, &record.error_message) {
        return format!(
            "({:.4}, {:.4}) month {} [{}]: {} failed: {}",
            record.lat, record.lon, record.requested_month, place, stage, message
        );
    }
    let value = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into());
    format!(
        "({:.4}, {:.4}) month {} [{}]\n  soil type   {} (code {})\n  ph {}  K {}  P {}  N {}\n  temperature {} °C  humidity {} %\n  soil source {}",
        record.lat,
        record.lon,
        record.month.unwrap_or(record.requested_month),
        place,
        record.soil_type.as_deref().unwrap_or("-"),
        record.soil_type_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
        value(record.ph),
        value(record.k),
        value(record.p),
        value(record.n),
        value(record.temperature_c),
        value(record.humidity_pct),
        record.soil_source.as_deref().unwrap_or("-"),
    )
}

pub fn print_pretty(record: &ResolutionRecord) {
    println!("{}", format_pretty(record));
}

/// Prints any serializable value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a [`ResolutionRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, record: &ResolutionRecord) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // header only on a fresh file
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}
