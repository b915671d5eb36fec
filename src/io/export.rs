//! CSV export for simulation snapshots.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::Snapshot;

/// Column header for CSV export, one row per meter per tick.
const HEADER: &str = "timestamp,meter_id,surplus,transferred,counterparty,participation,\
                      grid_load,grid_temperature,voltage,intensity";

/// Exports snapshots to a CSV file at the given path.
///
/// # Arguments
///
/// * `snapshots` - Snapshots of a finished run
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(snapshots: &[Snapshot], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(snapshots, buf)
}

/// Writes snapshots as CSV to any writer.
///
/// Meters without a counterparty get an empty cell. Output is identical
/// for identical input.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(snapshots: &[Snapshot], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for s in snapshots {
        let timestamp = s.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string();
        let grid = s.readings;
        for m in &s.meters {
            wtr.write_record(&[
                timestamp.clone(),
                m.id.to_string(),
                format!("{:.4}", m.surplus),
                format!("{:.4}", m.transferred),
                m.counterparty.map(|c| c.to_string()).unwrap_or_default(),
                m.participation.to_string(),
                format!("{:.4}", grid.load),
                format!("{:.4}", grid.temperature),
                format!("{:.4}", grid.voltage),
                format!("{:.4}", grid.intensity),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
