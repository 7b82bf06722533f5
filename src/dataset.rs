//! Interchange file: a pretty-printed JSON array of readings written once by the
//! generator and read once per benchmark run.

use crate::error::BenchError;
use crate::reading::{validate_batch, Reading};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub fn save(path: &Path, readings: &[Reading]) -> Result<(), BenchError> {
    let file = File::create(path).map_err(|err| {
        BenchError::Serialization(format!("failed to create {}: {err}", path.display()))
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, readings).map_err(|err| {
        BenchError::Serialization(format!("failed to encode {}: {err}", path.display()))
    })?;
    writer.flush().map_err(|err| {
        BenchError::Serialization(format!("failed to write {}: {err}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), rows = readings.len(), "wrote dataset");
    Ok(())
}

/// Reads and shape-checks a dataset; a malformed file never reaches an adapter.
pub fn load(path: &Path) -> Result<Vec<Reading>, BenchError> {
    let file = File::open(path).map_err(|err| {
        BenchError::Serialization(format!("failed to open {}: {err}", path.display()))
    })?;
    let readings: Vec<Reading> = serde_json::from_reader(BufReader::new(file)).map_err(|err| {
        BenchError::Serialization(format!("failed to parse {}: {err}", path.display()))
    })?;
    validate_batch(&readings)?;
    tracing::debug!(path = %path.display(), rows = readings.len(), "loaded dataset");
    Ok(readings)
}
