//! Artifact persistence: CSV, JSON, GeoJSON, and HTML writers.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Appends one serializable record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    ensure_parent(path)?;
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Writes a fresh CSV file from a slice of records, headers first.
pub fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = records.len(), "CSV written");
    Ok(())
}

/// Writes a value as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "JSON written");
    Ok(())
}

/// Writes a GeoJSON feature collection.
pub fn write_geojson(path: &Path, collection: &geojson::FeatureCollection) -> Result<()> {
    ensure_parent(path)?;
    let body = serde_json::to_string_pretty(collection)?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), features = collection.features.len(), "GeoJSON written");
    Ok(())
}

/// Writes an HTML artifact.
pub fn write_html(path: &Path, html: &str) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, html).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = html.len(), "HTML artifact written");
    Ok(())
}
