// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Report persistence
//!
//! Writes the scan result to the drive itself as a CSV table and a GeoJSON
//! FeatureCollection. Reports from prior runs are never overwritten: the
//! writers probe `results_1`, `results_2`, ... until a free name turns up.

use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::scan::ScanResult;
use crate::Result;

/// Persist the flat record table as `results.csv` (or the next free name).
pub fn write_csv(result: &ScanResult, dir: &Path) -> Result<PathBuf> {
    let path = unique_report_path(dir, "results", "csv");

    let mut writer = csv::Writer::from_path(&path)?;
    for record in result.all() {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!("CSV report written to {:?}", path);
    Ok(path)
}

/// Persist the records as an RFC 7946 FeatureCollection, `[lon, lat]` point
/// geometry per feature.
///
/// Every record carries a coordinate (the geotag fallback guarantees it), so
/// every record becomes a feature; synthetic positions are flagged in the
/// properties rather than dropped.
pub fn write_geojson(result: &ScanResult, dir: &Path) -> Result<PathBuf> {
    let path = unique_report_path(dir, "results", "geojson");

    let features: Vec<serde_json::Value> = result
        .all()
        .map(|record| {
            let coord = record.geotag.coordinate();
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [coord.lon, coord.lat],
                },
                "properties": {
                    "filename": record.filename,
                    "prediction": record.prediction_display(),
                    "classification": record.tier.label(),
                    "synthetic_location": record.geotag.is_synthetic(),
                },
            })
        })
        .collect();

    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });

    std::fs::write(&path, serde_json::to_string_pretty(&collection)?)?;

    info!("GeoJSON report written to {:?}", path);
    Ok(path)
}

/// First unused of `stem.ext`, `stem_1.ext`, `stem_2.ext`, ...
fn unique_report_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let base = dir.join(format!("{}.{}", stem, ext));
    if !base.exists() {
        return base;
    }

    let mut n = 1;
    loop {
        let probe = dir.join(format!("{}_{}.{}", stem, n, ext));
        if !probe.exists() {
            return probe;
        }
        n += 1;
    }
}
