// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! EXIF geolocation with a fixed fallback
//!
//! Every record needs *some* coordinate so the GeoJSON report can always be
//! mapped. Photos without usable GPS tags get a constant fallback location,
//! but the result type keeps embedded and fallback values distinguishable so
//! reports can mark synthetic positions instead of silently mixing them in.

use exif::{In, Reader, Tag, Value};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Decimal-degree pair. Both fields always present; there is no partial state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// A coordinate plus where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoTag {
    /// Parsed from the photo's EXIF GPS tags
    Embedded(Coordinate),
    /// The configured constant, used when tags are missing or unreadable
    Fallback(Coordinate),
}

impl GeoTag {
    pub fn coordinate(&self) -> Coordinate {
        match self {
            GeoTag::Embedded(c) | GeoTag::Fallback(c) => *c,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, GeoTag::Fallback(_))
    }
}

/// Extracts per-photo coordinates. Never fails: every error path collapses to
/// the fallback.
#[derive(Debug, Clone)]
pub struct GeoTagExtractor {
    fallback: Coordinate,
}

impl GeoTagExtractor {
    pub fn new(fallback: Coordinate) -> Self {
        Self { fallback }
    }

    pub fn extract(&self, path: &Path) -> GeoTag {
        match read_embedded(path) {
            Some(coord) => GeoTag::Embedded(coord),
            None => {
                debug!("No usable GPS tags in {:?}, using fallback coordinate", path);
                GeoTag::Fallback(self.fallback)
            }
        }
    }
}

/// Read the four GPS tags the conversion needs. All four must be present and
/// parseable, otherwise the photo counts as untagged.
fn read_embedded(path: &Path) -> Option<Coordinate> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(&file);
    let exif = Reader::new().read_from_container(&mut reader).ok()?;

    let lat_dms = rational_triplet(exif.get_field(Tag::GPSLatitude, In::PRIMARY)?)?;
    let lat_ref = ascii_ref(exif.get_field(Tag::GPSLatitudeRef, In::PRIMARY)?)?;
    let lon_dms = rational_triplet(exif.get_field(Tag::GPSLongitude, In::PRIMARY)?)?;
    let lon_ref = ascii_ref(exif.get_field(Tag::GPSLongitudeRef, In::PRIMARY)?)?;

    let lat = signed_degrees(lat_dms, &lat_ref, "N")?;
    let lon = signed_degrees(lon_dms, &lon_ref, "E")?;

    Some(Coordinate { lat, lon })
}

fn rational_triplet(field: &exif::Field) -> Option<[f64; 3]> {
    match &field.value {
        Value::Rational(v) if v.len() >= 3 => {
            Some([v[0].to_f64(), v[1].to_f64(), v[2].to_f64()])
        }
        _ => None,
    }
}

fn ascii_ref(field: &exif::Field) -> Option<String> {
    match &field.value {
        Value::Ascii(v) => v
            .first()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .map(|s| s.trim().to_string()),
        _ => None,
    }
}

/// DMS to decimal degrees, negated when the reference is not the positive
/// hemisphere marker.
fn signed_degrees(dms: [f64; 3], reference: &str, positive: &str) -> Option<f64> {
    let magnitude = dms[0] + dms[1] / 60.0 + dms[2] / 3600.0;
    if !magnitude.is_finite() {
        return None;
    }
    Some(if reference == positive { magnitude } else { -magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dms_conversion_matches_known_fixture() {
        // 42°57'48"N, 85°40'5"W
        let lat = signed_degrees([42.0, 57.0, 48.0], "N", "N").unwrap();
        let lon = signed_degrees([85.0, 40.0, 5.0], "W", "E").unwrap();

        assert!((lat - 42.9634).abs() < 1e-3);
        assert!((lon - (-85.6681)).abs() < 1e-3);
    }

    #[test]
    fn southern_and_western_references_negate() {
        let south = signed_degrees([10.0, 30.0, 0.0], "S", "N").unwrap();
        assert!((south + 10.5).abs() < 1e-9);

        let east = signed_degrees([10.0, 30.0, 0.0], "E", "E").unwrap();
        assert!((east - 10.5).abs() < 1e-9);
    }

    #[test]
    fn zero_denominator_is_rejected() {
        // 1/0 rationals come out as infinity from the exif crate
        assert!(signed_degrees([f64::INFINITY, 0.0, 0.0], "N", "N").is_none());
    }

    #[test]
    fn unreadable_file_falls_back() {
        let fallback = Coordinate { lat: 42.9634, lon: -85.6681 };
        let extractor = GeoTagExtractor::new(fallback);

        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("not-a-photo.jpg");
        std::fs::write(&bogus, b"definitely not jpeg").unwrap();

        let tag = extractor.extract(&bogus);
        assert!(tag.is_synthetic());
        assert_eq!(tag.coordinate(), fallback);
    }

    #[test]
    fn missing_file_falls_back() {
        let fallback = Coordinate { lat: 1.0, lon: 2.0 };
        let extractor = GeoTagExtractor::new(fallback);

        let tag = extractor.extract(Path::new("/nonexistent/photo.jpg"));
        assert!(tag.is_synthetic());
    }
}
