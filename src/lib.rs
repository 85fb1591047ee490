// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Oakwatch: USB photo triage for oak wilt field surveys
//!
//! Scans a removable drive for recently captured photos, scores each against
//! an external oak wilt classifier, attaches EXIF geolocation, and persists
//! CSV/GeoJSON reports alongside an HTTP surface that serves the originals.

pub mod classifier;
pub mod config;
pub mod discover;
pub mod error;
pub mod geotag;
pub mod index;
pub mod mount;
pub mod report;
pub mod scan;
pub mod scorer;
pub mod web;

pub use config::AppConfig;
pub use error::{OakwatchError, Result};
