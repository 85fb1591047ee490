// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Configuration management for Oakwatch

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Scan (device + selection) settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// External classifier settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Geotag fallback settings
    #[serde(default)]
    pub geotag: GeotagConfig,

    /// Web server settings
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanConfig {
    /// Well-known mount location of the removable drive
    #[serde(default = "default_mount_path")]
    pub mount_path: String,

    /// Newest-first cap on how many candidates one scan will process
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Only files modified within this many days qualify
    #[serde(default = "default_recency_days")]
    pub recency_days: i64,

    /// Per-file workers during the processing stage
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    /// Predict endpoint of the serving process hosting the model
    #[serde(default = "default_scorer_url")]
    pub url: String,

    /// Square edge the model was trained on
    #[serde(default = "default_input_edge")]
    pub input_edge: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeotagConfig {
    /// Substitute coordinate when EXIF GPS is missing or unreadable
    #[serde(default = "default_fallback_lat")]
    pub fallback_lat: f64,
    #[serde(default = "default_fallback_lon")]
    pub fallback_lon: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

// Default value functions
fn default_mount_path() -> String { "/media/pi/usb".to_string() }
fn default_max_candidates() -> usize { 200 }
fn default_recency_days() -> i64 { 14 }
fn default_workers() -> usize { 4 }
fn default_scorer_url() -> String {
    "http://localhost:8501/v1/models/oak_wilt:predict".to_string()
}
fn default_input_edge() -> u32 { 256 }
fn default_timeout() -> u64 { 120 }
// Grand Rapids, MI. Survey crews operate out of the county office there,
// so untagged photos at least land on the right map.
fn default_fallback_lat() -> f64 { 42.9634 }
fn default_fallback_lon() -> f64 { -85.6681 }
fn default_web_host() -> String { "0.0.0.0".to_string() }
fn default_web_port() -> u16 { 5001 }

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mount_path: default_mount_path(),
            max_candidates: default_max_candidates(),
            recency_days: default_recency_days(),
            workers: default_workers(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: default_scorer_url(),
            input_edge: default_input_edge(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for GeotagConfig {
    fn default() -> Self {
        Self {
            fallback_lat: default_fallback_lat(),
            fallback_lon: default_fallback_lon(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            classifier: ClassifierConfig::default(),
            geotag: GeotagConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::OakwatchError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
