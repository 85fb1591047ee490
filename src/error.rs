// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Error types for Oakwatch

use thiserror::Error;

/// Result type alias for Oakwatch operations
pub type Result<T> = std::result::Result<T, OakwatchError>;

/// Oakwatch error types
#[derive(Error, Debug)]
pub enum OakwatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("No removable drive mounted")]
    NoMountFound,

    #[error("No qualifying images found on drive")]
    NoImagesFound,

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Scorer API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
