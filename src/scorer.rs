// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Client for the external classifier serving process
//!
//! The model itself lives behind a TF-Serving-style REST predict endpoint;
//! this module only knows how to ship a pixel tensor there and pull the one
//! scalar back out.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{OakwatchError, Result};

/// One decoded image as `height x width` rows of `[r, g, b]` in [0, 1].
pub type PixelTensor = Vec<Vec<[f32; 3]>>;

/// Seam to the external binary classifier: fixed-size pixel buffer in, single
/// probability (0.0 - 1.0) out.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, pixels: &PixelTensor) -> Result<f32>;
}

/// Scorer backed by an HTTP predict endpoint.
pub struct HttpScorer {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    // The model expects a batch; we always send a batch of one.
    instances: [&'a PixelTensor; 1],
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f32>>,
}

impl HttpScorer {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(OakwatchError::Api)?;

        Ok(Self { client, url: url.to_string() })
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(&self, pixels: &PixelTensor) -> Result<f32> {
        let request = PredictRequest { instances: [pixels] };

        debug!("Sending predict request to {}", self.url);

        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(OakwatchError::Classifier(format!(
                "Scorer returned status {}",
                response.status()
            )));
        }

        let result: PredictResponse = response.json().await?;
        scalar_prediction(&result)
    }
}

fn scalar_prediction(response: &PredictResponse) -> Result<f32> {
    response
        .predictions
        .first()
        .and_then(|row| row.first())
        .copied()
        .ok_or_else(|| OakwatchError::Classifier("Scorer returned an empty prediction".to_string()))
}
