// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Classification adapter and severity tiers
//!
//! Normalizes a decoded photo into the tensor the model was trained on,
//! obtains a probability from the external scorer, and maps probabilities to
//! the four severity tiers used throughout the reports.

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use std::sync::Arc;

use crate::scorer::{PixelTensor, Scorer};
use crate::{OakwatchError, Result};

/// Severity tiers, ordered most to least severe. Flat report output follows
/// this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Has,
    HighChance,
    Possible,
    None,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Has, Tier::HighChance, Tier::Possible, Tier::None];

    /// Thresholds are strict lower bounds: exactly 99.5 is still HighChance.
    pub fn from_percent(p: f32) -> Self {
        if p > 99.5 {
            Tier::Has
        } else if p > 90.0 {
            Tier::HighChance
        } else if p > 70.0 {
            Tier::Possible
        } else {
            Tier::None
        }
    }

    /// Report label, kept verbatim from the survey crews' original sheets.
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Has => "THIS PICTURE HAS OAK WILT",
            Tier::HighChance => "THERE'S A HIGH CHANCE OF OAK WILT",
            Tier::Possible => "POSSIBILITY OF OAK WILT",
            Tier::None => "DOES NOT HAVE OAK WILT",
        }
    }
}

/// Adapter between decoded photos and the external scorer.
pub struct ClassificationAdapter {
    scorer: Arc<dyn Scorer>,
    input_edge: u32,
}

impl ClassificationAdapter {
    pub fn new(scorer: Arc<dyn Scorer>, input_edge: u32) -> Self {
        Self { scorer, input_edge }
    }

    pub fn input_edge(&self) -> u32 {
        self.input_edge
    }

    /// Score one prepared tensor, returning the probability as a percent
    /// (0 - 100).
    ///
    /// Scorer failures surface as errors here; the orchestrator decides the
    /// fallback (treat as 0%, keep scanning) and records the reason.
    pub async fn probability_percent(&self, tensor: &PixelTensor) -> Result<f32> {
        let probability = self.scorer.score(tensor).await?;
        Ok(probability * 100.0)
    }
}

impl Clone for ClassificationAdapter {
    fn clone(&self) -> Self {
        Self { scorer: Arc::clone(&self.scorer), input_edge: self.input_edge }
    }
}

/// Resize to the model's square input and normalize pixels to [0, 1].
///
/// Must match the preprocessing the model was trained with: plain bilinear
/// resize (no aspect preservation), RGB channel order, divide by 255.
pub fn preprocess(img: &DynamicImage, edge: u32) -> Result<PixelTensor> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(OakwatchError::Classifier("Degenerate image (zero dimension)".to_string()));
    }

    let resized = img.resize_exact(edge, edge, FilterType::Triangle).to_rgb8();

    let tensor: PixelTensor = resized
        .rows()
        .map(|row| {
            row.map(|px| {
                [
                    px.0[0] as f32 / 255.0,
                    px.0[1] as f32 / 255.0,
                    px.0[2] as f32 / 255.0,
                ]
            })
            .collect()
        })
        .collect();

    Ok(tensor)
}
