//! Tunable pipeline parameters.

use serde::{Deserialize, Serialize};

/// Parameters for a single pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Luma filter strength for non-local-means denoising.
    pub denoise_strength: f32,
    /// Chroma filter strength for non-local-means denoising.
    pub denoise_color_strength: f32,
    /// CLAHE clip limit, relative to a uniform histogram.
    pub contrast_clip_limit: f32,
    /// CLAHE tiles across and down.
    pub contrast_tile_grid: (u32, u32),
    /// Canny lower hysteresis threshold.
    pub edge_low_threshold: f32,
    /// Canny upper hysteresis threshold.
    pub edge_high_threshold: f32,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            denoise_strength: 10.0,
            denoise_color_strength: 10.0,
            contrast_clip_limit: 2.0,
            contrast_tile_grid: (8, 8),
            edge_low_threshold: 50.0,
            edge_high_threshold: 150.0,
        }
    }
}

impl PipelineParams {
    /// Checks ranges and the threshold ordering.
    ///
    /// Inverted edge thresholds are rejected, never swapped.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let finite = [
            ("denoise_strength", self.denoise_strength),
            ("denoise_color_strength", self.denoise_color_strength),
            ("contrast_clip_limit", self.contrast_clip_limit),
            ("edge_low_threshold", self.edge_low_threshold),
            ("edge_high_threshold", self.edge_high_threshold),
        ];
        if let Some((name, _)) = finite.into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ParamsError::NotFinite(name));
        }
        if self.denoise_strength < 0.0 || self.denoise_color_strength < 0.0 {
            return Err(ParamsError::NegativeDenoiseStrength);
        }
        if self.contrast_clip_limit <= 0.0 {
            return Err(ParamsError::InvalidClipLimit(self.contrast_clip_limit));
        }
        if self.contrast_tile_grid.0 == 0 || self.contrast_tile_grid.1 == 0 {
            return Err(ParamsError::EmptyTileGrid);
        }
        if self.edge_high_threshold < self.edge_low_threshold {
            return Err(ParamsError::ThresholdOrder {
                low: self.edge_low_threshold,
                high: self.edge_high_threshold,
            });
        }
        Ok(())
    }
}

/// Parameter validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("`{0}` must be a finite number")]
    NotFinite(&'static str),
    #[error("denoise strengths must be non-negative")]
    NegativeDenoiseStrength,
    #[error("contrast clip limit must be positive, got {0}")]
    InvalidClipLimit(f32),
    #[error("contrast tile grid must be at least 1x1")]
    EmptyTileGrid,
    #[error("edge high threshold {high} is below low threshold {low}")]
    ThresholdOrder { low: f32, high: f32 },
}
