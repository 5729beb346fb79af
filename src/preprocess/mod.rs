//! Deterministic image enhancement pipeline.
//!
//! Six stages run in a fixed order, each consuming the previous stage's
//! output and producing a new frame:
//!
//! ```text
//! denoise → grayscale → contrast (CLAHE) → edges (blur + Canny)
//!                              │                 ↓
//!                              │            morphology (close)
//!                              ↓                 ↓
//!                              └───────→ fusion (0.8 / 0.2)
//! ```
//!
//! The pipeline holds no mutable state, so it can run concurrently on
//! independent frames. An optional inspector sees every intermediate frame
//! for tuning without being able to change the result.
//!
//! # Example
//!
//! ```
//! use relume_capture::capture::Frame;
//! use relume_capture::preprocess::{Preprocessor, PipelineParams, Stage};
//!
//! let frame = Frame::bgr(vec![90; 16 * 16 * 3], 16, 16, 1);
//! let preprocessor = Preprocessor::new(PipelineParams::default()).unwrap();
//!
//! let mut seen = Vec::new();
//! let output = preprocessor
//!     .process_inspected(&frame, &mut |stage: Stage, _: &Frame| seen.push(stage))
//!     .unwrap();
//!
//! assert_eq!(seen, Stage::ALL.to_vec());
//! assert_eq!(output.channels(), 1);
//! ```

mod clahe;
mod denoise;
mod edges;
mod fusion;
mod grayscale;
mod morphology;
mod params;

pub use fusion::{BASE_WEIGHT, EDGE_WEIGHT};
pub use params::{ParamsError, PipelineParams};

use crate::capture::Frame;
use std::fmt;
use thiserror::Error;

/// Errors returned by a pipeline invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("input frame is empty")]
    EmptyInput,
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    MalformedFrame { expected: usize, actual: usize },
    #[error("invalid pipeline parameters: {0}")]
    InvalidParams(#[from] ParamsError),
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Denoise,
    Grayscale,
    Contrast,
    Edges,
    Morphology,
    Fusion,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::Denoise,
        Stage::Grayscale,
        Stage::Contrast,
        Stage::Edges,
        Stage::Morphology,
        Stage::Fusion,
    ];

    /// Short stage name for logs and debug windows.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Denoise => "denoise",
            Stage::Grayscale => "grayscale",
            Stage::Contrast => "contrast",
            Stage::Edges => "edges",
            Stage::Morphology => "morphology",
            Stage::Fusion => "fusion",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collects a copy of every intermediate frame.
///
/// Pass [`StageRecorder::inspector`] to
/// [`Preprocessor::process_inspected`] to keep stage outputs for tuning.
#[derive(Debug, Default)]
pub struct StageRecorder {
    frames: Vec<(Stage, Frame)>,
}

impl StageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a callback that records into this recorder.
    pub fn inspector(&mut self) -> impl FnMut(Stage, &Frame) + '_ {
        move |stage, frame| self.frames.push((stage, frame.clone()))
    }

    /// Recorded stage outputs in execution order.
    pub fn frames(&self) -> &[(Stage, Frame)] {
        &self.frames
    }

    /// Output of a particular stage, if recorded.
    pub fn get(&self, stage: Stage) -> Option<&Frame> {
        self.frames
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, frame)| frame)
    }
}

/// A validated pipeline configuration.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    params: PipelineParams,
}

impl Preprocessor {
    /// Validates `params`; inverted edge thresholds are rejected.
    pub fn new(params: PipelineParams) -> Result<Self, PipelineError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Returns the parameters in use.
    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Runs all stages and returns the fused single-channel frame.
    pub fn process(&self, frame: &Frame) -> Result<Frame, PipelineError> {
        self.run(frame, None)
    }

    /// Like [`process`](Self::process), calling `inspect` after every stage.
    pub fn process_inspected(
        &self,
        frame: &Frame,
        inspect: &mut dyn FnMut(Stage, &Frame),
    ) -> Result<Frame, PipelineError> {
        self.run(frame, Some(inspect))
    }

    fn run(
        &self,
        frame: &Frame,
        mut inspect: Option<&mut dyn FnMut(Stage, &Frame)>,
    ) -> Result<Frame, PipelineError> {
        if frame.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if !frame.is_valid() {
            return Err(PipelineError::MalformedFrame {
                expected: frame.pixel_count() * frame.channels(),
                actual: frame.pixels().len(),
            });
        }

        let p = &self.params;
        let mut emit = |stage: Stage, out: &Frame| {
            tracing::debug!(%stage, sequence = out.sequence(), "Stage complete");
            if let Some(inspect) = inspect.as_mut() {
                inspect(stage, out);
            }
        };

        let denoised = denoise::denoise(frame, p.denoise_strength, p.denoise_color_strength);
        emit(Stage::Denoise, &denoised);

        let gray = grayscale::to_gray(&denoised);
        emit(Stage::Grayscale, &gray);

        let equalized = clahe::equalize(&gray, p.contrast_clip_limit, p.contrast_tile_grid);
        emit(Stage::Contrast, &equalized);

        let blurred = edges::gaussian_blur(&equalized);
        let edge_map = edges::canny(&blurred, p.edge_low_threshold, p.edge_high_threshold);
        emit(Stage::Edges, &edge_map);

        let closed = morphology::close(&edge_map);
        emit(Stage::Morphology, &closed);

        let fused = fusion::fuse(&equalized, &closed);
        emit(Stage::Fusion, &fused);

        Ok(fused)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            params: PipelineParams::default(),
        }
    }
}

/// Runs the pipeline with default parameters.
pub fn preprocess(frame: &Frame) -> Result<Frame, PipelineError> {
    Preprocessor::default().process(frame)
}

/// Runs the pipeline with explicit parameters.
pub fn preprocess_with(frame: &Frame, params: &PipelineParams) -> Result<Frame, PipelineError> {
    Preprocessor::new(params.clone())?.process(frame)
}

/// Reflects an out-of-range index without repeating the border pixel.
pub(crate) fn reflect101(i: isize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let last = n as isize - 1;
    let mut i = i;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}
