//! Camera configuration and the on-disk configuration file.
//!
//! Values are passed through to the device as-is. Only the fields that
//! the session and supervisor depend on (dimensions and frame rate) are
//! range-checked.

use super::device::DeviceParameter;
use crate::preprocess::{ParamsError, PipelineParams};
use crate::supervisor::SupervisorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest frame rate accepted by [`CameraConfig::validate`].
pub const MAX_FPS: u32 = 240;

/// Desired camera configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera device index.
    pub device_id: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// Exposure value in device units (negative values are common on UVC).
    pub exposure: i32,
    /// White balance color temperature, roughly Kelvin.
    pub white_balance: i32,
    /// Brightness in device units.
    pub brightness: i32,
    /// Contrast in device units.
    pub contrast: i32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 640,
            height: 480,
            fps: 30,
            exposure: -4,
            white_balance: 4000,
            brightness: 150,
            contrast: 50,
        }
    }
}

impl CameraConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }

    /// Device-facing values, in the order they are applied on open.
    pub fn parameters(&self) -> [(DeviceParameter, f64); 7] {
        [
            (DeviceParameter::FrameWidth, f64::from(self.width)),
            (DeviceParameter::FrameHeight, f64::from(self.height)),
            (DeviceParameter::Fps, f64::from(self.fps)),
            (DeviceParameter::Exposure, f64::from(self.exposure)),
            (DeviceParameter::WhiteBalance, f64::from(self.white_balance)),
            (DeviceParameter::Brightness, f64::from(self.brightness)),
            (DeviceParameter::Contrast, f64::from(self.contrast)),
        ]
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-240 fps)")]
    InvalidFrameRate,
    #[error("value {value} out of range for parameter `{name}`")]
    OutOfRange { name: &'static str, value: i64 },
    #[error("invalid pipeline parameters: {0}")]
    Pipeline(#[from] ParamsError),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub pipeline: PipelineParams,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What the command-line runner does with captured frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Frames to deliver before stopping (0 runs until interrupted).
    pub frame_count: u64,
    /// Run every frame through the preprocessing pipeline.
    pub preprocess: bool,
    /// Log per-stage statistics for each preprocessed frame.
    pub inspect_stages: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frame_count: 100,
            preprocess: true,
            inspect_stages: false,
        }
    }
}

impl FileConfig {
    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.camera.validate()?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }
}
