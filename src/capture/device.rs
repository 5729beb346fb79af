//! Device abstraction for the image sensor.
//!
//! The session only depends on this trait, so real hardware backends and
//! the scripted mock used in tests are interchangeable.

use super::Frame;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors reported by a device backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("camera device not found: {0}")]
    NotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("camera is not open")]
    NotOpen,
    #[error("failed to read frame: {0}")]
    ReadFailed(String),
    #[error("parameter `{0}` is not supported by this device")]
    Unsupported(DeviceParameter),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Named numeric device parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceParameter {
    FrameWidth,
    FrameHeight,
    Fps,
    Exposure,
    WhiteBalance,
    Brightness,
    Contrast,
}

impl DeviceParameter {
    /// Every parameter, in the order they are applied on open.
    pub const ALL: [DeviceParameter; 7] = [
        DeviceParameter::FrameWidth,
        DeviceParameter::FrameHeight,
        DeviceParameter::Fps,
        DeviceParameter::Exposure,
        DeviceParameter::WhiteBalance,
        DeviceParameter::Brightness,
        DeviceParameter::Contrast,
    ];

    /// Canonical snake_case name.
    pub fn name(self) -> &'static str {
        match self {
            DeviceParameter::FrameWidth => "width",
            DeviceParameter::FrameHeight => "height",
            DeviceParameter::Fps => "fps",
            DeviceParameter::Exposure => "exposure",
            DeviceParameter::WhiteBalance => "white_balance",
            DeviceParameter::Brightness => "brightness",
            DeviceParameter::Contrast => "contrast",
        }
    }
}

impl fmt::Display for DeviceParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceParameter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "width" => Ok(DeviceParameter::FrameWidth),
            "height" => Ok(DeviceParameter::FrameHeight),
            "fps" => Ok(DeviceParameter::Fps),
            "exposure" => Ok(DeviceParameter::Exposure),
            "white_balance" | "whiteBalance" => Ok(DeviceParameter::WhiteBalance),
            "brightness" => Ok(DeviceParameter::Brightness),
            "contrast" => Ok(DeviceParameter::Contrast),
            _ => Err(()),
        }
    }
}

/// Trait for camera device backends.
///
/// Calls are never made concurrently; the owning session serializes them.
pub trait CameraDevice: Send {
    /// Acquires the device with the given index.
    fn open(&mut self, device_id: u32) -> Result<(), DeviceError>;

    /// Sets a single named parameter.
    fn set_parameter(&mut self, parameter: DeviceParameter, value: f64)
        -> Result<(), DeviceError>;

    /// Reads back a parameter, if the device reports it.
    fn get_parameter(&self, parameter: DeviceParameter) -> Option<f64>;

    /// Reads a single frame synchronously.
    fn read(&mut self) -> Result<Frame, DeviceError>;

    /// Checks if the device is currently open.
    fn is_open(&self) -> bool;

    /// Releases the device. Must be safe to call when already closed.
    fn close(&mut self);
}

impl<D: CameraDevice + ?Sized> CameraDevice for Box<D> {
    fn open(&mut self, device_id: u32) -> Result<(), DeviceError> {
        (**self).open(device_id)
    }

    fn set_parameter(
        &mut self,
        parameter: DeviceParameter,
        value: f64,
    ) -> Result<(), DeviceError> {
        (**self).set_parameter(parameter, value)
    }

    fn get_parameter(&self, parameter: DeviceParameter) -> Option<f64> {
        (**self).get_parameter(parameter)
    }

    fn read(&mut self) -> Result<Frame, DeviceError> {
        (**self).read()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
