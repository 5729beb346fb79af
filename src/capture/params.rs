//! Desired camera parameters and partial updates.
//!
//! The store is purely in-memory. Pushing values to the device is the
//! session's job.

use super::config::{CameraConfig, ConfigError};
use super::device::DeviceParameter;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed partial update of [`CameraConfig`].
///
/// Unset fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterUpdate {
    pub device_id: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub exposure: Option<i32>,
    pub white_balance: Option<i32>,
    pub brightness: Option<i32>,
    pub contrast: Option<i32>,
}

/// A field name the store does not know about.
///
/// Reported back to the caller instead of failing the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownParameter {
    pub name: String,
}

impl fmt::Display for UnknownParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown camera parameter `{}`", self.name)
    }
}

/// Result of a named update: the parsed changes plus anything ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedUpdate {
    pub update: ParameterUpdate,
    pub unknown: Vec<UnknownParameter>,
}

fn narrow<T: TryFrom<i64>>(name: &'static str, value: i64) -> Result<T, ConfigError> {
    T::try_from(value).map_err(|_| ConfigError::OutOfRange { name, value })
}

impl ParameterUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parses `(name, value)` pairs from a dynamic source.
    ///
    /// Unknown names are collected rather than rejected. A known name whose
    /// value does not fit the field type (e.g. a negative width) is an error.
    pub fn from_named<'a, I>(pairs: I) -> Result<NamedUpdate, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let mut update = ParameterUpdate::default();
        let mut unknown = Vec::new();

        for (name, value) in pairs {
            if name == "device_id" || name == "deviceId" {
                update.device_id = Some(narrow("device_id", value)?);
                continue;
            }
            let Ok(parameter) = name.parse::<DeviceParameter>() else {
                unknown.push(UnknownParameter {
                    name: name.to_string(),
                });
                continue;
            };
            match parameter {
                DeviceParameter::FrameWidth => update.width = Some(narrow("width", value)?),
                DeviceParameter::FrameHeight => update.height = Some(narrow("height", value)?),
                DeviceParameter::Fps => update.fps = Some(narrow("fps", value)?),
                DeviceParameter::Exposure => update.exposure = Some(narrow("exposure", value)?),
                DeviceParameter::WhiteBalance => {
                    update.white_balance = Some(narrow("white_balance", value)?)
                }
                DeviceParameter::Brightness => {
                    update.brightness = Some(narrow("brightness", value)?)
                }
                DeviceParameter::Contrast => update.contrast = Some(narrow("contrast", value)?),
            }
        }

        Ok(NamedUpdate { update, unknown })
    }

    /// Device-facing changes, in the same order as a full configure.
    pub fn changes(&self) -> Vec<(DeviceParameter, f64)> {
        [
            (DeviceParameter::FrameWidth, self.width.map(f64::from)),
            (DeviceParameter::FrameHeight, self.height.map(f64::from)),
            (DeviceParameter::Fps, self.fps.map(f64::from)),
            (DeviceParameter::Exposure, self.exposure.map(f64::from)),
            (DeviceParameter::WhiteBalance, self.white_balance.map(f64::from)),
            (DeviceParameter::Brightness, self.brightness.map(f64::from)),
            (DeviceParameter::Contrast, self.contrast.map(f64::from)),
        ]
        .into_iter()
        .filter_map(|(parameter, value)| value.map(|v| (parameter, v)))
        .collect()
    }

    /// Returns `config` with every set field overwritten.
    pub fn merged_into(&self, config: &CameraConfig) -> CameraConfig {
        CameraConfig {
            device_id: self.device_id.unwrap_or(config.device_id),
            width: self.width.unwrap_or(config.width),
            height: self.height.unwrap_or(config.height),
            fps: self.fps.unwrap_or(config.fps),
            exposure: self.exposure.unwrap_or(config.exposure),
            white_balance: self.white_balance.unwrap_or(config.white_balance),
            brightness: self.brightness.unwrap_or(config.brightness),
            contrast: self.contrast.unwrap_or(config.contrast),
        }
    }

    /// Writes a single forwarded device parameter into `config`.
    pub(crate) fn record(config: &mut CameraConfig, parameter: DeviceParameter, value: f64) {
        match parameter {
            DeviceParameter::FrameWidth => config.width = value as u32,
            DeviceParameter::FrameHeight => config.height = value as u32,
            DeviceParameter::Fps => config.fps = value as u32,
            DeviceParameter::Exposure => config.exposure = value as i32,
            DeviceParameter::WhiteBalance => config.white_balance = value as i32,
            DeviceParameter::Brightness => config.brightness = value as i32,
            DeviceParameter::Contrast => config.contrast = value as i32,
        }
    }
}

/// Holds the desired camera configuration.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    current: CameraConfig,
}

impl ParameterStore {
    /// Creates a store, rejecting an invalid initial configuration.
    pub fn new(config: CameraConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { current: config })
    }

    /// Returns the current configuration.
    pub fn current(&self) -> &CameraConfig {
        &self.current
    }

    /// Returns a copy of the current configuration.
    pub fn snapshot(&self) -> CameraConfig {
        self.current.clone()
    }

    /// Merges `update` and returns the merged configuration.
    ///
    /// All-or-nothing: if the merged result is invalid the store is left
    /// unchanged.
    pub fn update(&mut self, update: &ParameterUpdate) -> Result<CameraConfig, ConfigError> {
        let merged = update.merged_into(&self.current);
        merged.validate()?;
        self.current = merged;
        tracing::debug!(config = ?self.current, "Camera parameters updated");
        Ok(self.current.clone())
    }

    /// Parses and merges `(name, value)` pairs.
    ///
    /// Unknown names are logged and returned alongside the parsed update;
    /// they never fail the call.
    pub fn update_named<'a, I>(&mut self, pairs: I) -> Result<NamedUpdate, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let named = ParameterUpdate::from_named(pairs)?;
        for unknown in &named.unknown {
            tracing::warn!(name = %unknown.name, "Ignoring unknown camera parameter");
        }
        self.update(&named.update)?;
        Ok(named)
    }
}
