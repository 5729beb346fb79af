//! Camera session: open, configure, warm up, read, release.
//!
//! The session owns the device exclusively. It performs no retries of its
//! own; retry and reinitialization policy live in the supervisor.

use super::config::{CameraConfig, ConfigError};
use super::device::{CameraDevice, DeviceError};
use super::params::ParameterUpdate;
use super::Frame;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Default pause after open for auto exposure and white balance to settle.
pub const DEFAULT_WARM_UP: Duration = Duration::from_secs(2);

/// Errors returned by [`CameraSession`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("failed to open camera device {device_id}: {source}")]
    DeviceOpen {
        device_id: u32,
        #[source]
        source: DeviceError,
    },
    #[error("frame read failed: {0}")]
    FrameRead(#[source] DeviceError),
    #[error("camera session is not ready (state: {0:?})")]
    NotReady(SessionState),
    #[error("invalid camera configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Lifecycle state of a [`CameraSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Opening,
    Ready,
    Failed,
    Closed,
}

/// Owns a camera device and sequences its lifecycle.
pub struct CameraSession<D> {
    device: D,
    state: SessionState,
    /// Configuration last pushed to the device.
    config: Option<CameraConfig>,
    warm_up: Duration,
}

impl<D: CameraDevice> CameraSession<D> {
    /// Wraps a device. Nothing is opened until [`open`](Self::open).
    pub fn new(device: D) -> Self {
        Self::with_warm_up(device, DEFAULT_WARM_UP)
    }

    /// Wraps a device with a custom warm-up delay.
    pub fn with_warm_up(device: D, warm_up: Duration) -> Self {
        Self {
            device,
            state: SessionState::Uninitialized,
            config: None,
            warm_up,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True when frames can be read.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Configuration last applied to the device, if it was ever opened.
    pub fn config(&self) -> Option<&CameraConfig> {
        self.config.as_ref()
    }

    /// Opens and configures the device, then waits for it to settle.
    pub fn open(&mut self, config: &CameraConfig) -> Result<(), SessionError> {
        config.validate()?;
        if self.device.is_open() {
            self.device.close();
        }

        self.state = SessionState::Opening;
        tracing::info!(device_id = config.device_id, "Opening camera");

        if let Err(source) = self.device.open(config.device_id) {
            self.state = SessionState::Failed;
            return Err(SessionError::DeviceOpen {
                device_id: config.device_id,
                source,
            });
        }

        for (parameter, value) in config.parameters() {
            if let Err(e) = self.device.set_parameter(parameter, value) {
                tracing::warn!(%parameter, value, error = %e, "Device rejected parameter");
            }
        }

        if !self.warm_up.is_zero() {
            thread::sleep(self.warm_up);
        }

        self.config = Some(config.clone());
        self.state = SessionState::Ready;
        tracing::info!(
            device_id = config.device_id,
            width = config.width,
            height = config.height,
            fps = config.fps,
            "Camera ready"
        );
        Ok(())
    }

    /// Forwards changed fields to the open device one at a time.
    ///
    /// Fields the device refuses are logged and skipped. Returns the number
    /// of fields the device accepted.
    pub fn apply_parameters(&mut self, update: &ParameterUpdate) -> Result<usize, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotReady(self.state));
        }

        let mut applied = 0;
        for (parameter, value) in update.changes() {
            match self.device.set_parameter(parameter, value) {
                Ok(()) => {
                    if let Some(config) = self.config.as_mut() {
                        ParameterUpdate::record(config, parameter, value);
                    }
                    applied += 1;
                }
                Err(e) => {
                    tracing::warn!(%parameter, value, error = %e, "Skipping camera parameter");
                }
            }
        }
        if let (Some(device_id), Some(config)) = (update.device_id, self.config.as_ref()) {
            if device_id != config.device_id {
                tracing::warn!(
                    device_id,
                    "Device index changes take effect on the next open"
                );
            }
        }

        tracing::info!(applied, "Camera parameters updated");
        Ok(applied)
    }

    /// Reads a single frame.
    pub fn read_frame(&mut self) -> Result<Frame, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotReady(self.state));
        }
        self.device.read().map_err(SessionError::FrameRead)
    }

    /// Releases the device. Idempotent.
    pub fn close(&mut self) {
        if self.device.is_open() {
            self.device.close();
            tracing::info!("Camera released");
        }
        self.state = SessionState::Closed;
    }
}

impl<D> std::fmt::Debug for CameraSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("warm_up", &self.warm_up)
            .finish()
    }
}
