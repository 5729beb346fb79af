//! Camera input, configuration and session management.
//!
//! The device is an opaque capability behind [`CameraDevice`]. A
//! [`CameraSession`] owns one and sequences open, configure, warm-up, read
//! and release. [`ParameterStore`] keeps the desired configuration.

mod config;
mod device;
mod frame;
mod mock;
mod params;
mod session;

pub use config::{CameraConfig, ConfigError, FileConfig, OutputConfig, MAX_FPS};
pub use device::{CameraDevice, DeviceError, DeviceParameter};
pub use frame::{Frame, PixelFormat};
pub use mock::{DeviceCall, MockDevice, MockHandle, ReadOutcome};
pub use params::{NamedUpdate, ParameterStore, ParameterUpdate, UnknownParameter};
pub use session::{CameraSession, SessionError, SessionState, DEFAULT_WARM_UP};
