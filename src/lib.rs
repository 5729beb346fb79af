//! Relume Capture Library
//!
//! Continuous camera acquisition that heals itself, plus a deterministic
//! preprocessing pipeline for downstream vision analysis.
//!
//! # Architecture
//!
//! ```text
//! CameraDevice → CameraSession → CaptureSupervisor → consumer
//!                     ↑                 │                ↓
//!              ParameterStore      observers       preprocess
//!                                (tracing, metrics)
//! ```
//!
//! # Design Principles
//!
//! - **Keep going**: read failures, consumer errors and consumer panics never
//!   end the loop; only an explicit stop does
//! - **Reopen after a streak**: five consecutive failed reads close and
//!   reopen the device with the current desired configuration
//! - **Pure pipeline**: preprocessing holds no state, so identical input and
//!   parameters always give identical output
//!
//! # Example
//!
//! ```no_run
//! use relume_capture::{
//!     capture::{CameraConfig, MockDevice},
//!     preprocess::Preprocessor,
//!     supervisor::{CaptureSupervisor, SupervisorConfig},
//! };
//!
//! let preprocessor = Preprocessor::default();
//! let mut supervisor = CaptureSupervisor::new(
//!     MockDevice::new(),
//!     CameraConfig::default(),
//!     SupervisorConfig::default(),
//! )
//! .unwrap();
//!
//! supervisor.register_consumer(move |frame| {
//!     let enhanced = preprocessor.process(&frame)?;
//!     println!("frame {} -> {} bytes", enhanced.sequence(), enhanced.pixels().len());
//!     Ok(())
//! });
//!
//! supervisor.start().unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! supervisor.release();
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod metrics;
pub mod preprocess;
pub mod supervisor;

// Re-export commonly used types at crate root
pub use capture::{
    CameraConfig, CameraDevice, CameraSession, FileConfig, Frame, MockDevice, ParameterStore,
    ParameterUpdate, PixelFormat,
};
pub use preprocess::{preprocess, PipelineParams, Preprocessor, Stage};
pub use supervisor::{CaptureObserver, CaptureSupervisor, SupervisorConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
