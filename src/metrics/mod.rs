//! Prometheus metrics for the acquisition loop.
//!
//! [`MetricsRegistry`] is a [`CaptureObserver`](crate::supervisor::CaptureObserver):
//! attach it to a supervisor and it keeps its counters current.
//!
//! # Metrics Exposed
//!
//! - `relume_capture_frames_total` - Frames read from the camera
//! - `relume_capture_read_failures_total` - Failed reads
//! - `relume_capture_consecutive_failures` - Current run of failed reads
//! - `relume_capture_reinitializations_total` - Successful reopen cycles
//! - `relume_capture_reinitialization_failures_total` - Failed reopen cycles
//! - `relume_capture_consumer_errors_total` - Consumer errors and panics
//! - `relume_capture_frames_processed_total` - Frames through the pipeline
//!
//! # Example
//!
//! ```no_run
//! use relume_capture::capture::{CameraConfig, MockDevice};
//! use relume_capture::metrics::MetricsRegistry;
//! use relume_capture::supervisor::{CaptureSupervisor, SupervisorConfig};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(MetricsRegistry::new().expect("Failed to create registry"));
//! let mut supervisor = CaptureSupervisor::new(
//!     MockDevice::new(),
//!     CameraConfig::default(),
//!     SupervisorConfig::default(),
//! )
//! .unwrap()
//! .with_observer(metrics.clone());
//!
//! supervisor.start().unwrap();
//! supervisor.stop();
//! println!("{}", metrics.encode().unwrap());
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry};
