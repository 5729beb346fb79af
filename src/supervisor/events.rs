//! Observability hooks for the acquisition loop.
//!
//! The supervisor reports what happens through injected
//! [`CaptureObserver`]s instead of logging directly. [`TracingObserver`]
//! turns events into `tracing` records and is installed by default.

use crate::capture::SessionError;
use thiserror::Error;

/// Boxed error returned by a frame consumer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A consumer failure, contained by the supervisor.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("frame consumer failed: {0}")]
    Failed(BoxError),
    #[error("frame consumer panicked: {0}")]
    Panicked(String),
}

/// Something that happened inside the acquisition loop.
#[derive(Debug)]
pub enum CaptureEvent<'a> {
    /// The loop thread was launched.
    Started,
    /// The loop thread has exited.
    Stopped,
    /// A frame was read; the failure counter is back to zero.
    FrameCaptured { sequence: u64 },
    /// A read failed.
    ReadFailed {
        consecutive_failures: u32,
        error: &'a SessionError,
    },
    /// The failure threshold was reached; the device is being reopened.
    Reinitializing { consecutive_failures: u32 },
    /// The device was reopened.
    Reinitialized,
    /// Reopening failed; the loop keeps going.
    ReinitializationFailed { error: &'a SessionError },
    /// The consumer returned an error or panicked.
    ConsumerFailed {
        sequence: u64,
        error: &'a ConsumerError,
    },
}

impl CaptureEvent<'_> {
    /// Value of the failure counter after this event, for events that
    /// change it.
    pub fn failure_count(&self) -> Option<u32> {
        match self {
            CaptureEvent::FrameCaptured { .. } => Some(0),
            CaptureEvent::ReadFailed {
                consecutive_failures,
                ..
            } => Some(*consecutive_failures),
            _ => None,
        }
    }
}

/// Receives loop events. Called on the capture thread; keep it quick.
pub trait CaptureObserver: Send + Sync {
    fn on_event(&self, event: &CaptureEvent<'_>);
}

/// Logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CaptureObserver for TracingObserver {
    fn on_event(&self, event: &CaptureEvent<'_>) {
        match event {
            CaptureEvent::Started => tracing::info!("Capture loop started"),
            CaptureEvent::Stopped => tracing::info!("Capture loop stopped"),
            CaptureEvent::FrameCaptured { sequence } => {
                tracing::trace!(sequence, "Frame captured")
            }
            CaptureEvent::ReadFailed {
                consecutive_failures,
                error,
            } => tracing::error!(
                consecutive_failures,
                error = %error,
                "Frame capture failed"
            ),
            CaptureEvent::Reinitializing {
                consecutive_failures,
            } => tracing::warn!(
                consecutive_failures,
                "Too many consecutive capture failures, reinitializing camera"
            ),
            CaptureEvent::Reinitialized => tracing::info!("Camera reinitialized"),
            CaptureEvent::ReinitializationFailed { error } => {
                tracing::error!(error = %error, "Camera reinitialization failed")
            }
            CaptureEvent::ConsumerFailed { sequence, error } => {
                tracing::error!(sequence, error = %error, "Frame consumer failed")
            }
        }
    }
}
