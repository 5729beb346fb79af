//! Metrics collection and registry.

use crate::supervisor::{CaptureEvent, CaptureObserver};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus counters for the acquisition loop.
///
/// Install it on a supervisor as an observer; it updates itself from loop
/// events.
pub struct MetricsRegistry {
    registry: Registry,

    // Capture metrics
    frames_total: IntCounter,
    read_failures_total: IntCounter,
    consecutive_failures: IntGauge,

    // Recovery metrics
    reinitializations_total: IntCounter,
    reinitialization_failures_total: IntCounter,

    // Consumer metrics
    consumer_errors_total: IntCounter,
    frames_processed_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new registry with all capture metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_total = IntCounter::new(
            "relume_capture_frames_total",
            "Total number of frames read from the camera",
        )?;
        let read_failures_total = IntCounter::new(
            "relume_capture_read_failures_total",
            "Total number of failed frame reads",
        )?;
        let consecutive_failures = IntGauge::new(
            "relume_capture_consecutive_failures",
            "Current run of consecutive failed reads",
        )?;
        let reinitializations_total = IntCounter::new(
            "relume_capture_reinitializations_total",
            "Camera reinitializations that succeeded",
        )?;
        let reinitialization_failures_total = IntCounter::new(
            "relume_capture_reinitialization_failures_total",
            "Camera reinitializations that failed",
        )?;
        let consumer_errors_total = IntCounter::new(
            "relume_capture_consumer_errors_total",
            "Frame consumer errors and panics",
        )?;
        let frames_processed_total = IntCounter::new(
            "relume_capture_frames_processed_total",
            "Frames run through the preprocessing pipeline",
        )?;

        registry.register(Box::new(frames_total.clone()))?;
        registry.register(Box::new(read_failures_total.clone()))?;
        registry.register(Box::new(consecutive_failures.clone()))?;
        registry.register(Box::new(reinitializations_total.clone()))?;
        registry.register(Box::new(reinitialization_failures_total.clone()))?;
        registry.register(Box::new(consumer_errors_total.clone()))?;
        registry.register(Box::new(frames_processed_total.clone()))?;

        Ok(Self {
            registry,
            frames_total,
            read_failures_total,
            consecutive_failures,
            reinitializations_total,
            reinitialization_failures_total,
            consumer_errors_total,
            frames_processed_total,
        })
    }

    /// Counts a frame that made it through preprocessing.
    pub fn record_processed(&self) {
        self.frames_processed_total.inc();
    }

    pub fn frames_total(&self) -> u64 {
        self.frames_total.get()
    }

    pub fn read_failures_total(&self) -> u64 {
        self.read_failures_total.get()
    }

    pub fn reinitializations_total(&self) -> u64 {
        self.reinitializations_total.get()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl CaptureObserver for MetricsRegistry {
    fn on_event(&self, event: &CaptureEvent<'_>) {
        if let Some(count) = event.failure_count() {
            self.consecutive_failures.set(i64::from(count));
        }
        match event {
            CaptureEvent::FrameCaptured { .. } => self.frames_total.inc(),
            CaptureEvent::ReadFailed { .. } => self.read_failures_total.inc(),
            CaptureEvent::Reinitialized => self.reinitializations_total.inc(),
            CaptureEvent::ReinitializationFailed { .. } => {
                self.reinitialization_failures_total.inc()
            }
            CaptureEvent::ConsumerFailed { .. } => self.consumer_errors_total.inc(),
            _ => {}
        }
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("frames_total", &self.frames_total.get())
            .field("read_failures_total", &self.read_failures_total.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeviceError, SessionError};
    use crate::supervisor::ConsumerError;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_events_update_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        let error = SessionError::FrameRead(DeviceError::ReadFailed("gone".into()));

        for consecutive_failures in 1..=3 {
            registry.on_event(&CaptureEvent::ReadFailed {
                consecutive_failures,
                error: &error,
            });
        }
        registry.on_event(&CaptureEvent::Reinitialized);
        registry.on_event(&CaptureEvent::FrameCaptured { sequence: 1 });
        registry.on_event(&CaptureEvent::ConsumerFailed {
            sequence: 1,
            error: &ConsumerError::Panicked("boom".into()),
        });

        assert_eq!(registry.read_failures_total(), 3);
        assert_eq!(registry.reinitializations_total(), 1);
        assert_eq!(registry.frames_total(), 1);

        let output = registry.encode().unwrap();
        assert!(output.contains("relume_capture_consecutive_failures 0"));
        assert!(output.contains("relume_capture_consumer_errors_total 1"));
    }

    #[test]
    fn test_gauge_tracks_failure_run() {
        let registry = MetricsRegistry::new().unwrap();
        let error = SessionError::FrameRead(DeviceError::ReadFailed("gone".into()));
        registry.on_event(&CaptureEvent::ReadFailed {
            consecutive_failures: 4,
            error: &error,
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("relume_capture_consecutive_failures 4"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_processed();
        let output = registry.encode().unwrap();

        assert!(output.contains("relume_capture_frames_total"));
        assert!(output.contains("relume_capture_reinitialization_failures_total"));
        assert!(output.contains("relume_capture_frames_processed_total 1"));
    }
}
