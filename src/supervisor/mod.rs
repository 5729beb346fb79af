//! Continuous acquisition with failure recovery.
//!
//! A [`CaptureSupervisor`] runs a camera session on a background thread,
//! hands every frame to a registered consumer and reopens the device after
//! [`REINIT_THRESHOLD`] consecutive read failures. Consumer errors and
//! panics are contained; the loop only ends on [`stop`](CaptureSupervisor::stop)
//! or a [`StopHandle`] request.

mod config;
mod events;
mod failure;
mod worker;

pub use config::SupervisorConfig;
pub use events::{BoxError, CaptureEvent, CaptureObserver, ConsumerError, TracingObserver};
pub use failure::{FailureCounter, REINIT_THRESHOLD};
pub use worker::FrameConsumer;

use crate::capture::{
    CameraConfig, CameraDevice, CameraSession, ConfigError, Frame, NamedUpdate, ParameterStore,
    ParameterUpdate, SessionError, SessionState,
};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use worker::{lock, ConsumerSlot, Shared};

/// Errors returned by [`CaptureSupervisor`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("camera could not be opened: {0}")]
    Start(#[source] SessionError),
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Asks a running loop to exit without waiting for it.
///
/// Safe to use from inside the frame consumer. The loop finishes the
/// current iteration and exits; [`CaptureSupervisor::stop`] then joins it.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Owns a camera session and drives it from a background thread.
pub struct CaptureSupervisor<D: CameraDevice + 'static> {
    shared: Arc<Shared<D>>,
    worker: Option<JoinHandle<()>>,
}

impl<D: CameraDevice + 'static> CaptureSupervisor<D> {
    /// Creates a supervisor for `device`. The device is opened on
    /// [`start`](Self::start).
    pub fn new(
        device: D,
        camera: CameraConfig,
        config: SupervisorConfig,
    ) -> Result<Self, SupervisorError> {
        let session = CameraSession::with_warm_up(device, config.warm_up());
        Self::from_session(session, camera, config)
    }

    /// Wraps an existing session, which may already be open.
    pub fn from_session(
        session: CameraSession<D>,
        camera: CameraConfig,
        config: SupervisorConfig,
    ) -> Result<Self, SupervisorError> {
        let store = ParameterStore::new(camera)?;
        let observer: Arc<dyn CaptureObserver> = Arc::new(TracingObserver);
        Ok(Self {
            shared: Arc::new(Shared {
                session: Mutex::new(session),
                store: Mutex::new(store),
                consumer: Mutex::new(ConsumerSlot::default()),
                observers: Mutex::new(vec![observer]),
                running: Arc::new(AtomicBool::new(false)),
                config,
            }),
            worker: None,
        })
    }

    /// Adds an observer, builder style.
    pub fn with_observer(self, observer: Arc<dyn CaptureObserver>) -> Self {
        self.add_observer(observer);
        self
    }

    /// Adds an observer. Safe to call from inside an observer.
    pub fn add_observer(&self, observer: Arc<dyn CaptureObserver>) {
        self.shared.add_observer(observer);
    }

    /// Sets the frame consumer, replacing any previous one.
    ///
    /// Safe while running, including from inside the consumer itself. The
    /// next frame goes to the new consumer; a call already in flight
    /// finishes with the old one.
    pub fn register_consumer<F>(&self, consumer: F)
    where
        F: FnMut(Frame) -> Result<(), BoxError> + Send + 'static,
    {
        self.shared.set_consumer(Some(Box::new(consumer)));
    }

    /// Removes the consumer. Frames are still read and then dropped.
    pub fn clear_consumer(&self) {
        self.shared.set_consumer(None);
    }

    /// Starts the acquisition loop. Opens the camera first if needed.
    ///
    /// Calling this while already running does nothing.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        if self.is_running() {
            return Ok(());
        }
        // A previous loop may have exited after a stop request
        if self.join_worker() {
            self.shared.emit(&CaptureEvent::Stopped);
        }

        {
            let mut session = lock(&self.shared.session);
            if !session.is_ready() {
                let camera = lock(&self.shared.store).snapshot();
                session.open(&camera).map_err(SupervisorError::Start)?;
            }
        }

        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.emit(&CaptureEvent::Started);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("capture-supervisor".into())
            .spawn(move || worker::run(&shared));
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(SupervisorError::Spawn(e))
            }
        }
    }

    /// Stops the loop and waits for it to exit.
    ///
    /// An in-flight consumer call finishes first; no new one starts.
    /// The camera stays open; see [`release`](Self::release).
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if self.join_worker() {
            self.shared.emit(&CaptureEvent::Stopped);
        }
    }

    /// Stops the loop and closes the camera.
    pub fn release(&mut self) {
        self.stop();
        lock(&self.shared.session).close();
    }

    fn join_worker(&mut self) -> bool {
        let Some(handle) = self.worker.take() else {
            return false;
        };
        if handle.join().is_err() {
            tracing::error!("Capture thread panicked");
        }
        true
    }

    /// Handle for requesting a stop from elsewhere, e.g. the consumer.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.shared.running),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Desired camera configuration.
    pub fn config(&self) -> CameraConfig {
        lock(&self.shared.store).snapshot()
    }

    pub fn session_state(&self) -> SessionState {
        lock(&self.shared.session).state()
    }

    /// Merges `update` into the desired configuration and forwards the
    /// changed fields to the camera if it is open.
    ///
    /// An invalid merge is rejected as a whole. Returns the merged config.
    pub fn update_parameters(
        &self,
        update: &ParameterUpdate,
    ) -> Result<CameraConfig, SupervisorError> {
        let merged = lock(&self.shared.store).update(update)?;
        self.forward(update)?;
        Ok(merged)
    }

    /// Like [`update_parameters`](Self::update_parameters) for
    /// `(name, value)` pairs. Unknown names are returned, not rejected.
    pub fn update_named<'a, I>(&self, pairs: I) -> Result<NamedUpdate, SupervisorError>
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let named = lock(&self.shared.store).update_named(pairs)?;
        self.forward(&named.update)?;
        Ok(named)
    }

    fn forward(&self, update: &ParameterUpdate) -> Result<(), SupervisorError> {
        let mut session = lock(&self.shared.session);
        if session.is_ready() && !update.is_empty() {
            session.apply_parameters(update)?;
        }
        Ok(())
    }
}

impl<D: CameraDevice + 'static> Drop for CaptureSupervisor<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: CameraDevice + 'static> std::fmt::Debug for CaptureSupervisor<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSupervisor")
            .field("running", &self.is_running())
            .field("config", &self.shared.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeviceCall, DeviceParameter, MockDevice, MockHandle, ReadOutcome};
    use crate::capture::{DeviceError, Frame};
    use std::sync::atomic::AtomicUsize;
    use std::sync::{mpsc, OnceLock, Weak};
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Started,
        Stopped,
        Frame(u64),
        ReadFailed(u32),
        Reinitializing,
        Reinitialized,
        ReinitializationFailed,
        ConsumerFailed(u64, String),
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Seen>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }

        fn failure_trace(&self) -> Vec<u32> {
            self.seen()
                .iter()
                .filter_map(|s| match s {
                    Seen::Frame(_) => Some(0),
                    Seen::ReadFailed(n) => Some(*n),
                    _ => None,
                })
                .collect()
        }

        fn frames(&self) -> usize {
            self.seen()
                .iter()
                .filter(|s| matches!(s, Seen::Frame(_)))
                .count()
        }
    }

    impl CaptureObserver for Recorder {
        fn on_event(&self, event: &CaptureEvent<'_>) {
            let seen = match event {
                CaptureEvent::Started => Seen::Started,
                CaptureEvent::Stopped => Seen::Stopped,
                CaptureEvent::FrameCaptured { sequence } => Seen::Frame(*sequence),
                CaptureEvent::ReadFailed {
                    consecutive_failures,
                    ..
                } => Seen::ReadFailed(*consecutive_failures),
                CaptureEvent::Reinitializing { .. } => Seen::Reinitializing,
                CaptureEvent::Reinitialized => Seen::Reinitialized,
                CaptureEvent::ReinitializationFailed { .. } => Seen::ReinitializationFailed,
                CaptureEvent::ConsumerFailed { sequence, error } => {
                    Seen::ConsumerFailed(*sequence, error.to_string())
                }
            };
            self.seen.lock().unwrap().push(seen);
        }
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    /// Runs `stop` on another thread and reports whether it returned in time.
    fn stops_in_time(mut supervisor: CaptureSupervisor<MockDevice>) -> bool {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            supervisor.stop();
            let _ = tx.send(());
        });
        rx.recv_timeout(Duration::from_secs(5)).is_ok()
    }

    fn camera() -> CameraConfig {
        // Small frames and a high rate keep the loop fast
        CameraConfig {
            width: 32,
            height: 24,
            fps: 240,
            ..Default::default()
        }
    }

    fn supervisor() -> (CaptureSupervisor<MockDevice>, MockHandle, Arc<Recorder>) {
        let device = MockDevice::new();
        let handle = device.handle();
        let recorder = Arc::new(Recorder::default());
        let supervisor =
            CaptureSupervisor::new(device, camera(), SupervisorConfig::immediate())
                .unwrap()
                .with_observer(recorder.clone());
        (supervisor, handle, recorder)
    }

    fn without_sets(calls: Vec<DeviceCall>) -> Vec<DeviceCall> {
        calls
            .into_iter()
            .filter(|c| !matches!(c, DeviceCall::Set(..)))
            .collect()
    }

    #[test]
    fn test_start_opens_lazily_and_is_idempotent() {
        let (mut supervisor, handle, recorder) = supervisor();
        assert_eq!(supervisor.session_state(), SessionState::Uninitialized);
        assert_eq!(handle.open_count(), 0);

        supervisor.start().unwrap();
        supervisor.start().unwrap();
        assert!(supervisor.is_running());
        assert_eq!(handle.open_count(), 1);
        assert_eq!(supervisor.session_state(), SessionState::Ready);

        supervisor.stop();
        assert!(!supervisor.is_running());
        let seen = recorder.seen();
        assert_eq!(seen.iter().filter(|s| **s == Seen::Started).count(), 1);
        assert_eq!(seen.last(), Some(&Seen::Stopped));
    }

    #[test]
    fn test_start_reports_open_failure() {
        let (mut supervisor, handle, _recorder) = supervisor();
        handle.fail_opens(1);

        let err = supervisor.start().unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::Start(SessionError::DeviceOpen { device_id: 0, .. })
        ));
        assert!(!supervisor.is_running());
        assert_eq!(supervisor.session_state(), SessionState::Failed);

        // Next attempt succeeds
        supervisor.start().unwrap();
        assert!(supervisor.is_running());
    }

    #[test]
    fn test_reinitializes_after_threshold() {
        let (mut supervisor, handle, recorder) = supervisor();
        handle.fail_reads(REINIT_THRESHOLD as usize);

        supervisor.start().unwrap();
        assert!(wait_until(|| recorder.frames() >= 1));
        supervisor.stop();

        let mut expected = vec![DeviceCall::Open(0)];
        expected.extend(std::iter::repeat(DeviceCall::Read).take(REINIT_THRESHOLD as usize));
        expected.extend([DeviceCall::Close, DeviceCall::Open(0), DeviceCall::Read]);
        let calls = without_sets(handle.calls());
        assert_eq!(calls[..expected.len()], expected[..]);

        let seen = recorder.seen();
        let reinit = seen.iter().position(|s| *s == Seen::Reinitializing).unwrap();
        assert_eq!(seen[reinit - 1], Seen::ReadFailed(REINIT_THRESHOLD));
        assert_eq!(seen[reinit + 1], Seen::Reinitialized);
        assert!(matches!(seen[reinit + 2], Seen::Frame(_)));
    }

    #[test]
    fn test_intermittent_failures_never_reinitialize() {
        let device = MockDevice::new();
        let handle = device.handle();
        let recorder = Arc::new(Recorder::default());
        let camera = CameraConfig {
            width: 640,
            height: 480,
            fps: 30,
            ..Default::default()
        };
        let mut supervisor =
            CaptureSupervisor::new(device, camera, SupervisorConfig::immediate())
                .unwrap()
                .with_observer(recorder.clone());
        let pattern = [
            ReadOutcome::Fail,
            ReadOutcome::Fail,
            ReadOutcome::Fail,
            ReadOutcome::Fail,
            ReadOutcome::Frame,
        ];
        handle.script_reads(pattern.iter().chain(pattern.iter()).copied());

        supervisor.start().unwrap();
        assert!(wait_until(|| recorder.failure_trace().len() >= 10));
        supervisor.stop();

        assert_eq!(
            recorder.failure_trace()[..10],
            [1, 2, 3, 4, 0, 1, 2, 3, 4, 0]
        );
        assert!(!recorder.seen().contains(&Seen::Reinitializing));
        assert_eq!(handle.open_count(), 1);
    }

    #[test]
    fn test_counter_resets_after_reinitialization() {
        let (mut supervisor, handle, recorder) = supervisor();
        handle.fail_reads(REINIT_THRESHOLD as usize + 2);

        supervisor.start().unwrap();
        assert!(wait_until(|| recorder.frames() >= 1));
        supervisor.stop();

        let trace = recorder.failure_trace();
        assert_eq!(trace[..8], [1, 2, 3, 4, 5, 1, 2, 0]);
    }

    #[test]
    fn test_failed_reinitialization_keeps_looping() {
        let device = MockDevice::new();
        let handle = device.handle();
        let mut session = CameraSession::with_warm_up(device, Duration::ZERO);
        session.open(&camera()).unwrap();

        let recorder = Arc::new(Recorder::default());
        let mut supervisor =
            CaptureSupervisor::from_session(session, camera(), SupervisorConfig::immediate())
                .unwrap()
                .with_observer(recorder.clone());
        handle.fail_reads(REINIT_THRESHOLD as usize);
        handle.fail_opens(1);

        supervisor.start().unwrap();
        assert!(wait_until(|| recorder.frames() >= 1));
        supervisor.stop();

        let seen = recorder.seen();
        let failed = seen
            .iter()
            .position(|s| *s == Seen::ReinitializationFailed)
            .unwrap();
        let recovered = seen.iter().position(|s| *s == Seen::Reinitialized).unwrap();
        assert!(failed < recovered);
        // Reads against the failed session count toward the next attempt
        assert_eq!(
            seen[failed + 1..recovered]
                .iter()
                .filter(|s| matches!(s, Seen::ReadFailed(_)))
                .count(),
            REINIT_THRESHOLD as usize
        );
        assert_eq!(handle.open_count(), 3);
    }

    #[test]
    fn test_consumer_errors_are_contained() {
        let (mut supervisor, _handle, recorder) = supervisor();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        supervisor.register_consumer(move |_frame| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err("disk full".into()),
                1 => panic!("consumer blew up"),
                _ => Ok(()),
            }
        });

        supervisor.start().unwrap();
        assert!(wait_until(|| calls.load(Ordering::SeqCst) >= 4));
        assert!(supervisor.is_running());
        supervisor.stop();

        let failures: Vec<String> = recorder
            .seen()
            .into_iter()
            .filter_map(|s| match s {
                Seen::ConsumerFailed(_, message) => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("disk full"));
        assert!(failures[1].contains("consumer blew up"));
    }

    #[test]
    fn test_stop_waits_for_in_flight_consumer() {
        let (mut supervisor, _handle, _recorder) = supervisor();
        let in_flight = Arc::new(AtomicBool::new(false));
        let delivered = Arc::new(AtomicUsize::new(0));
        let (flag, count) = (in_flight.clone(), delivered.clone());
        supervisor.register_consumer(move |_frame| {
            flag.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            count.fetch_add(1, Ordering::SeqCst);
            flag.store(false, Ordering::SeqCst);
            Ok(())
        });

        supervisor.start().unwrap();
        assert!(wait_until(|| in_flight.load(Ordering::SeqCst)));
        supervisor.stop();

        assert!(!in_flight.load(Ordering::SeqCst));
        let after_stop = delivered.load(Ordering::SeqCst);
        assert!(after_stop >= 1);
        thread::sleep(Duration::from_millis(60));
        assert_eq!(delivered.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_consumer_can_request_stop() {
        let (mut supervisor, _handle, _recorder) = supervisor();
        let stopper = supervisor.stop_handle();
        let delivered = Arc::new(AtomicUsize::new(0));
        let count = delivered.clone();
        supervisor.register_consumer(move |_frame| {
            if count.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                stopper.request_stop();
            }
            Ok(())
        });

        supervisor.start().unwrap();
        assert!(wait_until(|| !supervisor.is_running()));
        supervisor.stop();

        assert_eq!(delivered.load(Ordering::SeqCst), 3);
        // Stopped but not released
        assert_eq!(supervisor.session_state(), SessionState::Ready);
    }

    #[test]
    fn test_frames_arrive_in_order() {
        let (mut supervisor, _handle, _recorder) = supervisor();
        let sequences = Arc::new(Mutex::new(Vec::new()));
        let sink = sequences.clone();
        supervisor.register_consumer(move |frame| {
            assert_eq!((frame.width(), frame.height()), (32, 24));
            sink.lock().unwrap().push(frame.sequence());
            Ok(())
        });

        supervisor.start().unwrap();
        assert!(wait_until(|| sequences.lock().unwrap().len() >= 5));
        supervisor.stop();

        let sequences = sequences.lock().unwrap();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_replace_consumer_while_running() {
        let (mut supervisor, _handle, _recorder) = supervisor();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        supervisor.register_consumer(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        supervisor.start().unwrap();
        assert!(wait_until(|| first.load(Ordering::SeqCst) >= 1));

        let counter = second.clone();
        supervisor.register_consumer(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        // Once the new consumer has run, any in-flight call to the old one is done
        assert!(wait_until(|| second.load(Ordering::SeqCst) >= 1));
        let first_total = first.load(Ordering::SeqCst);
        assert!(wait_until(|| second.load(Ordering::SeqCst) >= 3));
        supervisor.stop();

        assert_eq!(first.load(Ordering::SeqCst), first_total);
    }

    #[test]
    fn test_consumer_can_clear_itself() {
        let (mut supervisor, _handle, recorder) = supervisor();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let shared = Arc::downgrade(&supervisor.shared);
        supervisor.register_consumer(move |_frame| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(shared) = shared.upgrade() {
                shared.set_consumer(None);
            }
            Ok(())
        });

        supervisor.start().unwrap();
        assert!(wait_until(|| recorder.frames() >= 3));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(stops_in_time(supervisor));
    }

    #[test]
    fn test_consumer_can_replace_itself() {
        let (mut supervisor, _handle, _recorder) = supervisor();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (first_count, second_count) = (first.clone(), second.clone());
        let shared = Arc::downgrade(&supervisor.shared);
        supervisor.register_consumer(move |_frame| {
            first_count.fetch_add(1, Ordering::SeqCst);
            if let Some(shared) = shared.upgrade() {
                let counter = second_count.clone();
                shared.set_consumer(Some(Box::new(move |_frame: Frame| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), BoxError>(())
                })));
            }
            Ok(())
        });

        supervisor.start().unwrap();
        assert!(wait_until(|| second.load(Ordering::SeqCst) >= 2));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert!(stops_in_time(supervisor));
    }

    struct Recruiter {
        shared: OnceLock<Weak<Shared<MockDevice>>>,
        late: Arc<Recorder>,
        recruited: AtomicBool,
    }

    impl CaptureObserver for Recruiter {
        fn on_event(&self, event: &CaptureEvent<'_>) {
            if !matches!(event, CaptureEvent::FrameCaptured { .. })
                || self.recruited.swap(true, Ordering::SeqCst)
            {
                return;
            }
            if let Some(shared) = self.shared.get().and_then(Weak::upgrade) {
                shared.add_observer(self.late.clone());
            }
        }
    }

    #[test]
    fn test_observer_can_add_observer() {
        let (mut supervisor, _handle, _recorder) = supervisor();
        let late = Arc::new(Recorder::default());
        let recruiter = Arc::new(Recruiter {
            shared: OnceLock::new(),
            late: late.clone(),
            recruited: AtomicBool::new(false),
        });
        let _ = recruiter.shared.set(Arc::downgrade(&supervisor.shared));
        supervisor.add_observer(recruiter);

        supervisor.start().unwrap();
        assert!(wait_until(|| late.frames() >= 2));
        assert!(stops_in_time(supervisor));
    }

    /// Mock device whose first reads panic, like a crashing driver.
    struct PanickingDevice {
        inner: MockDevice,
        panics: u32,
    }

    impl CameraDevice for PanickingDevice {
        fn open(&mut self, device_id: u32) -> Result<(), DeviceError> {
            self.inner.open(device_id)
        }

        fn set_parameter(
            &mut self,
            parameter: DeviceParameter,
            value: f64,
        ) -> Result<(), DeviceError> {
            self.inner.set_parameter(parameter, value)
        }

        fn get_parameter(&self, parameter: DeviceParameter) -> Option<f64> {
            self.inner.get_parameter(parameter)
        }

        fn read(&mut self) -> Result<Frame, DeviceError> {
            if self.panics > 0 {
                self.panics -= 1;
                panic!("sensor driver crashed");
            }
            self.inner.read()
        }

        fn is_open(&self) -> bool {
            self.inner.is_open()
        }

        fn close(&mut self) {
            self.inner.close()
        }
    }

    #[test]
    fn test_device_panic_counts_as_read_failure() {
        let device = PanickingDevice {
            inner: MockDevice::new(),
            panics: 2,
        };
        let recorder = Arc::new(Recorder::default());
        let mut supervisor =
            CaptureSupervisor::new(device, camera(), SupervisorConfig::immediate())
                .unwrap()
                .with_observer(recorder.clone());

        supervisor.start().unwrap();
        assert!(wait_until(|| recorder.frames() >= 1));
        assert!(supervisor.is_running());
        supervisor.stop();

        assert_eq!(recorder.failure_trace()[..3], [1, 2, 0]);
    }

    #[test]
    fn test_parameter_updates_are_forwarded() {
        let (mut supervisor, handle, _recorder) = supervisor();

        // Not open yet: stored only
        supervisor
            .update_parameters(&ParameterUpdate {
                brightness: Some(120),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(handle.parameter(DeviceParameter::Brightness), None);

        supervisor.start().unwrap();
        assert_eq!(handle.parameter(DeviceParameter::Brightness), Some(120.0));

        let merged = supervisor
            .update_parameters(&ParameterUpdate {
                exposure: Some(-3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(merged.exposure, -3);
        assert_eq!(handle.parameter(DeviceParameter::Exposure), Some(-3.0));

        let named = supervisor
            .update_named([("gain", 4), ("contrast", 40)])
            .unwrap();
        assert_eq!(named.unknown.len(), 1);
        assert_eq!(named.unknown[0].name, "gain");
        assert_eq!(handle.parameter(DeviceParameter::Contrast), Some(40.0));
        assert_eq!(supervisor.config().contrast, 40);

        supervisor.release();
        assert!(!handle.is_open());
    }

    #[test]
    fn test_invalid_update_is_rejected() {
        let (supervisor, handle, _recorder) = supervisor();
        let err = supervisor
            .update_parameters(&ParameterUpdate {
                fps: Some(0),
                exposure: Some(-2),
                ..Default::default()
            })
            .unwrap_err();

        assert!(matches!(
            err,
            SupervisorError::Config(ConfigError::InvalidFrameRate)
        ));
        assert_eq!(supervisor.config().exposure, -4);
        assert!(handle.calls().is_empty());
    }

    #[test]
    fn test_drop_releases_camera() {
        let (mut supervisor, handle, _recorder) = supervisor();
        supervisor.start().unwrap();
        assert!(handle.is_open());

        drop(supervisor);
        assert!(!handle.is_open());
        assert_eq!(handle.close_count(), 1);
    }
}
