//! The acquisition loop and the state it shares with the supervisor handle.

use super::config::SupervisorConfig;
use super::events::{BoxError, CaptureEvent, CaptureObserver, ConsumerError};
use super::failure::FailureCounter;
use crate::capture::{CameraDevice, CameraSession, DeviceError, Frame, ParameterStore, SessionError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Frame callback registered with the supervisor.
pub type FrameConsumer = Box<dyn FnMut(Frame) -> Result<(), BoxError> + Send>;

/// Pacing used before the session has a configuration snapshot.
const FALLBACK_FPS: u32 = 30;

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The registered consumer and a counter bumped on every replacement.
///
/// The capture thread takes the consumer out while calling it, so a consumer
/// may replace or clear itself without deadlocking.
#[derive(Default)]
pub(crate) struct ConsumerSlot {
    consumer: Option<FrameConsumer>,
    generation: u64,
}

/// State shared between the supervisor handle and the capture thread.
pub(crate) struct Shared<D> {
    pub(crate) session: Mutex<CameraSession<D>>,
    pub(crate) store: Mutex<ParameterStore>,
    pub(crate) consumer: Mutex<ConsumerSlot>,
    pub(crate) observers: Mutex<Vec<Arc<dyn CaptureObserver>>>,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) config: SupervisorConfig,
}

impl<D: CameraDevice> Shared<D> {
    pub(crate) fn emit(&self, event: &CaptureEvent<'_>) {
        // Observers run unlocked so they may add observers themselves
        let observers = lock(&self.observers).clone();
        for observer in &observers {
            observer.on_event(event);
        }
    }

    pub(crate) fn add_observer(&self, observer: Arc<dyn CaptureObserver>) {
        lock(&self.observers).push(observer);
    }

    /// Replaces the consumer. A call already in flight finishes with the
    /// old one, which is then dropped.
    pub(crate) fn set_consumer(&self, consumer: Option<FrameConsumer>) {
        let mut slot = lock(&self.consumer);
        slot.consumer = consumer;
        slot.generation = slot.generation.wrapping_add(1);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Close then reopen the session with the current desired config.
    fn reinitialize(&self) -> Result<(), SessionError> {
        let config = lock(&self.store).snapshot();
        let mut session = lock(&self.session);
        session.close();
        session.open(&config)
    }

    fn frame_interval(&self) -> Duration {
        let fps = lock(&self.session)
            .config()
            .map(|c| c.fps)
            .unwrap_or(FALLBACK_FPS)
            .max(1);
        Duration::from_secs_f64(1.0 / f64::from(fps))
    }

    /// Reads one frame. A panicking device counts as a failed read.
    fn read(&self) -> Result<Frame, SessionError> {
        let mut session = lock(&self.session);
        match panic::catch_unwind(AssertUnwindSafe(|| session.read_frame())) {
            Ok(read) => read,
            Err(payload) => Err(SessionError::FrameRead(DeviceError::Backend(format!(
                "device panicked: {}",
                panic_message(payload.as_ref())
            )))),
        }
    }

    fn deliver(&self, frame: Frame) {
        let sequence = frame.sequence();
        let (mut consumer, generation) = {
            let mut slot = lock(&self.consumer);
            let Some(consumer) = slot.consumer.take() else {
                return;
            };
            (consumer, slot.generation)
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| consumer(frame)));

        {
            let mut slot = lock(&self.consumer);
            if slot.generation == generation {
                slot.consumer = Some(consumer);
            }
        }
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => ConsumerError::Failed(e),
            Err(payload) => ConsumerError::Panicked(panic_message(payload.as_ref())),
        };
        self.emit(&CaptureEvent::ConsumerFailed {
            sequence,
            error: &error,
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Body of the capture thread. Returns only once `running` is cleared.
pub(crate) fn run<D: CameraDevice>(shared: &Shared<D>) {
    let mut failures = FailureCounter::new();
    let pause = shared.config.failure_pause();

    while shared.is_running() {
        let read = shared.read();

        let frame = match read {
            Ok(frame) => frame,
            Err(error) => {
                let consecutive_failures = failures.record_failure();
                shared.emit(&CaptureEvent::ReadFailed {
                    consecutive_failures,
                    error: &error,
                });
                if !pause.is_zero() {
                    thread::sleep(pause);
                }

                if failures.should_reinitialize() && shared.is_running() {
                    shared.emit(&CaptureEvent::Reinitializing {
                        consecutive_failures,
                    });
                    match shared.reinitialize() {
                        Ok(()) => shared.emit(&CaptureEvent::Reinitialized),
                        Err(error) => {
                            shared.emit(&CaptureEvent::ReinitializationFailed { error: &error })
                        }
                    }
                    failures.reset();
                }
                continue;
            }
        };

        failures.reset();
        shared.emit(&CaptureEvent::FrameCaptured {
            sequence: frame.sequence(),
        });

        // No new consumer call once stop has been requested
        if !shared.is_running() {
            break;
        }
        shared.deliver(frame);

        thread::sleep(shared.frame_interval());
    }
}
