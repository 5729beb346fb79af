//! Scriptable in-memory camera device.
//!
//! Generates synthetic BGR frames at whatever resolution was configured and
//! records every call it receives. A [`MockHandle`] shares the device state so
//! tests can inject failures and inspect the call log while the device itself
//! is owned by a session running on another thread.

use super::device::{CameraDevice, DeviceError, DeviceParameter};
use super::Frame;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// A call received by the mock device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Open(u32),
    Set(DeviceParameter, f64),
    Read,
    Close,
}

/// Outcome of a scripted read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Frame,
    Fail,
}

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    parameters: HashMap<DeviceParameter, f64>,
    rejected: HashSet<DeviceParameter>,
    script: VecDeque<ReadOutcome>,
    fail_every: Option<u64>,
    failing_opens: u32,
    reads: u64,
    sequence: u64,
    calls: Vec<DeviceCall>,
}

/// Mock device that generates synthetic frames.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

/// Test-side view of a [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle sharing this device's state.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn dimensions(state: &MockState) -> (u32, u32) {
        let width = state
            .parameters
            .get(&DeviceParameter::FrameWidth)
            .copied()
            .unwrap_or(640.0);
        let height = state
            .parameters
            .get(&DeviceParameter::FrameHeight)
            .copied()
            .unwrap_or(480.0);
        (width.max(1.0) as u32, height.max(1.0) as u32)
    }
}

impl MockHandle {
    /// Queues read outcomes consumed before the default behavior resumes.
    pub fn script_reads(&self, outcomes: impl IntoIterator<Item = ReadOutcome>) {
        lock(&self.state).script.extend(outcomes);
    }

    /// Queues `count` consecutive read failures.
    pub fn fail_reads(&self, count: usize) {
        self.script_reads(std::iter::repeat(ReadOutcome::Fail).take(count));
    }

    /// Makes every `n`th unscripted read fail (0 disables).
    pub fn fail_every(&self, n: u64) {
        lock(&self.state).fail_every = (n > 0).then_some(n);
    }

    /// Makes the next `count` open attempts fail.
    pub fn fail_opens(&self, count: u32) {
        lock(&self.state).failing_opens = count;
    }

    /// Makes the device refuse a parameter.
    pub fn reject_parameter(&self, parameter: DeviceParameter) {
        lock(&self.state).rejected.insert(parameter);
    }

    /// Snapshot of every call received so far.
    pub fn calls(&self) -> Vec<DeviceCall> {
        lock(&self.state).calls.clone()
    }

    /// Clears the call log.
    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Number of `open` calls received.
    pub fn open_count(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::Open(_)))
    }

    /// Number of `close` calls received.
    pub fn close_count(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::Close))
    }

    /// Number of `read` calls received.
    pub fn read_count(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::Read))
    }

    /// Whether the device is currently open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Last value written for a parameter.
    pub fn parameter(&self, parameter: DeviceParameter) -> Option<f64> {
        lock(&self.state).parameters.get(&parameter).copied()
    }

    fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        lock(&self.state).calls.iter().filter(|c| predicate(c)).count()
    }
}

impl CameraDevice for MockDevice {
    fn open(&mut self, device_id: u32) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        state.calls.push(DeviceCall::Open(device_id));
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(DeviceError::OpenFailed(format!(
                "mock device {device_id} is busy"
            )));
        }
        state.open = true;
        tracing::debug!(device_id, "MockDevice opened");
        Ok(())
    }

    fn set_parameter(
        &mut self,
        parameter: DeviceParameter,
        value: f64,
    ) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        state.calls.push(DeviceCall::Set(parameter, value));
        if !state.open {
            return Err(DeviceError::NotOpen);
        }
        if state.rejected.contains(&parameter) {
            return Err(DeviceError::Unsupported(parameter));
        }
        state.parameters.insert(parameter, value);
        Ok(())
    }

    fn get_parameter(&self, parameter: DeviceParameter) -> Option<f64> {
        lock(&self.state).parameters.get(&parameter).copied()
    }

    fn read(&mut self) -> Result<Frame, DeviceError> {
        let mut state = lock(&self.state);
        state.calls.push(DeviceCall::Read);
        if !state.open {
            return Err(DeviceError::NotOpen);
        }

        let outcome = match state.script.pop_front() {
            Some(outcome) => outcome,
            None => {
                state.reads += 1;
                match state.fail_every {
                    Some(n) if state.reads % n == 0 => ReadOutcome::Fail,
                    _ => ReadOutcome::Frame,
                }
            }
        };
        if outcome == ReadOutcome::Fail {
            return Err(DeviceError::ReadFailed("mock sensor returned no data".into()));
        }

        let (width, height) = Self::dimensions(&state);
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| {
                DeviceError::ReadFailed(format!("{width}x{height} frame does not fit in memory"))
            })?;
        state.sequence += 1;
        let sequence = state.sequence;

        // Diagonal ramp per channel, shifted by sequence so frames differ
        let mut pixels = Vec::with_capacity(len);
        for y in 0..u64::from(height) {
            for x in 0..u64::from(width) {
                let base = x + y + sequence;
                pixels.push((base % 256) as u8);
                pixels.push(((base * 3) % 256) as u8);
                pixels.push((x * 255 / u64::from(width)) as u8);
            }
        }

        Ok(Frame::bgr(pixels, width, height, sequence))
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn close(&mut self) {
        let mut state = lock(&self.state);
        state.calls.push(DeviceCall::Close);
        if state.open {
            state.open = false;
            tracing::debug!("MockDevice closed");
        }
    }
}
