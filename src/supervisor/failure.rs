//! Consecutive read failure tracking.

/// Consecutive failures that trigger a close/reopen cycle.
pub const REINIT_THRESHOLD: u32 = 5;

/// Counts consecutive read failures.
///
/// Reset on every successful read and after every reinitialization attempt,
/// so a device that stays dead is retried once per threshold failures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailureCounter {
    count: u32,
}

impl FailureCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure and returns the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// True once the threshold has been reached.
    pub fn should_reinitialize(&self) -> bool {
        self.count >= REINIT_THRESHOLD
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn get(&self) -> u32 {
        self.count
    }
}
