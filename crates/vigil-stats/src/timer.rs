//! Frame-counted countdown timer.

use serde::{Deserialize, Serialize};

/// Which end of its range a timer resets to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerReset {
    /// Restart the countdown from the full duration.
    Begin,
    /// Mark the countdown as elapsed.
    End,
}

/// Countdown measured in simulation frames.
///
/// A timer is "at end" once `current` reaches zero; ticking an ended timer is
/// a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timer {
    current: u32,
    duration: u32,
}

impl Timer {
    /// Creates an elapsed timer with the given duration.
    #[must_use]
    pub const fn new(duration: u32) -> Self {
        Self {
            current: 0,
            duration,
        }
    }

    /// Advances one frame.
    pub fn tick(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    /// True once the countdown has elapsed.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.current == 0
    }

    /// True while the countdown is at its full duration.
    #[must_use]
    pub const fn is_begin(&self) -> bool {
        self.current == self.duration
    }

    /// Frames left.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Full duration in frames.
    #[must_use]
    pub const fn duration(&self) -> u32 {
        self.duration
    }

    /// Sets the remaining frames, capped at the duration.
    pub fn set_current(&mut self, frames: u32) {
        self.current = frames.min(self.duration);
    }

    /// Sets the duration and restarts the countdown.
    pub fn set_duration(&mut self, frames: u32) {
        self.duration = frames;
        self.current = frames;
    }

    /// Resets to one end of the range.
    pub fn reset(&mut self, to: TimerReset) {
        self.current = match to {
            TimerReset::Begin => self.duration,
            TimerReset::End => 0,
        };
    }
}
