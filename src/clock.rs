//! Logical simulation clock.
//!
//! Each scheduler owns exactly one clock. There is no process-wide time, so
//! any number of simulations can run side by side.

use crate::error::{SimError, SimResult};
use crate::types::SimTime;

/// Current simulated time of a single simulation instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Clock {
    now: SimTime,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Time `diff` ticks ahead of now.
    pub fn ahead(&self, diff: SimTime) -> SimResult<SimTime> {
        self.now.checked_add(diff).ok_or(SimError::Overflow)
    }

    /// Time `diff` ticks behind now.
    pub fn behind(&self, diff: SimTime) -> SimResult<SimTime> {
        self.now.checked_sub(diff).ok_or(SimError::Underflow {
            current: self.now,
            diff,
        })
    }

    pub(crate) fn set(&mut self, time: SimTime) {
        self.now = time;
    }
}
