//! Stall watchdog
//!
//! Pure-logic state machine over the decoder's frame counter. The stream
//! element samples it on every engine tick and turns its signals into
//! `Stalled` / `Playing` events. No I/O.

use std::time::{Duration, Instant};

use crate::config::timeouts::STALL_TIMEOUT_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Playback started, no frames seen yet
    Starting,
    Flowing,
    Stalled,
}

/// Edge reported by [`StallWatchdog::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSignal {
    Stalled,
    Recovered,
}

pub struct StallWatchdog {
    state: FlowState,
    last_count: u64,
    last_progress: Instant,
    timeout: Duration,
}

impl StallWatchdog {
    pub fn new(now: Instant) -> Self {
        Self::with_timeout(now, Duration::from_millis(STALL_TIMEOUT_MS))
    }

    pub fn with_timeout(now: Instant, timeout: Duration) -> Self {
        Self {
            state: FlowState::Starting,
            last_count: 0,
            last_progress: now,
            timeout,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Feed the current frame count. Returns a signal on state edges only.
    pub fn update(&mut self, frame_count: u64, now: Instant) -> Option<FlowSignal> {
        if frame_count > self.last_count {
            self.last_count = frame_count;
            self.last_progress = now;
            let previous = self.state;
            self.state = FlowState::Flowing;
            return (previous == FlowState::Stalled).then_some(FlowSignal::Recovered);
        }

        let idle = now.saturating_duration_since(self.last_progress);
        if self.state != FlowState::Stalled && idle >= self.timeout {
            self.state = FlowState::Stalled;
            return Some(FlowSignal::Stalled);
        }
        None
    }

    /// Restart the idle clock, e.g. after a pause
    pub fn rearm(&mut self, now: Instant) {
        self.last_progress = now;
        if self.state == FlowState::Stalled {
            self.state = FlowState::Flowing;
        }
    }
}
