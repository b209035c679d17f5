//! Reconnection policy
//!
//! A single deferred retry with cancel-and-replace semantics: scheduling a
//! retry always discards the pending one, so at most one is ever
//! outstanding. Time is passed in explicitly; the owner polls `fire_due`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    delay: Duration,
    max_attempts: Option<u32>,
    deadline: Option<Instant>,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            delay,
            max_attempts,
            deadline: None,
            attempts: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Retries fired since the last successful playback
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Replace any pending retry with one due `delay` after `now`.
    ///
    /// Returns `false` (and leaves nothing pending) once the attempt ceiling
    /// is reached.
    pub fn schedule(&mut self, now: Instant) -> bool {
        self.deadline = None;
        if let Some(max) = self.max_attempts {
            if self.attempts >= max {
                return false;
            }
        }
        self.deadline = Some(now + self.delay);
        true
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Consume the pending retry if it is due. Counts as one attempt.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.attempts = self.attempts.saturating_add(1);
                true
            }
            _ => false,
        }
    }

    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(3000);

    #[test]
    fn nothing_pending_initially() {
        let mut p = ReconnectPolicy::new(DELAY, None);
        assert!(!p.is_pending());
        assert!(!p.fire_due(Instant::now() + DELAY * 10));
    }

    #[test]
    fn fires_only_after_delay() {
        let t0 = Instant::now();
        let mut p = ReconnectPolicy::new(DELAY, None);
        assert!(p.schedule(t0));
        assert!(!p.fire_due(t0 + Duration::from_millis(2999)));
        assert!(p.fire_due(t0 + DELAY));
        assert!(!p.is_pending());
        assert!(!p.fire_due(t0 + DELAY * 2));
        assert_eq!(p.attempts(), 1);
    }

    #[test]
    fn rescheduling_replaces_pending_retry() {
        let t0 = Instant::now();
        let mut p = ReconnectPolicy::new(DELAY, None);
        p.schedule(t0);
        p.schedule(t0 + Duration::from_millis(1000));
        assert_eq!(p.deadline(), Some(t0 + Duration::from_millis(4000)));
        // the first deadline no longer fires
        assert!(!p.fire_due(t0 + DELAY));
        assert!(p.fire_due(t0 + Duration::from_millis(4000)));
        assert!(!p.fire_due(t0 + Duration::from_millis(9000)));
    }

    #[test]
    fn cancel_discards_pending_retry() {
        let t0 = Instant::now();
        let mut p = ReconnectPolicy::new(DELAY, None);
        p.schedule(t0);
        p.cancel();
        assert!(!p.is_pending());
        assert!(!p.fire_due(t0 + DELAY));
        assert_eq!(p.attempts(), 0);
    }

    #[test]
    fn unbounded_by_default() {
        let mut t = Instant::now();
        let mut p = ReconnectPolicy::new(DELAY, None);
        for _ in 0..100 {
            assert!(p.schedule(t));
            t += DELAY;
            assert!(p.fire_due(t));
        }
        assert_eq!(p.attempts(), 100);
    }

    #[test]
    fn ceiling_stops_scheduling() {
        let mut t = Instant::now();
        let mut p = ReconnectPolicy::new(DELAY, Some(2));
        for _ in 0..2 {
            assert!(p.schedule(t));
            t += DELAY;
            assert!(p.fire_due(t));
        }
        assert!(!p.schedule(t));
        assert!(!p.is_pending());
    }

    #[test]
    fn reset_restores_budget() {
        let t0 = Instant::now();
        let mut p = ReconnectPolicy::new(DELAY, Some(1));
        p.schedule(t0);
        p.fire_due(t0 + DELAY);
        assert!(!p.schedule(t0 + DELAY));
        p.reset_attempts();
        assert!(p.schedule(t0 + DELAY));
    }

    #[test]
    fn zero_delay_fires_immediately() {
        let t0 = Instant::now();
        let mut p = ReconnectPolicy::new(Duration::ZERO, None);
        p.schedule(t0);
        assert!(p.fire_due(t0));
    }
}
