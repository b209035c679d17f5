//! Playback session snapshot and outbound notifications
//!
//! `PlaybackSession` is the authoritative state a front-end reads.
//! `EventBus` turns a before/after pair of sessions into edge-triggered
//! `PlayerEvent`s and delivers them to subscribers.

use std::fmt;
use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::audio::DEFAULT_VOLUME;

/// Coarse phase of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "Idle"),
            SessionPhase::Loading => write!(f, "Loading"),
            SessionPhase::Playing => write!(f, "Playing"),
            SessionPhase::Paused => write!(f, "Paused"),
            SessionPhase::Error => write!(f, "Error"),
        }
    }
}

/// Snapshot of one player's playback state
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub phase: SessionPhase,
    pub is_playing: bool,
    pub is_loading: bool,
    /// Master volume in [0, 1]
    pub volume: f32,
    pub is_muted: bool,
    /// Latest user-visible error message
    pub error: Option<String>,
    pub has_interacted: bool,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            is_playing: false,
            is_loading: false,
            volume: DEFAULT_VOLUME,
            is_muted: false,
            error: None,
            has_interacted: false,
        }
    }
}

impl PlaybackSession {
    /// Level actually sent to the output
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted {
            0.0
        } else {
            self.volume
        }
    }
}

/// Outbound notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// `is_playing` went false → true
    Play,
    /// `is_playing` went true → false
    Pause,
    /// The error field changed to a new non-empty message
    Error(String),
}

/// Publishes the notifications implied by session changes.
///
/// The controller hands over the session before and after each action; the
/// bus works out which edges were crossed and fans them out to every live
/// subscriber. A subscriber whose receiver is gone is forgotten on the next
/// delivery.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<PlayerEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receiver for every notification published from now on
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Deliver the edges between `prev` and `next`; returns what was sent
    pub fn publish(&self, prev: &PlaybackSession, next: &PlaybackSession) -> Vec<PlayerEvent> {
        let events = transitions(prev, next);
        if !events.is_empty() {
            self.deliver(&events);
        }
        events
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn deliver(&self, events: &[PlayerEvent]) {
        let Ok(mut subs) = self.subscribers.lock() else {
            return;
        };
        subs.retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
    }
}

/// Notifications implied by moving from `prev` to `next`: a play or pause
/// edge on `is_playing`, then a fresh non-empty error message
pub fn transitions(prev: &PlaybackSession, next: &PlaybackSession) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    match (prev.is_playing, next.is_playing) {
        (false, true) => events.push(PlayerEvent::Play),
        (true, false) => events.push(PlayerEvent::Pause),
        _ => {}
    }
    if let Some(msg) = next.error.as_deref() {
        if !msg.is_empty() && prev.error.as_deref() != Some(msg) {
            events.push(PlayerEvent::Error(msg.to_string()));
        }
    }
    events
}
