//! Shared audio types
//!
//! Pure data types used across the audio subsystem.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Response shape of an equalizer filter stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    LowShelf,
    Peaking,
    HighShelf,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::LowShelf => write!(f, "lowshelf"),
            FilterKind::Peaking => write!(f, "peaking"),
            FilterKind::HighShelf => write!(f, "highshelf"),
        }
    }
}

/// One parametric-equalizer control point.
///
/// Frequency, kind and label are fixed at construction; only the gain moves.
#[derive(Debug, Clone, PartialEq)]
pub struct EqBand {
    pub frequency_hz: f32,
    pub gain_db: f32,
    pub kind: FilterKind,
    pub label: &'static str,
}

impl EqBand {
    pub const fn new(frequency_hz: f32, kind: FilterKind, label: &'static str) -> Self {
        Self {
            frequency_hz,
            gain_db: 0.0,
            kind,
            label,
        }
    }
}

/// Lifecycle of an audio-processing context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    #[default]
    Suspended,
    Running,
    Closed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextState::Suspended => write!(f, "suspended"),
            ContextState::Running => write!(f, "running"),
            ContextState::Closed => write!(f, "closed"),
        }
    }
}

impl ContextState {
    fn to_u8(self) -> u8 {
        match self {
            ContextState::Suspended => 0,
            ContextState::Running => 1,
            ContextState::Closed => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ContextState::Running,
            2 => ContextState::Closed,
            _ => ContextState::Suspended,
        }
    }
}

/// Context state shared between the control thread and the audio thread
#[derive(Debug, Clone, Default)]
pub struct ContextStateCell(Arc<AtomicU8>);

impl ContextStateCell {
    pub fn new(state: ContextState) -> Self {
        Self(Arc::new(AtomicU8::new(state.to_u8())))
    }

    pub fn get(&self) -> ContextState {
        ContextState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ContextState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

/// Lock-free f32 for parameters read on the audio thread
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Shared handle to an audio parameter
pub type SharedParam = Arc<AtomicF32>;
