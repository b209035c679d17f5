//! Audio-processing context seam
//!
//! The graph lives inside an `AudioContext`. A context starts suspended (no
//! audio leaves the graph), is resumed on a user gesture and is closed exactly
//! once on teardown. `AudioBackend` creates contexts so the player can build
//! its graph lazily on first play.

use tracing::debug;

use crate::error::{PlayerError, Result};

use super::types::{ContextState, ContextStateCell};

/// An audio-processing context owning the graph's lifetime
pub trait AudioContext: Send {
    /// Shared state read by the audio thread
    fn state_cell(&self) -> ContextStateCell;

    fn state(&self) -> ContextState {
        self.state_cell().get()
    }

    /// Transition a suspended context to running. No-op when already running.
    fn resume(&mut self) -> Result<()>;

    /// Release the context. Fails if already closed.
    fn close(&mut self) -> Result<()>;
}

/// Factory for audio contexts
pub trait AudioBackend: Send {
    fn create_context(&mut self) -> Result<Box<dyn AudioContext>>;
}

/// In-process context whose state gates the DSP chain's output
#[derive(Debug, Clone)]
pub struct SoftwareContext {
    state: ContextStateCell,
}

impl SoftwareContext {
    pub fn new(initial: ContextState) -> Self {
        Self {
            state: ContextStateCell::new(initial),
        }
    }
}

impl Default for SoftwareContext {
    fn default() -> Self {
        Self::new(ContextState::Suspended)
    }
}

impl AudioContext for SoftwareContext {
    fn state_cell(&self) -> ContextStateCell {
        self.state.clone()
    }

    fn resume(&mut self) -> Result<()> {
        match self.state.get() {
            ContextState::Closed => Err(PlayerError::Context(
                "cannot resume a closed context".to_string(),
            )),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                self.state.set(ContextState::Running);
                debug!("audio context resumed");
                Ok(())
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.state.get() == ContextState::Closed {
            return Err(PlayerError::Context("context already closed".to_string()));
        }
        self.state.set(ContextState::Closed);
        debug!("audio context closed");
        Ok(())
    }
}

/// Backend producing `SoftwareContext`s
#[derive(Debug, Clone)]
pub struct SoftwareBackend {
    /// Whether new contexts start suspended, as they do before a user gesture
    pub start_suspended: bool,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self {
            start_suspended: true,
        }
    }
}

impl AudioBackend for SoftwareBackend {
    fn create_context(&mut self) -> Result<Box<dyn AudioContext>> {
        let initial = if self.start_suspended {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        Ok(Box::new(SoftwareContext::new(initial)))
    }
}
