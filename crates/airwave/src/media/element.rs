//! Media element seam
//!
//! The player drives playback through this trait and learns what happened
//! only through polled [`MediaEvent`]s. `StreamElement` is the native
//! implementation; tests script their own.

use crate::audio::GraphTap;
use crate::error::Result;

use super::types::{MediaEvent, MediaSource};

pub trait MediaElement {
    /// Point the element at a new source. Discards any current playback.
    fn load(&mut self, source: &MediaSource);

    /// Request playback. The outcome arrives later as
    /// `PlayResolved` / `PlayRejected` carrying the same `generation`.
    fn play(&mut self, generation: u64);

    fn pause(&mut self);

    /// Element-level volume in [0, 1]
    fn set_volume(&mut self, volume: f32);

    /// Send decoded audio through the processing graph instead of straight
    /// to the output. Takes effect for playback started after this call.
    fn route_through(&mut self, tap: GraphTap) -> Result<()>;

    /// Stop playback and release the source
    fn detach(&mut self);

    /// Next pending lifecycle event, if any
    fn poll_event(&mut self) -> Option<MediaEvent>;
}
