//! Media source adapter
//!
//! The [`MediaElement`] seam the player drives, the events it reports, and
//! the native [`StreamElement`] that plays HTTP radio streams.

pub mod buffer;
pub mod element;
pub mod stream;
pub mod types;
pub mod watchdog;

pub use element::MediaElement;
pub use stream::StreamElement;
pub use types::{CrossOrigin, MediaEvent, MediaSource, Preload};
