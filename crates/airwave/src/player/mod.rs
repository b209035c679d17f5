//! Playback session, reconnection and the controller that ties them together

pub mod controller;
pub mod reconnect;
pub mod state;

#[cfg(test)]
pub(crate) mod fakes;

pub use controller::{GraphStatus, RadioPlayer};
pub use reconnect::ReconnectPolicy;
pub use state::{EventBus, PlaybackSession, PlayerEvent, SessionPhase};
