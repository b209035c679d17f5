//! Airwave: live radio player core
//!
//! Playback session state machine, reconnection policy, a lazily built
//! audio-processing graph (5-band EQ, spectrum analyzer, gain) and the
//! spectrum/equalizer view models a front-end draws from.
//!
//! ## Quick start
//!
//! ```no_run
//! use airwave::audio::SoftwareBackend;
//! use airwave::media::StreamElement;
//! use airwave::player::RadioPlayer;
//! use airwave::PlayerConfig;
//!
//! let config = PlayerConfig::new("https://host/stream.mp3");
//! let element = StreamElement::new().unwrap();
//! let mut player = RadioPlayer::mount(config, element, Box::new(SoftwareBackend::default())).unwrap();
//! player.play();
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod media;
pub mod player;
pub mod visual;

pub use config::PlayerConfig;
pub use error::{MediaError, PlayerError, Result};
