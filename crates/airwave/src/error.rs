//! Error types for Airwave
//!
//! Centralized error handling using thiserror. `MediaError` is what a media
//! element reports; `PlayerError` is everything else the core can return.

use thiserror::Error;

/// Failure reported by a media element.
///
/// Display strings are the user-visible messages stored in the session
/// snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Playback aborted")]
    Aborted,

    #[error("Network error. Check your connection.")]
    Network,

    #[error("Audio decode error. File may be corrupted.")]
    Decode,

    #[error("Audio format not supported or file not found.")]
    SrcNotSupported,

    /// A play request was refused without a reason
    #[error("Failed to play stream")]
    PlayFailed,

    /// Anything else, with the platform's own message when it has one
    #[error("{}", other_message(.0))]
    Other(Option<String>),
}

impl MediaError {
    /// Whether this failure points at connectivity rather than format or abort.
    ///
    /// Network-class failures are the only ones the player retries.
    pub fn is_network(&self) -> bool {
        match self {
            MediaError::Network => true,
            MediaError::Other(Some(msg)) => msg.to_ascii_lowercase().contains("network"),
            _ => false,
        }
    }
}

fn other_message(msg: &Option<String>) -> &str {
    match msg.as_deref() {
        Some(m) if !m.trim().is_empty() => m,
        _ => "Unknown error occurred",
    }
}

/// Main error type for the player core
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("{}", friendly_network_error(.0))]
    Network(#[from] reqwest::Error),

    #[error("Audio graph error: {0}")]
    Graph(String),

    #[error("Audio context error: {0}")]
    Context(String),

    #[error("Audio output error: {0}")]
    Output(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No equalizer band at index {0}")]
    InvalidBand(usize),

    #[error("Player has been unmounted")]
    Unmounted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Airwave
pub type Result<T> = std::result::Result<T, PlayerError>;

fn friendly_network_error(e: &reqwest::Error) -> String {
    if e.is_builder() {
        if let Some(url) = e.url() {
            return format!("Invalid URL: {url}");
        }
        return "Invalid URL".to_string();
    }
    if e.is_connect() {
        if let Some(url) = e.url() {
            return format!("Could not connect to {}", url.host_str().unwrap_or("server"));
        }
        return "Could not connect to server".to_string();
    }
    if e.is_timeout() {
        return "Connection timed out".to_string();
    }
    format!("Network error: {e}")
}
