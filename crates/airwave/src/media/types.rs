//! Media element data types

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::MediaError;

/// How much of the stream to fetch before `play()` is called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    /// Fetch nothing until playback is requested
    None,
    /// Only resolve what the stream is
    #[default]
    Metadata,
    /// Connect and buffer right away
    Auto,
}

/// Credentials policy for the stream request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOrigin {
    /// Send no credentials, even ones embedded in the URL
    #[default]
    Anonymous,
    UseCredentials,
}

/// What the element plays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub url: String,
    pub preload: Preload,
    pub cross_origin: CrossOrigin,
}

impl MediaSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            preload: Preload::default(),
            cross_origin: CrossOrigin::default(),
        }
    }

    /// URL to request, with embedded credentials removed for anonymous requests
    pub fn request_url(&self) -> Result<Url, MediaError> {
        let mut url = Url::parse(self.url.trim()).map_err(|_| MediaError::SrcNotSupported)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MediaError::SrcNotSupported);
        }
        if self.cross_origin == CrossOrigin::Anonymous {
            let _ = url.set_username("");
            let _ = url.set_password(None);
        }
        Ok(url)
    }

    /// Container hint from the URL path's extension, e.g. `mp3` or `aac`
    pub fn extension_hint(&self) -> Option<String> {
        let url = Url::parse(self.url.trim()).ok()?;
        let last = url.path_segments()?.next_back()?;
        let (_, ext) = last.rsplit_once('.')?;
        (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
    }
}

/// Lifecycle notifications a media element emits
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Began fetching the source
    LoadStart,
    /// Enough data to start playback
    CanPlay,
    /// Playback is waiting for data
    Waiting,
    /// Data stopped arriving
    Stalled,
    /// Audio is flowing
    Playing,
    /// Stream reached its end
    Ended,
    Error(MediaError),
    /// The play request tagged `generation` started playback
    PlayResolved { generation: u64 },
    /// The play request tagged `generation` failed
    PlayRejected { generation: u64, error: MediaError },
}

impl fmt::Display for MediaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaEvent::LoadStart => write!(f, "loadstart"),
            MediaEvent::CanPlay => write!(f, "canplay"),
            MediaEvent::Waiting => write!(f, "waiting"),
            MediaEvent::Stalled => write!(f, "stalled"),
            MediaEvent::Playing => write!(f, "playing"),
            MediaEvent::Ended => write!(f, "ended"),
            MediaEvent::Error(e) => write!(f, "error({e})"),
            MediaEvent::PlayResolved { generation } => write!(f, "play#{generation} resolved"),
            MediaEvent::PlayRejected { generation, error } => {
                write!(f, "play#{generation} rejected: {error}")
            }
        }
    }
}
