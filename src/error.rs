//! Error types for wavdeck
//!
//! Header and sample problems surface as [`FormatError`], failures while
//! starting playback as [`PlaybackError`], and everything is funnelled into
//! the crate-wide [`Error`].

use std::path::PathBuf;
use thiserror::Error;

/// Problems with a WAV container or its sample data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("WAV data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("missing RIFF marker")]
    MissingRiffMarker,

    #[error("sample rate is zero")]
    ZeroSampleRate,

    #[error("channel count is zero")]
    ZeroChannels,

    #[error("unsupported bits per sample: {0} (only 8, 16, 24, 32 supported)")]
    UnsupportedBitDepth(u16),

    #[error("data chunk truncated: header declares {declared} bytes, only {available} available")]
    Truncated { declared: u32, available: usize },
}

/// Failures while opening, decoding or handing a track to the output device
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("failed to read '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("audio output error: {0}")]
    Output(String),
}

/// Main error type for wavdeck
#[derive(Error, Debug)]
pub enum Error {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
