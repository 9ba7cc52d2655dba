// wavdeck library - WAV decoding, playlists and the playback engine
// The CLI in main.rs is a thin layer over these modules

pub mod audio;  // decoding, effects, playlists, playback
pub mod config; // settings shared with the engine
pub mod error;

pub use audio::{PlaybackEngine, PlaybackState, Playlist, PlaylistStore, RepeatMode, Track};
pub use config::{Config, SharedConfig};
pub use error::{Error, Result};
