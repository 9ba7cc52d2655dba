pub mod buffer;
pub mod output;
pub mod player;
pub mod playlist;
#[cfg(feature = "audio")]
pub mod rodio_output;
pub mod scanner;
pub mod track;
pub mod wav;

pub use buffer::AudioBuffer;
pub use output::{MemoryOutput, OutputDevice, OutputEvent};
pub use player::{PlaybackEngine, PlaybackState, PlayerEvent, RepeatMode};
pub use playlist::{Playlist, PlaylistStore};
#[cfg(feature = "audio")]
pub use rodio_output::RodioOutput;
pub use scanner::WavScanner;
pub use track::Track;
pub use wav::WavHeader;
