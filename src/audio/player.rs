use super::output::{OutputDevice, OutputEvent};
use super::playlist::Playlist;
use super::scanner::WavScanner;
use super::track::Track;
use super::{wav, AudioBuffer};
use crate::config::{AudioSettings, SharedConfig};
use crate::error::{Error, PlaybackError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// What happens when a track plays to the end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Advance, stopping after the last track
    #[default]
    None,
    /// Replay the same track
    Single,
    /// Advance, wrapping to the first track
    All,
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(RepeatMode::None),
            "single" | "one" => Ok(RepeatMode::Single),
            "all" => Ok(RepeatMode::All),
            other => Err(format!("unknown repeat mode '{}' (expected none, single or all)", other)),
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepeatMode::None => "none",
            RepeatMode::Single => "single",
            RepeatMode::All => "all",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackStarted(PathBuf),
    TrackPaused,
    TrackResumed,
    TrackStopped,
    TrackFinished(PathBuf),
    PlaylistEnded,
    VolumeChanged(f32),
    Error(String),
}

/// Transport state machine over a list of WAV paths.
///
/// The engine owns its output device and all playback state. Every transport
/// call takes `&mut self`; callers sharing an engine between threads wrap it
/// in a mutex or drive it from one task. Completion events from the device
/// are queued and only acted on in [`process_events`](Self::process_events).
pub struct PlaybackEngine<O: OutputDevice> {
    output: O,
    config: SharedConfig,
    playlist_name: Option<String>,
    tracks: Vec<PathBuf>,
    // play order as indices into `tracks`; identity unless shuffled
    order: Vec<usize>,
    current_index: usize,
    repeat_mode: RepeatMode,
    shuffle_enabled: bool,
    state: PlaybackState,
    current_track: Option<Track>,
    volume: Option<f32>,
    load_token: u64,
    // the current load finished while paused; acted on at resume
    pending_completion: bool,
    rng: StdRng,
    output_events: mpsc::UnboundedReceiver<OutputEvent>,
    event_sender: Option<mpsc::UnboundedSender<PlayerEvent>>,
}

impl<O: OutputDevice> PlaybackEngine<O> {
    pub fn new(mut output: O, config: SharedConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        output.set_event_sender(tx);

        Self {
            output,
            config,
            playlist_name: None,
            tracks: Vec::new(),
            order: Vec::new(),
            current_index: 0,
            repeat_mode: RepeatMode::None,
            shuffle_enabled: false,
            state: PlaybackState::Stopped,
            current_track: None,
            volume: None,
            load_token: 0,
            pending_completion: false,
            rng: StdRng::from_entropy(),
            output_events: rx,
            event_sender: None,
        }
    }

    pub fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<PlayerEvent>) {
        self.event_sender = Some(sender);
    }

    fn emit(&self, event: PlayerEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }

    pub fn load_playlist(&mut self, playlist: Playlist) {
        let Playlist { name, tracks } = playlist;
        self.load_tracks(tracks);
        info!("Loaded playlist '{}' ({} tracks)", name, self.tracks.len());
        self.playlist_name = Some(name);
    }

    /// Load every valid WAV file directly inside `dir`. Returns the track count.
    pub fn load_directory<P: AsRef<Path>>(&mut self, dir: P) -> usize {
        let tracks = WavScanner::new().scan_directory(dir.as_ref());
        self.load_tracks(tracks);
        self.playlist_name = None;
        self.tracks.len()
    }

    /// Replace the playlist. Stops playback, resets to natural order and
    /// reshuffles if shuffle is on.
    pub fn load_tracks(&mut self, tracks: Vec<PathBuf>) {
        self.stop();
        self.order = (0..tracks.len()).collect();
        self.tracks = tracks;
        self.current_index = 0;
        if self.shuffle_enabled {
            self.reshuffle(false);
        }
    }

    pub fn play(&mut self) -> Result<()> {
        if self.order.is_empty() {
            debug!("play() with an empty playlist");
            return Ok(());
        }

        match self.state {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Paused if self.pending_completion => {
                self.pending_completion = false;
                self.state = PlaybackState::Playing;
                debug!("Resuming a track that already finished");
                return self.handle_track_completion();
            }
            PlaybackState::Paused
                if self.current_track.is_some() && self.output.position() > Duration::ZERO =>
            {
                if let Err(e) = self.output.start() {
                    return Err(self.fail(e));
                }
                self.state = PlaybackState::Playing;
                self.emit(PlayerEvent::TrackResumed);
                debug!("Resumed at {:?}", self.output.position());
                return Ok(());
            }
            _ => {}
        }

        self.start_current()
    }

    fn start_current(&mut self) -> Result<()> {
        let path = self.tracks[self.order[self.current_index]].clone();
        let settings = self.config.audio();

        let (track, buffer) = match Self::prepare(&path, &settings) {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.fail(e)),
        };

        self.load_token += 1;
        self.pending_completion = false;
        if let Err(e) = self.output.load(buffer, self.load_token) {
            return Err(self.fail(e));
        }
        self.output
            .set_volume(self.volume.unwrap_or(settings.default_volume()));
        if let Err(e) = self.output.start() {
            return Err(self.fail(e));
        }

        info!(
            "Playing '{}' [{}] ({} of {})",
            track.display_title(),
            track.format_summary(),
            self.current_index + 1,
            self.order.len()
        );
        self.current_track = Some(track);
        self.state = PlaybackState::Playing;
        self.emit(PlayerEvent::TrackStarted(path));
        Ok(())
    }

    /// Read, decode and process one file with the settings of this operation
    fn prepare(
        path: &Path,
        settings: &AudioSettings,
    ) -> std::result::Result<(Track, AudioBuffer), PlaybackError> {
        let bytes = fs::read(path).map_err(|source| PlaybackError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let (header, mut buffer) = wav::decode(&bytes).map_err(|source| PlaybackError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        if settings.normalization_enabled() {
            buffer = buffer.normalized();
        }
        buffer = buffer.with_fades(settings.fade_in_ms(), settings.fade_out_ms());

        let track = Track {
            path: path.to_path_buf(),
            header,
        };
        Ok((track, buffer))
    }

    // a failed play leaves the engine stopped; the caller decides what next
    fn fail(&mut self, err: PlaybackError) -> Error {
        error!("Playback failed: {}", err);
        self.output.stop();
        self.current_track = None;
        self.state = PlaybackState::Stopped;
        self.emit(PlayerEvent::Error(err.to_string()));
        Error::Playback(err)
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.output.pause();
        self.state = PlaybackState::Paused;
        self.emit(PlayerEvent::TrackPaused);
        debug!("Paused at {:?}", self.output.position());
    }

    pub fn stop(&mut self) {
        self.output.stop();
        self.pending_completion = false;
        self.current_track = None;
        if self.state != PlaybackState::Stopped {
            self.state = PlaybackState::Stopped;
            self.emit(PlayerEvent::TrackStopped);
            debug!("Stopped");
        }
    }

    pub fn next(&mut self) -> Result<()> {
        if self.order.is_empty() {
            return Ok(());
        }
        self.stop();
        self.current_index = (self.current_index + 1) % self.order.len();
        self.play()
    }

    pub fn previous(&mut self) -> Result<()> {
        if self.order.is_empty() {
            return Ok(());
        }
        self.stop();
        self.current_index = (self.current_index + self.order.len() - 1) % self.order.len();
        self.play()
    }

    /// Jump to `index` in the play order and start it. Out of range is a no-op.
    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.order.len() {
            debug!("Ignoring select({}) on {} tracks", index, self.order.len());
            return Ok(());
        }
        self.stop();
        self.current_index = index;
        self.play()
    }

    /// Move within the loaded track, clamped to its length. Does nothing
    /// when no track is loaded.
    pub fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current_track.is_none() {
            debug!("seek_to() with nothing loaded");
            return Ok(());
        }
        let clamped = position.min(self.output.duration());
        self.output.seek(clamped)?;
        Ok(())
    }

    /// Clamped to `[0, 1]`. Applies now and to every later track.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.volume = Some(volume);
        self.output.set_volume(volume);
        self.emit(PlayerEvent::VolumeChanged(volume));
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
        debug!("Repeat mode: {}", mode);
    }

    /// Enabling (again) draws a fresh permutation; disabling restores the
    /// natural order. The current track is kept in both cases.
    pub fn set_shuffle_mode(&mut self, enabled: bool) {
        if enabled {
            self.shuffle_enabled = true;
            self.reshuffle(true);
        } else if self.shuffle_enabled {
            self.shuffle_enabled = false;
            let current = self.order.get(self.current_index).copied();
            self.order = (0..self.tracks.len()).collect();
            self.current_index = current.unwrap_or(0);
            debug!("Shuffle off");
        }
    }

    /// New permutation starting at index 0. With `keep_current` the track at
    /// the current position, loaded or not, is moved to the front.
    fn reshuffle(&mut self, keep_current: bool) {
        let current = if keep_current {
            self.order.get(self.current_index).copied()
        } else {
            None
        };

        self.order.shuffle(&mut self.rng);
        if let Some(track_index) = current {
            if let Some(pos) = self.order.iter().position(|&i| i == track_index) {
                self.order.swap(0, pos);
            }
        }
        self.current_index = 0;
        debug!("Shuffled {} tracks", self.order.len());
    }

    /// Act on everything the output device has reported since the last call.
    /// Returns how many completions were handled.
    pub fn process_events(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Ok(event) = self.output_events.try_recv() {
            match event {
                OutputEvent::TrackCompleted { token } => {
                    if token != self.load_token {
                        debug!(
                            "Ignoring completion for load {} (current load {})",
                            token, self.load_token
                        );
                        continue;
                    }
                    match self.state {
                        PlaybackState::Playing => {}
                        PlaybackState::Paused => {
                            debug!("Load {} finished while paused", token);
                            self.pending_completion = true;
                            continue;
                        }
                        PlaybackState::Stopped => continue,
                    }
                    handled += 1;
                    self.handle_track_completion()?;
                }
            }
        }
        Ok(handled)
    }

    fn handle_track_completion(&mut self) -> Result<()> {
        if let Some(track) = &self.current_track {
            self.emit(PlayerEvent::TrackFinished(track.path.clone()));
        }

        match self.repeat_mode {
            RepeatMode::None => {
                if self.current_index + 1 < self.order.len() {
                    self.next()
                } else {
                    info!("Reached the end of the playlist");
                    self.stop();
                    self.emit(PlayerEvent::PlaylistEnded);
                    Ok(())
                }
            }
            RepeatMode::Single => {
                self.stop();
                self.play()
            }
            RepeatMode::All => self.next(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Position in the play order
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Path at the current position, loaded or not
    pub fn current_track(&self) -> Option<&Path> {
        self.order
            .get(self.current_index)
            .map(|&i| self.tracks[i].as_path())
    }

    pub fn loaded_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn play_order(&self) -> Vec<&Path> {
        self.order.iter().map(|&i| self.tracks[i].as_path()).collect()
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }

    pub fn playlist_name(&self) -> Option<&str> {
        self.playlist_name.as_deref()
    }

    pub fn position(&self) -> Duration {
        if self.current_track.is_some() {
            self.output.position()
        } else {
            Duration::ZERO
        }
    }

    pub fn duration(&self) -> Duration {
        if self.current_track.is_some() {
            self.output.duration()
        } else {
            Duration::ZERO
        }
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    pub fn volume(&self) -> f32 {
        self.volume
            .unwrap_or_else(|| self.config.audio().default_volume())
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}
