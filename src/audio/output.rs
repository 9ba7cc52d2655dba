//! The output device seam.
//!
//! The engine only ever talks to an [`OutputDevice`]. Devices report the end
//! of a track by sending [`OutputEvent::TrackCompleted`] down the channel
//! registered with [`OutputDevice::set_event_sender`]; they never call back
//! into the engine directly, so the send may happen on any thread.

use super::AudioBuffer;
use crate::error::PlaybackError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Every sample of the buffer loaded with `token` has been played
    TrackCompleted { token: u64 },
}

pub trait OutputDevice {
    /// Replace whatever is loaded with `buffer`, paused at position zero.
    /// `token` is echoed back in the completion event for this buffer.
    fn load(&mut self, buffer: AudioBuffer, token: u64) -> Result<(), PlaybackError>;
    fn start(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    /// Unload and rewind. No completion event follows a stop.
    fn stop(&mut self);
    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError>;
    fn position(&self) -> Duration;
    fn duration(&self) -> Duration;
    fn set_volume(&mut self, volume: f32);
    fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<OutputEvent>);
}

/// A device with no sound card behind it. Time only moves when
/// [`advance`](Self::advance) is called, which makes playback deterministic
/// for tests and for headless runs.
///
/// Clones share state, so a clone kept outside the engine can drive the clock
/// and inspect what was loaded.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    buffer: Option<AudioBuffer>,
    token: u64,
    playing: bool,
    position: Duration,
    volume: f32,
    loads: usize,
    event_sender: Option<mpsc::UnboundedSender<OutputEvent>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Let `elapsed` of playback pass. Returns true if the track ran out,
    /// in which case the completion event has been sent.
    pub fn advance(&self, elapsed: Duration) -> bool {
        let mut state = self.lock();
        let duration = match (&state.buffer, state.playing) {
            (Some(buffer), true) => buffer.duration(),
            _ => return false,
        };

        state.position = (state.position + elapsed).min(duration);
        if state.position < duration {
            return false;
        }

        state.playing = false;
        if let Some(sender) = &state.event_sender {
            let _ = sender.send(OutputEvent::TrackCompleted { token: state.token });
        }
        true
    }

    /// Play out the rest of the current track
    pub fn finish(&self) -> bool {
        let remaining = {
            let state = self.lock();
            state
                .buffer
                .as_ref()
                .map(|b| b.duration().saturating_sub(state.position))
                .unwrap_or_default()
        };
        self.advance(remaining)
    }

    pub fn loaded(&self) -> Option<AudioBuffer> {
        self.lock().buffer.clone()
    }

    pub fn load_count(&self) -> usize {
        self.lock().loads
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }
}

impl OutputDevice for MemoryOutput {
    fn load(&mut self, buffer: AudioBuffer, token: u64) -> Result<(), PlaybackError> {
        let mut state = self.lock();
        state.buffer = Some(buffer);
        state.token = token;
        state.playing = false;
        state.position = Duration::ZERO;
        state.loads += 1;
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        let mut state = self.lock();
        if state.buffer.is_none() {
            return Err(PlaybackError::Output("nothing loaded".to_string()));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.lock().playing = false;
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        state.buffer = None;
        state.playing = false;
        state.position = Duration::ZERO;
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        let mut state = self.lock();
        let duration = state
            .buffer
            .as_ref()
            .map(AudioBuffer::duration)
            .ok_or_else(|| PlaybackError::Output("nothing loaded".to_string()))?;
        state.position = position.min(duration);
        Ok(())
    }

    fn position(&self) -> Duration {
        self.lock().position
    }

    fn duration(&self) -> Duration {
        self.lock()
            .buffer
            .as_ref()
            .map(AudioBuffer::duration)
            .unwrap_or_default()
    }

    fn set_volume(&mut self, volume: f32) {
        self.lock().volume = volume;
    }

    fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<OutputEvent>) {
        self.lock().event_sender = Some(sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_second() -> AudioBuffer {
        AudioBuffer::new(vec![0.0; 1000], 1000, 1)
    }

    #[test]
    fn test_completion_is_sent_with_token() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = MemoryOutput::new();
        output.set_event_sender(tx);

        output.load(one_second(), 7).unwrap();
        assert!(!output.advance(Duration::from_secs(5)), "paused device must not advance");

        output.start().unwrap();
        assert!(!output.advance(Duration::from_millis(600)));
        assert_eq!(output.position(), Duration::from_millis(600));
        assert!(output.advance(Duration::from_millis(600)));
        assert_eq!(rx.try_recv().unwrap(), OutputEvent::TrackCompleted { token: 7 });
        assert!(!output.is_playing());
    }

    #[test]
    fn test_stop_unloads_and_rewinds() {
        let mut output = MemoryOutput::new();
        output.load(one_second(), 1).unwrap();
        output.start().unwrap();
        output.advance(Duration::from_millis(200));

        output.stop();
        assert_eq!(output.position(), Duration::ZERO);
        assert_eq!(output.duration(), Duration::ZERO);
        assert!(output.start().is_err());
    }

    #[test]
    fn test_seek_clamps() {
        let mut output = MemoryOutput::new();
        assert!(output.seek(Duration::from_secs(1)).is_err());

        output.load(one_second(), 1).unwrap();
        output.seek(Duration::from_secs(3)).unwrap();
        assert_eq!(output.position(), Duration::from_secs(1));
    }
}
