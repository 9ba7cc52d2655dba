use super::output::{OutputDevice, OutputEvent};
use super::AudioBuffer;
use crate::error::PlaybackError;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

// rodio has no end-of-source callback, so a watcher polls the sink
const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// The default sound card, through rodio
pub struct RodioOutput {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Option<Arc<Sink>>,
    duration: Duration,
    volume: f32,
    event_sender: Option<mpsc::UnboundedSender<OutputEvent>>,
    watcher_cancel: Option<Arc<AtomicBool>>,
}

impl RodioOutput {
    pub fn new() -> Result<Self, PlaybackError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Output(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
            duration: Duration::ZERO,
            volume: 1.0,
            event_sender: None,
            watcher_cancel: None,
        })
    }

    fn cancel_watcher(&mut self) {
        if let Some(cancel) = self.watcher_cancel.take() {
            cancel.store(true, Ordering::SeqCst);
        }
    }

    fn spawn_watcher(&mut self, sink: Arc<Sink>, token: u64) -> Result<(), PlaybackError> {
        let Some(sender) = self.event_sender.clone() else {
            return Ok(());
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let cancelled = Arc::clone(&cancel);

        thread::Builder::new()
            .name("wavdeck-output-watch".to_string())
            .spawn(move || loop {
                thread::sleep(WATCH_INTERVAL);
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                if sink.empty() {
                    debug!("Sink drained for load {}", token);
                    let _ = sender.send(OutputEvent::TrackCompleted { token });
                    return;
                }
            })
            .map_err(|e| PlaybackError::Output(format!("failed to spawn watcher: {}", e)))?;

        self.watcher_cancel = Some(cancel);
        Ok(())
    }
}

impl OutputDevice for RodioOutput {
    fn load(&mut self, buffer: AudioBuffer, token: u64) -> Result<(), PlaybackError> {
        self.stop();

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| PlaybackError::Output(e.to_string()))?;
        sink.pause();
        sink.set_volume(self.volume);

        self.duration = buffer.duration();
        sink.append(SamplesBuffer::new(
            buffer.channels,
            buffer.sample_rate,
            buffer.samples,
        ));

        let sink = Arc::new(sink);
        self.spawn_watcher(Arc::clone(&sink), token)?;
        self.sink = Some(sink);
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        match &self.sink {
            Some(sink) => {
                sink.play();
                Ok(())
            }
            None => Err(PlaybackError::Output("nothing loaded".to_string())),
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn stop(&mut self) {
        self.cancel_watcher();
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.duration = Duration::ZERO;
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| PlaybackError::Output("nothing loaded".to_string()))?;

        sink.try_seek(position.min(self.duration)).map_err(|e| {
            warn!("Seek failed: {}", e);
            PlaybackError::Output(e.to_string())
        })
    }

    fn position(&self) -> Duration {
        self.sink
            .as_ref()
            .map(|sink| sink.get_pos())
            .unwrap_or_default()
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<OutputEvent>) {
        self.event_sender = Some(sender);
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        self.cancel_watcher();
    }
}
