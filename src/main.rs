// wavdeck - WAV playlist player for the terminal
// Plays playlists or directories through the sound card and manages saved playlists

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;
use wavdeck::audio::{MemoryOutput, OutputDevice, PlayerEvent, Track};
use wavdeck::{Config, PlaybackEngine, PlaybackState, PlaylistStore, RepeatMode, SharedConfig};

// how often the play loop checks for finished tracks
const TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "wavdeck", version)]
#[command(about = "Play and organise WAV playlists from the terminal")]
struct Args {
    /// Enable developer logging (stderr + debug output)
    #[arg(long, global = true)]
    dev: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the format of a WAV file
    Info { file: PathBuf },

    /// Play a saved playlist or every WAV file in a directory
    Play {
        #[arg(long, conflicts_with = "dir")]
        playlist: Option<String>,

        #[arg(long)]
        dir: Option<PathBuf>,

        /// none, single or all
        #[arg(long, default_value = "none")]
        repeat: RepeatMode,

        #[arg(long)]
        shuffle: bool,

        /// 0.0 to 1.0, overrides the configured default
        #[arg(long)]
        volume: Option<f32>,

        /// Position in the play order to start from
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Run the transport without a sound card
        #[arg(long)]
        silent: bool,
    },

    /// Manage saved playlists
    #[command(subcommand)]
    Playlist(PlaylistCommand),
}

#[derive(Subcommand)]
enum PlaylistCommand {
    List,
    Show { name: String },
    /// Create or overwrite a playlist
    Save {
        name: String,
        #[arg(required = true)]
        tracks: Vec<PathBuf>,
    },
    Add { name: String, track: PathBuf },
    Remove { name: String, track: PathBuf },
    /// Move the entry at FROM to TO (zero-based)
    Move { name: String, from: usize, to: usize },
    Delete { name: String },
}

struct PlayOptions {
    playlist: Option<String>,
    dir: Option<PathBuf>,
    repeat: RepeatMode,
    shuffle: bool,
    volume: Option<f32>,
    start: usize,
}

fn init_logging(dev: bool) -> Result<()> {
    let log_dir = PathBuf::from("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "wavdeck.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let base_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wavdeck=debug"));

    let writer = if dev {
        BoxMakeWriter::new(file_writer.and(std::io::stderr))
    } else {
        BoxMakeWriter::new(file_writer)
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(base_filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // the guard must outlive main or buffered lines are lost
    std::mem::forget(_guard);

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) if path.exists() => Config::load_from(path)
            .with_context(|| format!("reading config {}", path.display())),
        Some(path) => {
            let config = Config::default();
            config.save_to(path)?;
            info!("Wrote default configuration to {}", path.display());
            Ok(config)
        }
        None => Ok(Config::load()?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.dev)?;

    let config = load_config(args.config.as_ref())?;
    debug!("Playlists in {}", config.playlist_directory.display());

    match args.command {
        Command::Info { file } => show_info(file),
        Command::Playlist(command) => {
            let store = PlaylistStore::new(config.playlist_directory.clone());
            run_playlist_command(&store, command)
        }
        Command::Play {
            playlist,
            dir,
            repeat,
            shuffle,
            volume,
            start,
            silent,
        } => {
            let options = PlayOptions {
                playlist,
                dir,
                repeat,
                shuffle,
                volume,
                start,
            };
            run_play(config, options, silent).await
        }
    }
}

fn show_info(file: PathBuf) -> Result<()> {
    let track = Track::open(&file).with_context(|| format!("{} is not a playable WAV file", file.display()))?;

    println!("🎵 {}", track.display_title());
    println!("   Format:   {}", track.format_summary());
    println!("   Duration: {}", format_duration(track.duration()));
    println!("   Data:     {} bytes", track.header.data_size);
    Ok(())
}

fn run_playlist_command(store: &PlaylistStore, command: PlaylistCommand) -> Result<()> {
    match command {
        PlaylistCommand::List => {
            let names = store.list()?;
            if names.is_empty() {
                println!("No playlists in {}", store.directory().display());
            }
            for name in names {
                println!("{}", name);
            }
        }
        PlaylistCommand::Show { name } => {
            let tracks = store.load(&name)?;
            println!("📜 {} ({} tracks)", name, tracks.len());
            for (i, track) in tracks.iter().enumerate() {
                println!("{:>4}  {}", i, track.display());
            }
        }
        PlaylistCommand::Save { name, tracks } => {
            store.save(&name, &tracks)?;
            println!("✅ Saved '{}' with {} tracks", name, tracks.len());
        }
        PlaylistCommand::Add { name, track } => {
            if store.add_track(&name, &track)? {
                println!("✅ Added {}", track.display());
            } else {
                println!("Not added: already listed or not a valid WAV file");
            }
        }
        PlaylistCommand::Remove { name, track } => {
            if store.remove_track(&name, &track)? {
                println!("✅ Removed {}", track.display());
            } else {
                println!("{} is not in '{}'", track.display(), name);
            }
        }
        PlaylistCommand::Move { name, from, to } => {
            if store.reorder(&name, from, to)? {
                println!("✅ Moved {} -> {}", from, to);
            } else {
                println!("Nothing to move");
            }
        }
        PlaylistCommand::Delete { name } => {
            store.delete(&name)?;
            println!("🗑️  Deleted '{}'", name);
        }
    }
    Ok(())
}

async fn run_play(config: Config, options: PlayOptions, silent: bool) -> Result<()> {
    let shared = SharedConfig::new(config);

    #[cfg(feature = "audio")]
    if !silent {
        let output = wavdeck::audio::RodioOutput::new().context("opening the audio device")?;
        return drive(PlaybackEngine::new(output, shared.clone()), &shared, options, None).await;
    }

    #[cfg(not(feature = "audio"))]
    if !silent {
        warn!("Built without the audio feature, playing silently");
    }

    let clock = MemoryOutput::new();
    let engine = PlaybackEngine::new(clock.clone(), shared.clone());
    drive(engine, &shared, options, Some(clock)).await
}

/// Run the engine until the playlist ends or Ctrl-C. `clock` is advanced in
/// real time when playing without a sound card.
async fn drive<O: OutputDevice>(
    mut engine: PlaybackEngine<O>,
    shared: &SharedConfig,
    options: PlayOptions,
    clock: Option<MemoryOutput>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.set_event_sender(tx);

    let config = shared.snapshot();
    match (&options.playlist, &options.dir) {
        (Some(name), _) => {
            let store = PlaylistStore::new(config.playlist_directory.clone());
            if !store.exists(name) {
                bail!("no playlist named '{}' in {}", name, store.directory().display());
            }
            engine.load_playlist(store.playlist(name)?);
        }
        (None, Some(dir)) => {
            engine.load_directory(dir);
        }
        (None, None) => match &config.music_directory {
            Some(dir) => {
                engine.load_directory(dir);
            }
            None => bail!("give --playlist or --dir, or set music_directory in the config"),
        },
    }

    if engine.tracks().is_empty() {
        println!("Nothing to play");
        return Ok(());
    }

    engine.set_repeat_mode(options.repeat);
    engine.set_shuffle_mode(options.shuffle);
    if let Some(volume) = options.volume {
        engine.set_volume(volume);
    }

    info!(
        "Starting playback: {} tracks, repeat {}, shuffle {}",
        engine.tracks().len(),
        options.repeat,
        options.shuffle
    );
    engine.select(options.start.min(engine.tracks().len() - 1))?;
    print_events(&mut rx);

    let mut ticker = tokio::time::interval(TICK);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(clock) = &clock {
                    clock.advance(TICK);
                }
                if let Err(e) = engine.process_events() {
                    warn!("Track failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                engine.stop();
            }
        }

        print_events(&mut rx);
        if engine.state() == PlaybackState::Stopped {
            break;
        }
    }

    Ok(())
}

fn print_events(rx: &mut mpsc::UnboundedReceiver<PlayerEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            PlayerEvent::TrackStarted(path) => println!("▶️  {}", path.display()),
            PlayerEvent::TrackPaused => println!("⏸️  Paused"),
            PlayerEvent::TrackResumed => println!("▶️  Resumed"),
            PlayerEvent::TrackStopped => {}
            PlayerEvent::TrackFinished(_) => {}
            PlayerEvent::PlaylistEnded => println!("🏁 End of playlist"),
            PlayerEvent::VolumeChanged(volume) => println!("🔊 Volume {:.0}%", volume * 100.0),
            PlayerEvent::Error(message) => eprintln!("❌ {}", message),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}.{:03}", secs / 60, secs % 60, duration.subsec_millis())
}
