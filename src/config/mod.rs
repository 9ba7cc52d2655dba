// Configuration management for wavdeck
// Handles loading/saving settings, with sensible defaults when config is missing

use crate::error::{Error, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub playlist_directory: PathBuf,
    /// Played by `wavdeck play` when no playlist or directory is given
    #[serde(default)]
    pub music_directory: Option<PathBuf>,
    #[serde(default)]
    pub audio: AudioSettings,
}

/// Settings read by the playback engine at the start of every operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    default_volume: f32,
    fade_in_ms: u64,
    fade_out_ms: u64,
    normalization_enabled: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            default_volume: 1.0,
            fade_in_ms: 500,
            fade_out_ms: 500,
            normalization_enabled: true,
        }
    }
}

impl AudioSettings {
    pub fn default_volume(&self) -> f32 {
        self.default_volume
    }

    /// Clamped to `[0, 1]`
    pub fn set_default_volume(&mut self, volume: f32) {
        self.default_volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
    }

    pub fn fade_in_ms(&self) -> u64 {
        self.fade_in_ms
    }

    /// Negative durations become zero
    pub fn set_fade_in_ms(&mut self, ms: i64) {
        self.fade_in_ms = ms.max(0) as u64;
    }

    pub fn fade_out_ms(&self) -> u64 {
        self.fade_out_ms
    }

    pub fn set_fade_out_ms(&mut self, ms: i64) {
        self.fade_out_ms = ms.max(0) as u64;
    }

    pub fn normalization_enabled(&self) -> bool {
        self.normalization_enabled
    }

    pub fn set_normalization_enabled(&mut self, enabled: bool) {
        self.normalization_enabled = enabled;
    }

    // files edited by hand can carry anything
    fn sanitize(&mut self) {
        let volume = self.default_volume;
        self.set_default_volume(volume);
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wavdeck");

        Self {
            playlist_directory: config_dir.join("playlists"),
            music_directory: dirs::audio_dir(),
            audio: AudioSettings::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            info!("Wrote default configuration to {}", config_path.display());
            Ok(config)
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.audio.sanitize();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path()?)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?
            .join("wavdeck");

        Ok(config_dir.join("config.toml"))
    }
}

/// The process-wide configuration, handed to every component that reads it.
///
/// Clones share one instance. Readers take a [`snapshot`](Self::snapshot) at
/// the start of an operation, so an update lands on the next operation.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Config>>,
}

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn snapshot(&self) -> Config {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn audio(&self) -> AudioSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .audio
            .clone()
    }

    pub fn update<F: FnOnce(&mut Config)>(&self, f: F) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_setters_clamp() {
        let mut audio = AudioSettings::default();

        audio.set_default_volume(1.7);
        assert_eq!(audio.default_volume(), 1.0);
        audio.set_default_volume(-0.2);
        assert_eq!(audio.default_volume(), 0.0);
        audio.set_default_volume(0.35);
        assert_eq!(audio.default_volume(), 0.35);

        audio.set_fade_in_ms(-50);
        assert_eq!(audio.fade_in_ms(), 0);
        audio.set_fade_out_ms(250);
        assert_eq!(audio.fade_out_ms(), 250);
    }

    #[test]
    fn test_defaults() {
        let audio = AudioSettings::default();
        assert_eq!(audio.default_volume(), 1.0);
        assert_eq!(audio.fade_in_ms(), 500);
        assert_eq!(audio.fade_out_ms(), 500);
        assert!(audio.normalization_enabled());
    }

    #[test]
    fn test_round_trip_and_clamp_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.playlist_directory = dir.path().join("lists");
        config.audio.set_fade_in_ms(120);
        config.audio.set_default_volume(0.5);
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);

        let edited = fs::read_to_string(&path)
            .unwrap()
            .replace("default_volume = 0.5", "default_volume = 3.5");
        fs::write(&path, edited).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().audio.default_volume(), 1.0);
    }

    #[test]
    fn test_partial_audio_section_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "playlist_directory = \"/tmp/lists\"\n\n[audio]\nfade_in_ms = 10\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.music_directory, None);
        assert_eq!(config.audio.fade_in_ms(), 10);
        assert_eq!(config.audio.fade_out_ms(), 500);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "playlist_directory = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_shared_updates_are_visible_to_clones() {
        let shared = SharedConfig::new(Config::default());
        let reader = shared.clone();

        shared.update(|cfg| cfg.audio.set_normalization_enabled(false));
        assert!(!reader.audio().normalization_enabled());
    }
}
