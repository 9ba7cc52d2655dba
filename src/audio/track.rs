use super::wav::{self, WavHeader};
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A playlist entry whose header has been read and validated
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub path: PathBuf,
    pub header: WavHeader,
}

impl Track {
    /// Read the header now. Nothing is cached, so reopening picks up changes
    /// made to the file in between.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = wav::read_header(&path)?;
        Ok(Self { path, header })
    }

    pub fn duration(&self) -> Duration {
        self.header.duration()
    }

    pub fn display_title(&self) -> String {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("Unknown")
            .to_string()
    }

    /// `44.1 kHz, 2 ch, 16-bit`
    pub fn format_summary(&self) -> String {
        format!(
            "{:.1} kHz, {} ch, {}-bit",
            self.header.sample_rate as f64 / 1000.0,
            self.header.channels,
            self.header.bits_per_sample
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::fixtures::write_tone;
    use tempfile::TempDir;

    #[test]
    fn test_open_reads_header() {
        let dir = TempDir::new().unwrap();
        let path = write_tone(dir.path(), "Morning Song.wav", 2_000, 0);

        let track = Track::open(&path).unwrap();
        assert_eq!(track.display_title(), "Morning Song");
        assert_eq!(track.duration(), Duration::from_secs(2));
        assert_eq!(track.format_summary(), "1.0 kHz, 1 ch, 16-bit");
    }

    #[test]
    fn test_open_rejects_non_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, "just some text").unwrap();
        assert!(Track::open(&path).is_err());
    }
}
