use super::wav;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Finds playable WAV files in a directory
#[derive(Debug, Clone)]
pub struct WavScanner {
    recursive: bool,
}

impl WavScanner {
    /// Top-level files only
    pub fn new() -> Self {
        Self { recursive: false }
    }

    pub fn recursive() -> Self {
        Self { recursive: true }
    }

    /// Valid `.wav` files under `dir`, sorted by path. A missing directory
    /// yields an empty list.
    pub fn scan_directory<P: AsRef<Path>>(&self, dir: P) -> Vec<PathBuf> {
        let dir = dir.as_ref();
        let mut walker = WalkDir::new(dir).follow_links(true).min_depth(1);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut tracks = Vec::new();
        for entry in walker.into_iter().filter_map(Result::ok) {
            let path = entry.path();

            if !entry.file_type().is_file() {
                continue;
            }

            // Skip hidden files (dotfiles)
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with('.'))
            {
                continue;
            }

            if !Self::has_wav_extension(path) {
                continue;
            }

            if wav::is_valid(path) {
                tracks.push(path.to_path_buf());
            } else {
                debug!("Skipping unreadable WAV: {}", path.display());
            }
        }

        tracks.sort();
        info!("Found {} WAV files in {}", tracks.len(), dir.display());
        tracks
    }

    fn has_wav_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("wav"))
    }
}

impl Default for WavScanner {
    fn default() -> Self {
        Self::new()
    }
}
