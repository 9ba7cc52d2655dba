use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::wav;
use crate::error::Result;

const PLAYLIST_EXTENSION: &str = "playlist";

/// An ordered list of track paths under a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<PathBuf>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, tracks: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            tracks,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Playlists persisted as `<dir>/<name>.playlist`, one track path per line.
///
/// Every mutation loads the record, edits it in memory and rewrites the whole
/// file. Loading drops entries that are no longer valid WAV files, so a
/// mutation also prunes them from disk.
#[derive(Debug, Clone)]
pub struct PlaylistStore {
    playlists_dir: PathBuf,
}

impl PlaylistStore {
    pub fn new<P: Into<PathBuf>>(playlists_dir: P) -> Self {
        Self {
            playlists_dir: playlists_dir.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.playlists_dir
    }

    /// Overwrite `name` with `tracks`
    pub fn save<P: AsRef<Path>>(&self, name: &str, tracks: &[P]) -> Result<()> {
        if !self.playlists_dir.exists() {
            fs::create_dir_all(&self.playlists_dir)?;
            info!("Created playlists directory: {}", self.playlists_dir.display());
        }

        let mut content = String::new();
        for track in tracks {
            content.push_str(Self::record_line(track.as_ref())?);
            content.push('\n');
        }

        // write-then-rename so readers never see a half-written list
        let file_path = self.file_path(name);
        let tmp_path = file_path.with_extension(format!("{}.tmp", PLAYLIST_EXTENSION));
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &file_path)?;

        info!("Saved playlist '{}' ({} tracks) to {}", name, tracks.len(), file_path.display());
        Ok(())
    }

    /// Tracks of `name` that are currently valid WAV files. A missing record
    /// is an empty playlist.
    pub fn load(&self, name: &str) -> Result<Vec<PathBuf>> {
        let file_path = self.file_path(name);
        if !file_path.exists() {
            debug!("No playlist record for '{}'", name);
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&file_path)?;
        let mut tracks = Vec::new();
        let mut dropped = 0;

        for line in content.lines() {
            if line.is_empty() {
                continue;
            }
            let path = PathBuf::from(line);
            if wav::is_valid(&path) {
                tracks.push(path);
            } else {
                dropped += 1;
                warn!("Dropping invalid entry '{}' from playlist '{}'", line, name);
            }
        }

        debug!("Loaded playlist '{}': {} tracks, {} dropped", name, tracks.len(), dropped);
        Ok(tracks)
    }

    pub fn playlist(&self, name: &str) -> Result<Playlist> {
        Ok(Playlist::new(name, self.load(name)?))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    /// Names of all stored playlists, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.playlists_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.playlists_dir)? {
            let path = entry?.path();
            let is_playlist = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case(PLAYLIST_EXTENSION));

            if is_playlist && path.is_file() {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let file_path = self.file_path(name);
        if file_path.exists() {
            fs::remove_file(&file_path)?;
            info!("Deleted playlist '{}'", name);
        }
        Ok(())
    }

    /// Append `track` unless it is already listed or not a valid WAV.
    /// Returns whether the playlist changed.
    pub fn add_track<P: AsRef<Path>>(&self, name: &str, track: P) -> Result<bool> {
        let track = track.as_ref();
        let mut tracks = self.load(name)?;

        if tracks.iter().any(|t| t == track) {
            debug!("'{}' already in playlist '{}'", track.display(), name);
            return Ok(false);
        }
        if !wav::is_valid(track) {
            debug!("Not adding invalid WAV '{}' to playlist '{}'", track.display(), name);
            return Ok(false);
        }

        tracks.push(track.to_path_buf());
        self.save(name, &tracks)?;
        info!("Added track '{}' to playlist '{}'", track.display(), name);
        Ok(true)
    }

    /// Remove the first entry equal to `track`. Returns whether one was found.
    pub fn remove_track<P: AsRef<Path>>(&self, name: &str, track: P) -> Result<bool> {
        let track = track.as_ref();
        let mut tracks = self.load(name)?;

        match tracks.iter().position(|t| t == track) {
            Some(pos) => {
                tracks.remove(pos);
                self.save(name, &tracks)?;
                info!("Removed track '{}' from playlist '{}'", track.display(), name);
                Ok(true)
            }
            None => {
                debug!("'{}' not in playlist '{}'", track.display(), name);
                Ok(false)
            }
        }
    }

    /// Move the entry at `from` to `to`. Out-of-range or equal indices leave
    /// the record untouched and return `false`.
    pub fn reorder(&self, name: &str, from: usize, to: usize) -> Result<bool> {
        let mut tracks = self.load(name)?;

        if from >= tracks.len() || to >= tracks.len() || from == to {
            debug!(
                "Ignoring move {} -> {} in playlist '{}' ({} tracks)",
                from,
                to,
                name,
                tracks.len()
            );
            return Ok(false);
        }

        let track = tracks.remove(from);
        tracks.insert(to, track);
        self.save(name, &tracks)?;
        info!("Moved track from position {} to {} in playlist '{}'", from, to, name);
        Ok(true)
    }

    // one path per line, so it must be UTF-8 without line breaks
    fn record_line(track: &Path) -> Result<&str> {
        match track.to_str() {
            Some(line) if !line.contains(['\n', '\r']) => Ok(line),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot store '{}' in a playlist", track.display()),
            )
            .into()),
        }
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.playlists_dir.join(format!("{}.{}", name, PLAYLIST_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::fixtures::write_tone;
    use crate::error::Error;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: PlaylistStore,
        tracks: Vec<PathBuf>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let tracks = ["a.wav", "b.wav", "c.wav"]
            .iter()
            .map(|name| write_tone(dir.path(), name, 8, 100))
            .collect();
        let store = PlaylistStore::new(dir.path().join("playlists"));
        Fixture { _dir: dir, store, tracks }
    }

    #[test]
    fn test_save_load_round_trip() {
        let f = fixture();
        f.store.save("mix", &f.tracks).unwrap();
        assert_eq!(f.store.load("mix").unwrap(), f.tracks);

        let raw = fs::read_to_string(f.store.directory().join("mix.playlist")).unwrap();
        assert_eq!(raw.lines().count(), 3);
    }

    #[test]
    fn test_save_rejects_path_with_line_break() {
        let f = fixture();
        let split = write_tone(f._dir.path(), "two\nlines.wav", 8, 100);
        assert!(wav::is_valid(&split));

        let err = f.store.save("mix", &[f.tracks[0].clone(), split]).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::InvalidInput));
        assert!(!f.store.exists("mix"));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_rejects_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let f = fixture();
        f.store.save("mix", &f.tracks).unwrap();
        let before = fs::read(f.store.directory().join("mix.playlist")).unwrap();

        let odd = f._dir.path().join(OsStr::from_bytes(b"caf\xe9.wav"));
        assert!(f.store.save("mix", &[odd]).is_err());
        assert_eq!(fs::read(f.store.directory().join("mix.playlist")).unwrap(), before);
    }

    #[test]
    fn test_missing_playlist_is_empty() {
        let f = fixture();
        assert!(f.store.load("nothing").unwrap().is_empty());
        assert!(!f.store.exists("nothing"));
    }

    #[test]
    fn test_load_drops_invalid_entries() {
        let f = fixture();
        let mut listed = f.tracks.clone();
        listed.insert(1, f.store.directory().join("gone.wav"));
        f.store.save("mix", &listed).unwrap();

        assert_eq!(f.store.load("mix").unwrap(), f.tracks);
    }

    #[test]
    fn test_list_and_delete() {
        let f = fixture();
        f.store.save("rock", &f.tracks).unwrap();
        f.store.save("jazz", &f.tracks[..1]).unwrap();
        fs::write(f.store.directory().join("notes.txt"), "x").unwrap();

        assert_eq!(f.store.list().unwrap(), vec!["jazz", "rock"]);

        f.store.delete("rock").unwrap();
        f.store.delete("rock").unwrap();
        assert_eq!(f.store.list().unwrap(), vec!["jazz"]);
    }

    #[test]
    fn test_list_without_directory() {
        let dir = TempDir::new().unwrap();
        let store = PlaylistStore::new(dir.path().join("missing"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_add_track_skips_duplicates_and_invalid() {
        let f = fixture();
        assert!(f.store.add_track("mix", &f.tracks[0]).unwrap());
        assert!(!f.store.add_track("mix", &f.tracks[0]).unwrap());
        assert!(!f.store.add_track("mix", f.store.directory().join("nope.wav")).unwrap());
        assert!(f.store.add_track("mix", &f.tracks[1]).unwrap());

        assert_eq!(f.store.load("mix").unwrap(), f.tracks[..2].to_vec());
    }

    #[test]
    fn test_remove_track() {
        let f = fixture();
        f.store.save("mix", &f.tracks).unwrap();

        assert!(f.store.remove_track("mix", &f.tracks[1]).unwrap());
        assert!(!f.store.remove_track("mix", &f.tracks[1]).unwrap());
        assert_eq!(
            f.store.load("mix").unwrap(),
            vec![f.tracks[0].clone(), f.tracks[2].clone()]
        );
    }

    #[test]
    fn test_reorder_moves_entry() {
        let f = fixture();
        f.store.save("mix", &f.tracks).unwrap();

        assert!(f.store.reorder("mix", 0, 2).unwrap());
        assert_eq!(
            f.store.load("mix").unwrap(),
            vec![f.tracks[1].clone(), f.tracks[2].clone(), f.tracks[0].clone()]
        );
    }

    #[test]
    fn test_reorder_noops_leave_file_identical() {
        let f = fixture();
        f.store.save("mix", &f.tracks).unwrap();
        let file = f.store.directory().join("mix.playlist");
        let before = fs::read(&file).unwrap();

        assert!(!f.store.reorder("mix", 1, 1).unwrap());
        assert!(!f.store.reorder("mix", 0, 3).unwrap());
        assert!(!f.store.reorder("mix", 5, 0).unwrap());

        assert_eq!(fs::read(&file).unwrap(), before);
    }
}
