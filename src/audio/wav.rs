//! Canonical 44-byte WAV headers and linear PCM decoding.
//!
//! Fields are read at fixed offsets. The chunk layout is not walked, so files
//! with extra chunks before `data` (LIST, fact, ...) or WAVE_FORMAT_EXTENSIBLE
//! headers are misread. The channel count is taken from byte 22 alone; the
//! high byte of that 16-bit field is ignored, which caps it at 255 channels.

use crate::audio::AudioBuffer;
use crate::error::{Error, FormatError, Result};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

pub const HEADER_SIZE: usize = 44;
const RIFF_MARKER: &[u8; 4] = b"RIFF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Parse the fixed header at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::TooShort {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        if &bytes[0..4] != RIFF_MARKER {
            return Err(FormatError::MissingRiffMarker);
        }

        let header = Self {
            channels: bytes[22] as u16,
            sample_rate: u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
            bits_per_sample: u16::from_le_bytes([bytes[34], bytes[35]]),
            data_size: u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]),
        };

        if header.sample_rate == 0 {
            return Err(FormatError::ZeroSampleRate);
        }
        if header.channels == 0 {
            return Err(FormatError::ZeroChannels);
        }
        if !matches!(header.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(FormatError::UnsupportedBitDepth(header.bits_per_sample));
        }

        Ok(header)
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Size of one frame (all channels) in bytes
    pub fn block_align(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    pub fn frames(&self) -> u64 {
        self.data_size as u64 / self.block_align() as u64
    }

    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    fn check_available(&self, available: usize) -> std::result::Result<(), FormatError> {
        if self.data_size as usize > available {
            return Err(FormatError::Truncated {
                declared: self.data_size,
                available,
            });
        }
        Ok(())
    }
}

/// Read and validate the header of a file on disk, including that the
/// declared data size fits in the file.
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<WavHeader> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len() as usize;

    let mut bytes = Vec::with_capacity(HEADER_SIZE);
    file.by_ref().take(HEADER_SIZE as u64).read_to_end(&mut bytes)?;

    let header = WavHeader::parse(&bytes)?;
    header.check_available(file_len.saturating_sub(HEADER_SIZE))?;
    Ok(header)
}

/// Whether `path` has a readable, well-formed header. Errors are swallowed.
pub fn is_valid<P: AsRef<Path>>(path: P) -> bool {
    read_header(path).is_ok()
}

/// Decode a complete WAV image into interleaved samples
pub fn decode(bytes: &[u8]) -> std::result::Result<(WavHeader, AudioBuffer), FormatError> {
    let header = WavHeader::parse(bytes)?;
    let body = &bytes[HEADER_SIZE..];
    header.check_available(body.len())?;

    let data = &body[..header.data_size as usize];
    let samples = match header.bits_per_sample {
        8 => data.iter().map(|&b| (b as f32 - 128.0) / 128.0).collect(),
        16 => data
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32_768.0)
            .collect(),
        24 => data
            .chunks_exact(3)
            .map(|c| {
                // sign-extend by parking the 24 bits in the top of an i32
                let value = i32::from_le_bytes([0, c[0], c[1], c[2]]) >> 8;
                value as f32 / 8_388_608.0
            })
            .collect(),
        32 => data
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32 / 2_147_483_648.0)
            .collect(),
        other => return Err(FormatError::UnsupportedBitDepth(other)),
    };

    Ok((
        header,
        AudioBuffer::new(samples, header.sample_rate, header.channels),
    ))
}

/// Read `path` and decode it. Blocking.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<(WavHeader, AudioBuffer)> {
    let bytes = fs::read(path.as_ref())?;
    decode(&bytes).map_err(Error::from)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::{Path, PathBuf};

    /// Canonical PCM WAV image with the given format and raw data bytes
    pub fn wav_bytes(sample_rate: u32, channels: u16, bits: u16, data: &[u8]) -> Vec<u8> {
        let block_align = channels * (bits / 8);
        let byte_rate = sample_rate * block_align as u32;

        let mut bytes = Vec::with_capacity(44 + data.len());
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
        bytes
    }

    /// 16-bit mono file of `frames` samples at 1 kHz, each frame `value`
    pub fn write_tone(dir: &Path, name: &str, frames: usize, value: i16) -> PathBuf {
        let data: Vec<u8> = (0..frames).flat_map(|_| value.to_le_bytes()).collect();
        let path = dir.join(name);
        std::fs::write(&path, wav_bytes(1000, 1, 16, &data)).expect("write wav fixture");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{wav_bytes, write_tone};
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_missing_riff_marker() {
        let mut bytes = wav_bytes(44_100, 2, 16, &[0; 8]);
        bytes[0..4].copy_from_slice(b"RIFX");
        assert_eq!(WavHeader::parse(&bytes), Err(FormatError::MissingRiffMarker));

        let garbage = vec![0xAB; 64];
        assert_eq!(WavHeader::parse(&garbage), Err(FormatError::MissingRiffMarker));
    }

    #[test]
    fn test_rejects_short_buffer() {
        let bytes = wav_bytes(44_100, 2, 16, &[]);
        assert_eq!(
            WavHeader::parse(&bytes[..43]),
            Err(FormatError::TooShort { expected: 44, actual: 43 })
        );
    }

    #[test]
    fn test_parses_fields_at_fixed_offsets() {
        let bytes = wav_bytes(22_050, 2, 24, &[0; 12]);
        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(
            header,
            WavHeader {
                sample_rate: 22_050,
                channels: 2,
                bits_per_sample: 24,
                data_size: 12,
            }
        );
        assert_eq!(header.block_align(), 6);
        assert_eq!(header.frames(), 2);
    }

    #[test]
    fn test_channel_high_byte_ignored() {
        let mut bytes = wav_bytes(8_000, 1, 8, &[128; 4]);
        bytes[23] = 0x01;
        assert_eq!(WavHeader::parse(&bytes).unwrap().channels, 1);
    }

    #[test]
    fn test_rejects_bad_format_fields() {
        assert_eq!(
            WavHeader::parse(&wav_bytes(0, 1, 16, &[])),
            Err(FormatError::ZeroSampleRate)
        );
        assert_eq!(
            WavHeader::parse(&wav_bytes(8_000, 0, 16, &[])),
            Err(FormatError::ZeroChannels)
        );
        assert_eq!(
            WavHeader::parse(&wav_bytes(8_000, 1, 12, &[])),
            Err(FormatError::UnsupportedBitDepth(12))
        );
    }

    #[test]
    fn test_decode_8_bit_is_centered() {
        let (_, buffer) = decode(&wav_bytes(8_000, 1, 8, &[0, 128, 255])).unwrap();
        assert_eq!(buffer.samples, vec![-1.0, 0.0, 127.0 / 128.0]);
    }

    #[test]
    fn test_decode_16_bit_interleaved() {
        let data: Vec<u8> = [i16::MIN, 16_384, 0, i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let (header, buffer) = decode(&wav_bytes(44_100, 2, 16, &data)).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.samples, vec![-1.0, 0.5, 0.0, 32_767.0 / 32_768.0]);
    }

    #[test]
    fn test_decode_24_and_32_bit() {
        // -8388608 and +4194304 in 24-bit little endian
        let data = [0x00, 0x00, 0x80, 0x00, 0x00, 0x40];
        let (_, buffer) = decode(&wav_bytes(48_000, 1, 24, &data)).unwrap();
        assert_eq!(buffer.samples, vec![-1.0, 0.5]);

        let data: Vec<u8> = [i32::MIN, 1 << 30].iter().flat_map(|s| s.to_le_bytes()).collect();
        let (_, buffer) = decode(&wav_bytes(48_000, 1, 32, &data)).unwrap();
        assert_eq!(buffer.samples, vec![-1.0, 0.5]);
    }

    #[test]
    fn test_decode_rejects_truncated_data() {
        let mut bytes = wav_bytes(8_000, 1, 16, &[0; 8]);
        bytes.truncate(48);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            FormatError::Truncated { declared: 8, available: 4 }
        );
    }

    #[test]
    fn test_file_validity() {
        let dir = TempDir::new().unwrap();
        let good = write_tone(dir.path(), "good.wav", 10, 1000);
        assert!(is_valid(&good));
        assert_eq!(read_header(&good).unwrap().data_size, 20);

        let bogus = dir.path().join("bogus.wav");
        fs::write(&bogus, b"definitely not audio, but long enough to hold a header").unwrap();
        assert!(!is_valid(&bogus));

        let cut = dir.path().join("cut.wav");
        let bytes = fs::read(&good).unwrap();
        fs::write(&cut, &bytes[..50]).unwrap();
        assert!(!is_valid(&cut));

        assert!(!is_valid(dir.path().join("missing.wav")));
    }

    #[test]
    fn test_decode_file() {
        let dir = TempDir::new().unwrap();
        let path = write_tone(dir.path(), "tone.wav", 4, i16::MIN);
        let (header, buffer) = decode_file(&path).unwrap();
        assert_eq!(header.sample_rate, 1000);
        assert_eq!(buffer.samples, vec![-1.0; 4]);
    }
}
