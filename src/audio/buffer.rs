//! Decoded audio handle.
//!
//! Reads a WAV file once, normalizes it to 16kHz mono PCM and keeps the
//! samples in memory for VAD and chunk extraction. Supports arbitrary sample
//! rates and channel counts; resampling always runs when the source rate
//! differs, never silently falling back to the original rate.

use crate::defaults::SAMPLE_RATE;
use crate::error::{CallscribeError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Immutable handle to the decoded input audio.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    path: PathBuf,
    source_sample_rate: u32,
    source_channels: u16,
    samples: Vec<i16>,
}

impl AudioBuffer {
    /// Opens and decodes a WAV file, normalizing to 16kHz mono.
    ///
    /// # Errors
    /// Returns `CallscribeError::AudioFileNotFound` if the file is missing and
    /// `CallscribeError::AudioDecode` if it cannot be parsed.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CallscribeError::AudioFileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(Box::new(std::io::BufReader::new(file)), path)
    }

    /// Decodes WAV data from any reader. The path is kept for reporting only.
    pub fn from_reader(reader: Box<dyn Read + Send>, path: &Path) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| {
            CallscribeError::AudioDecode {
                message: format!("Failed to parse WAV file: {}", e),
            }
        })?;

        let spec = wav_reader.spec();
        let source_rate = spec.sample_rate;
        let source_channels = spec.channels;

        if source_channels == 0 {
            return Err(CallscribeError::AudioDecode {
                message: "WAV file reports zero channels".to_string(),
            });
        }

        let raw_samples = read_samples_as_i16(&mut wav_reader, &spec)?;

        // Downmix to mono by averaging the channels of each frame.
        let mono_samples: Vec<i16> = if source_channels > 1 {
            let channels = source_channels as usize;
            raw_samples
                .chunks_exact(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        } else {
            raw_samples
        };

        let samples = if source_rate != SAMPLE_RATE {
            resample(&mono_samples, source_rate, SAMPLE_RATE)
        } else {
            mono_samples
        };

        Ok(Self {
            path: path.to_path_buf(),
            source_sample_rate: source_rate,
            source_channels,
            samples,
        })
    }

    /// Path of the source file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sample rate of the file before normalization.
    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    /// Channel count of the file before normalization.
    pub fn source_channels(&self) -> u16 {
        self.source_channels
    }

    /// Sample rate of the normalized buffer. Always 16kHz.
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Normalized 16kHz mono samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }

    /// Samples covering `[start, end)` in seconds, clamped to the buffer.
    pub fn slice_secs(&self, start: f64, end: f64) -> &[i16] {
        let lo = ((start.max(0.0) * SAMPLE_RATE as f64) as usize).min(self.samples.len());
        let hi = ((end.max(0.0) * SAMPLE_RATE as f64) as usize).min(self.samples.len());
        &self.samples[lo..hi.max(lo)]
    }
}

/// Reads samples from any supported WAV encoding as 16-bit PCM.
fn read_samples_as_i16<R: Read>(
    reader: &mut hound::WavReader<R>,
    spec: &hound::WavSpec,
) -> Result<Vec<i16>> {
    let decode_err = |e: hound::Error| CallscribeError::AudioDecode {
        message: format!("Failed to read WAV samples: {}", e),
    };

    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err),
        (hound::SampleFormat::Int, bits @ (24 | 32)) => {
            let shift = bits - 16;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_err)
        }
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err),
        (format, bits) => Err(CallscribeError::AudioDecode {
            message: format!("Unsupported WAV encoding: {:?} {} bit", format, bits),
        }),
    }
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn decode(data: Vec<u8>) -> Result<AudioBuffer> {
        AudioBuffer::from_reader(Box::new(Cursor::new(data)), Path::new("test.wav"))
    }

    #[test]
    fn from_reader_16khz_mono_matches_exactly() {
        let input_samples = vec![100i16, 200, 300, 400, 500];
        let wav_data = make_wav_data(16000, 1, &input_samples);

        let buffer = decode(wav_data).unwrap();

        assert_eq!(buffer.samples(), input_samples.as_slice());
        assert_eq!(buffer.source_sample_rate(), 16000);
        assert_eq!(buffer.source_channels(), 1);
    }

    #[test]
    fn from_reader_stereo_downmixes_to_mono() {
        // Stereo pairs: (100, 200), (300, 400), (500, 600)
        let stereo_samples = vec![100i16, 200, 300, 400, 500, 600];
        let wav_data = make_wav_data(16000, 2, &stereo_samples);

        let buffer = decode(wav_data).unwrap();

        assert_eq!(buffer.samples(), &[150i16, 350, 550]);
        assert_eq!(buffer.source_channels(), 2);
    }

    #[test]
    fn from_reader_48khz_resamples_to_16khz() {
        let input_samples = vec![1000i16; 48000]; // 1 second at 48kHz
        let wav_data = make_wav_data(48000, 1, &input_samples);

        let buffer = decode(wav_data).unwrap();

        assert!(buffer.samples().len() >= 15900 && buffer.samples().len() <= 16100);
        assert!((buffer.duration() - 1.0).abs() < 0.01);
        // Values should be close to the original.
        assert!(buffer.samples().iter().all(|&s| (900..=1100).contains(&s)));
    }

    #[test]
    fn duration_reflects_normalized_rate() {
        let wav_data = make_wav_data(16000, 1, &vec![0i16; 32000]);
        let buffer = decode(wav_data).unwrap();
        assert!((buffer.duration() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn slice_secs_selects_expected_range() {
        let samples: Vec<i16> = (0..16000).map(|i| (i % 100) as i16).collect();
        let wav_data = make_wav_data(16000, 1, &samples);
        let buffer = decode(wav_data).unwrap();

        let slice = buffer.slice_secs(0.5, 0.75);
        assert_eq!(slice.len(), 4000);
        assert_eq!(slice[0], samples[8000]);
    }

    #[test]
    fn slice_secs_clamps_to_buffer() {
        let wav_data = make_wav_data(16000, 1, &vec![1i16; 1600]);
        let buffer = decode(wav_data).unwrap();

        assert_eq!(buffer.slice_secs(0.0, 10.0).len(), 1600);
        assert_eq!(buffer.slice_secs(5.0, 10.0).len(), 0);
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let result = AudioBuffer::open(Path::new("/nonexistent/audio.wav"));
        match result {
            Err(CallscribeError::AudioFileNotFound { path }) => {
                assert_eq!(path, "/nonexistent/audio.wav");
            }
            _ => panic!("Expected AudioFileNotFound error"),
        }
    }

    #[test]
    fn invalid_wav_data_returns_decode_error() {
        let result = decode(vec![0u8, 1, 2, 3, 4, 5]);
        match result {
            Err(CallscribeError::AudioDecode { message }) => {
                assert!(message.contains("Failed to parse WAV file"));
            }
            _ => panic!("Expected AudioDecode error"),
        }
    }

    #[test]
    fn truncated_wav_header_returns_decode_error() {
        let result = decode(b"RIFF\x00\x00".to_vec());
        assert!(result.is_err());
    }

    #[test]
    fn decode_error_maps_to_input_exit_code() {
        let err = decode(vec![0u8; 64]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn float_wav_is_decoded() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..1600 {
            writer.write_sample(0.5f32).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = decode(cursor.into_inner()).unwrap();
        assert_eq!(buffer.samples().len(), 1600);
        assert!((buffer.samples()[0] as f32 / i16::MAX as f32 - 0.5).abs() < 0.001);
    }

    #[test]
    fn resample_identity_same_rate() {
        let samples = vec![100i16, 200, 300, 400, 500];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn resample_upsample_interpolates() {
        let samples = vec![0i16, 1000, 2000];
        let resampled = resample(&samples, 8000, 16000);

        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0);
        assert!(resampled[1] > 0 && resampled[1] < 1000);
        assert_eq!(resampled[2], 1000);
    }

    #[test]
    fn resample_downsample_halves_count() {
        let samples = vec![0i16; 3200];
        assert_eq!(resample(&samples, 16000, 8000).len(), 1600);
    }
}
