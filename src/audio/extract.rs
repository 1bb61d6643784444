//! Temporary per-chunk audio extracts.
//!
//! Each chunk handed to the inference engine is written as a self-contained
//! 16kHz mono WAV in the system temp directory. The extract is tied to a
//! [`ChunkAudio`] guard whose drop removes the file, so deletion happens on
//! every exit path, including panics and failed transcriptions.

use crate::defaults::SAMPLE_RATE;
use crate::error::{CallscribeError, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// RAII handle to a temporary chunk WAV. The file is deleted on drop.
#[derive(Debug)]
pub struct ChunkAudio {
    file: NamedTempFile,
    duration: f64,
}

impl ChunkAudio {
    /// Path of the temporary WAV file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Duration of the extracted audio in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// Writes samples to a uniquely named temporary WAV file.
///
/// The extract preserves the 16kHz mono layout the engine expects.
pub fn write_chunk_wav(samples: &[i16], sample_rate: u32) -> Result<ChunkAudio> {
    let file = tempfile::Builder::new()
        .prefix("callscribe-chunk-")
        .suffix(".wav")
        .tempfile()
        .map_err(|e| CallscribeError::ChunkExtraction {
            message: format!("Failed to create temp file: {}", e),
        })?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(file.path(), spec).map_err(|e| CallscribeError::ChunkExtraction {
            message: format!("Failed to create WAV writer: {}", e),
        })?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| CallscribeError::ChunkExtraction {
                message: format!("Failed to write WAV samples: {}", e),
            })?;
    }
    writer.finalize().map_err(|e| CallscribeError::ChunkExtraction {
        message: format!("Failed to finalize WAV: {}", e),
    })?;

    Ok(ChunkAudio {
        file,
        duration: samples.len() as f64 / sample_rate as f64,
    })
}

/// Writes a synthetic silent WAV of the given length, used for warm-up.
pub fn write_silence_wav(secs: f64) -> Result<ChunkAudio> {
    let samples = vec![0i16; (secs * SAMPLE_RATE as f64) as usize];
    write_chunk_wav(&samples, SAMPLE_RATE)
}
