//! Transcript serialization.
//!
//! Pure functions of the final transcript; the orchestrator decides where
//! the rendered files go.

use crate::config::OutputFormat;
use crate::error::{CallscribeError, Result};
use crate::merge::merger::FinalTranscript;
use crate::merge::timestamp::{format_srt_timestamp, format_vtt_timestamp};
use std::path::{Path, PathBuf};

/// Renders the transcript in the given format.
pub fn render(transcript: &FinalTranscript, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Txt => Ok(to_txt(transcript)),
        OutputFormat::Srt => Ok(to_srt(transcript)),
        OutputFormat::Vtt => Ok(to_vtt(transcript)),
        OutputFormat::Json => to_json(transcript),
    }
}

/// Plain text: the transcript body only.
pub fn to_txt(transcript: &FinalTranscript) -> String {
    transcript.full_text.clone()
}

/// SRT: 1-indexed cues, comma millisecond separator, blank line between
/// cues, trailing newline.
pub fn to_srt(transcript: &FinalTranscript) -> String {
    let mut out = String::new();
    for (i, segment) in transcript.segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_timestamp(segment.start),
            format_srt_timestamp(segment.end),
            segment.text.trim()
        ));
    }
    out
}

/// WebVTT: standard header, dot millisecond separator.
pub fn to_vtt(transcript: &FinalTranscript) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in &transcript.segments {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_timestamp(segment.start),
            format_vtt_timestamp(segment.end),
            segment.text.trim()
        ));
    }
    out
}

/// Structured JSON with segments, aggregates and pipeline metadata.
pub fn to_json(transcript: &FinalTranscript) -> Result<String> {
    serde_json::to_string_pretty(transcript)
        .map_err(|e| CallscribeError::Other(format!("Failed to serialize transcript: {}", e)))
}

/// Writes one file per format next to `output_base`.
///
/// `output_base` is the path prefix (typically `<dir>/<audio stem>`); each
/// format lands at `<output_base>_transcription.<ext>`.
pub fn write_outputs(
    transcript: &FinalTranscript,
    formats: &[OutputFormat],
    output_base: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(formats.len());
    for &format in formats {
        let mut file_name = output_base
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        file_name.push_str("_transcription.");
        file_name.push_str(format.extension());

        let path = match output_base.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        };

        std::fs::write(&path, render(transcript, format)?)?;
        written.push(path);
    }
    Ok(written)
}
