//! Chunk result merging.
//!
//! Assembles chunk results (already sorted by `chunk_id`) into one transcript
//! in strict global-time order. Overlap-zone duplicates are removed by a
//! purely positional rule; failed chunks are skipped without substitution and
//! leave a detectable time gap.

use crate::asr::{ChunkResult, TranscriptSegment};
use serde::{Deserialize, Serialize};

/// Elapsed time and outcome of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    /// Stage name (e.g. "vad", "transcribe").
    pub stage: String,
    /// Wall-clock seconds spent in the stage.
    pub elapsed_secs: f64,
    /// Stage outcome ("ok", "deadline exceeded", ...).
    pub status: String,
}

/// Pipeline run metadata carried on the final transcript.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetadata {
    /// Source audio path.
    pub audio_path: String,
    /// Source audio duration in seconds.
    pub audio_duration: f64,
    /// Configured model size.
    pub model_size: String,
    /// Configured device.
    pub device: String,
    /// Configured compute precision.
    pub compute_type: String,
    /// Language forwarded to the engine.
    pub language: String,
    /// Parallel worker count.
    pub max_workers: usize,
    /// VAD preset name.
    pub vad_preset: String,
    /// Number of planned chunks.
    pub chunk_count: usize,
    /// Per-stage timings, in execution order.
    pub stages: Vec<StageTiming>,
    /// Total pipeline wall-clock seconds.
    pub pipeline_elapsed_secs: f64,
    /// Sum of per-chunk engine processing seconds.
    pub total_processing_secs: f64,
}

/// The assembled transcript of a whole recording.
///
/// Invariant: `segments[i].end <= segments[i+1].start` for all `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalTranscript {
    /// Kept segments in strict global-time order.
    pub segments: Vec<TranscriptSegment>,
    /// Kept segment texts joined by a single space.
    pub full_text: String,
    /// Number of kept segments.
    pub total_segments: usize,
    /// End of the last kept segment, or 0 when empty.
    pub total_duration: f64,
    /// Arithmetic mean of kept segment confidences, or 0 when empty.
    pub average_confidence: f32,
    /// Chunks transcribed successfully.
    pub chunks_processed: usize,
    /// Chunks that failed; non-zero means the transcript has time gaps.
    pub chunks_failed: usize,
    /// Run metadata. Filled in by the orchestrator.
    #[serde(rename = "processingMetadata")]
    pub metadata: PipelineMetadata,
}

impl FinalTranscript {
    /// An empty transcript (zero-speech input or all chunks failed).
    pub fn empty(chunks_processed: usize, chunks_failed: usize) -> Self {
        Self {
            segments: Vec::new(),
            full_text: String::new(),
            total_segments: 0,
            total_duration: 0.0,
            average_confidence: 0.0,
            chunks_processed,
            chunks_failed,
            metadata: PipelineMetadata::default(),
        }
    }
}

/// Merges chunk results into a [`FinalTranscript`].
#[derive(Debug, Clone)]
pub struct TranscriptMerger {
    overlap_duration: f64,
}

impl TranscriptMerger {
    /// Creates a merger for plans built with the given overlap.
    pub fn new(overlap_duration: f64) -> Self {
        Self { overlap_duration }
    }

    /// Merges results, which must be sorted by `chunk_id`.
    ///
    /// For every successful chunk following another successful chunk, any
    /// segment starting inside the shared overlap window is dropped: the
    /// previous chunk's tail already covers that region with more acoustic
    /// context. The rule tests only the segment start; a segment starting at
    /// or past the overlap boundary is kept whole, and global ordering is
    /// restored afterwards by clamping starts that the previous chunk's tail
    /// ran over (segments fully covered by the previous tail are dropped).
    pub fn merge(&self, results: &[ChunkResult]) -> FinalTranscript {
        let chunks_processed = results.iter().filter(|r| r.is_ok()).count();
        let chunks_failed = results.len() - chunks_processed;

        let mut kept: Vec<TranscriptSegment> = Vec::new();
        let mut prev_ok_chunk: Option<usize> = None;

        for result in results {
            if !result.is_ok() {
                continue;
            }

            let dedup_cutoff = match prev_ok_chunk {
                Some(prev_id)
                    if self.overlap_duration > 0.0 && result.chunk_id == prev_id + 1 =>
                {
                    Some(result.chunk_start + self.overlap_duration)
                }
                _ => None,
            };

            for segment in &result.segments {
                if let Some(cutoff) = dedup_cutoff
                    && segment.start < cutoff
                {
                    continue;
                }
                push_ordered(&mut kept, segment.clone());
            }

            prev_ok_chunk = Some(result.chunk_id);
        }

        let full_text = kept
            .iter()
            .map(|seg| seg.text.trim())
            .collect::<Vec<_>>()
            .join(" ");

        let total_duration = kept.last().map(|seg| seg.end).unwrap_or(0.0);
        let average_confidence = if kept.is_empty() {
            0.0
        } else {
            (kept.iter().map(|seg| seg.confidence as f64).sum::<f64>() / kept.len() as f64) as f32
        };

        FinalTranscript {
            total_segments: kept.len(),
            full_text,
            total_duration,
            average_confidence,
            segments: kept,
            chunks_processed,
            chunks_failed,
            metadata: PipelineMetadata::default(),
        }
    }
}

/// Appends a segment, keeping `segments[i].end <= segments[i+1].start`.
///
/// A segment starting before the current tail is clamped forward; one ending
/// before the tail carries no new timeline and is dropped.
fn push_ordered(kept: &mut Vec<TranscriptSegment>, mut segment: TranscriptSegment) {
    if let Some(last) = kept.last() {
        if segment.end <= last.end {
            return;
        }
        if segment.start < last.end {
            segment.start = last.end;
        }
    }
    kept.push(segment);
}
