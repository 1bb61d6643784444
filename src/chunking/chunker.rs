//! Silence-aware audio chunk planning.
//!
//! Partitions `[0, duration)` into contiguous chunks around a target length.
//! Split points are chosen from silence gaps between detected speech
//! intervals when one exists near the target; each chunk shares a small
//! overlap with its successor.

use crate::defaults;
use crate::error::{CallscribeError, Result};
use crate::vad::SpeechInterval;
use serde::{Deserialize, Serialize};

/// Configuration for the chunk planner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkerConfig {
    /// Preferred chunk length in seconds.
    pub target_chunk_duration: f64,
    /// Hard ceiling on chunk length in seconds.
    pub max_chunk_duration: f64,
    /// A final tail shorter than this is absorbed into the previous chunk.
    pub min_chunk_duration: f64,
    /// Overlap in seconds shared between adjacent chunks.
    pub overlap_duration: f64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_chunk_duration: defaults::TARGET_CHUNK_DURATION,
            max_chunk_duration: defaults::MAX_CHUNK_DURATION,
            min_chunk_duration: defaults::MIN_CHUNK_DURATION,
            overlap_duration: defaults::OVERLAP_DURATION,
        }
    }
}

impl ChunkerConfig {
    /// Validates internal consistency of the durations.
    pub fn validate(&self) -> Result<()> {
        if self.target_chunk_duration <= 0.0 {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "chunking.target_chunk_duration".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.max_chunk_duration < self.target_chunk_duration {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "chunking.max_chunk_duration".to_string(),
                message: "must be at least target_chunk_duration".to_string(),
            });
        }
        if self.min_chunk_duration < 0.0 || self.min_chunk_duration > self.target_chunk_duration {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "chunking.min_chunk_duration".to_string(),
                message: "must be within 0..=target_chunk_duration".to_string(),
            });
        }
        let overlap_ok = self.overlap_duration == 0.0
            || (self.overlap_duration > 0.0 && self.overlap_duration < self.min_chunk_duration);
        if !overlap_ok {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "chunking.overlap_duration".to_string(),
                message: "must be non-negative and smaller than min_chunk_duration".to_string(),
            });
        }
        Ok(())
    }
}

/// A contiguous sub-interval of the input audio processed as one ASR unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Zero-based dense index.
    pub chunk_id: usize,
    /// Chunk start in global time (seconds).
    pub start: f64,
    /// Chunk end in global time (seconds).
    pub end: f64,
    /// Speech intervals inside `[start, end)`, rebased to chunk-local time.
    pub speech_intervals: Vec<SpeechInterval>,
    /// Whether the chunk shares an overlap window with its predecessor.
    pub has_overlap_start: bool,
    /// Whether the chunk shares an overlap window with its successor.
    pub has_overlap_end: bool,
}

impl Chunk {
    /// Chunk length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ordered chunk plan covering the full input timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    /// Chunks in `chunk_id` order.
    pub chunks: Vec<Chunk>,
    /// Duration of the planned audio in seconds.
    pub total_duration: f64,
    /// Overlap between adjacent chunks in seconds.
    pub overlap_duration: f64,
}

impl ChunkPlan {
    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when the plan contains no chunks (zero-length audio).
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A candidate silence gap between two consecutive speech intervals.
#[derive(Debug, Clone, Copy)]
struct SilenceGap {
    start: f64,
    end: f64,
}

impl SilenceGap {
    fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Plans chunk boundaries from VAD evidence.
#[derive(Debug, Clone)]
pub struct AudioChunker {
    config: ChunkerConfig,
}

impl AudioChunker {
    /// Creates a new chunker with the given configuration.
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Builds a chunk plan covering `[0, total_duration)`.
    ///
    /// Audio no longer than the target, and audio with no detected speech,
    /// yields a single chunk spanning the whole file.
    pub fn plan(&self, intervals: &[SpeechInterval], total_duration: f64) -> ChunkPlan {
        let cfg = &self.config;

        if total_duration <= 0.0 {
            return ChunkPlan {
                chunks: Vec::new(),
                total_duration: 0.0,
                overlap_duration: cfg.overlap_duration,
            };
        }

        let mut boundaries: Vec<(f64, f64)> = Vec::new();

        if intervals.is_empty() || total_duration <= cfg.target_chunk_duration {
            boundaries.push((0.0, total_duration));
        } else {
            let gaps = silence_gaps(intervals, total_duration);
            let mut current = 0.0_f64;

            loop {
                if total_duration - current <= cfg.target_chunk_duration {
                    boundaries.push((current, total_duration));
                    break;
                }

                let target = current + cfg.target_chunk_duration;
                let max_end = current + cfg.max_chunk_duration;
                // The lower bound keeps every chunk at least min_chunk long,
                // which also guarantees the loop advances past the overlap.
                let window_lo =
                    (target - defaults::SPLIT_SEARCH_HALF_WIDTH).max(current + cfg.min_chunk_duration);
                let window_hi = (target + defaults::SPLIT_SEARCH_HALF_WIDTH).min(max_end);

                let mut split = best_gap_split(&gaps, window_lo, window_hi, target)
                    .unwrap_or_else(|| target.min(max_end));
                if split <= current {
                    split = target.min(max_end);
                }
                split = split.min(total_duration);

                // Never leave a sliver tail; absorb it if the ceiling allows.
                let remaining = total_duration - split;
                if remaining > 0.0
                    && remaining < cfg.min_chunk_duration
                    && total_duration - current <= cfg.max_chunk_duration
                {
                    split = total_duration;
                }

                boundaries.push((current, split));
                if split >= total_duration {
                    break;
                }
                current = split - cfg.overlap_duration;
            }
        }

        let count = boundaries.len();
        let chunks = boundaries
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Chunk {
                chunk_id: i,
                start,
                end,
                speech_intervals: clip_intervals(intervals, start, end),
                has_overlap_start: i > 0,
                has_overlap_end: i < count - 1,
            })
            .collect();

        ChunkPlan {
            chunks,
            total_duration,
            overlap_duration: cfg.overlap_duration,
        }
    }
}

/// Silence gaps between consecutive speech intervals, including the leading
/// and trailing silence of the recording.
fn silence_gaps(intervals: &[SpeechInterval], total_duration: f64) -> Vec<SilenceGap> {
    let mut gaps = Vec::with_capacity(intervals.len() + 1);
    let mut cursor = 0.0_f64;

    for iv in intervals {
        if iv.start > cursor {
            gaps.push(SilenceGap {
                start: cursor,
                end: iv.start,
            });
        }
        cursor = iv.end;
    }
    if total_duration > cursor {
        gaps.push(SilenceGap {
            start: cursor,
            end: total_duration,
        });
    }
    gaps
}

/// Picks the best-scoring split point inside `[window_lo, window_hi]`.
///
/// Each gap intersecting the window contributes one candidate at its midpoint
/// (clamped into the intersection); score favors long gaps near the target.
fn best_gap_split(gaps: &[SilenceGap], window_lo: f64, window_hi: f64, target: f64) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;

    for gap in gaps {
        let lo = gap.start.max(window_lo);
        let hi = gap.end.min(window_hi);
        if hi <= lo {
            continue;
        }

        let candidate = ((gap.start + gap.end) / 2.0).clamp(lo, hi);
        let score = gap.duration() * defaults::GAP_SCORE_WEIGHT - (candidate - target).abs();

        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, candidate));
        }
    }

    best.map(|(_, split)| split)
}

/// Speech intervals overlapping `[start, end)`, clipped and rebased to
/// chunk-local time.
fn clip_intervals(intervals: &[SpeechInterval], start: f64, end: f64) -> Vec<SpeechInterval> {
    intervals
        .iter()
        .filter_map(|iv| {
            let lo = iv.start.max(start);
            let hi = iv.end.min(end);
            if hi > lo {
                Some(SpeechInterval::new(lo - start, hi - start))
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(target: f64, max: f64, min: f64, overlap: f64) -> AudioChunker {
        AudioChunker::new(ChunkerConfig {
            target_chunk_duration: target,
            max_chunk_duration: max,
            min_chunk_duration: min,
            overlap_duration: overlap,
        })
    }

    /// Speech intervals with short silences every `period` seconds.
    fn periodic_speech(total: f64, period: f64, gap: f64) -> Vec<SpeechInterval> {
        let mut out = Vec::new();
        let mut t = 0.0;
        while t < total {
            let end = (t + period - gap).min(total);
            out.push(SpeechInterval::new(t, end));
            t += period;
        }
        out
    }

    fn assert_plan_invariants(plan: &ChunkPlan, config: &ChunkerConfig) {
        let chunks = &plan.chunks;
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].start, 0.0);
        assert_eq!(chunks[chunks.len() - 1].end, plan.total_duration);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, i);
            assert!(chunk.duration() > 0.0);
            assert!(
                chunk.duration() <= config.max_chunk_duration + 1e-9,
                "chunk {} duration {} exceeds max {}",
                i,
                chunk.duration(),
                config.max_chunk_duration
            );
            assert_eq!(chunk.has_overlap_start, i > 0);
            assert_eq!(chunk.has_overlap_end, i < chunks.len() - 1);
        }
        for window in chunks.windows(2) {
            let delta = window[1].start - (window[0].end - config.overlap_duration);
            assert!(delta.abs() < 1e-9, "overlap relationship violated");
        }
    }

    #[test]
    fn test_short_audio_single_chunk() {
        let chunker = chunker(600.0, 900.0, 300.0, 2.0);
        let intervals = vec![SpeechInterval::new(1.0, 25.0)];
        let plan = chunker.plan(&intervals, 30.0);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.chunks[0].start, 0.0);
        assert_eq!(plan.chunks[0].end, 30.0);
        assert!(!plan.chunks[0].has_overlap_start);
        assert!(!plan.chunks[0].has_overlap_end);
    }

    #[test]
    fn test_empty_vad_yields_single_full_chunk() {
        let chunker = chunker(600.0, 900.0, 300.0, 2.0);
        let plan = chunker.plan(&[], 1800.0);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.chunks[0].start, 0.0);
        assert_eq!(plan.chunks[0].end, 1800.0);
        assert!(plan.chunks[0].speech_intervals.is_empty());
    }

    #[test]
    fn test_zero_duration_yields_empty_plan() {
        let chunker = chunker(600.0, 900.0, 300.0, 2.0);
        let plan = chunker.plan(&[], 0.0);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_25_minute_meeting_three_or_four_chunks() {
        let config = ChunkerConfig::default();
        let chunker = AudioChunker::new(config);
        let intervals = periodic_speech(1500.0, 20.0, 1.5);
        let plan = chunker.plan(&intervals, 1500.0);

        assert!(plan.len() == 3 || plan.len() == 4, "got {}", plan.len());
        assert_plan_invariants(&plan, &config);
    }

    #[test]
    fn test_splits_prefer_silence_gaps() {
        let config = ChunkerConfig::default();
        let chunker = AudioChunker::new(config);
        let intervals = periodic_speech(1500.0, 20.0, 1.5);
        let plan = chunker.plan(&intervals, 1500.0);

        let gaps = silence_gaps(&intervals, 1500.0);
        for chunk in &plan.chunks[..plan.len() - 1] {
            let split = chunk.end;
            let in_gap = gaps.iter().any(|g| g.start <= split && split <= g.end);
            let at_max = (chunk.duration() - config.max_chunk_duration).abs() < 1e-9;
            assert!(in_gap || at_max, "split at {} is mid-speech", split);
        }
    }

    #[test]
    fn test_no_gap_in_window_splits_at_target() {
        let chunker = chunker(600.0, 900.0, 300.0, 2.0);
        // One long uninterrupted speech interval: no usable gap anywhere.
        let intervals = vec![SpeechInterval::new(0.0, 1800.0)];
        let plan = chunker.plan(&intervals, 1800.0);

        assert!(plan.len() >= 2);
        assert_eq!(plan.chunks[0].end, 600.0);
        assert_eq!(plan.chunks[1].start, 598.0);
    }

    #[test]
    fn test_long_audio_invariants_hold() {
        let config = ChunkerConfig::default();
        let chunker = AudioChunker::new(config);
        // 90 minutes with silences every 45s.
        let intervals = periodic_speech(5400.0, 45.0, 2.0);
        let plan = chunker.plan(&intervals, 5400.0);

        assert!(plan.len() >= 8);
        assert_plan_invariants(&plan, &config);
    }

    #[test]
    fn test_sliver_tail_absorbed() {
        // 610s with target 600: a 10s tail would be a sliver, so one chunk
        // runs to the end instead.
        let chunker = chunker(600.0, 900.0, 300.0, 2.0);
        let intervals = vec![SpeechInterval::new(0.0, 610.0)];
        let plan = chunker.plan(&intervals, 610.0);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.chunks[0].end, 610.0);
    }

    #[test]
    fn test_speech_intervals_rebased_to_chunk_local_time() {
        let chunker = chunker(600.0, 900.0, 300.0, 2.0);
        let intervals = vec![
            SpeechInterval::new(10.0, 590.0),
            SpeechInterval::new(610.0, 1180.0),
            SpeechInterval::new(1210.0, 1290.0),
        ];
        let plan = chunker.plan(&intervals, 1300.0);

        assert!(plan.len() >= 2);
        let second = &plan.chunks[1];
        for iv in &second.speech_intervals {
            assert!(iv.start >= 0.0);
            assert!(iv.end <= second.duration() + 1e-9);
        }
        // The interval at global 610s must appear rebased, not global.
        assert!(
            second
                .speech_intervals
                .iter()
                .any(|iv| (iv.start + second.start - 610.0).abs() < 1e-6)
        );
    }

    #[test]
    fn test_straddling_interval_clipped_into_both_chunks() {
        let chunker = chunker(600.0, 900.0, 300.0, 2.0);
        // Continuous speech across the split point.
        let intervals = vec![SpeechInterval::new(0.0, 1200.0)];
        let plan = chunker.plan(&intervals, 1200.0);

        assert_eq!(plan.len(), 2);
        let first = &plan.chunks[0];
        let second = &plan.chunks[1];
        assert_eq!(first.speech_intervals.len(), 1);
        assert_eq!(second.speech_intervals.len(), 1);
        assert!((first.speech_intervals[0].end - first.duration()).abs() < 1e-9);
        assert_eq!(second.speech_intervals[0].start, 0.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkerConfig::default().validate().is_ok());

        let bad_max = ChunkerConfig {
            max_chunk_duration: 100.0,
            ..ChunkerConfig::default()
        };
        assert!(bad_max.validate().is_err());

        let bad_overlap = ChunkerConfig {
            overlap_duration: 700.0,
            ..ChunkerConfig::default()
        };
        assert!(bad_overlap.validate().is_err());

        let negative_overlap = ChunkerConfig {
            overlap_duration: -1.0,
            ..ChunkerConfig::default()
        };
        assert!(negative_overlap.validate().is_err());
    }

    #[test]
    fn test_config_rejects_unknown_field() {
        let toml_str = r#"
            target_chunk_duration = 600.0
            chunk_size_samples = 512
        "#;
        let result: std::result::Result<ChunkerConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_is_deterministic() {
        let chunker = AudioChunker::new(ChunkerConfig::default());
        let intervals = periodic_speech(3000.0, 30.0, 1.0);
        assert_eq!(
            chunker.plan(&intervals, 3000.0),
            chunker.plan(&intervals, 3000.0)
        );
    }
}
