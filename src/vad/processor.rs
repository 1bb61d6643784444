//! Voice Activity Detection (VAD) processor.
//!
//! Computes per-frame speech probability from RMS energy at ~30ms resolution,
//! then applies threshold, silence merging, minimum-duration filtering and
//! symmetric padding to produce ordered speech intervals. Deterministic for
//! identical input.

use crate::defaults;
use serde::{Deserialize, Serialize};

/// A detected speech interval in seconds from the start of the audio.
///
/// Invariants: `0 <= start < end`; intervals emitted by [`VadProcessor`] are
/// non-overlapping and strictly increasing in `start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechInterval {
    /// Interval start in seconds.
    pub start: f64,
    /// Interval end in seconds.
    pub end: f64,
}

impl SpeechInterval {
    /// Creates a new interval.
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Interval length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Configuration for Voice Activity Detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VadConfig {
    /// Decision threshold on per-frame speech probability (0.0 to 1.0).
    pub threshold: f32,
    /// Speech islands shorter than this are discarded (milliseconds).
    pub min_speech_duration_ms: u32,
    /// Speech separated by a shorter silence is merged (milliseconds).
    pub min_silence_duration_ms: u32,
    /// Symmetric padding applied around each interval (milliseconds).
    pub speech_pad_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::VAD_THRESHOLD,
            min_speech_duration_ms: defaults::MIN_SPEECH_DURATION_MS,
            min_silence_duration_ms: defaults::MIN_SILENCE_DURATION_MS,
            speech_pad_ms: defaults::SPEECH_PAD_MS,
        }
    }
}

/// Tuned VAD parameter presets for common recording situations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VadPreset {
    /// Multi-speaker meeting recordings. Same as `Default`.
    Meeting,
    /// Single long-form speaker; stricter threshold, longer pauses expected.
    Presentation,
    /// Strong background noise; strictest threshold, widest padding.
    Noisy,
    /// Baseline parameters.
    Default,
}

impl VadPreset {
    /// Returns the tuned parameter set for this preset.
    pub fn config(&self) -> VadConfig {
        match self {
            VadPreset::Meeting | VadPreset::Default => VadConfig::default(),
            VadPreset::Presentation => VadConfig {
                threshold: 0.6,
                min_speech_duration_ms: 500,
                min_silence_duration_ms: 1000,
                speech_pad_ms: 300,
            },
            VadPreset::Noisy => VadConfig {
                threshold: 0.7,
                min_speech_duration_ms: 500,
                min_silence_duration_ms: 800,
                speech_pad_ms: 500,
            },
        }
    }

    /// Preset name as it appears in configuration and on the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            VadPreset::Meeting => "meeting",
            VadPreset::Presentation => "presentation",
            VadPreset::Noisy => "noisy",
            VadPreset::Default => "default",
        }
    }
}

/// Voice activity detector over a complete 16kHz mono buffer.
#[derive(Debug, Clone)]
pub struct VadProcessor {
    config: VadConfig,
}

impl VadProcessor {
    /// Creates a new processor with the given configuration.
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    /// Detects speech intervals in the given samples.
    ///
    /// # Arguments
    /// * `samples` - Audio samples as 16-bit PCM, mono
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// An empty result means the audio contains no speech; it is not an
    /// error.
    pub fn detect(&self, samples: &[i16], sample_rate: u32) -> Vec<SpeechInterval> {
        if samples.is_empty() || sample_rate == 0 {
            return Vec::new();
        }

        let total_duration = samples.len() as f64 / sample_rate as f64;
        let frame_len = ((sample_rate as u64 * defaults::VAD_FRAME_MS as u64 / 1000) as usize).max(1);
        let frame_secs = frame_len as f64 / sample_rate as f64;

        // Threshold per-frame probabilities into raw speech runs.
        let mut raw: Vec<SpeechInterval> = Vec::new();
        let mut run_start: Option<usize> = None;

        let frame_count = samples.len().div_ceil(frame_len);
        for i in 0..frame_count {
            let lo = i * frame_len;
            let hi = (lo + frame_len).min(samples.len());
            let is_speech = frame_speech_probability(&samples[lo..hi]) > self.config.threshold;

            match (is_speech, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    raw.push(SpeechInterval::new(
                        start as f64 * frame_secs,
                        (i as f64 * frame_secs).min(total_duration),
                    ));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            raw.push(SpeechInterval::new(
                start as f64 * frame_secs,
                total_duration,
            ));
        }

        let merged = merge_close(&raw, self.config.min_silence_duration_ms as f64 / 1000.0);

        let min_speech = self.config.min_speech_duration_ms as f64 / 1000.0;
        let filtered: Vec<SpeechInterval> = merged
            .into_iter()
            .filter(|iv| iv.duration() >= min_speech)
            .collect();

        let pad = self.config.speech_pad_ms as f64 / 1000.0;
        let padded: Vec<SpeechInterval> = filtered
            .into_iter()
            .map(|iv| {
                SpeechInterval::new((iv.start - pad).max(0.0), (iv.end + pad).min(total_duration))
            })
            .collect();

        // Padding can push neighbors into each other; coalesce to keep the
        // non-overlapping invariant.
        coalesce(&padded)
    }

    /// Estimates speech vs silence duration for a recording, assuming a
    /// typical silence ratio. Used for progress reporting before VAD runs.
    pub fn estimate_speech_ratio(audio_duration: f64, silence_ratio: f64) -> (f64, f64) {
        let silence = audio_duration * silence_ratio;
        (audio_duration - silence, silence)
    }
}

/// Per-frame speech probability in [0.0, 1.0].
///
/// RMS energy scaled by a reference speech level; a frame at or above the
/// reference maps to 1.0.
pub fn frame_speech_probability(samples: &[i16]) -> f32 {
    (frame_rms(samples) / defaults::SPEECH_REFERENCE_RMS).min(1.0)
}

/// Root mean square of the samples, normalized to [0.0, 1.0].
fn frame_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    ((sum_squares / samples.len() as f64).sqrt()) as f32
}

/// Merges intervals separated by a gap shorter than `max_gap` seconds.
fn merge_close(intervals: &[SpeechInterval], max_gap: f64) -> Vec<SpeechInterval> {
    let mut merged: Vec<SpeechInterval> = Vec::with_capacity(intervals.len());
    for iv in intervals {
        match merged.last_mut() {
            Some(prev) if iv.start - prev.end < max_gap => prev.end = iv.end,
            _ => merged.push(*iv),
        }
    }
    merged
}

/// Coalesces overlapping or touching intervals.
fn coalesce(intervals: &[SpeechInterval]) -> Vec<SpeechInterval> {
    let mut out: Vec<SpeechInterval> = Vec::with_capacity(intervals.len());
    for iv in intervals {
        match out.last_mut() {
            Some(prev) if iv.start <= prev.end => prev.end = prev.end.max(iv.end),
            _ => out.push(*iv),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    fn silence(secs: f64) -> Vec<i16> {
        vec![0i16; (secs * RATE as f64) as usize]
    }

    fn speech(secs: f64) -> Vec<i16> {
        // Amplitude 6000 gives RMS ~0.18, well above the reference level.
        vec![6000i16; (secs * RATE as f64) as usize]
    }

    fn signal(parts: &[(bool, f64)]) -> Vec<i16> {
        let mut out = Vec::new();
        for &(is_speech, secs) in parts {
            if is_speech {
                out.extend(speech(secs));
            } else {
                out.extend(silence(secs));
            }
        }
        out
    }

    fn no_pad_config() -> VadConfig {
        VadConfig {
            speech_pad_ms: 0,
            ..VadConfig::default()
        }
    }

    #[test]
    fn test_frame_probability_silence_is_zero() {
        assert_eq!(frame_speech_probability(&silence(0.03)), 0.0);
    }

    #[test]
    fn test_frame_probability_loud_speech_saturates() {
        assert_eq!(frame_speech_probability(&speech(0.03)), 1.0);
    }

    #[test]
    fn test_frame_probability_empty() {
        assert_eq!(frame_speech_probability(&[]), 0.0);
    }

    #[test]
    fn test_detect_pure_silence_is_empty() {
        let vad = VadProcessor::new(VadConfig::default());
        let intervals = vad.detect(&silence(60.0), RATE);
        assert!(intervals.is_empty());
    }

    #[test]
    fn test_detect_empty_input() {
        let vad = VadProcessor::new(VadConfig::default());
        assert!(vad.detect(&[], RATE).is_empty());
    }

    #[test]
    fn test_detect_single_speech_run() {
        let vad = VadProcessor::new(no_pad_config());
        let audio = signal(&[(false, 1.0), (true, 2.0), (false, 1.0)]);
        let intervals = vad.detect(&audio, RATE);

        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].start - 1.0).abs() < 0.05);
        assert!((intervals[0].end - 3.0).abs() < 0.05);
    }

    #[test]
    fn test_short_speech_island_is_dropped() {
        let vad = VadProcessor::new(no_pad_config());
        // 100ms blip is below the 250ms minimum.
        let audio = signal(&[(false, 1.0), (true, 0.1), (false, 2.0)]);
        let intervals = vad.detect(&audio, RATE);
        assert!(intervals.is_empty());
    }

    #[test]
    fn test_short_silence_merges_neighbors() {
        let vad = VadProcessor::new(no_pad_config());
        // 300ms gap is below the 500ms minimum silence, so one interval.
        let audio = signal(&[(true, 1.0), (false, 0.3), (true, 1.0)]);
        let intervals = vad.detect(&audio, RATE);

        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].duration() - 2.3).abs() < 0.1);
    }

    #[test]
    fn test_long_silence_keeps_intervals_separate() {
        let vad = VadProcessor::new(no_pad_config());
        let audio = signal(&[(true, 1.0), (false, 1.0), (true, 1.0)]);
        let intervals = vad.detect(&audio, RATE);
        assert_eq!(intervals.len(), 2);
    }

    #[test]
    fn test_padding_extends_and_clamps() {
        let vad = VadProcessor::new(VadConfig {
            speech_pad_ms: 400,
            ..VadConfig::default()
        });
        // Speech starts at 0.2s, closer to the boundary than the padding.
        let audio = signal(&[(false, 0.2), (true, 1.0), (false, 0.2)]);
        let intervals = vad.detect(&audio, RATE);

        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, 0.0);
        assert!((intervals[0].end - 1.4).abs() < 0.05);
    }

    #[test]
    fn test_padding_never_creates_overlap() {
        let vad = VadProcessor::new(VadConfig {
            speech_pad_ms: 400,
            min_silence_duration_ms: 500,
            ..VadConfig::default()
        });
        // 600ms gap survives merging, but 2x400ms padding covers it.
        let audio = signal(&[(true, 1.0), (false, 0.6), (true, 1.0)]);
        let intervals = vad.detect(&audio, RATE);

        assert_eq!(intervals.len(), 1);
        for window in intervals.windows(2) {
            assert!(window[0].end <= window[1].start);
        }
    }

    #[test]
    fn test_intervals_strictly_increasing_and_positive() {
        let vad = VadProcessor::new(VadConfig::default());
        let audio = signal(&[
            (false, 0.5),
            (true, 1.5),
            (false, 2.0),
            (true, 1.0),
            (false, 2.0),
            (true, 2.0),
        ]);
        let intervals = vad.detect(&audio, RATE);

        assert!(!intervals.is_empty());
        for iv in &intervals {
            assert!(iv.duration() > 0.0);
        }
        for window in intervals.windows(2) {
            assert!(window[0].start < window[1].start);
            assert!(window[0].end <= window[1].start);
        }
    }

    #[test]
    fn test_detect_is_deterministic() {
        let vad = VadProcessor::new(VadConfig::default());
        let audio = signal(&[(false, 0.5), (true, 1.0), (false, 1.0), (true, 0.5)]);
        let first = vad.detect(&audio, RATE);
        let second = vad.detect(&audio, RATE);
        assert_eq!(first, second);
    }

    #[test]
    fn test_noisy_preset_rejects_quiet_noise() {
        // Amplitude 2700 is ~0.082 RMS, probability ~1.0... use quieter noise.
        let noise: Vec<i16> = vec![1500i16; RATE as usize];
        let meeting = VadProcessor::new(VadPreset::Meeting.config());
        let noisy = VadProcessor::new(VadPreset::Noisy.config());

        // ~0.046 RMS -> probability ~0.57: speech for meeting, not for noisy.
        assert_eq!(meeting.detect(&noise, RATE).len(), 1);
        assert!(noisy.detect(&noise, RATE).is_empty());
    }

    #[test]
    fn test_preset_values() {
        assert_eq!(VadPreset::Meeting.config(), VadConfig::default());
        assert_eq!(VadPreset::Default.config(), VadConfig::default());

        let presentation = VadPreset::Presentation.config();
        assert_eq!(presentation.threshold, 0.6);
        assert_eq!(presentation.min_silence_duration_ms, 1000);

        let noisy = VadPreset::Noisy.config();
        assert_eq!(noisy.threshold, 0.7);
        assert_eq!(noisy.speech_pad_ms, 500);
    }

    #[test]
    fn test_preset_deserializes_from_lowercase() {
        let preset: VadPreset = serde_json::from_str("\"presentation\"").unwrap();
        assert_eq!(preset, VadPreset::Presentation);
    }

    #[test]
    fn test_vad_config_rejects_unknown_field() {
        // The engine once silently broke on a removed knob; unknown keys are
        // now a hard configuration error.
        let toml_str = r#"
            threshold = 0.5
            window_size_samples = 512
        "#;
        let result: std::result::Result<VadConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("window_size_samples")
        );
    }

    #[test]
    fn test_estimate_speech_ratio() {
        let (speech, silence) = VadProcessor::estimate_speech_ratio(3600.0, 0.35);
        assert!((speech - 2340.0).abs() < 1e-9);
        assert!((silence - 1260.0).abs() < 1e-9);
    }
}
