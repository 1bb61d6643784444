//! ASR engine trait and test double.
//!
//! Engines are created by a factory, one instance per worker, and consume
//! self-contained WAV extracts. The decode parameter set is closed: the only
//! parameters that can reach an engine are the fields below, so a removed or
//! renamed engine knob cannot silently break transcription at runtime.

use crate::error::{CallscribeError, Result};
use crate::vad::VadConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// VAD parameters forwarded to engines that support internal VAD filtering.
///
/// Plain data with a closed field set; engines without internal filtering
/// ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineVadParams {
    pub threshold: f32,
    pub min_speech_duration_ms: u32,
    pub min_silence_duration_ms: u32,
    pub speech_pad_ms: u32,
}

impl From<&VadConfig> for EngineVadParams {
    fn from(config: &VadConfig) -> Self {
        Self {
            threshold: config.threshold,
            min_speech_duration_ms: config.min_speech_duration_ms,
            min_silence_duration_ms: config.min_silence_duration_ms,
            speech_pad_ms: config.speech_pad_ms,
        }
    }
}

/// Decode parameters passed to every engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParams {
    /// Language code (e.g. "zh"); never auto-detect in this pipeline.
    pub language: String,
    /// Beam search width.
    pub beam_size: u32,
    /// Internal VAD filtering parameters, when enabled.
    pub vad: Option<EngineVadParams>,
}

/// One transcribed segment in chunk-local time.
#[derive(Debug, Clone, PartialEq)]
pub struct AsrSegment {
    /// Segment start in seconds from the start of the chunk.
    pub start: f64,
    /// Segment end in seconds from the start of the chunk.
    pub end: f64,
    /// Transcribed text.
    pub text: String,
    /// Mean token probability; larger is more confident.
    pub confidence: f32,
}

/// Output contract of an engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AsrOutput {
    /// Language the engine decoded with.
    pub language: String,
    /// Engine's confidence in the language decision.
    pub language_probability: f32,
    /// Segments in chunk-local time, ordered by start.
    pub segments: Vec<AsrSegment>,
}

/// Speech-to-text engine consuming a self-contained WAV file.
pub trait AsrEngine: Send {
    /// Transcribes the audio file at `wav_path`.
    ///
    /// # Errors
    /// Inference failures are per-chunk errors; the caller converts them into
    /// failed chunk results rather than propagating.
    fn transcribe(&mut self, wav_path: &Path, params: &DecodeParams) -> Result<AsrOutput>;

    /// Name of the loaded model.
    fn model_name(&self) -> &str;
}

/// Creates engine instances, one per worker at pool start.
///
/// Model loading happens inside `create`, so load failures surface before any
/// chunk work begins.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn AsrEngine>>;

    /// Name of the model this factory loads.
    fn model_name(&self) -> &str;
}

/// Scripted engine for tests.
///
/// Emits one segment per contiguous loud run in the input WAV, so pipelines
/// driven by synthetic audio produce predictable transcripts. Failures can be
/// injected per call or keyed on the extract's duration, which identifies a
/// chunk deterministically in a known plan.
#[derive(Debug)]
pub struct MockEngine {
    factory_state: Arc<MockState>,
    calls: u32,
}

#[derive(Debug, Default)]
struct MockState {
    /// Engines created by the factory so far.
    engines_created: AtomicUsize,
    /// Total transcribe calls across all engines.
    calls_total: AtomicU32,
    /// Every WAV path handed to any engine, for temp-lifetime assertions.
    seen_paths: Mutex<Vec<PathBuf>>,
    /// Fail the first N calls of each engine.
    fail_first_calls: u32,
    /// Fail any extract whose duration falls inside this range (seconds).
    fail_duration_range: Option<(f64, f64)>,
    /// Fail factory creation itself (model load failure).
    fail_create: bool,
}

/// Factory for [`MockEngine`] instances with shared failure script.
#[derive(Debug, Clone)]
pub struct MockEngineFactory {
    state: Arc<MockState>,
}

impl Default for MockEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngineFactory {
    /// Creates a factory for well-behaved engines.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
        }
    }

    fn with_state(f: impl FnOnce(&mut MockState)) -> Self {
        let mut state = MockState::default();
        f(&mut state);
        Self {
            state: Arc::new(state),
        }
    }

    /// Every engine fails its first `n` transcribe calls.
    pub fn failing_first_calls(n: u32) -> Self {
        Self::with_state(|s| s.fail_first_calls = n)
    }

    /// Fails any extract whose duration lies within `[min, max]` seconds.
    pub fn failing_durations(min: f64, max: f64) -> Self {
        Self::with_state(|s| s.fail_duration_range = Some((min, max)))
    }

    /// Factory creation itself fails, as an unreadable model would.
    pub fn failing_create() -> Self {
        Self::with_state(|s| s.fail_create = true)
    }

    /// Number of engine instances created so far.
    pub fn engines_created(&self) -> usize {
        self.state.engines_created.load(Ordering::SeqCst)
    }

    /// Number of transcribe calls across all engines so far.
    pub fn calls_total(&self) -> u32 {
        self.state.calls_total.load(Ordering::SeqCst)
    }

    /// Every WAV path any engine of this factory was invoked with.
    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.state.seen_paths.lock().unwrap().clone()
    }
}

impl EngineFactory for MockEngineFactory {
    fn create(&self) -> Result<Box<dyn AsrEngine>> {
        if self.state.fail_create {
            return Err(CallscribeError::ModelLoad {
                message: "mock model load failure".to_string(),
            });
        }
        self.state.engines_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockEngine {
            factory_state: self.state.clone(),
            calls: 0,
        }))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

impl AsrEngine for MockEngine {
    fn transcribe(&mut self, wav_path: &Path, params: &DecodeParams) -> Result<AsrOutput> {
        self.calls += 1;
        self.factory_state.calls_total.fetch_add(1, Ordering::SeqCst);
        self.factory_state
            .seen_paths
            .lock()
            .unwrap()
            .push(wav_path.to_path_buf());

        let (samples, sample_rate) = read_wav(wav_path)?;
        let duration = samples.len() as f64 / sample_rate as f64;

        if self.calls <= self.factory_state.fail_first_calls {
            return Err(CallscribeError::TranscriptionInference {
                message: format!("mock failure on call {}", self.calls),
            });
        }
        if let Some((min, max)) = self.factory_state.fail_duration_range
            && duration >= min
            && duration <= max
        {
            return Err(CallscribeError::TranscriptionInference {
                message: format!("mock failure for {:.2}s extract", duration),
            });
        }

        let segments = loud_runs(&samples, sample_rate)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| AsrSegment {
                start,
                end,
                text: format!("mock segment {}", i),
                confidence: 0.9,
            })
            .collect();

        Ok(AsrOutput {
            language: params.language.clone(),
            language_probability: 0.99,
            segments,
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

fn read_wav(path: &Path) -> Result<(Vec<i16>, u32)> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| CallscribeError::TranscriptionInference {
            message: format!("mock failed to open WAV: {}", e),
        })?;
    let rate = reader.spec().sample_rate;
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CallscribeError::TranscriptionInference {
            message: format!("mock failed to read WAV: {}", e),
        })?;
    Ok((samples, rate))
}

/// Contiguous loud runs at 30ms frame resolution, in seconds.
fn loud_runs(samples: &[i16], sample_rate: u32) -> Vec<(f64, f64)> {
    let frame_len = (sample_rate as u64 * 30 / 1000).max(1) as usize;
    let frame_secs = frame_len as f64 / sample_rate as f64;
    let total = samples.len() as f64 / sample_rate as f64;

    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;
    let frame_count = samples.len().div_ceil(frame_len);

    for i in 0..frame_count {
        let lo = i * frame_len;
        let hi = (lo + frame_len).min(samples.len());
        let loud = crate::vad::processor::frame_speech_probability(&samples[lo..hi]) > 0.5;
        match (loud, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                runs.push((start as f64 * frame_secs, i as f64 * frame_secs));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        runs.push((start as f64 * frame_secs, total));
    }
    runs
}
