//! Pipeline configuration.
//!
//! A single immutable record passed to the orchestrator; child stages receive
//! only the sub-fields they need. Unknown fields are rejected at
//! deserialization, and invalid combinations fail validation before any stage
//! runs.

use crate::chunking::ChunkerConfig;
use crate::defaults;
use crate::error::{CallscribeError, Result};
use crate::vad::{VadConfig, VadPreset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Whisper model size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    LargeV3,
}

impl ModelSize {
    /// Model name as used in configuration and ggml file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::LargeV3 => "large-v3",
        }
    }
}

/// Inference device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

/// Numeric precision used by the inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ComputeType {
    Int8,
    Float16,
    Float32,
}

impl ComputeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeType::Int8 => "int8",
            ComputeType::Float16 => "float16",
            ComputeType::Float32 => "float32",
        }
    }
}

/// Transcript output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Txt,
    Srt,
    Vtt,
    Json,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
            OutputFormat::Json => "json",
        }
    }
}

/// Model selection and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Whisper model size.
    pub size: ModelSize,
    /// Inference device.
    pub device: Device,
    /// Numeric precision. `float16` requires `cuda`.
    pub compute_type: ComputeType,
    /// Directory holding ggml model files. Defaults to the user cache dir.
    pub model_dir: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            size: ModelSize::Medium,
            device: Device::Cpu,
            compute_type: ComputeType::Int8,
            model_dir: None,
        }
    }
}

/// VAD parameter selection: a preset plus optional explicit overrides.
///
/// Unknown parameter names are rejected at deserialization; the engine's
/// accepted parameter set is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VadSettings {
    /// Named preset providing the base parameter values.
    pub preset: VadPreset,
    /// Explicit threshold override (0.0 to 1.0).
    pub threshold: Option<f32>,
    /// Explicit minimum speech duration override (milliseconds).
    pub min_speech_duration_ms: Option<u32>,
    /// Explicit minimum silence duration override (milliseconds).
    pub min_silence_duration_ms: Option<u32>,
    /// Explicit speech padding override (milliseconds).
    pub speech_pad_ms: Option<u32>,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            preset: VadPreset::Meeting,
            threshold: None,
            min_speech_duration_ms: None,
            min_silence_duration_ms: None,
            speech_pad_ms: None,
        }
    }
}

impl VadSettings {
    /// Resolves the preset plus overrides into a concrete parameter set.
    pub fn resolve(&self) -> VadConfig {
        let base = self.preset.config();
        VadConfig {
            threshold: self.threshold.unwrap_or(base.threshold),
            min_speech_duration_ms: self
                .min_speech_duration_ms
                .unwrap_or(base.min_speech_duration_ms),
            min_silence_duration_ms: self
                .min_silence_duration_ms
                .unwrap_or(base.min_silence_duration_ms),
            speech_pad_ms: self.speech_pad_ms.unwrap_or(base.speech_pad_ms),
        }
    }
}

/// Output file selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Formats to write after a successful run.
    pub formats: Vec<OutputFormat>,
    /// Output directory; defaults to the audio file's directory.
    pub dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Txt, OutputFormat::Json],
            dir: None,
        }
    }
}

/// Root configuration for the transcription pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Model selection.
    pub model: ModelConfig,
    /// VAD parameters.
    pub vad: VadSettings,
    /// Chunk planning durations.
    pub chunking: ChunkerConfig,
    /// Parallel transcription workers. Defaults by device: 6 on CPU, 2 on GPU.
    pub max_workers: Option<usize>,
    /// Language code forwarded to the engine (e.g. "zh").
    pub language: String,
    /// Beam search width.
    pub beam_size: u32,
    /// Output files.
    pub output: OutputConfig,
    /// Optional wall-clock budget in seconds. Chunks not started before it
    /// expires are recorded as failed; in-flight chunks finish.
    pub deadline_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            vad: VadSettings::default(),
            chunking: ChunkerConfig::default(),
            max_workers: None,
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            beam_size: defaults::BEAM_SIZE,
            output: OutputConfig::default(),
            deadline_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Missing fields use default values; unknown fields are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CallscribeError::ConfigFileNotFound {
                    path: path.to_string_lossy().to_string(),
                },
                _ => CallscribeError::Io(e),
            })?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Applies container environment variable overrides.
    ///
    /// Supported variables:
    /// - `WHISPER_MODEL_SIZE` → model.size
    /// - `WHISPER_DEVICE` → model.device
    /// - `WHISPER_COMPUTE_TYPE` → model.compute_type
    /// - `VAD_PRESET` → vad.preset
    /// - `TRANSCRIBE_WORKERS` → max_workers
    /// - `CALLSCRIBE_MODEL_DIR` → model.model_dir
    ///
    /// Explicit CLI or library arguments are applied after this, so they win.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(value) = non_empty_env("WHISPER_MODEL_SIZE") {
            self.model.size = parse_env_enum("WHISPER_MODEL_SIZE", &value)?;
        }
        if let Some(value) = non_empty_env("WHISPER_DEVICE") {
            self.model.device = parse_env_enum("WHISPER_DEVICE", &value)?;
        }
        if let Some(value) = non_empty_env("WHISPER_COMPUTE_TYPE") {
            self.model.compute_type = parse_env_enum("WHISPER_COMPUTE_TYPE", &value)?;
        }
        if let Some(value) = non_empty_env("VAD_PRESET") {
            self.vad.preset = parse_env_enum("VAD_PRESET", &value)?;
        }
        if let Some(value) = non_empty_env("TRANSCRIBE_WORKERS") {
            let workers: usize =
                value
                    .parse()
                    .map_err(|_| CallscribeError::ConfigInvalidValue {
                        key: "TRANSCRIBE_WORKERS".to_string(),
                        message: format!("expected a positive integer, got '{}'", value),
                    })?;
            self.max_workers = Some(workers);
        }
        if let Some(value) = non_empty_env("CALLSCRIBE_MODEL_DIR") {
            self.model.model_dir = Some(PathBuf::from(value));
        }
        Ok(self)
    }

    /// Validates the configuration. Called once at orchestrator entry.
    pub fn validate(&self) -> Result<()> {
        if self.model.device == Device::Cpu && self.model.compute_type == ComputeType::Float16 {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "model.compute_type".to_string(),
                message: "float16 requires device=cuda".to_string(),
            });
        }
        if self.max_workers == Some(0) {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "max_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.beam_size == 0 {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "beam_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.language.is_empty() {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "language".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        let vad = self.vad.resolve();
        if !(0.0..=1.0).contains(&vad.threshold) {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "vad.threshold".to_string(),
                message: format!("must be within 0.0..=1.0, got {}", vad.threshold),
            });
        }
        self.chunking.validate()?;
        Ok(())
    }

    /// Effective worker count, defaulting by device.
    pub fn effective_workers(&self) -> usize {
        self.max_workers.unwrap_or(match self.model.device {
            Device::Cpu => defaults::DEFAULT_WORKERS_CPU,
            Device::Cuda => defaults::DEFAULT_WORKERS_GPU,
        })
    }

    /// Wall-clock budget as a duration, when configured.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Reads an environment variable, treating empty values as unset.
fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Parses an enum-valued environment variable via its CLI value names.
fn parse_env_enum<T: clap::ValueEnum>(name: &str, value: &str) -> Result<T> {
    T::from_str(value, true).map_err(|_| CallscribeError::ConfigInvalidValue {
        key: name.to_string(),
        message: format!("unknown value '{}'", value),
    })
}
