//! Whisper-based ASR engine using whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be
//! installed. To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```
//!
//! Without the feature, the factory still validates the model path but the
//! engine reports an inference error when used, so test and CI builds do not
//! need the whisper.cpp toolchain.

use crate::asr::catalog;
use crate::asr::engine::{AsrEngine, AsrOutput, DecodeParams, EngineFactory};
#[cfg(feature = "whisper")]
use crate::asr::engine::AsrSegment;
use crate::config::{Device, ModelConfig};
use crate::error::{CallscribeError, Result};
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Factory creating one Whisper engine per worker.
///
/// Each engine owns its own `WhisperContext`; nothing is shared across
/// workers and there are no module-level model caches.
#[derive(Debug, Clone)]
pub struct WhisperEngineFactory {
    model_path: PathBuf,
    model_name: String,
    use_gpu: bool,
}

impl WhisperEngineFactory {
    /// Resolves the model file for the given configuration.
    ///
    /// # Errors
    /// Returns `CallscribeError::ModelNotFound` if the model file is missing.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let model_path = catalog::resolve_model_path(config.size, config.model_dir.as_deref())?;
        Ok(Self {
            model_path,
            model_name: config.size.as_str().to_string(),
            use_gpu: config.device == Device::Cuda,
        })
    }

    /// Creates a factory for an explicit ggml model file.
    pub fn from_model_path(path: &Path, use_gpu: bool) -> Result<Self> {
        if !path.exists() {
            return Err(CallscribeError::ModelNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }
        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(Self {
            model_path: path.to_path_buf(),
            model_name,
            use_gpu,
        })
    }

    /// Path of the model file this factory loads.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Whether engines created by this factory run on the GPU.
    pub fn use_gpu(&self) -> bool {
        self.use_gpu
    }
}

#[cfg(feature = "whisper")]
impl EngineFactory for WhisperEngineFactory {
    fn create(&self) -> Result<Box<dyn AsrEngine>> {
        // Suppress whisper.cpp output (only once per process).
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        let mut context_params = WhisperContextParameters::default();
        context_params.use_gpu(self.use_gpu);

        let context = WhisperContext::new_with_params(
            self.model_path
                .to_str()
                .ok_or_else(|| CallscribeError::ModelLoad {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            context_params,
        )
        .map_err(|e| CallscribeError::ModelLoad {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Box::new(WhisperEngine {
            context,
            model_name: self.model_name.clone(),
        }))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(not(feature = "whisper"))]
impl EngineFactory for WhisperEngineFactory {
    fn create(&self) -> Result<Box<dyn AsrEngine>> {
        Ok(Box::new(WhisperEngine {
            model_name: self.model_name.clone(),
        }))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Whisper engine owned by a single worker.
#[cfg(feature = "whisper")]
pub struct WhisperEngine {
    context: WhisperContext,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper engine placeholder (without the whisper feature).
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine {
    model_name: String,
}

#[cfg(feature = "whisper")]
impl AsrEngine for WhisperEngine {
    fn transcribe(&mut self, wav_path: &Path, params: &DecodeParams) -> Result<AsrOutput> {
        let audio = read_wav_f32(wav_path)?;

        let mut state =
            self.context
                .create_state()
                .map_err(|e| CallscribeError::TranscriptionInference {
                    message: format!("Failed to create Whisper state: {}", e),
                })?;

        let mut full_params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: params.beam_size as i32,
            patience: -1.0,
        });
        full_params.set_language(Some(&params.language));
        full_params.set_token_timestamps(true);
        full_params.set_print_special(false);
        full_params.set_print_progress(false);
        full_params.set_print_realtime(false);
        full_params.set_print_timestamps(false);
        // whisper.cpp has no faster-whisper-style VAD filter; params.vad stays
        // unused here and the pipeline's own VAD evidence does that job.

        state
            .full(full_params, &audio)
            .map_err(|e| CallscribeError::TranscriptionInference {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut segments = Vec::new();
        for segment in state.as_iter() {
            let text = match segment.to_str_lossy() {
                Ok(t) => t.trim().to_string(),
                Err(_) => continue,
            };
            if text.is_empty() {
                continue;
            }

            // Confidence from mean token probability; no_speech_prob is ~0
            // for any real speech and useless as a segment score.
            let mut prob_sum = 0.0_f64;
            let mut token_count = 0u32;
            for i in 0..segment.n_tokens() {
                if let Some(token) = segment.get_token(i) {
                    prob_sum += token.token_probability() as f64;
                    token_count += 1;
                }
            }
            let confidence = if token_count > 0 {
                (prob_sum / token_count as f64).clamp(0.0, 1.0) as f32
            } else {
                0.0
            };

            segments.push(AsrSegment {
                start: segment.start_timestamp() as f64 / 100.0,
                end: segment.end_timestamp() as f64 / 100.0,
                text,
                confidence,
            });
        }

        Ok(AsrOutput {
            // Language is forced from configuration, so the engine's decision
            // is the configured one with full confidence.
            language: params.language.clone(),
            language_probability: 1.0,
            segments,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(not(feature = "whisper"))]
impl AsrEngine for WhisperEngine {
    fn transcribe(&mut self, _wav_path: &Path, _params: &DecodeParams) -> Result<AsrOutput> {
        Err(CallscribeError::TranscriptionInference {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --features whisper\n",
                "If the build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Reads a WAV extract as f32 samples normalized to [-1.0, 1.0].
///
/// Whisper expects f32 input; extracts are always 16kHz mono 16-bit PCM.
#[cfg(feature = "whisper")]
fn read_wav_f32(path: &Path) -> Result<Vec<f32>> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| CallscribeError::TranscriptionInference {
            message: format!("Failed to open chunk WAV: {}", e),
        })?;
    reader
        .samples::<i16>()
        .map(|s| s.map(|v| v as f32 / 32768.0))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CallscribeError::TranscriptionInference {
            message: format!("Failed to read chunk WAV: {}", e),
        })
}
