//! Whisper model metadata catalog.
//!
//! Maps configured model sizes to ggml model files on disk. Deployment bakes
//! the files into the container image (or pre-downloads them into the cache
//! directory); a missing file is a model-load error, never a download.

use crate::config::ModelSize;
use crate::error::{CallscribeError, Result};
use std::path::{Path, PathBuf};

/// Metadata for a Whisper model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// Model identifier (e.g. "medium", "large-v3").
    pub name: &'static str,
    /// Approximate model size in megabytes.
    pub size_mb: u32,
    /// Upstream URL the deployment image fetches the model from.
    pub url: &'static str,
}

/// Catalog of supported multilingual Whisper models.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "tiny",
        size_mb: 75,
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.bin",
    },
    ModelInfo {
        name: "base",
        size_mb: 142,
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin",
    },
    ModelInfo {
        name: "small",
        size_mb: 466,
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin",
    },
    ModelInfo {
        name: "medium",
        size_mb: 1533,
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-medium.bin",
    },
    ModelInfo {
        name: "large-v3",
        size_mb: 3094,
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3.bin",
    },
];

/// Looks up catalog metadata for a model size.
pub fn get_model(size: ModelSize) -> &'static ModelInfo {
    MODELS
        .iter()
        .find(|m| m.name == size.as_str())
        .expect("catalog covers every ModelSize variant")
}

/// ggml file name for a model size.
pub fn model_filename(size: ModelSize) -> String {
    format!("ggml-{}.bin", size.as_str())
}

/// Directory where model files are stored when no explicit dir is configured.
///
/// `~/.cache/callscribe/models/` on Linux.
pub fn default_models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("callscribe")
        .join("models")
}

/// Resolves the on-disk path for a model, verifying it exists.
///
/// # Errors
/// Returns `CallscribeError::ModelNotFound` when the file is absent.
pub fn resolve_model_path(size: ModelSize, model_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = model_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(default_models_dir);
    let path = dir.join(model_filename(size));

    if !path.exists() {
        return Err(CallscribeError::ModelNotFound {
            path: path.to_string_lossy().to_string(),
        });
    }
    Ok(path)
}
