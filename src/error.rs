//! Error types for callscribe.
//!
//! Infrastructure failures (configuration, input I/O, model load) are raised
//! out of the pipeline; per-chunk transcription failures are converted into
//! data on the chunk result and never propagate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Input errors
    #[error("Audio file not found: {path}")]
    AudioFileNotFound { path: String },

    #[error("Failed to decode audio: {message}")]
    AudioDecode { message: String },

    // Model errors
    #[error("Transcription model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Failed to load transcription model: {message}")]
    ModelLoad { message: String },

    // Per-chunk errors; absorbed into ChunkResult, never raised from process()
    #[error("Chunk extraction failed: {message}")]
    ChunkExtraction { message: String },

    #[error("Transcription inference failed: {message}")]
    TranscriptionInference { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl CallscribeError {
    /// Process exit code for this error when it reaches the CLI boundary.
    ///
    /// 1 = configuration error, 2 = input I/O error, 3 = model load error.
    /// Per-chunk failures never reach the CLI as errors; they are reflected
    /// in `chunks_failed` on the final transcript and exit code stays 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            CallscribeError::ConfigFileNotFound { .. }
            | CallscribeError::ConfigInvalidValue { .. }
            | CallscribeError::ConfigParse(_) => 1,
            CallscribeError::AudioFileNotFound { .. }
            | CallscribeError::AudioDecode { .. }
            | CallscribeError::Io(_) => 2,
            CallscribeError::ModelNotFound { .. } | CallscribeError::ModelLoad { .. } => 3,
            CallscribeError::ChunkExtraction { .. }
            | CallscribeError::TranscriptionInference { .. }
            | CallscribeError::Other(_) => 1,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, CallscribeError>;
