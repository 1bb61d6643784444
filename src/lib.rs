//! callscribe - Optimized long-audio transcription pipeline
//!
//! Turns hour-long multi-speaker recordings into time-aligned transcripts in
//! a fraction of real-time on CPU hardware, by composing VAD, silence-aware
//! chunking, bounded-parallel Whisper inference and overlap-aware merging.

pub mod app;
pub mod asr;
pub mod audio;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod vad;

pub use config::PipelineConfig;
pub use error::{CallscribeError, Result};
pub use merge::FinalTranscript;
pub use pipeline::Pipeline;
