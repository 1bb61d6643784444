//! ASR engine abstraction and bounded-parallel chunk transcription.
//!
//! The inference engine is a black box with a `{language, segments[]}`
//! output contract. Each worker owns its own engine instance; chunks are
//! independent units of work and a failing chunk never takes down the run.

pub mod catalog;
pub mod engine;
pub mod parallel;
pub mod whisper;

pub use engine::{
    AsrEngine, AsrOutput, AsrSegment, DecodeParams, EngineFactory, EngineVadParams, MockEngine,
    MockEngineFactory,
};
pub use parallel::{
    ChunkResult, ChunkStatus, ParallelTranscriber, TranscriberConfig, TranscriptSegment,
    DEADLINE_MESSAGE,
};
pub use whisper::WhisperEngineFactory;
