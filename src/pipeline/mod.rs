//! Pipeline orchestration.
//!
//! Wires the stages together in a strict sequence:
//!
//! ```text
//! ┌────────┐   ┌─────┐   ┌─────────┐   ┌──────────────┐   ┌───────┐
//! │ Decode │──▶│ VAD │──▶│ Chunker │──▶│ Transcriber  │──▶│ Merge │──▶ FinalTranscript
//! │        │   │     │   │         │   │ (parallel)   │   │       │
//! └────────┘   └─────┘   └─────────┘   └──────────────┘   └───────┘
//! ```
//!
//! Components never call each other; the orchestrator owns control flow,
//! configuration, timing and temp-file lifetime.

pub mod orchestrator;

pub use orchestrator::Pipeline;
