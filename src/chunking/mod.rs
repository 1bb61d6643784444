//! Timeline partitioning into processable chunks.
//!
//! Splits long recordings at natural silences so the inference engine never
//! cuts through an utterance, with small overlaps between neighbors for
//! boundary continuity.

pub mod chunker;

pub use chunker::{AudioChunker, Chunk, ChunkPlan, ChunkerConfig};
