//! Transcript assembly and serialization.
//!
//! Collects chunk results in chunk order, removes the overlap-zone
//! duplicates, and produces the final transcript plus its txt/srt/vtt/json
//! renderings.

pub mod merger;
pub mod timestamp;
pub mod writer;

pub use merger::{FinalTranscript, PipelineMetadata, StageTiming, TranscriptMerger};
pub use timestamp::{
    format_srt_timestamp, format_vtt_timestamp, parse_srt_timestamp, parse_vtt_timestamp,
};
pub use writer::{render, write_outputs};
