//! Voice activity detection over decoded audio.
//!
//! Produces ordered, non-overlapping speech intervals that downstream
//! chunking uses as splitting evidence.

pub mod processor;

pub use processor::{SpeechInterval, VadConfig, VadPreset, VadProcessor};
