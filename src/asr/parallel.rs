//! Bounded-parallel chunk transcription.
//!
//! Runs ASR over the chunk plan on a pool of worker threads. Every worker
//! owns its own engine instance, allocated at pool start and dropped at pool
//! shutdown. Chunks complete in any order; results are returned sorted by
//! `chunk_id`. A failing chunk yields a failed result and never cancels the
//! others.

use crate::asr::engine::{AsrEngine, DecodeParams, EngineFactory};
use crate::audio::{AudioBuffer, write_chunk_wav};
use crate::chunking::{Chunk, ChunkPlan};
use crate::defaults;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Error message recorded on chunks that were never started because the
/// deadline expired.
pub const DEADLINE_MESSAGE: &str = "Deadline exceeded before chunk transcription started";

/// Outcome of a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Ok,
    Failed,
}

/// One transcribed segment in global time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Segment start in seconds from the start of the input audio.
    pub start: f64,
    /// Segment end in seconds from the start of the input audio.
    pub end: f64,
    /// Transcribed text.
    pub text: String,
    /// Mean token probability; larger is more confident.
    pub confidence: f32,
}

/// Result of transcribing one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_id: usize,
    pub status: ChunkStatus,
    /// Chunk start in global time (seconds).
    pub chunk_start: f64,
    /// Chunk end in global time (seconds).
    pub chunk_end: f64,
    /// Segments in global time. Empty when the chunk failed.
    pub segments: Vec<TranscriptSegment>,
    /// Language the engine decoded with.
    pub detected_language: String,
    /// Engine confidence in the language decision.
    pub language_probability: f32,
    /// Wall-clock seconds spent on this chunk.
    pub processing_time: f64,
    /// Failure message when `status` is `Failed`.
    pub error: Option<String>,
}

impl ChunkResult {
    /// True when this chunk was transcribed successfully.
    pub fn is_ok(&self) -> bool {
        self.status == ChunkStatus::Ok
    }

    fn failed(chunk: &Chunk, processing_time: f64, error: String) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            status: ChunkStatus::Failed,
            chunk_start: chunk.start,
            chunk_end: chunk.end,
            segments: Vec::new(),
            detected_language: String::new(),
            language_probability: 0.0,
            processing_time,
            error: Some(error),
        }
    }
}

/// Configuration for the parallel transcriber.
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    /// Worker thread count; also the number of engine instances held alive.
    pub max_workers: usize,
    /// Decode parameters forwarded to every engine invocation.
    pub decode: DecodeParams,
    /// Attempts per chunk (1 initial + retries).
    pub max_attempts: u32,
    /// Base backoff between attempts, doubled after each failure.
    pub retry_backoff: Duration,
}

impl TranscriberConfig {
    /// Creates a config with default retry policy.
    pub fn new(max_workers: usize, decode: DecodeParams) -> Self {
        Self {
            max_workers,
            decode,
            max_attempts: defaults::TRANSCRIBE_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(defaults::TRANSCRIBE_RETRY_BACKOFF_MS),
        }
    }
}

/// Parallel transcriber executing a chunk plan.
pub struct ParallelTranscriber {
    config: TranscriberConfig,
    factory: Arc<dyn EngineFactory>,
}

impl ParallelTranscriber {
    /// Creates a transcriber over the given engine factory.
    pub fn new(config: TranscriberConfig, factory: Arc<dyn EngineFactory>) -> Self {
        Self { config, factory }
    }

    /// Transcribes every chunk of the plan, bounded by the worker count.
    ///
    /// Chunks not started before `deadline` are recorded as failed; in-flight
    /// chunks run to completion. The returned list is sorted by `chunk_id`.
    ///
    /// # Errors
    /// Fails only when the pool cannot start, i.e. an engine cannot be
    /// created (model load). Per-chunk failures are data, not errors.
    pub fn transcribe_chunks(
        &self,
        audio: &AudioBuffer,
        plan: &ChunkPlan,
        deadline: Option<Instant>,
    ) -> Result<Vec<ChunkResult>> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        // One engine per worker, allocated before any chunk work so that
        // model load failures raise instead of producing failed chunks.
        let worker_count = self.config.max_workers.clamp(1, plan.len());
        let mut engines: Vec<Box<dyn AsrEngine>> = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            engines.push(self.factory.create()?);
        }

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Chunk>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<ChunkResult>();

        for chunk in &plan.chunks {
            // Plan chunks are small; samples are sliced lazily by workers.
            job_tx.send(chunk.clone()).expect("receiver alive");
        }
        drop(job_tx);

        thread::scope(|scope| {
            for mut engine in engines.drain(..) {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let config = &self.config;
                scope.spawn(move || {
                    while let Ok(chunk) = job_rx.recv() {
                        let past_deadline = deadline.is_some_and(|d| Instant::now() >= d);
                        let result = if past_deadline {
                            ChunkResult::failed(&chunk, 0.0, DEADLINE_MESSAGE.to_string())
                        } else {
                            process_chunk(engine.as_mut(), audio, &chunk, config)
                        };
                        if result_tx.send(result).is_err() {
                            return;
                        }
                    }
                    // Engine dropped here: per-worker model lifetime ends at
                    // pool shutdown.
                });
            }
        });
        drop(result_tx);

        let mut results: Vec<ChunkResult> = result_rx.iter().collect();
        results.sort_by_key(|r| r.chunk_id);
        Ok(results)
    }
}

/// Transcribes a single chunk, converting any failure into a failed result.
fn process_chunk(
    engine: &mut dyn AsrEngine,
    audio: &AudioBuffer,
    chunk: &Chunk,
    config: &TranscriberConfig,
) -> ChunkResult {
    let started = Instant::now();

    match run_chunk(engine, audio, chunk, config) {
        Ok(output) => {
            let segments = output
                .segments
                .into_iter()
                .map(|seg| TranscriptSegment {
                    // Local chunk time to global time.
                    start: chunk.start + seg.start,
                    end: chunk.start + seg.end,
                    text: seg.text,
                    confidence: seg.confidence,
                })
                .collect();

            ChunkResult {
                chunk_id: chunk.chunk_id,
                status: ChunkStatus::Ok,
                chunk_start: chunk.start,
                chunk_end: chunk.end,
                segments,
                detected_language: output.language,
                language_probability: output.language_probability,
                processing_time: started.elapsed().as_secs_f64(),
                error: None,
            }
        }
        Err(e) => ChunkResult::failed(chunk, started.elapsed().as_secs_f64(), e.to_string()),
    }
}

/// Extracts the chunk audio and runs the engine with bounded retries.
///
/// The temp extract is dropped (and deleted) on every return path.
fn run_chunk(
    engine: &mut dyn AsrEngine,
    audio: &AudioBuffer,
    chunk: &Chunk,
    config: &TranscriberConfig,
) -> Result<crate::asr::engine::AsrOutput> {
    let samples = audio.slice_secs(chunk.start, chunk.end);
    let extract = write_chunk_wav(samples, audio.sample_rate())?;

    let mut backoff = config.retry_backoff;
    let mut attempt = 1;
    loop {
        match engine.transcribe(extract.path(), &config.decode) {
            Ok(output) => return Ok(output),
            Err(_) if attempt < config.max_attempts => {
                attempt += 1;
                thread::sleep(backoff);
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
