//! The transcription pipeline orchestrator.
//!
//! Exposes the single entry point `process(audio_path)` and the container
//! warm-up operation. Stage outputs flow unchanged from one stage to the
//! next; the orchestrator adds only timing metadata.

use crate::asr::{
    DEADLINE_MESSAGE, DecodeParams, EngineFactory, EngineVadParams, ParallelTranscriber,
    TranscriberConfig, WhisperEngineFactory,
};
use crate::audio::{AudioBuffer, write_silence_wav};
use crate::chunking::AudioChunker;
use crate::config::PipelineConfig;
use crate::defaults;
use crate::error::Result;
use crate::merge::{
    FinalTranscript, PipelineMetadata, StageTiming, TranscriptMerger, write_outputs,
};
use crate::vad::VadProcessor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// The long-audio transcription pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    factory: Arc<dyn EngineFactory>,
    quiet: bool,
    verbosity: u8,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("factory", &self.factory.model_name())
            .field("quiet", &self.quiet)
            .field("verbosity", &self.verbosity)
            .finish()
    }
}

impl Pipeline {
    /// Creates a pipeline with the Whisper engine for the configured model.
    ///
    /// # Errors
    /// Fails for invalid configuration or a missing model file; both are
    /// pre-flight errors, nothing has run yet.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let factory = Arc::new(WhisperEngineFactory::from_config(&config.model)?);
        Ok(Self {
            config,
            factory,
            quiet: false,
            verbosity: 0,
        })
    }

    /// Creates a pipeline over a custom engine factory.
    ///
    /// This is the seam tests and embedders use to supply their own engine.
    pub fn with_engine_factory(
        config: PipelineConfig,
        factory: Arc<dyn EngineFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            quiet: false,
            verbosity: 0,
        })
    }

    /// Suppresses stderr reporting.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Sets the verbosity level (0=summary, 1=progress, 2=diagnostics).
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline over one audio file.
    ///
    /// # Errors
    /// Raises only configuration, input I/O and model-load failures.
    /// Individual chunk failures are reflected in `chunks_failed` on the
    /// returned transcript, never as an error.
    pub fn process(&self, audio_path: &Path) -> Result<FinalTranscript> {
        let run_started = Instant::now();
        let deadline = self.config.deadline().map(|d| run_started + d);
        let mut stages: Vec<StageTiming> = Vec::new();

        self.progress(&format!("Processing {}", audio_path.display()));

        // Stage 1: decode and normalize.
        let stage_started = Instant::now();
        let audio = AudioBuffer::open(audio_path)?;
        stages.push(stage("decode", stage_started, "ok"));
        self.progress(&format!(
            "Audio duration: {:.1}s ({:.1} min), {} Hz, {} ch",
            audio.duration(),
            audio.duration() / 60.0,
            audio.source_sample_rate(),
            audio.source_channels()
        ));

        // Stage 2: speech intervals.
        let stage_started = Instant::now();
        let vad_config = self.config.vad.resolve();
        let intervals = VadProcessor::new(vad_config).detect(audio.samples(), audio.sample_rate());
        stages.push(stage("vad", stage_started, "ok"));
        self.progress(&format!("VAD: {} speech intervals", intervals.len()));

        // Stage 3: chunk plan.
        let stage_started = Instant::now();
        let plan = AudioChunker::new(self.config.chunking).plan(&intervals, audio.duration());
        stages.push(stage("chunk", stage_started, "ok"));
        if self.verbosity >= 1 && !self.quiet {
            for chunk in &plan.chunks {
                eprintln!(
                    "  chunk {}: {:.1}s - {:.1}s ({:.1}s)",
                    chunk.chunk_id,
                    chunk.start,
                    chunk.end,
                    chunk.duration()
                );
            }
        }

        // Stage 4: bounded-parallel transcription.
        let stage_started = Instant::now();
        let workers = self.config.effective_workers();
        let decode = self.decode_params(Some(EngineVadParams::from(&vad_config)));
        let transcriber =
            ParallelTranscriber::new(TranscriberConfig::new(workers, decode), self.factory.clone());
        let results = transcriber.transcribe_chunks(&audio, &plan, deadline)?;
        let deadline_hit = results
            .iter()
            .any(|r| r.error.as_deref() == Some(DEADLINE_MESSAGE));
        stages.push(stage(
            "transcribe",
            stage_started,
            if deadline_hit {
                "deadline exceeded"
            } else {
                "ok"
            },
        ));

        // Stage 5: merge.
        let stage_started = Instant::now();
        let merger = TranscriptMerger::new(plan.overlap_duration);
        let mut transcript = merger.merge(&results);
        stages.push(stage("merge", stage_started, "ok"));

        transcript.metadata = PipelineMetadata {
            audio_path: audio_path.to_string_lossy().to_string(),
            audio_duration: audio.duration(),
            model_size: self.config.model.size.as_str().to_string(),
            device: self.config.model.device.as_str().to_string(),
            compute_type: self.config.model.compute_type.as_str().to_string(),
            language: self.config.language.clone(),
            max_workers: workers,
            vad_preset: self.config.vad.preset.as_str().to_string(),
            chunk_count: plan.len(),
            stages,
            pipeline_elapsed_secs: run_started.elapsed().as_secs_f64(),
            total_processing_secs: results.iter().map(|r| r.processing_time).sum(),
        };

        if !self.config.output.formats.is_empty() {
            let base = self.output_base(audio_path)?;
            write_outputs(&transcript, &self.config.output.formats, &base)?;
        }

        self.report(&transcript);
        Ok(transcript)
    }

    /// Pre-warms the process so the first real request skips cold start.
    ///
    /// Loads one engine and runs a trivial inference over a synthetic silent
    /// buffer. Failures are logged and never propagate; the first real
    /// request will surface the same failure with full context.
    pub fn warm_up(&self) {
        self.progress("Warm-up: loading model");
        match self.run_asr_warm_up() {
            Ok(()) => self.progress("Warm-up: model ready"),
            Err(e) => {
                if !self.quiet {
                    eprintln!("callscribe: warm-up failed (continuing): {}", e);
                }
            }
        }
        self.run_diarization_warm_up();
    }

    fn run_asr_warm_up(&self) -> Result<()> {
        let mut engine = self.factory.create()?;
        let silence = write_silence_wav(defaults::WARMUP_SILENCE_SECS)?;
        engine.transcribe(silence.path(), &self.decode_params(None))?;
        Ok(())
    }

    /// Diarization is a warm-up side effect only; its absence never blocks
    /// transcription. Controlled by `ENABLE_DIARIZATION` and an auth token
    /// consumed here and nowhere else.
    fn run_diarization_warm_up(&self) {
        let enabled = std::env::var("ENABLE_DIARIZATION")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if !enabled {
            if self.verbosity >= 1 {
                self.progress("Warm-up: diarization skipped (ENABLE_DIARIZATION not set)");
            }
            return;
        }

        if !self.quiet {
            match std::env::var("HUGGINGFACE_TOKEN") {
                Ok(_token) if !_token.is_empty() => {
                    eprintln!(
                        "callscribe: diarization warm-up requested; no diarization backend in this build, transcription is unaffected"
                    );
                }
                _ => {
                    eprintln!(
                        "callscribe: diarization warm-up skipped: HUGGINGFACE_TOKEN is not set"
                    );
                }
            }
        }
    }

    fn decode_params(&self, vad: Option<EngineVadParams>) -> DecodeParams {
        DecodeParams {
            language: self.config.language.clone(),
            beam_size: self.config.beam_size,
            vad,
        }
    }

    /// Output path prefix: `<output dir>/<audio stem>`.
    fn output_base(&self, audio_path: &Path) -> Result<PathBuf> {
        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "transcript".to_string());

        let dir = match &self.config.output.dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => audio_path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        };
        Ok(dir.join(stem))
    }

    fn progress(&self, message: &str) {
        if !self.quiet && self.verbosity >= 1 {
            eprintln!("callscribe: {}", message);
        }
    }

    /// Per-stage summary and one-line outcome.
    fn report(&self, transcript: &FinalTranscript) {
        if self.quiet {
            return;
        }
        for stage in &transcript.metadata.stages {
            eprintln!(
                "[{:<10}] {:>8.2}s  {}",
                stage.stage, stage.elapsed_secs, stage.status
            );
        }
        eprintln!(
            "Completed: {} segments, {} chunks ok, {} failed, {:.1}s total",
            transcript.total_segments,
            transcript.chunks_processed,
            transcript.chunks_failed,
            transcript.metadata.pipeline_elapsed_secs
        );
    }
}

fn stage(name: &str, started: Instant, status: &str) -> StageTiming {
    StageTiming {
        stage: name.to_string(),
        elapsed_secs: started.elapsed().as_secs_f64(),
        status: status.to_string(),
    }
}
