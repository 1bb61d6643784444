//! Command-line interface for callscribe.
//!
//! Provides argument parsing using clap derive macros. Flags override both
//! the configuration file and environment variables.

use crate::config::{ComputeType, Device, ModelSize, OutputFormat, PipelineConfig};
use crate::vad::VadPreset;
use clap::Parser;
use std::path::PathBuf;

/// Optimized long-audio transcription pipeline
#[derive(Parser, Debug)]
#[command(
    name = "callscribe",
    version,
    about = "Optimized long-audio transcription: VAD, silence-aware chunking, parallel Whisper, overlap-aware merging"
)]
pub struct Cli {
    /// Path to the audio file (WAV) to transcribe
    #[arg(long, value_name = "PATH", required_unless_present = "prewarm")]
    pub audio: Option<PathBuf>,

    /// Whisper model size
    #[arg(long, value_name = "SIZE")]
    pub model: Option<ModelSize>,

    /// Inference device
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<Device>,

    /// Numeric precision (float16 requires cuda)
    #[arg(long, value_name = "TYPE")]
    pub compute_type: Option<ComputeType>,

    /// Number of parallel transcription workers (default: 6 on cpu, 2 on cuda)
    #[arg(long, short = 'w', value_name = "N")]
    pub workers: Option<usize>,

    /// VAD preset tuned for the recording situation
    #[arg(long, value_name = "PRESET")]
    pub vad_preset: Option<VadPreset>,

    /// Output formats to write, comma separated
    #[arg(long, value_name = "FMT", value_delimiter = ',')]
    pub formats: Option<Vec<OutputFormat>>,

    /// Output directory (default: alongside the audio file)
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Language code for transcription (e.g. zh, en)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Wall-clock budget; unstarted chunks past it are reported as failed.
    /// Examples: 90s, 10m, 1h30m
    #[arg(long, value_name = "DURATION", value_parser = parse_deadline_secs)]
    pub deadline: Option<u64>,

    /// Directory holding ggml model files
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Load the model, run a warm-up inference and exit
    #[arg(long)]
    pub prewarm: bool,

    /// Suppress per-stage output
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose output (-v: progress, -vv: diagnostics)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a deadline string into seconds.
///
/// Supports bare numbers (seconds) and any duration format accepted by
/// `humantime` (`90s`, `10m`, `1h30m`).
fn parse_deadline_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

impl Cli {
    /// Applies explicit flags on top of a base configuration.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(model) = self.model {
            config.model.size = model;
        }
        if let Some(device) = self.device {
            config.model.device = device;
        }
        if let Some(compute_type) = self.compute_type {
            config.model.compute_type = compute_type;
        }
        if let Some(ref model_dir) = self.model_dir {
            config.model.model_dir = Some(model_dir.clone());
        }
        if let Some(workers) = self.workers {
            config.max_workers = Some(workers);
        }
        if let Some(preset) = self.vad_preset {
            config.vad.preset = preset;
        }
        if let Some(ref formats) = self.formats {
            config.output.formats = formats.clone();
        }
        if let Some(ref output) = self.output {
            config.output.dir = Some(output.clone());
        }
        if let Some(ref language) = self.language {
            config.language = language.clone();
        }
        if let Some(deadline) = self.deadline {
            config.deadline_secs = Some(deadline);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("callscribe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_minimal_invocation() {
        let cli = parse(&["--audio", "call.wav"]);
        assert_eq!(cli.audio, Some(PathBuf::from("call.wav")));
        assert!(cli.model.is_none());
        assert!(!cli.prewarm);
    }

    #[test]
    fn test_audio_required_unless_prewarm() {
        assert!(Cli::try_parse_from(["callscribe"]).is_err());
        let cli = parse(&["--prewarm"]);
        assert!(cli.prewarm);
        assert!(cli.audio.is_none());
    }

    #[test]
    fn test_full_invocation() {
        let cli = parse(&[
            "--audio",
            "call.wav",
            "--model",
            "large-v3",
            "--device",
            "cuda",
            "--compute-type",
            "float16",
            "--workers",
            "3",
            "--vad-preset",
            "noisy",
            "--formats",
            "txt,json,srt",
            "--output",
            "/tmp/out",
            "--language",
            "zh",
            "--deadline",
            "10m",
        ]);

        assert_eq!(cli.model, Some(ModelSize::LargeV3));
        assert_eq!(cli.device, Some(Device::Cuda));
        assert_eq!(cli.compute_type, Some(ComputeType::Float16));
        assert_eq!(cli.workers, Some(3));
        assert_eq!(cli.vad_preset, Some(VadPreset::Noisy));
        assert_eq!(
            cli.formats,
            Some(vec![OutputFormat::Txt, OutputFormat::Json, OutputFormat::Srt])
        );
        assert_eq!(cli.deadline, Some(600));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let result = Cli::try_parse_from(["callscribe", "--audio", "a.wav", "--model", "huge"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_deadline_bare_seconds() {
        let cli = parse(&["--audio", "a.wav", "--deadline", "45"]);
        assert_eq!(cli.deadline, Some(45));
    }

    #[test]
    fn test_deadline_compound_duration() {
        let cli = parse(&["--audio", "a.wav", "--deadline", "1h30m"]);
        assert_eq!(cli.deadline, Some(5400));
    }

    #[test]
    fn test_apply_overrides_config() {
        let cli = parse(&[
            "--audio",
            "a.wav",
            "--model",
            "tiny",
            "--workers",
            "2",
            "--vad-preset",
            "presentation",
            "--language",
            "en",
        ]);
        let config = cli.apply(PipelineConfig::default());

        assert_eq!(config.model.size, ModelSize::Tiny);
        assert_eq!(config.max_workers, Some(2));
        assert_eq!(config.vad.preset, VadPreset::Presentation);
        assert_eq!(config.language, "en");
        // Untouched fields keep their defaults.
        assert_eq!(config.model.device, Device::Cpu);
    }

    #[test]
    fn test_apply_without_flags_is_identity() {
        let cli = parse(&["--audio", "a.wav"]);
        let config = cli.apply(PipelineConfig::default());
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_verbosity_count() {
        let cli = parse(&["--audio", "a.wav", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
