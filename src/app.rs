//! Application entry: builds the configuration layer stack and runs the
//! pipeline, mapping errors to process exit codes.

use crate::cli::Cli;
use crate::config::PipelineConfig;
use crate::error::{CallscribeError, Result};
use crate::pipeline::Pipeline;

/// Runs the CLI and returns the process exit code.
///
/// Exit codes: 0 success (even with failed chunks; the count is in the JSON
/// output), 1 configuration error, 2 input I/O error, 3 model load error.
pub fn run(cli: Cli) -> i32 {
    match try_run(&cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("callscribe: {}", e);
            e.exit_code()
        }
    }
}

fn try_run(cli: &Cli) -> Result<()> {
    // Precedence: defaults < config file < environment < explicit flags.
    let base = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let config = cli.apply(base.with_env_overrides()?);

    let pipeline = Pipeline::new(config)?
        .with_quiet(cli.quiet)
        .with_verbosity(cli.verbose);

    if cli.prewarm {
        pipeline.warm_up();
        return Ok(());
    }

    let audio = cli
        .audio
        .as_ref()
        .ok_or_else(|| CallscribeError::ConfigInvalidValue {
            key: "audio".to_string(),
            message: "an audio path is required".to_string(),
        })?;

    pipeline.process(audio)?;
    Ok(())
}
