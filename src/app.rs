//! Application entry point.
//!
//! Wires the file decoder, the MP3 encoder and the progress dashboard into an
//! [`Orchestrator`] and runs it over one input.

use crate::audio::FileOpener;
use crate::config::Config;
use crate::encode::mp3::{Mp3EncoderFactory, Mp3Settings};
use crate::error::Result;
use crate::pipeline::orchestrator::{Orchestrator, RunReport};
use crate::pipeline::progress::{BarReporter, NullReporter, ProgressReporter};
use std::path::Path;
use std::sync::Arc;

/// Build the orchestrator used for real runs.
pub fn build_orchestrator(config: Config, seed: Option<u64>) -> Orchestrator {
    let encoders = Mp3EncoderFactory::new(Mp3Settings {
        bit_rate: config.encoder.bit_rate,
        quality: config.encoder.quality,
    });
    let orchestrator = Orchestrator::new(config, Arc::new(FileOpener), Arc::new(encoders));
    match seed {
        Some(seed) => orchestrator.with_seed(seed),
        None => orchestrator,
    }
}

/// Run the chirp command: decode → chirp → encode every segment of `input`.
///
/// # Arguments
/// * `config` - Fully layered configuration (file, environment, CLI)
/// * `input` - Audio file to process
/// * `quiet` - Suppress the overview and progress bars
/// * `seed` - Optional seed for reproducible chirp noise
///
/// # Returns
/// Reports for every written segment, in segment order
pub fn run_chirp_command(
    config: Config,
    input: &Path,
    quiet: bool,
    seed: Option<u64>,
) -> Result<RunReport> {
    config.validate()?;

    let mut reporter: Box<dyn ProgressReporter> = if quiet {
        Box::new(NullReporter)
    } else {
        Box::new(BarReporter::new())
    };

    build_orchestrator(config, seed).run(input, reporter.as_mut())
}
