//! Command-line interface for wakechirp
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Inject quiet noise chirps into long silences so Bluetooth earbuds stay awake
#[derive(Parser, Debug)]
#[command(
    name = "wakechirp",
    version,
    about = "Inject quiet noise chirps into long silences so Bluetooth earbuds stay awake",
    subcommand_negates_reqs = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Audio file to process (mp3, flac, ogg, m4a, wav)
    #[arg(value_name = "AUDIO_IN", required = true)]
    pub audio_in: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Length of each output file; 0 writes a single file. Examples: 1800, 30m, 1h
    #[arg(long, short = 'f', value_name = "DURATION", value_parser = parse_duration_secs)]
    pub file_duration: Option<f64>,

    /// Level below which audio counts as silence (0.0 to 1.0)
    #[arg(long, value_name = "LEVEL", value_parser = parse_level)]
    pub silence_volume: Option<f32>,

    /// How long silence lasts before a chirp is injected. Examples: 1.5, 2s, 1500ms
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
    pub silence_duration: Option<f64>,

    /// Peak level of the injected noise (0.0 to 1.0)
    #[arg(long, value_name = "LEVEL", value_parser = parse_level)]
    pub chirp_volume: Option<f32>,

    /// Length of each chirp. Examples: 0.01, 10ms
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
    pub chirp_duration: Option<f64>,

    /// Interval between progress updates. Examples: 1, 500ms
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
    pub update_freq: Option<f64>,

    /// Audio handed to the encoder per call. Examples: 10, 10s
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
    pub chunk_duration: Option<f64>,

    /// Number of segments encoded in parallel
    #[arg(long, short = 'w', value_name = "N")]
    pub workers: Option<usize>,

    /// Only process this much of the input. Examples: 90, 5m
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
    pub max_length: Option<f64>,

    /// MP3 encoder quality, 2 (best, slowest) to 7 (fastest)
    #[arg(long, value_name = "LEVEL")]
    pub quality: Option<u8>,

    /// MP3 bit rate in kbps (32, 40, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320)
    #[arg(long, short = 'b', value_name = "KBPS")]
    pub bit_rate: Option<u16>,

    /// Seed the chirp noise generator for reproducible output
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

impl Cli {
    /// Layer command-line values over `config`.
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(value) = self.file_duration {
            config.split.file_duration_sec = value;
        }
        if let Some(value) = self.workers {
            config.split.worker_count = value;
        }
        if let Some(value) = self.max_length {
            config.split.max_encode_duration_sec = Some(value);
        }
        if let Some(value) = self.silence_volume {
            config.chirp.silence_threshold_volume = value;
        }
        if let Some(value) = self.silence_duration {
            config.chirp.silence_duration_sec = value;
        }
        if let Some(value) = self.chirp_volume {
            config.chirp.chirp_volume = value;
        }
        if let Some(value) = self.chirp_duration {
            config.chirp.chirp_duration_sec = value;
        }
        if let Some(value) = self.chunk_duration {
            config.encoder.chunk_duration_sec = value;
        }
        if let Some(value) = self.quality {
            config.encoder.quality = value;
        }
        if let Some(value) = self.bit_rate {
            config.encoder.bit_rate = value;
        }
        if let Some(value) = self.update_freq {
            config.progress.update_interval_sec = value;
        }
        config
    }
}

/// Parse a duration string into fractional seconds.
///
/// Supports bare numbers (seconds, fractions allowed) and any format accepted
/// by `humantime`: single-unit (`30s`, `5m`, `250ms`) and compound (`1h30m`).
fn parse_duration_secs(s: &str) -> Result<f64, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<f64>() {
        if secs.is_finite() && secs >= 0.0 {
            return Ok(secs);
        }
        return Err(format!("duration must be a non-negative number, got {s}"));
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs_f64())
        .map_err(|e| e.to_string())
}

fn parse_level(s: &str) -> Result<f32, String> {
    let level: f32 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&level) {
        Ok(level)
    } else {
        Err(format!("level must be between 0.0 and 1.0, got {level}"))
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the path of the default configuration file
    Path,
}
