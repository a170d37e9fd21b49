//! wakechirp - keep Bluetooth earbuds awake through quiet audio
//!
//! Detects long silences in a recording, fills them with short low-level
//! noise bursts, and re-encodes the result as MP3 segments in parallel.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod encode;
pub mod error;
pub mod pipeline;

// Composition root - needs the real encoder and the CLI stack
#[cfg(all(feature = "mp3", feature = "cli"))]
pub mod app;

// Collaborator traits (source → encoder)
pub use audio::FileOpener;
pub use audio::source::{AudioOpener, AudioParams, AudioSource};
pub use encode::{EncoderFactory, SegmentEncoder};

// Pipeline
pub use pipeline::orchestrator::{Orchestrator, RunOverview, RunReport};
pub use pipeline::progress::{ProgressEvent, ProgressReporter};

// Error handling
pub use error::{ChirpError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
