//! Default configuration constants for wakechirp.
//!
//! Shared by the configuration file layer and the CLI so both agree on what
//! "unset" means.

/// Samples quieter than this (absolute, 0.0 to 1.0) count as silence.
pub const SILENCE_THRESHOLD_VOLUME: f32 = 0.3;

/// Seconds of silence after which the earbuds go to sleep.
pub const SILENCE_DURATION_SEC: f64 = 1.5;

/// Peak amplitude of the injected noise (0.0 to 1.0).
pub const CHIRP_VOLUME: f32 = 0.01;

/// Length of one chirp burst in seconds.
pub const CHIRP_DURATION_SEC: f64 = 0.01;

/// Seconds of audio buffered in memory before each encoder call.
pub const CHUNK_DURATION_SEC: f64 = 10.0;

/// LAME quality level: 2 = best compression, 7 = fastest.
pub const MP3_QUALITY: u8 = 2;

/// Output bit rate in kbps.
pub const MP3_BIT_RATE: u16 = 64;

/// Bit rates accepted for the MP3 output, in kbps.
pub const MP3_BIT_RATES: &[u16] = &[32, 40, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];

/// Lowest and highest accepted quality levels.
pub const MP3_QUALITY_RANGE: std::ops::RangeInclusive<u8> = 2..=7;

/// Length of each output file in seconds (30 minutes).
pub const FILE_DURATION_SEC: f64 = 30.0 * 60.0;

/// Size of the segment worker pool.
pub const WORKER_COUNT: usize = 16;

/// Seconds between progress updates from one segment.
pub const PROGRESS_UPDATE_INTERVAL_SEC: f64 = 1.0;

/// Full-scale magnitude of a signed 16-bit sample.
pub const I16_FULL_SCALE: f32 = 32767.0;

/// Marker inserted into output file names before the encoder's extension.
pub const OUTPUT_TAG: &str = "chirp";
