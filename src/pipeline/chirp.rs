//! Silence tracking and chirp injection.
//!
//! Once the input has stayed below the silence threshold for longer than
//! `silence_duration_sec`, samples are replaced with low-level uniform noise
//! for `chirp_duration_sec`. The silence timer then resets, so a long quiet
//! stretch gets a fresh chirp every `silence_duration_sec + chirp_duration_sec`.

use crate::config::ChirpConfig;
use rand::Rng;

/// Running silence timer for one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SilenceState {
    pub running_silence_sec: f64,
}

impl SilenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the timer by one sample.
    ///
    /// # Returns
    /// `true` when this sample should be replaced by chirp noise
    pub fn step(&mut self, sample: f32, config: &ChirpConfig, sample_period_sec: f64) -> bool {
        if sample.abs() < config.silence_threshold_volume {
            self.running_silence_sec += sample_period_sec;
        } else {
            self.running_silence_sec = 0.0;
        }

        if self.running_silence_sec > config.silence_duration_sec + config.chirp_duration_sec {
            self.running_silence_sec = 0.0;
        }

        self.running_silence_sec > config.silence_duration_sec
    }
}

/// One chirp sample, uniform in `[-volume, volume]`.
pub fn chirp_sample<R: Rng + ?Sized>(rng: &mut R, volume: f32) -> f32 {
    if volume <= 0.0 {
        return 0.0;
    }
    rng.gen_range(-volume..=volume)
}

/// Apply one transform step to `sample`, returning the output sample and the
/// next state.
pub fn transform<R: Rng + ?Sized>(
    sample: f32,
    mut state: SilenceState,
    config: &ChirpConfig,
    sample_period_sec: f64,
    rng: &mut R,
) -> (f32, SilenceState) {
    let output = if state.step(sample, config, sample_period_sec) {
        chirp_sample(rng, config.chirp_volume)
    } else {
        sample
    };
    (output, state)
}

/// Stateful transform owned by one segment worker.
pub struct ChirpTransform<R> {
    config: ChirpConfig,
    sample_period_sec: f64,
    state: SilenceState,
    rng: R,
}

impl<R: Rng> ChirpTransform<R> {
    pub fn new(config: ChirpConfig, sample_rate_hz: u32, rng: R) -> Self {
        Self {
            config,
            sample_period_sec: 1.0 / f64::from(sample_rate_hz),
            state: SilenceState::new(),
            rng,
        }
    }

    pub fn apply(&mut self, sample: f32) -> f32 {
        let (output, state) = transform(
            sample,
            self.state,
            &self.config,
            self.sample_period_sec,
            &mut self.rng,
        );
        self.state = state;
        output
    }

    pub fn state(&self) -> SilenceState {
        self.state
    }
}
