#![cfg(feature = "mp3")]

//! Silent WAV in, MP3 out, decoded again to find where the chirps landed.

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wakechirp::audio::FileOpener;
use wakechirp::audio::decode::SymphoniaSource;
use wakechirp::encode::mp3::{Mp3EncoderFactory, Mp3Settings};
use wakechirp::pipeline::progress::CollectingReporter;
use wakechirp::{AudioSource, Config, Orchestrator};

const RATE: u32 = 8000;

fn write_silent_wav(path: &Path, seconds: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..seconds * RATE {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn decode_all(path: &Path) -> Vec<i16> {
    let mut source = SymphoniaSource::open(path).unwrap();
    assert_eq!(source.params().channel_count, 1);
    assert_eq!(source.params().sample_rate_hz, RATE);

    let mut samples = Vec::new();
    while let Some(block) = source.read_block().unwrap() {
        samples.extend(block);
    }
    samples
}

/// Peak amplitude of each 50 ms window.
fn window_peaks(samples: &[i16]) -> Vec<i16> {
    samples
        .chunks(RATE as usize / 20)
        .map(|window| window.iter().map(|s| s.saturating_abs()).max().unwrap_or(0))
        .collect()
}

fn round_trip_config() -> Config {
    let mut config = Config::default();
    config.split.file_duration_sec = 0.0;
    config.chirp.silence_duration_sec = 0.5;
    config.chirp.chirp_duration_sec = 0.1;
    config.chirp.chirp_volume = 0.05;
    config
}

#[test]
fn silent_input_gets_chirps_after_half_a_second() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("silence.wav");
    write_silent_wav(&input, 2);

    let config = round_trip_config();
    let encoders = Mp3EncoderFactory::new(Mp3Settings {
        bit_rate: config.encoder.bit_rate,
        quality: config.encoder.quality,
    });
    let orchestrator =
        Orchestrator::new(config, Arc::new(FileOpener), Arc::new(encoders)).with_seed(5);
    let reporter = CollectingReporter::new();

    let report = orchestrator.run(&input, &mut reporter.clone()).unwrap();

    assert_eq!(report.segments.len(), 1);
    let segment = &report.segments[0];
    assert_eq!(segment.output_path, dir.path().join("silence.000.chirp.mp3"));
    assert_eq!(segment.sample_count, 2 * u64::from(RATE));

    let decoded = decode_all(&segment.output_path);
    // Encoder delay and padding only ever add samples
    assert!(
        decoded.len() >= 2 * RATE as usize,
        "decoded only {} samples",
        decoded.len()
    );

    let peaks = window_peaks(&decoded);
    let first_loud = peaks
        .iter()
        .position(|&peak| peak > 200)
        .expect("no chirp energy in decoded output");
    let onset_sec = first_loud as f64 * 0.05;
    assert!(
        (0.4..=0.8).contains(&onset_sec),
        "chirp energy starts at {onset_sec}s, peaks: {peaks:?}"
    );
    assert!(peaks[..8].iter().all(|&peak| peak < 200));

    let events = reporter.events_for(0);
    assert_eq!(events.last().map(|e| e.completed_fraction), Some(1.0));
}

#[test]
fn segments_are_independently_decodable() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("long.wav");
    write_silent_wav(&input, 5);

    let mut config = round_trip_config();
    config.split.file_duration_sec = 2.0;
    config.split.worker_count = 3;
    let encoders = Mp3EncoderFactory::new(Mp3Settings {
        bit_rate: 32,
        quality: 7,
    });
    let orchestrator = Orchestrator::new(config, Arc::new(FileOpener), Arc::new(encoders));

    let report = orchestrator
        .run(&input, &mut wakechirp::pipeline::NullReporter)
        .unwrap();

    assert_eq!(report.segments.len(), 3);
    let planned = [2.0, 2.0, 1.0];
    for (segment, expected_sec) in report.segments.iter().zip(planned) {
        let decoded = decode_all(&segment.output_path);
        let decoded_sec = decoded.len() as f64 / f64::from(RATE);
        assert!(
            decoded_sec >= expected_sec,
            "segment {} decoded to {decoded_sec}s",
            segment.segment_index
        );
    }
}
