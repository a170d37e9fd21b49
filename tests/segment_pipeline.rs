//! End-to-end runs over real WAV files with the mock encoder.

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wakechirp::encode::{MOCK_TRAILER, MockEncoderFactory};
use wakechirp::pipeline::{CollectingReporter, NullReporter};
use wakechirp::{ChirpError, Config, FileOpener, Orchestrator};

fn write_wav(path: &Path, channels: u16, frames: usize, frame: &[i16]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        for &sample in frame {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn words(path: &Path) -> Vec<i16> {
    let bytes = std::fs::read(path).unwrap();
    assert!(bytes.ends_with(MOCK_TRAILER));
    bytes[..bytes.len() - MOCK_TRAILER.len()]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn config(file_duration_sec: f64, worker_count: usize) -> Config {
    let mut config = Config::default();
    config.split.file_duration_sec = file_duration_sec;
    config.split.worker_count = worker_count;
    config
}

#[test]
fn three_channel_input_aborts_before_any_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("surround.wav");
    write_wav(&input, 3, 8000, &[0, 0, 0]);
    let encoders = MockEncoderFactory::new();
    let orchestrator = Orchestrator::new(
        config(0.5, 4),
        Arc::new(FileOpener),
        Arc::new(encoders.clone()),
    );

    let result = orchestrator.run(&input, &mut NullReporter);

    match result {
        Err(ChirpError::UnsupportedChannelLayout { channels }) => assert_eq!(channels, 3),
        other => panic!("Expected UnsupportedChannelLayout, got {other:?}"),
    }
    assert!(encoders.encoders().is_empty());
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("surround.wav")]);
}

#[test]
fn loud_stereo_input_is_downmixed_and_passed_through() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("music.wav");
    // Mean 15000 is well above the silence threshold
    write_wav(&input, 2, 20000, &[20000, 10000]);
    let orchestrator = Orchestrator::new(
        config(1.0, 2),
        Arc::new(FileOpener),
        Arc::new(MockEncoderFactory::new()),
    );
    let reporter = CollectingReporter::new();

    let report = orchestrator.run(&input, &mut reporter.clone()).unwrap();

    assert_eq!(report.segments.len(), 3);
    let mut all = Vec::new();
    for segment in &report.segments {
        all.extend(words(&segment.output_path));
    }
    assert_eq!(all.len(), 20000);
    assert!(all.iter().all(|&w| w == 15000));

    let overview = reporter.overview().unwrap();
    assert_eq!(overview.params.channel_count, 2);
    assert_eq!(overview.total_sample_count, 20000);
    assert!(reporter.is_finished());
}

#[test]
fn max_length_caps_processed_audio() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("long.wav");
    write_wav(&input, 1, 24000, &[0]);
    let mut cfg = config(0.0, 1);
    cfg.split.max_encode_duration_sec = Some(1.25);
    let orchestrator = Orchestrator::new(
        cfg,
        Arc::new(FileOpener),
        Arc::new(MockEncoderFactory::new()),
    );

    let report = orchestrator.run(&input, &mut NullReporter).unwrap();

    assert_eq!(report.segments.len(), 1);
    assert_eq!(report.segments[0].sample_count, 10000);
    assert_eq!(words(&report.segments[0].output_path).len(), 10000);
}

#[test]
fn quiet_stretches_are_chirped_in_every_segment() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("quiet.wav");
    write_wav(&input, 1, 32000, &[0]);
    let orchestrator = Orchestrator::new(
        config(2.0, 2),
        Arc::new(FileOpener),
        Arc::new(MockEncoderFactory::new()),
    )
    .with_seed(99);

    let report = orchestrator.run(&input, &mut NullReporter).unwrap();

    let limit = (0.01f32 * 32767.0).round() as i16;
    for segment in &report.segments {
        let words = words(&segment.output_path);
        assert_eq!(words.len(), 16000);
        // Each segment starts its silence timer from zero: 1.5 s before the first chirp
        assert!(words[..11990].iter().all(|&w| w == 0));
        assert!(words[12000..12080].iter().any(|&w| w != 0));
        assert!(words.iter().all(|w| w.abs() <= limit));
    }
}

#[test]
fn corrupt_input_is_unreadable() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.mp3");
    std::fs::write(&input, b"definitely not audio").unwrap();
    let orchestrator = Orchestrator::new(
        Config::default(),
        Arc::new(FileOpener),
        Arc::new(MockEncoderFactory::new()),
    );

    let error = orchestrator.run(&input, &mut NullReporter).unwrap_err();
    match error {
        ChirpError::UnreadableAudio { path, .. } => assert!(path.ends_with("broken.mp3")),
        other => panic!("Expected UnreadableAudio, got {other:?}"),
    }
}
