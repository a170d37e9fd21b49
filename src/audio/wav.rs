//! WAV input read directly through hound.
//!
//! Only 16-bit integer PCM is handled here; anything else goes to the
//! symphonia decoder.

use crate::audio::source::{AudioParams, AudioSource};
use crate::error::{ChirpError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Interleaved samples per block (one MP3 frame's worth of stereo audio).
const BLOCK_SIZE: usize = 2304;

/// Audio source that streams samples out of WAV data.
pub struct WavSource<R: Read> {
    samples: hound::WavIntoSamples<R, i16>,
    params: AudioParams,
    origin: String,
}

impl WavSource<BufReader<File>> {
    /// Open a WAV file on disk.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path).map_err(|e| ChirpError::UnreadableAudio {
            path: path.display().to_string(),
            message: format!("Failed to parse WAV file: {e}"),
        })?;
        Self::from_wav_reader(reader, path.display().to_string())
    }
}

impl<R: Read> WavSource<R> {
    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: R) -> Result<Self> {
        let wav_reader = hound::WavReader::new(reader).map_err(|e| ChirpError::UnreadableAudio {
            path: "<reader>".to_string(),
            message: format!("Failed to parse WAV file: {e}"),
        })?;
        Self::from_wav_reader(wav_reader, "<reader>".to_string())
    }

    fn from_wav_reader(reader: hound::WavReader<R>, origin: String) -> Result<Self> {
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(ChirpError::UnreadableAudio {
                path: origin,
                message: format!(
                    "expected 16-bit integer PCM, got {}-bit {:?}",
                    spec.bits_per_sample, spec.sample_format
                ),
            });
        }

        // duration() counts frames, not interleaved samples
        let params = AudioParams::from_frames(
            spec.channels,
            spec.sample_rate,
            u64::from(reader.duration()),
        );

        Ok(Self {
            samples: reader.into_samples::<i16>(),
            params,
            origin,
        })
    }
}

impl<R: Read + Send> AudioSource for WavSource<R> {
    fn params(&self) -> AudioParams {
        self.params
    }

    fn read_block(&mut self) -> Result<Option<Vec<i16>>> {
        let mut block = Vec::with_capacity(BLOCK_SIZE);
        for sample in self.samples.by_ref().take(BLOCK_SIZE) {
            let sample = sample.map_err(|e| ChirpError::UnreadableAudio {
                path: self.origin.clone(),
                message: format!("Failed to read WAV samples: {e}"),
            })?;
            block.push(sample);
        }

        if block.is_empty() {
            Ok(None)
        } else {
            Ok(Some(block))
        }
    }
}
