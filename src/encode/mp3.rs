//! MP3 output through LAME.

use crate::encode::{EncoderFactory, SegmentEncoder};
use crate::error::{ChirpError, Result};
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, MonoPcm, Quality};

/// LAME recommends this much headroom for the final flush.
const FLUSH_BUFFER_BYTES: usize = 7200;

/// Output settings shared by every segment of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3Settings {
    /// Bit rate in kbps.
    pub bit_rate: u16,
    /// LAME quality, 2 (best) to 7 (fastest).
    pub quality: u8,
}

impl Mp3Settings {
    fn bitrate(&self) -> Result<Bitrate> {
        let bitrate = match self.bit_rate {
            32 => Bitrate::Kbps32,
            40 => Bitrate::Kbps40,
            48 => Bitrate::Kbps48,
            64 => Bitrate::Kbps64,
            80 => Bitrate::Kbps80,
            96 => Bitrate::Kbps96,
            112 => Bitrate::Kbps112,
            128 => Bitrate::Kbps128,
            160 => Bitrate::Kbps160,
            192 => Bitrate::Kbps192,
            224 => Bitrate::Kbps224,
            256 => Bitrate::Kbps256,
            320 => Bitrate::Kbps320,
            other => {
                return Err(ChirpError::Encoding {
                    message: format!("unsupported MP3 bit rate: {other} kbps"),
                });
            }
        };
        Ok(bitrate)
    }

    fn lame_quality(&self) -> Result<Quality> {
        let quality = match self.quality {
            2 => Quality::NearBest,
            3 => Quality::VeryNice,
            4 => Quality::Nice,
            5 => Quality::Good,
            6 => Quality::Decent,
            7 => Quality::Ok,
            other => {
                return Err(ChirpError::Encoding {
                    message: format!("unsupported MP3 quality level: {other}"),
                });
            }
        };
        Ok(quality)
    }
}

/// Mono MP3 encoder for one output segment.
pub struct Mp3Encoder {
    inner: mp3lame_encoder::Encoder,
}

impl Mp3Encoder {
    pub fn new(settings: Mp3Settings, sample_rate_hz: u32) -> Result<Self> {
        let mut builder = Builder::new().ok_or_else(|| ChirpError::Encoding {
            message: "failed to allocate LAME encoder".to_string(),
        })?;
        builder
            .set_num_channels(1)
            .map_err(|e| build_error("channel count", e))?;
        builder
            .set_sample_rate(sample_rate_hz)
            .map_err(|e| build_error("sample rate", e))?;
        builder
            .set_brate(settings.bitrate()?)
            .map_err(|e| build_error("bit rate", e))?;
        builder
            .set_quality(settings.lame_quality()?)
            .map_err(|e| build_error("quality", e))?;

        let inner = builder.build().map_err(|e| build_error("encoder", e))?;
        Ok(Self { inner })
    }
}

fn build_error(what: &str, error: impl std::fmt::Debug) -> ChirpError {
    ChirpError::Encoding {
        message: format!("LAME rejected {what}: {error:?}"),
    }
}

impl SegmentEncoder for Mp3Encoder {
    fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(pcm.len()));
        self.inner
            .encode_to_vec(MonoPcm(pcm), &mut out)
            .map_err(|e| ChirpError::Encoding {
                message: format!("LAME encode failed: {e:?}"),
            })?;
        Ok(out)
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(FLUSH_BUFFER_BYTES);
        self.inner
            .flush_to_vec::<FlushNoGap>(&mut out)
            .map_err(|e| ChirpError::Encoding {
                message: format!("LAME flush failed: {e:?}"),
            })?;
        Ok(out)
    }
}

/// Creates a LAME encoder per segment.
#[derive(Debug, Clone, Copy)]
pub struct Mp3EncoderFactory {
    settings: Mp3Settings,
}

impl Mp3EncoderFactory {
    pub fn new(settings: Mp3Settings) -> Self {
        Self { settings }
    }
}

impl EncoderFactory for Mp3EncoderFactory {
    fn create(&self, sample_rate_hz: u32) -> Result<Box<dyn SegmentEncoder>> {
        Ok(Box::new(Mp3Encoder::new(self.settings, sample_rate_hz)?))
    }

    fn extension(&self) -> &str {
        "mp3"
    }
}
