use crate::error::{ChirpError, Result};
use std::path::Path;

/// Format of an opened input, read once before any work is planned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioParams {
    pub channel_count: u16,
    pub sample_rate_hz: u32,
    pub duration_sec: f64,
}

impl AudioParams {
    pub fn new(channel_count: u16, sample_rate_hz: u32, duration_sec: f64) -> Self {
        Self {
            channel_count,
            sample_rate_hz,
            duration_sec,
        }
    }

    /// Derive params from an exact frame count.
    pub fn from_frames(channel_count: u16, sample_rate_hz: u32, frames: u64) -> Self {
        let duration_sec = if sample_rate_hz == 0 {
            0.0
        } else {
            frames as f64 / sample_rate_hz as f64
        };
        Self::new(channel_count, sample_rate_hz, duration_sec)
    }

    /// Number of mono samples covered by the reported duration.
    pub fn total_sample_count(&self) -> u64 {
        (self.duration_sec * self.sample_rate_hz as f64).round() as u64
    }

    /// Checks the channel layout and that the input actually contains audio.
    pub fn validate(&self, path: &Path) -> Result<()> {
        if !matches!(self.channel_count, 1 | 2) {
            return Err(ChirpError::UnsupportedChannelLayout {
                channels: self.channel_count,
            });
        }
        if self.sample_rate_hz == 0 {
            return Err(ChirpError::UnreadableAudio {
                path: path.display().to_string(),
                message: "stream does not advertise a sample rate".to_string(),
            });
        }
        if !(self.duration_sec.is_finite() && self.duration_sec > 0.0) {
            return Err(ChirpError::UnreadableAudio {
                path: path.display().to_string(),
                message: "stream contains no audio".to_string(),
            });
        }
        Ok(())
    }
}

/// Trait for decoded audio inputs.
///
/// This trait allows swapping implementations (real decoder vs in-memory).
pub trait AudioSource: Send {
    /// Format of the stream.
    fn params(&self) -> AudioParams;

    /// Read the next block of interleaved 16-bit PCM samples.
    ///
    /// # Returns
    /// `Ok(None)` once the stream is exhausted
    fn read_block(&mut self) -> Result<Option<Vec<i16>>>;
}

/// Opens a fresh, independent [`AudioSource`] for a path.
///
/// Every segment worker opens its own handle, so implementations must not
/// share decode state between calls.
pub trait AudioOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioSource>>;
}

/// Audio source backed by interleaved samples held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    params: AudioParams,
    samples: Vec<i16>,
    position: usize,
    block_size: usize,
    fail_after_blocks: Option<usize>,
    blocks_read: usize,
}

impl MemorySource {
    /// Create a source whose duration is derived from the sample count.
    pub fn new(channel_count: u16, sample_rate_hz: u32, samples: Vec<i16>) -> Self {
        let frames = samples.len() as u64 / u64::from(channel_count.max(1));
        Self {
            params: AudioParams::from_frames(channel_count, sample_rate_hz, frames),
            samples,
            position: 0,
            block_size: 1152 * channel_count.max(1) as usize,
            fail_after_blocks: None,
            blocks_read: 0,
        }
    }

    /// Override the reported params (e.g. a header that lies about duration).
    pub fn with_params(mut self, params: AudioParams) -> Self {
        self.params = params;
        self
    }

    /// Configure how many interleaved samples each block carries.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Configure the source to fail after yielding `blocks` blocks.
    pub fn with_read_failure_after(mut self, blocks: usize) -> Self {
        self.fail_after_blocks = Some(blocks);
        self
    }
}

impl AudioSource for MemorySource {
    fn params(&self) -> AudioParams {
        self.params
    }

    fn read_block(&mut self) -> Result<Option<Vec<i16>>> {
        if self
            .fail_after_blocks
            .is_some_and(|limit| self.blocks_read >= limit)
        {
            return Err(ChirpError::UnreadableAudio {
                path: "<memory>".to_string(),
                message: "simulated decode failure".to_string(),
            });
        }
        if self.position >= self.samples.len() {
            return Ok(None);
        }

        let end = std::cmp::min(self.position + self.block_size, self.samples.len());
        let block = self.samples[self.position..end].to_vec();
        self.position = end;
        self.blocks_read += 1;

        Ok(Some(block))
    }
}

/// Opener that hands out clones of a prepared [`MemorySource`], ignoring the path.
#[derive(Debug, Clone)]
pub struct MemoryOpener {
    source: MemorySource,
}

impl MemoryOpener {
    pub fn new(source: MemorySource) -> Self {
        Self { source }
    }
}

impl AudioOpener for MemoryOpener {
    fn open(&self, _path: &Path) -> Result<Box<dyn AudioSource>> {
        Ok(Box::new(self.source.clone()))
    }
}
