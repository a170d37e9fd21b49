//! Mono sample window over a decoded input.

use crate::audio::source::AudioSource;
use crate::defaults::I16_FULL_SCALE;
use crate::error::{ChirpError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Lazy sequence of mono samples in `[-1.0, 1.0]` for frames
/// `[offset, offset + count)` of an input.
///
/// The source is always read from its first frame; blocks that end before
/// the window are dropped without being downmixed. Once the window end is
/// reached no further blocks are pulled. A decode error is yielded once and
/// then the stream ends.
pub struct SampleStream<'a> {
    source: Box<dyn AudioSource>,
    channels: usize,
    start: u64,
    end: u64,
    /// Index of the frame `buffer[cursor]` corresponds to.
    frame_index: u64,
    buffer: Vec<f32>,
    cursor: usize,
    /// Trailing samples of an incomplete frame from the previous block.
    carry: Vec<i16>,
    cancel: Option<&'a AtomicBool>,
    done: bool,
}

impl<'a> SampleStream<'a> {
    pub fn new(source: Box<dyn AudioSource>, offset: u64, count: u64) -> Result<Self> {
        let channel_count = source.params().channel_count;
        if !matches!(channel_count, 1 | 2) {
            return Err(ChirpError::UnsupportedChannelLayout {
                channels: channel_count,
            });
        }

        Ok(Self {
            source,
            channels: usize::from(channel_count),
            start: offset,
            end: offset.saturating_add(count),
            frame_index: 0,
            buffer: Vec::new(),
            cursor: 0,
            carry: Vec::new(),
            cancel: None,
            done: count == 0,
        })
    }

    /// Stop with [`ChirpError::Cancelled`] if `cancel` is set while blocks
    /// before the window are being skipped.
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Downmix one decoded block into `buffer`, skipping frames before the window.
    ///
    /// Returns `false` when the whole block lay before the window.
    fn fill(&mut self, block: Vec<i16>) -> bool {
        let interleaved = if self.carry.is_empty() {
            block
        } else {
            let mut joined = std::mem::take(&mut self.carry);
            joined.extend(block);
            joined
        };

        let whole = interleaved.len() - interleaved.len() % self.channels;
        self.carry.extend_from_slice(&interleaved[whole..]);
        let frames = (whole / self.channels) as u64;

        self.buffer.clear();
        self.cursor = 0;

        if self.frame_index + frames <= self.start {
            self.frame_index += frames;
            return false;
        }

        let skip = self.start.saturating_sub(self.frame_index);
        self.frame_index += skip;

        let first = skip as usize * self.channels;
        self.buffer.extend(
            interleaved[first..whole]
                .chunks_exact(self.channels)
                .map(|frame| downmix(frame)),
        );
        true
    }
}

/// Average a frame's channels and scale to `[-1.0, 1.0]`.
pub fn downmix(frame: &[i16]) -> f32 {
    let sum: f32 = frame.iter().map(|&s| f32::from(s)).sum();
    let mean = sum / frame.len() as f32;
    (mean / I16_FULL_SCALE).clamp(-1.0, 1.0)
}

impl Iterator for SampleStream<'_> {
    type Item = Result<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.frame_index >= self.end {
                self.done = true;
                return None;
            }

            if let Some(&sample) = self.buffer.get(self.cursor) {
                self.cursor += 1;
                self.frame_index += 1;
                return Some(Ok(sample));
            }

            match self.source.read_block() {
                Ok(Some(block)) => {
                    if !self.fill(block) && self.is_cancelled() {
                        self.done = true;
                        return Some(Err(ChirpError::Cancelled));
                    }
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
