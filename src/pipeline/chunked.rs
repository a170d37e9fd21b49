//! Time-bounded batching of samples into a [`SegmentEncoder`].

use crate::defaults::I16_FULL_SCALE;
use crate::encode::SegmentEncoder;
use crate::error::Result;
use std::io::Write;

/// Upper bound on the words reserved up front for one chunk.
const MAX_RESERVED_WORDS: usize = 1 << 24;

/// Convert a `[-1.0, 1.0]` sample to a 16-bit PCM word.
pub fn to_pcm(sample: f32) -> i16 {
    (sample * I16_FULL_SCALE)
        .round()
        .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

/// What a finished [`ChunkedEncoder`] hands back.
#[derive(Debug)]
pub struct EncodedOutput<W> {
    pub sink: W,
    pub samples_encoded: u64,
    pub bytes_written: u64,
}

/// Buffers samples and hands them to the encoder once the buffer holds more
/// than `chunk_duration_sec` of audio, writing encoded bytes straight to the
/// sink.
pub struct ChunkedEncoder<W: Write> {
    encoder: Box<dyn SegmentEncoder>,
    sink: W,
    buffer: Vec<i16>,
    sample_period_sec: f64,
    chunk_duration_sec: f64,
    samples_encoded: u64,
    bytes_written: u64,
    chunks: usize,
}

impl<W: Write> ChunkedEncoder<W> {
    pub fn new(
        encoder: Box<dyn SegmentEncoder>,
        sink: W,
        sample_rate_hz: u32,
        chunk_duration_sec: f64,
    ) -> Self {
        let sample_period_sec = 1.0 / f64::from(sample_rate_hz);
        // One sample more than the chunk duration triggers a flush
        let chunk_words = (chunk_duration_sec * f64::from(sample_rate_hz))
            .ceil()
            .min(MAX_RESERVED_WORDS as f64) as usize;
        Self {
            encoder,
            sink,
            buffer: Vec::with_capacity(chunk_words.saturating_add(1)),
            sample_period_sec,
            chunk_duration_sec,
            samples_encoded: 0,
            bytes_written: 0,
            chunks: 0,
        }
    }

    pub fn push(&mut self, sample: f32) -> Result<()> {
        self.buffer.push(to_pcm(sample));
        if self.buffered_sec() > self.chunk_duration_sec {
            self.encode_buffer()?;
        }
        Ok(())
    }

    /// Seconds of audio waiting to be encoded.
    pub fn buffered_sec(&self) -> f64 {
        self.buffer.len() as f64 * self.sample_period_sec
    }

    fn encode_buffer(&mut self) -> Result<()> {
        let bytes = self.encoder.encode(&self.buffer)?;
        self.sink.write_all(&bytes)?;

        self.chunks += 1;
        self.samples_encoded += self.buffer.len() as u64;
        self.bytes_written += bytes.len() as u64;
        log::debug!(
            "Encoded chunk {} ({} samples, {} bytes)",
            self.chunks,
            self.buffer.len(),
            bytes.len()
        );

        self.buffer.clear();
        Ok(())
    }

    /// Encode whatever is left, drain the encoder and flush the sink.
    pub fn finish(mut self) -> Result<EncodedOutput<W>> {
        if !self.buffer.is_empty() {
            self.encode_buffer()?;
        }

        let trailer = self.encoder.flush()?;
        self.sink.write_all(&trailer)?;
        self.sink.flush()?;
        self.bytes_written += trailer.len() as u64;

        Ok(EncodedOutput {
            sink: self.sink,
            samples_encoded: self.samples_encoded,
            bytes_written: self.bytes_written,
        })
    }
}
