//! Compressed-audio encoders used to write output segments.

#[cfg(feature = "mp3")]
pub mod mp3;

use crate::error::{ChirpError, Result};
use std::sync::{Arc, Mutex};

/// Trait for streaming audio encoders.
///
/// This trait allows swapping implementations (LAME vs mock).
pub trait SegmentEncoder {
    /// Encode a block of mono 16-bit PCM, returning whatever bytes are ready.
    fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>>;

    /// Drain the encoder's internal buffers at end of stream.
    fn flush(&mut self) -> Result<Vec<u8>>;
}

/// Creates one encoder per output segment.
pub trait EncoderFactory: Send + Sync {
    fn create(&self, sample_rate_hz: u32) -> Result<Box<dyn SegmentEncoder>>;

    /// File extension for the produced stream, without the dot.
    fn extension(&self) -> &str;
}

/// One call observed by a [`MockEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderCall {
    Encode(Vec<i16>),
    Flush,
}

/// Mock encoder for testing.
///
/// Writes each PCM word as little-endian bytes and a fixed trailer on flush,
/// so the output is easy to inspect.
#[derive(Debug, Clone, Default)]
pub struct MockEncoder {
    calls: Arc<Mutex<Vec<EncoderCall>>>,
    fail_on_encode: Option<usize>,
    fail_on_flush: bool,
}

/// Bytes [`MockEncoder`] emits on flush.
pub const MOCK_TRAILER: &[u8] = b"END";

impl MockEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on the `n`th encode call (0-based).
    pub fn with_encode_failure_at(mut self, n: usize) -> Self {
        self.fail_on_encode = Some(n);
        self
    }

    /// Configure the mock to fail on flush
    pub fn with_flush_failure(mut self) -> Self {
        self.fail_on_flush = true;
        self
    }

    /// Calls observed so far.
    pub fn calls(&self) -> Vec<EncoderCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: EncoderCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl SegmentEncoder for MockEncoder {
    fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>> {
        let encode_index = self
            .calls()
            .iter()
            .filter(|call| matches!(call, EncoderCall::Encode(_)))
            .count();
        if self.fail_on_encode == Some(encode_index) {
            return Err(ChirpError::Encoding {
                message: "mock encode failure".to_string(),
            });
        }
        self.record(EncoderCall::Encode(pcm.to_vec()));
        Ok(pcm.iter().flat_map(|word| word.to_le_bytes()).collect())
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        if self.fail_on_flush {
            return Err(ChirpError::Encoding {
                message: "mock flush failure".to_string(),
            });
        }
        self.record(EncoderCall::Flush);
        Ok(MOCK_TRAILER.to_vec())
    }
}

/// Factory handing out [`MockEncoder`]s.
#[derive(Debug, Clone, Default)]
pub struct MockEncoderFactory {
    failing_encoder: Option<usize>,
    created: Arc<Mutex<Vec<MockEncoder>>>,
}

impl MockEncoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `n`th encoder created (0-based) fails on its first encode call.
    pub fn with_failing_encoder(mut self, n: usize) -> Self {
        self.failing_encoder = Some(n);
        self
    }

    /// Encoders created so far, in creation order.
    pub fn encoders(&self) -> Vec<MockEncoder> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl EncoderFactory for MockEncoderFactory {
    fn create(&self, _sample_rate_hz: u32) -> Result<Box<dyn SegmentEncoder>> {
        let mut created = self.created.lock().map_err(|_| ChirpError::Encoding {
            message: "mock factory lock poisoned".to_string(),
        })?;
        let mut encoder = MockEncoder::new();
        if self.failing_encoder == Some(created.len()) {
            encoder = encoder.with_encode_failure_at(0);
        }
        created.push(encoder.clone());
        Ok(Box::new(encoder))
    }

    fn extension(&self) -> &str {
        "pcm"
    }
}
