//! General-purpose decoding through symphonia.

use crate::audio::source::{AudioParams, AudioSource};
use crate::error::{ChirpError, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// Audio source decoding any container/codec symphonia was built with.
pub struct SymphoniaSource {
    stream: DecodeStream,
    params: AudioParams,
}

impl SymphoniaSource {
    /// Probe `path` and prepare to decode its default track.
    ///
    /// When the container doesn't report a frame count or channel layout, the
    /// whole file is decoded once up front to find them.
    pub fn open(path: &Path) -> Result<Self> {
        let stream = DecodeStream::open(path)?;

        let (frames, channels) = match (stream.n_frames, stream.channels) {
            (Some(frames), Some(channels)) => (frames, channels),
            (frames, channels) => {
                log::debug!(
                    "{} lacks frame count or channel layout, scanning",
                    path.display()
                );
                let (scanned_frames, scanned_channels) = DecodeStream::open(path)?.scan()?;
                (
                    frames.unwrap_or(scanned_frames),
                    channels.unwrap_or(scanned_channels),
                )
            }
        };

        let params = AudioParams::from_frames(channels, stream.sample_rate, frames);
        Ok(Self { stream, params })
    }
}

impl AudioSource for SymphoniaSource {
    fn params(&self) -> AudioParams {
        self.params
    }

    fn read_block(&mut self) -> Result<Option<Vec<i16>>> {
        self.stream.next_block()
    }
}

/// Format reader plus decoder for one track.
struct DecodeStream {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: Option<u16>,
    n_frames: Option<u64>,
    path: String,
    finished: bool,
}

impl DecodeStream {
    fn open(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let unreadable = |e: SymphoniaError| ChirpError::UnreadableAudio {
            path: display.clone(),
            message: e.to_string(),
        };

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let file = File::open(path).map_err(|e| ChirpError::UnreadableAudio {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(unreadable)?;
        let reader = probed.format;

        let track = reader
            .default_track()
            .ok_or_else(|| ChirpError::UnreadableAudio {
                path: display.clone(),
                message: "input stream does not provide a default track".to_string(),
            })?;
        if track.codec_params.codec == CODEC_TYPE_NULL {
            return Err(ChirpError::UnreadableAudio {
                path: display.clone(),
                message: "unsupported codec".to_string(),
            });
        }

        let sample_rate =
            track
                .codec_params
                .sample_rate
                .ok_or_else(|| ChirpError::UnreadableAudio {
                    path: display.clone(),
                    message: "input stream does not advertise a sample rate".to_string(),
                })?;
        let channels = track
            .codec_params
            .channels
            .map(|layout| layout.count() as u16);
        let n_frames = track.codec_params.n_frames;
        let track_id = track.id;

        let decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(unreadable)?;

        Ok(Self {
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            n_frames,
            path: display,
            finished: false,
        })
    }

    fn unreadable(&self, e: SymphoniaError) -> ChirpError {
        ChirpError::UnreadableAudio {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }

    fn next_block(&mut self) -> Result<Option<Vec<i16>>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => return Err(self.unreadable(e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let spec = *decoded.spec();
                    let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    return Ok(Some(buffer.samples().to_vec()));
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::debug!("{}: skipping undecodable packet: {msg}", self.path);
                    continue;
                }
                Err(e) => return Err(self.unreadable(e)),
            }
        }
    }

    /// Decode to the end, returning (frames, channels).
    fn scan(mut self) -> Result<(u64, u16)> {
        let mut frames = 0u64;
        let mut channels = self.channels;

        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(self.unreadable(e)),
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    frames += decoded.frames() as u64;
                    if channels.is_none() {
                        channels = Some(decoded.spec().channels.count() as u16);
                    }
                }
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(self.unreadable(e)),
            }
        }

        let channels = channels.ok_or_else(|| ChirpError::UnreadableAudio {
            path: self.path.clone(),
            message: "input stream does not advertise a channel layout".to_string(),
        })?;
        Ok((frames, channels))
    }
}
