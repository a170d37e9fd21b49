//! Audio input: opening files and streaming interleaved PCM out of them.

pub mod decode;
pub mod source;
pub mod wav;

use crate::error::Result;
use decode::SymphoniaSource;
use source::{AudioOpener, AudioSource};
use std::path::Path;
use wav::WavSource;

/// Opens audio files from disk.
///
/// 16-bit PCM WAV files are read directly with hound; everything else (and
/// any WAV hound can't take) goes through symphonia.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOpener;

impl AudioOpener for FileOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioSource>> {
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

        if is_wav {
            match WavSource::open(path) {
                Ok(source) => return Ok(Box::new(source)),
                Err(e) => log::debug!("hound declined {}: {e}", path.display()),
            }
        }

        Ok(Box::new(SymphoniaSource::open(path)?))
    }
}
