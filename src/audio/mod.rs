//! Soundtrack playback
//!
//! Platform-specific output:
//! - Native: cpal stream reading a decoded WAV buffer at a shared cursor
//! - WASM: an HTML audio element driven through `web/soundtrack.js`
//!
//! Both sit behind `AudioTrack`, which is all the frame loop needs: where
//! the track is, jump somewhere, start playing.

#[cfg(not(target_arch = "wasm32"))]
mod native;
#[cfg(target_arch = "wasm32")]
mod web;
pub mod wav;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device")]
    NoDevice,
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("soundtrack fetch failed: {0}")]
    Fetch(String),
    #[error("soundtrack decode failed: {0}")]
    Decode(#[from] wav::WavError),
    #[error("playback rejected: {0}")]
    Rejected(String),
}

/// A seekable audio element
pub trait AudioTrack {
    /// Playback position in seconds
    fn position(&self) -> f64;
    fn seek(&mut self, seconds: f64);
    /// Start (or resume) playback from the current position
    fn play(&mut self) -> Result<(), AudioError>;
    /// Per-frame housekeeping (surfacing asynchronous failures)
    fn pump(&mut self) {}
}

/// Stand-in when no soundtrack could be opened. Its position never
/// advances, so the loop restart never fires.
#[derive(Debug, Default)]
pub struct SilentTrack {
    position: f64,
}

impl AudioTrack for SilentTrack {
    fn position(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, seconds: f64) {
        self.position = seconds.max(0.0);
    }

    fn play(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Open the soundtrack for this platform, falling back to silence
pub async fn open_soundtrack(path: &str) -> Box<dyn AudioTrack> {
    #[cfg(not(target_arch = "wasm32"))]
    let opened = native::open(path).await;
    #[cfg(target_arch = "wasm32")]
    let opened = web::open(path);

    match opened {
        Ok(track) => {
            log::info!("Soundtrack ready: {}", path);
            track
        }
        Err(e) => {
            log::warn!("Soundtrack unavailable ({}), running silent", e);
            Box::new(SilentTrack::default())
        }
    }
}
