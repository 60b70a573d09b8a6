//! Browser soundtrack via an HTML audio element
//!
//! `web/soundtrack.js` owns the element; we only poke it through these
//! imports. `play()` returns a promise in the browser, so a rejection
//! (autoplay policy) arrives later and is collected in `pump`.

use super::{AudioError, AudioTrack};

extern "C" {
    fn tc_audio_load(ptr: *const u8, len: usize);
    fn tc_audio_position() -> f64;
    fn tc_audio_seek(seconds: f64);
    fn tc_audio_play();
    fn tc_audio_take_rejection() -> i32;
}

pub struct HtmlAudioTrack;

impl AudioTrack for HtmlAudioTrack {
    fn position(&self) -> f64 {
        unsafe { tc_audio_position() }
    }

    fn seek(&mut self, seconds: f64) {
        unsafe { tc_audio_seek(seconds.max(0.0)) }
    }

    fn play(&mut self) -> Result<(), AudioError> {
        unsafe { tc_audio_play() }
        Ok(())
    }

    fn pump(&mut self) {
        if unsafe { tc_audio_take_rejection() } != 0 {
            let err = AudioError::Rejected("browser refused to start playback".into());
            log::warn!("Autoplay failed: {}", err);
        }
    }
}

pub fn open(path: &str) -> Result<Box<dyn AudioTrack>, AudioError> {
    unsafe { tc_audio_load(path.as_ptr(), path.len()) }
    Ok(Box::new(HtmlAudioTrack))
}
