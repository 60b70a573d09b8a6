//! Native soundtrack output using cpal
//!
//! The whole WAV file is decoded up front. The output callback walks a
//! fractional cursor through it, resampling (nearest frame) to the fixed
//! 44.1kHz stereo stream.

use std::sync::{Arc, Mutex, MutexGuard};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use super::wav::{self, Pcm};
use super::{AudioError, AudioTrack};

/// Output sample rate requested from the device
const SAMPLE_RATE: u32 = 44100;

/// Everything the audio callback and the main thread share
pub(crate) struct PlaybackState {
    pcm: Pcm,
    /// Position in source frames
    cursor: f64,
    playing: bool,
    /// Source frames consumed per output frame
    step: f64,
}

impl PlaybackState {
    pub(crate) fn new(pcm: Pcm, output_rate: u32) -> Self {
        let step = pcm.sample_rate as f64 / output_rate.max(1) as f64;
        Self { pcm, cursor: 0.0, playing: false, step }
    }

    pub(crate) fn position(&self) -> f64 {
        self.cursor / self.pcm.sample_rate as f64
    }

    pub(crate) fn seek(&mut self, seconds: f64) {
        let seconds = seconds.clamp(0.0, self.pcm.duration());
        self.cursor = seconds * self.pcm.sample_rate as f64;
    }

    /// Fill interleaved stereo output. Past the end of the data playback
    /// stops and the position holds at the track's duration.
    pub(crate) fn fill(&mut self, out: &mut [f32]) {
        let frames = self.pcm.frames();
        for frame in out.chunks_mut(2) {
            let index = self.cursor as usize;
            if !self.playing || index >= frames {
                if self.playing {
                    self.playing = false;
                    self.cursor = frames as f64;
                }
                frame.iter_mut().for_each(|s| *s = 0.0);
                continue;
            }
            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample = self.pcm.sample(index, channel);
            }
            self.cursor += self.step;
        }
    }
}

fn lock(state: &Mutex<PlaybackState>) -> MutexGuard<'_, PlaybackState> {
    // A panic inside the callback leaves plain data behind; keep using it
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn init_stream(state: Arc<Mutex<PlaybackState>>) -> Result<Stream, AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

    let config = StreamConfig {
        channels: 2,
        sample_rate: SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                lock(&state).fill(data);
            },
            |err| log::error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))?;

    stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
    Ok(stream)
}

/// Decoded WAV soundtrack on the default output device
pub struct PcmTrack {
    state: Arc<Mutex<PlaybackState>>,
    /// Kept alive for as long as the track exists
    _stream: Stream,
}

impl PcmTrack {
    pub fn new(pcm: Pcm) -> Result<Self, AudioError> {
        let state = Arc::new(Mutex::new(PlaybackState::new(pcm, SAMPLE_RATE)));
        let stream = init_stream(Arc::clone(&state))?;
        Ok(Self { state, _stream: stream })
    }
}

impl AudioTrack for PcmTrack {
    fn position(&self) -> f64 {
        lock(&self.state).position()
    }

    fn seek(&mut self, seconds: f64) {
        lock(&self.state).seek(seconds);
    }

    fn play(&mut self) -> Result<(), AudioError> {
        lock(&self.state).playing = true;
        Ok(())
    }
}

pub async fn open(path: &str) -> Result<Box<dyn AudioTrack>, AudioError> {
    let bytes = macroquad::file::load_file(path)
        .await
        .map_err(|e| AudioError::Fetch(e.to_string()))?;
    let pcm = wav::decode(&bytes)?;
    log::info!(
        "Decoded soundtrack: {:.2}s, {} Hz, {} channel(s)",
        pcm.duration(),
        pcm.sample_rate,
        pcm.channels
    );
    Ok(Box::new(PcmTrack::new(pcm)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, rate: u32) -> Pcm {
        Pcm {
            sample_rate: rate,
            channels: 1,
            samples: (0..frames).map(|i| i as f32 / frames as f32).collect(),
        }
    }

    #[test]
    fn test_paused_outputs_silence_and_holds_position() {
        let mut state = PlaybackState::new(ramp(100, 100), 100);
        let mut out = [1.0f32; 8];
        state.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(state.position(), 0.0);
    }

    #[test]
    fn test_playing_advances_by_rate_ratio() {
        // 50 Hz source into a 100 Hz stream: half a source frame per output frame
        let mut state = PlaybackState::new(ramp(50, 50), 100);
        state.playing = true;
        let mut out = [0.0f32; 20];
        state.fill(&mut out);
        assert!((state.position() - 0.1).abs() < 1e-9);
        // Mono duplicated to both channels, each source frame played twice
        assert_eq!(out[0], out[1]);
        assert_eq!(out[0], out[2]);
        assert!(out[4] > out[0]);
    }

    #[test]
    fn test_end_of_data_stops_at_duration() {
        let mut state = PlaybackState::new(ramp(10, 10), 10);
        state.seek(0.8);
        state.playing = true;
        let mut out = [0.5f32; 10];
        state.fill(&mut out);
        assert!(!state.playing);
        assert!((state.position() - 1.0).abs() < 1e-9);
        assert!(out[4..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_seek_clamps_to_track() {
        let mut state = PlaybackState::new(ramp(10, 10), 10);
        state.seek(4.0);
        assert!((state.position() - 1.0).abs() < 1e-9);
        state.seek(-2.0);
        assert_eq!(state.position(), 0.0);
        state.seek(0.5);
        assert!((state.position() - 0.5).abs() < 1e-9);
    }
}
