//! Clock, audio loop and animation advancement
//!
//! The soundtrack is the master clock for the loop: once the session has
//! started, the moment its position reaches the loop duration every model's
//! animation restarts and the audio jumps back to zero.

use crate::audio::AudioTrack;
use crate::model::Model;

/// Running clock fed with host timestamps. The first tick only anchors it.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<f64>,
    elapsed: f64,
}

impl FrameClock {
    /// Seconds since the previous tick (0 on the first one)
    pub fn tick(&mut self, now: f64) -> f32 {
        let delta = match self.last {
            Some(last) => (now - last).max(0.0),
            None => 0.0,
        };
        self.last = Some(now);
        self.elapsed += delta;
        delta as f32
    }

    /// Accumulated seconds since the first tick
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

pub struct Playback {
    clock: FrameClock,
    loop_duration: f64,
    started: bool,
    audio: Box<dyn AudioTrack>,
}

impl Playback {
    pub fn new(audio: Box<dyn AudioTrack>, loop_duration: f64) -> Self {
        Self {
            clock: FrameClock::default(),
            loop_duration,
            started: false,
            audio,
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    /// First qualifying click: line the soundtrack up with the animations
    /// that have been running since load, then start it. A refused start is
    /// only logged; the session counts as started either way.
    pub fn start_session(&mut self) {
        let phase = self.clock.elapsed() % self.loop_duration;
        self.audio.seek(phase);
        if let Err(e) = self.audio.play() {
            log::warn!("Autoplay failed: {}", e);
        }
        self.started = true;
        log::info!("Session started at loop phase {:.3}s", phase);
    }

    /// One frame: advance the clock, restart the loop when the audio has run
    /// its length, then step every model's animation. Returns the delta.
    pub fn tick(&mut self, now: f64, models: &mut [Model]) -> f32 {
        let dt = self.clock.tick(now);
        self.audio.pump();

        if self.started && self.audio.position() >= self.loop_duration {
            for model in models.iter_mut() {
                model.restart_animation();
            }
            self.audio.seek(0.0);
            if let Err(e) = self.audio.play() {
                log::warn!("Autoplay failed: {}", e);
            }
            log::debug!("Loop restart");
        }

        for model in models.iter_mut() {
            model.advance(dt);
        }
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioError;
    use crate::model::animation::AnimClip;
    use crate::model::ModelHierarchy;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        position: f64,
        seeks: Vec<f64>,
        plays: usize,
    }

    /// Scripted audio element; the test moves its position by hand
    struct FakeTrack {
        log: Rc<RefCell<Log>>,
        reject: bool,
    }

    impl AudioTrack for FakeTrack {
        fn position(&self) -> f64 {
            self.log.borrow().position
        }

        fn seek(&mut self, seconds: f64) {
            let mut log = self.log.borrow_mut();
            log.position = seconds;
            log.seeks.push(seconds);
        }

        fn play(&mut self) -> Result<(), AudioError> {
            self.log.borrow_mut().plays += 1;
            if self.reject {
                Err(AudioError::Rejected("not allowed".into()))
            } else {
                Ok(())
            }
        }
    }

    fn playback(reject: bool) -> (Playback, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let track = FakeTrack { log: Rc::clone(&log), reject };
        (Playback::new(Box::new(track), 15.0), log)
    }

    fn models(n: usize) -> Vec<Model> {
        (0..n)
            .map(|i| {
                let clip = AnimClip { name: "dance".into(), duration: 20.0, ..Default::default() };
                let mut m = Model::new(format!("m{}", i), ModelHierarchy::default(), vec![clip]);
                m.restart_animation();
                m
            })
            .collect()
    }

    fn action_time(model: &Model) -> f32 {
        model.player.as_ref().unwrap().actions()[0].time
    }

    #[test]
    fn test_clock_first_delta_is_zero() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.tick(100.0), 0.0);
        assert!((clock.tick(100.25) - 0.25).abs() < 1e-6);
        assert!((clock.elapsed() - 0.25).abs() < 1e-9);
        // A timestamp going backwards never rewinds the clock
        assert_eq!(clock.tick(99.0), 0.0);
        assert!((clock.elapsed() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_session_start_aligns_phase() {
        let (mut pb, log) = playback(false);
        let mut ms = models(1);
        pb.tick(0.0, &mut ms);
        pb.tick(37.5, &mut ms);
        pb.start_session();
        assert!(pb.started());
        assert_eq!(log.borrow().seeks, vec![7.5]);
        assert_eq!(log.borrow().plays, 1);
    }

    #[test]
    fn test_rejected_play_still_starts_session() {
        let (mut pb, log) = playback(true);
        pb.start_session();
        assert!(pb.started());
        assert_eq!(log.borrow().plays, 1);
    }

    #[test]
    fn test_loop_restarts_at_duration() {
        let (mut pb, log) = playback(false);
        let mut ms = models(2);
        pb.tick(0.0, &mut ms);
        pb.start_session();
        pb.tick(14.0, &mut ms);
        log.borrow_mut().position = 14.99;
        pb.tick(14.5, &mut ms);
        assert_eq!(log.borrow().seeks.len(), 1);
        assert!((action_time(&ms[0]) - 14.5).abs() < 1e-4);

        log.borrow_mut().position = 15.0;
        pb.tick(15.0, &mut ms);
        assert_eq!(log.borrow().seeks, vec![0.0, 0.0]);
        assert_eq!(log.borrow().plays, 2);
        // Restarted this tick, then advanced by this tick's delta
        for m in &ms {
            assert!((action_time(m) - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_no_restart_before_session_start() {
        let (mut pb, log) = playback(false);
        let mut ms = models(1);
        log.borrow_mut().position = 30.0;
        pb.tick(0.0, &mut ms);
        pb.tick(16.0, &mut ms);
        assert!(log.borrow().seeks.is_empty());
        assert!((action_time(&ms[0]) - 16.0).abs() < 1e-4);
    }
}
