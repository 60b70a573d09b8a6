//! Animation clips and the per-model player
//!
//! A clip is a set of node channels (translation, rotation, scale) sampled
//! from keyframe tracks. The player owns one action per clip; every action
//! plays once from time zero and then holds its last frame until the next
//! restart.

use std::collections::HashMap;

use macroquad::math::{Quat, Vec3};

use super::Trs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
}

#[derive(Debug, Clone)]
pub struct TrackVec3 {
    pub times: Vec<f32>,
    pub values: Vec<Vec3>,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone)]
pub struct TrackQuat {
    pub times: Vec<f32>,
    pub values: Vec<Quat>,
    pub interpolation: Interpolation,
}

/// Keyframe pair surrounding `t` and the blend factor between them.
/// Times before the first key or after the last clamp to the end keys.
fn bracket(times: &[f32], t: f32) -> Option<(usize, usize, f32)> {
    let last = times.len().checked_sub(1)?;
    if t <= times[0] {
        return Some((0, 0, 0.0));
    }
    if t >= times[last] {
        return Some((last, last, 0.0));
    }
    // First key strictly after t; keys are sorted ascending
    let next = times.partition_point(|&k| k <= t);
    let prev = next - 1;
    let span = times[next] - times[prev];
    let f = if span > 0.0 { (t - times[prev]) / span } else { 0.0 };
    Some((prev, next, f))
}

impl TrackVec3 {
    pub fn sample(&self, t: f32) -> Option<Vec3> {
        let (i, j, f) = bracket(&self.times, t)?;
        let a = *self.values.get(i)?;
        let b = *self.values.get(j)?;
        Some(match self.interpolation {
            Interpolation::Step => a,
            Interpolation::Linear => a.lerp(b, f),
        })
    }
}

impl TrackQuat {
    pub fn sample(&self, t: f32) -> Option<Quat> {
        let (i, j, f) = bracket(&self.times, t)?;
        let a = *self.values.get(i)?;
        let b = *self.values.get(j)?;
        Some(match self.interpolation {
            Interpolation::Step => a,
            Interpolation::Linear => a.slerp(b, f),
        })
    }
}

/// One imported animation, channels keyed by node index
#[derive(Debug, Clone, Default)]
pub struct AnimClip {
    pub name: String,
    pub duration: f32,
    pub t_tracks: HashMap<usize, TrackVec3>,
    pub r_tracks: HashMap<usize, TrackQuat>,
    pub s_tracks: HashMap<usize, TrackVec3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Contributes nothing to the pose
    Stopped,
    Playing,
    /// Reached the end of the clip; holds the final frame
    Finished,
}

/// Playback cursor for one clip
#[derive(Debug, Clone, Copy)]
pub struct Action {
    pub time: f32,
    pub state: ActionState,
}

/// Drives every clip of one model
#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    actions: Vec<Action>,
}

impl AnimationPlayer {
    pub fn new(clip_count: usize) -> Self {
        Self {
            actions: vec![Action { time: 0.0, state: ActionState::Stopped }; clip_count],
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn stop_all(&mut self) {
        for action in &mut self.actions {
            action.time = 0.0;
            action.state = ActionState::Stopped;
        }
    }

    /// Stop everything, then play every clip once from time zero
    pub fn restart(&mut self) {
        self.stop_all();
        for action in &mut self.actions {
            action.state = ActionState::Playing;
        }
    }

    /// Advance running actions by `dt` seconds, clamping at clip end
    pub fn update(&mut self, dt: f32, clips: &[AnimClip]) {
        for (action, clip) in self.actions.iter_mut().zip(clips) {
            if action.state != ActionState::Playing {
                continue;
            }
            action.time += dt;
            if action.time >= clip.duration {
                action.time = clip.duration;
                action.state = ActionState::Finished;
            }
        }
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.actions.iter().all(|a| a.state != ActionState::Playing)
    }

    /// Local node transforms for the current action times.
    ///
    /// Nodes without an active channel keep `rest`. When several actions
    /// drive the same channel they blend with equal weight.
    pub fn pose(&self, clips: &[AnimClip], rest: &[Trs]) -> Vec<Trs> {
        let mut pose = rest.to_vec();
        let mut t_count = vec![0u32; rest.len()];
        let mut r_count = vec![0u32; rest.len()];
        let mut s_count = vec![0u32; rest.len()];

        for (action, clip) in self.actions.iter().zip(clips) {
            if action.state == ActionState::Stopped {
                continue;
            }
            let t = action.time;

            for (&node, track) in &clip.t_tracks {
                if let (Some(v), Some(slot)) = (track.sample(t), pose.get_mut(node)) {
                    t_count[node] += 1;
                    let w = 1.0 / t_count[node] as f32;
                    slot.translation = slot.translation.lerp(v, w);
                }
            }
            for (&node, track) in &clip.r_tracks {
                if let (Some(q), Some(slot)) = (track.sample(t), pose.get_mut(node)) {
                    r_count[node] += 1;
                    let w = 1.0 / r_count[node] as f32;
                    slot.rotation = slot.rotation.slerp(q, w).normalize();
                }
            }
            for (&node, track) in &clip.s_tracks {
                if let (Some(v), Some(slot)) = (track.sample(t), pose.get_mut(node)) {
                    s_count[node] += 1;
                    let w = 1.0 / s_count[node] as f32;
                    slot.scale = slot.scale.lerp(v, w);
                }
            }
        }
        pose
    }
}
