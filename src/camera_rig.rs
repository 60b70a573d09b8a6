//! Orbit camera rig and click-vs-drag discrimination
//!
//! Horizontal drag turns the camera around the look-at point; a press that
//! barely moves counts as a click when released.

use macroquad::math::Vec3;

use crate::config::OrbitConfig;
use crate::rasterizer::Camera;

/// Tracks one primary-button press from down to up
#[derive(Debug, Clone, Default)]
pub struct ClickDragTracker {
    dragging: bool,
    is_click: bool,
    drag_distance: f32,
    last_x: f32,
}

impl ClickDragTracker {
    pub fn press(&mut self, x: f32) {
        self.dragging = true;
        self.is_click = true;
        self.drag_distance = 0.0;
        self.last_x = x;
    }

    /// Pointer moved while pressed. Returns the horizontal delta (0 when not pressed).
    pub fn moved(&mut self, x: f32, threshold: f32) -> f32 {
        if !self.dragging {
            return 0.0;
        }
        let dx = x - self.last_x;
        self.last_x = x;
        self.drag_distance += dx.abs();
        if self.drag_distance > threshold {
            self.is_click = false;
        }
        dx
    }

    /// Button released. Returns true if the press was a click.
    pub fn release(&mut self) -> bool {
        let was_click = self.dragging && self.is_click;
        self.dragging = false;
        self.is_click = false;
        was_click
    }
}

/// Camera orbiting a fixed point at constant radius and height
#[derive(Debug, Clone)]
pub struct OrbitRig {
    pub angle: f32,
    radius: f32,
    height: f32,
    look_at: Vec3,
    drag_gain: f32,
    click_threshold: f32,
    pub tracker: ClickDragTracker,
}

impl OrbitRig {
    pub fn new(config: &OrbitConfig) -> Self {
        let (x, y, z) = config.look_at;
        Self {
            angle: config.initial_angle,
            radius: config.radius,
            height: config.height,
            look_at: Vec3::new(x, y, z),
            drag_gain: config.drag_gain,
            click_threshold: config.click_threshold,
            tracker: ClickDragTracker::default(),
        }
    }

    pub fn press(&mut self, x: f32) {
        self.tracker.press(x);
    }

    /// Apply a pointer move; the angle changes by `-dx * gain`, unclamped
    pub fn pointer_moved(&mut self, x: f32) {
        let dx = self.tracker.moved(x, self.click_threshold);
        self.angle -= dx * self.drag_gain;
    }

    /// Returns true when the release completes a click
    pub fn release(&mut self) -> bool {
        self.tracker.release()
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.radius * self.angle.cos(),
            self.height,
            self.radius * self.angle.sin(),
        )
    }

    /// Re-place the camera on the orbit and aim it at the look-at point
    pub fn apply(&self, camera: &mut Camera) {
        camera.look_at(self.position(), self.look_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use std::f32::consts::FRAC_PI_2;

    fn rig() -> OrbitRig {
        OrbitRig::new(&ViewerConfig::embedded().unwrap().orbit)
    }

    #[test]
    fn test_initial_position_faces_front() {
        let rig = rig();
        assert!((rig.angle - FRAC_PI_2).abs() < 1e-6);
        let p = rig.position();
        assert!(p.x.abs() < 1e-5);
        assert!((p.y - 1.0).abs() < 1e-6);
        assert!((p.z - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_click_threshold_is_exclusive() {
        let mut rig = rig();
        rig.press(100.0);
        rig.pointer_moved(101.0);
        rig.pointer_moved(99.0);
        rig.pointer_moved(100.0); // cumulative |dx| = 1 + 2 + 1
        assert!(!rig.release());

        rig.press(100.0);
        rig.pointer_moved(102.0);
        rig.pointer_moved(103.0); // cumulative 3, not above threshold
        assert!(rig.release());
    }

    #[test]
    fn test_drag_past_threshold_suppresses_click() {
        let mut rig = rig();
        rig.press(0.0);
        rig.pointer_moved(10.0);
        rig.pointer_moved(0.0);
        assert!(!rig.release());
    }

    #[test]
    fn test_angle_update_law() {
        let mut rig = rig();
        let start = rig.angle;
        rig.press(50.0);
        rig.pointer_moved(80.0);
        assert!((rig.angle - (start - 30.0 * 0.005)).abs() < 1e-6);
        rig.pointer_moved(60.0);
        assert!((rig.angle - (start - 10.0 * 0.005)).abs() < 1e-6);

        let a = rig.angle;
        let p = rig.position();
        assert!((p.x - 3.0 * a.cos()).abs() < 1e-5);
        assert!((p.z - 3.0 * a.sin()).abs() < 1e-5);
        assert!((p.length_squared() - 1.0 - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_moves_without_press_do_nothing() {
        let mut rig = rig();
        let start = rig.angle;
        rig.pointer_moved(500.0);
        assert_eq!(rig.angle, start);
        assert!(!rig.release());
    }

    #[test]
    fn test_apply_aims_at_look_at_point() {
        let rig = rig();
        let mut cam = Camera::default();
        rig.apply(&mut cam);
        let to_target = (Vec3::new(0.0, 1.0, 0.0) - cam.position).normalize();
        assert!((cam.basis_z - to_target).length() < 1e-5);
    }
}
