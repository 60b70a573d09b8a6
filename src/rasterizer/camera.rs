//! Camera for 3D rendering
//!
//! Position plus an orthonormal basis. Camera space is x right, y down
//! (screen rows grow downward), z forward into the scene.

use macroquad::math::Vec3;

use super::math::focal_length;

/// Camera state for 3D rendering
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,

    // Computed basis vectors
    pub basis_x: Vec3,
    pub basis_y: Vec3,
    pub basis_z: Vec3,

    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(fov_y_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            basis_x: Vec3::X,
            basis_y: Vec3::NEG_Y,
            basis_z: Vec3::NEG_Z,
            fov_y: fov_y_degrees.to_radians(),
            near,
            far,
        }
    }

    /// Place the camera and aim it at `target` (world up is +Y)
    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        self.position = position;
        let forward = (target - position).normalize_or_zero();
        if forward == Vec3::ZERO {
            return;
        }
        let mut right = forward.cross(Vec3::Y);
        if right.length_squared() < 1e-8 {
            // Looking straight up or down
            right = Vec3::X;
        }
        self.basis_z = forward;
        self.basis_x = right.normalize();
        self.basis_y = forward.cross(self.basis_x);
    }

    /// Focal length in pixels for a framebuffer of the given height
    pub fn focal(&self, height: usize) -> f32 {
        focal_length(self.fov_y, height)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(50.0, 0.1, 100.0)
    }
}
