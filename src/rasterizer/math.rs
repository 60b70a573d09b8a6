//! Projection helpers and color transfer functions

use std::sync::OnceLock;

use macroquad::math::Vec3;

/// Express a camera-relative point in the camera basis
pub fn perspective_transform(v: Vec3, cam_x: Vec3, cam_y: Vec3, cam_z: Vec3) -> Vec3 {
    Vec3::new(v.dot(cam_x), v.dot(cam_y), v.dot(cam_z))
}

/// Project a camera-space point to screen coordinates.
/// `focal` is the distance (in pixels) of the image plane from the eye.
/// Returns x,y in pixels and z as the ORIGINAL camera-space depth
/// (needed for perspective-correct interpolation).
pub fn project(v: Vec3, focal: f32, width: usize, height: usize) -> Vec3 {
    if v.z.abs() < 0.0001 {
        return Vec3::new(width as f32 / 2.0, height as f32 / 2.0, v.z);
    }
    Vec3::new(
        width as f32 / 2.0 + v.x / v.z * focal,
        height as f32 / 2.0 + v.y / v.z * focal,
        v.z,
    )
}

/// Focal length in pixels for a vertical field of view
pub fn focal_length(fov_y_radians: f32, height: usize) -> f32 {
    (height as f32 / 2.0) / (fov_y_radians / 2.0).tan()
}

fn srgb_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            *entry = if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }
        table
    })
}

/// Decode an sRGB-encoded 8-bit channel to linear light
#[inline]
pub fn srgb_to_linear(c: u8) -> f32 {
    srgb_table()[c as usize]
}

/// Encode linear light back to an 8-bit sRGB channel
#[inline]
pub fn linear_to_srgb(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let encoded = if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0 + 0.5) as u8
}
