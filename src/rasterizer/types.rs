//! Core rasterizer types: Color, Texture, Vertex, Face, Light, RasterSettings

use macroquad::math::{Vec2, Vec3};

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    #[cfg(test)]
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_tuple((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Source-over blend of `self` onto `back` using `self.a`
    pub fn blend_over(self, back: Color) -> Color {
        let a = self.a as u16;
        let inv = 255 - a;
        let mix = |f: u8, b: u8| ((f as u16 * a + b as u16 * inv) / 255) as u8;
        let out_a = (a + (back.a as u16 * inv) / 255).min(255) as u8;
        Color::with_alpha(mix(self.r, back.r), mix(self.g, back.g), mix(self.b, back.b), out_a)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// RGBA texture (no filtering, wraps)
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Color>,
    pub name: String,
}

impl Texture {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::WHITE; width * height],
            name: String::new(),
        }
    }

    /// Build from tightly packed RGBA8 bytes
    pub fn from_rgba8(width: usize, height: usize, bytes: &[u8], name: String) -> Self {
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| Color::with_alpha(p[0], p[1], p[2], p[3]))
            .collect();
        Self { width, height, pixels, name }
    }

    /// Decode an encoded image (PNG/JPEG)
    pub fn from_bytes(bytes: &[u8], name: String) -> Result<Self, image::ImageError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self::from_rgba8(width as usize, height as usize, rgba.as_raw(), name))
    }

    /// Sample at UV coordinates (nearest, euclidean wrap for tiling)
    pub fn sample(&self, u: f32, v: f32) -> Color {
        if self.width == 0 || self.height == 0 {
            return Color::WHITE;
        }
        let u_wrapped = u.rem_euclid(1.0);
        let v_wrapped = v.rem_euclid(1.0);
        let tx = ((u_wrapped * self.width as f32) as usize).min(self.width - 1);
        let ty = ((v_wrapped * self.height as f32) as usize).min(self.height - 1);
        self.pixels[ty * self.width + tx]
    }
}

/// World-space vertex ready for rasterization
#[derive(Debug, Clone, Copy, Default)]
pub struct Vertex {
    pub pos: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(pos: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self { pos, normal, uv }
    }
}

/// Triangle (indices into vertex list, counter-clockwise front face)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub v0: usize,
    pub v1: usize,
    pub v2: usize,
}

impl Face {
    pub fn new(v0: usize, v1: usize, v2: usize) -> Self {
        Self { v0, v1, v2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightType {
    /// Uniform light from every direction
    Ambient,
    /// Parallel rays travelling along `direction` (normalized)
    Directional { direction: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub light_type: LightType,
    pub color: Color,
    pub intensity: f32,
}

impl Light {
    pub fn ambient(color: Color, intensity: f32) -> Self {
        Self { light_type: LightType::Ambient, color, intensity }
    }

    /// Directional light shining from `position` toward `target`
    pub fn directional(position: Vec3, target: Vec3, color: Color, intensity: f32) -> Self {
        let direction = (target - position).normalize_or_zero();
        Self { light_type: LightType::Directional { direction }, color, intensity }
    }
}

/// Per-draw toon surface parameters (borrowed view of a material)
#[derive(Debug, Clone, Copy)]
pub struct ToonShading<'a> {
    pub map: Option<&'a Texture>,
    /// Linear RGB tint multiplied into the texel
    pub tint: [f32; 3],
    pub alpha_map: Option<&'a Texture>,
    /// Fragments whose alpha falls below this are discarded
    pub alpha_test: f32,
    /// Blend onto what is already drawn instead of overwriting
    pub transparent: bool,
}

impl Default for ToonShading<'_> {
    fn default() -> Self {
        Self {
            map: None,
            tint: [1.0, 1.0, 1.0],
            alpha_map: None,
            alpha_test: 0.5,
            transparent: false,
        }
    }
}

/// Rasterizer settings
#[derive(Debug, Clone)]
pub struct RasterSettings {
    pub lights: Vec<Light>,
    /// Skip triangles facing away from the camera
    pub backface_cull: bool,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            lights: Vec::new(),
            backface_cull: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_sample_wraps_negative_uv() {
        let mut tex = Texture::new(2, 2);
        tex.pixels[3] = Color::BLACK; // (1, 1)
        assert_eq!(tex.sample(0.75, 0.75), Color::BLACK);
        assert_eq!(tex.sample(-0.25, -0.25), Color::BLACK);
        assert_eq!(tex.sample(0.25, 0.25), Color::WHITE);
    }

    #[test]
    fn test_blend_over_half_alpha() {
        let front = Color::with_alpha(255, 0, 0, 128);
        let out = front.blend_over(Color::new(0, 0, 255));
        assert!(out.r > 120 && out.r < 135);
        assert!(out.b > 120 && out.b < 135);
        assert_eq!(out.a, 255);
    }

    #[test]
    fn test_directional_light_points_at_target() {
        let light = Light::directional(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Color::WHITE, 1.0);
        match light.light_type {
            LightType::Directional { direction } => {
                assert!((direction.y + 1.0).abs() < 0.001);
            }
            LightType::Ambient => panic!("expected directional"),
        }
    }
}
