//! Core rendering functions
//! Triangle rasterization with two-tone toon lighting

use std::f32::consts::PI;

use macroquad::math::{Vec2, Vec3};

use super::camera::Camera;
use super::math::{linear_to_srgb, perspective_transform, project, srgb_to_linear};
use super::types::{Color, Face, Light, LightType, RasterSettings, ToonShading, Vertex};

/// Lit side of the toon band
const TOON_LIT: f32 = 1.0;
/// Shadowed side of the toon band
const TOON_SHADOW: f32 = 0.7;
/// Half-Lambert value at which the band switches from shadow to lit
const TOON_THRESHOLD: f32 = 0.7;

/// Framebuffer for software rendering
pub struct Framebuffer {
    pub pixels: Vec<u8>,    // RGBA, 4 bytes per pixel
    pub zbuffer: Vec<f32>,  // Depth buffer
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height * 4],
            zbuffer: vec![f32::MAX; width * height],
            width,
            height,
        }
    }

    /// Reallocate when the size changed. Returns true if it did.
    pub fn resize(&mut self, width: usize, height: usize) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width * height * 4];
        self.zbuffer = vec![f32::MAX; width * height];
        true
    }

    pub fn clear(&mut self, color: Color) {
        let bytes = color.to_bytes();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&bytes);
        }
        self.zbuffer.fill(f32::MAX);
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Color {
        if x >= self.width || y >= self.height {
            return Color::TRANSPARENT;
        }
        let idx = (y * self.width + x) * 4;
        Color::with_alpha(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        )
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if x < self.width && y < self.height {
            let idx = (y * self.width + x) * 4;
            self.pixels[idx..idx + 4].copy_from_slice(&color.to_bytes());
        }
    }

    /// Depth test, then write. Returns true if the pixel was written.
    pub fn set_pixel_with_depth(&mut self, x: usize, y: usize, z: f32, color: Color) -> bool {
        if x < self.width && y < self.height {
            let idx = y * self.width + x;
            if z < self.zbuffer[idx] {
                self.zbuffer[idx] = z;
                self.set_pixel(x, y, color);
                return true;
            }
        }
        false
    }

    /// Depth test, then source-over blend onto the existing pixel
    pub fn blend_pixel_with_depth(&mut self, x: usize, y: usize, z: f32, color: Color) -> bool {
        if x < self.width && y < self.height {
            let idx = y * self.width + x;
            if z < self.zbuffer[idx] {
                self.zbuffer[idx] = z;
                let back = self.get_pixel(x, y);
                self.set_pixel(x, y, color.blend_over(back));
                return true;
            }
        }
        false
    }
}

/// Counters from one `render_mesh` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub triangles_drawn: u32,
    pub triangles_culled: u32,
}

impl std::ops::AddAssign for RenderStats {
    fn add_assign(&mut self, other: Self) {
        self.triangles_drawn += other.triangles_drawn;
        self.triangles_culled += other.triangles_culled;
    }
}

/// Light arriving at a surface with world normal `normal`, in linear RGB,
/// already divided by pi (Lambert BRDF with physical light units)
fn toon_irradiance(normal: Vec3, lights: &[Light]) -> [f32; 3] {
    let mut total = [0.0f32; 3];
    for light in lights {
        let band = match light.light_type {
            LightType::Ambient => 1.0,
            LightType::Directional { direction } => {
                let half_lambert = normal.dot(-direction) * 0.5 + 0.5;
                if half_lambert < TOON_THRESHOLD {
                    TOON_SHADOW
                } else {
                    TOON_LIT
                }
            }
        };
        let scale = band * light.intensity;
        total[0] += srgb_to_linear(light.color.r) * scale;
        total[1] += srgb_to_linear(light.color.g) * scale;
        total[2] += srgb_to_linear(light.color.b) * scale;
    }
    [total[0] / PI, total[1] / PI, total[2] / PI]
}

/// Screen-space triangle with per-vertex attributes
struct Surface {
    v1: Vec3, // screen x, y + camera depth
    v2: Vec3,
    v3: Vec3,
    wn1: Vec3, // world normals
    wn2: Vec3,
    wn3: Vec3,
    uv1: Vec2,
    uv2: Vec2,
    uv3: Vec2,
}

impl Surface {
    fn center_depth(&self) -> f32 {
        (self.v1.z + self.v2.z + self.v3.z) / 3.0
    }
}

/// Shade one fragment. None means the fragment is discarded by the alpha test.
fn shade_fragment(shading: &ToonShading, lights: &[Light], normal: Vec3, uv: Vec2) -> Option<Color> {
    let texel = shading.map.map(|t| t.sample(uv.x, uv.y)).unwrap_or(Color::WHITE);
    let mut alpha = texel.a as f32 / 255.0;
    if let Some(mask) = shading.alpha_map {
        alpha *= mask.sample(uv.x, uv.y).g as f32 / 255.0;
    }
    if alpha < shading.alpha_test {
        return None;
    }

    let irradiance = toon_irradiance(normal.normalize_or_zero(), lights);
    let r = shading.tint[0] * srgb_to_linear(texel.r) * irradiance[0];
    let g = shading.tint[1] * srgb_to_linear(texel.g) * irradiance[1];
    let b = shading.tint[2] * srgb_to_linear(texel.b) * irradiance[2];

    let out_alpha = if shading.transparent { (alpha * 255.0 + 0.5) as u8 } else { 255 };
    Some(Color::with_alpha(linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b), out_alpha))
}

/// Rasterize a single triangle using incremental edge functions
fn rasterize_triangle(
    fb: &mut Framebuffer,
    surface: &Surface,
    shading: &ToonShading,
    lights: &[Light],
) -> bool {
    let min_x = surface.v1.x.min(surface.v2.x).min(surface.v3.x).max(0.0) as usize;
    let max_x = (surface.v1.x.max(surface.v2.x).max(surface.v3.x) + 1.0).min(fb.width as f32) as usize;
    let min_y = surface.v1.y.min(surface.v2.y).min(surface.v3.y).max(0.0) as usize;
    let max_y = (surface.v1.y.max(surface.v2.y).max(surface.v3.y) + 1.0).min(fb.height as f32) as usize;

    if min_x >= max_x || min_y >= max_y {
        return false;
    }

    let v1 = surface.v1;
    let v2 = surface.v2;
    let v3 = surface.v3;

    // Twice the signed area; the sign cancels out in the barycentrics
    let area = (v2.y - v3.y) * (v1.x - v3.x) + (v3.x - v2.x) * (v1.y - v3.y);
    if area.abs() < 0.00001 {
        return false;
    }
    let inv_area = 1.0 / area;

    // E23 -> weight of v1, E31 -> weight of v2
    let a0 = v2.y - v3.y;
    let b0 = v3.x - v2.x;
    let a1 = v3.y - v1.y;
    let b1 = v1.x - v3.x;

    // Sample at pixel centers
    let start_x = min_x as f32 + 0.5;
    let start_y = min_y as f32 + 0.5;
    let mut w0_row = a0 * (start_x - v3.x) + b0 * (start_y - v3.y);
    let mut w1_row = a1 * (start_x - v3.x) + b1 * (start_y - v3.y);

    let inv_z1 = 1.0 / v1.z;
    let inv_z2 = 1.0 / v2.z;
    let inv_z3 = 1.0 / v3.z;

    let mut wrote = false;
    for y in min_y..max_y {
        let mut w0 = w0_row;
        let mut w1 = w1_row;

        for x in min_x..max_x {
            let bc_x = w0 * inv_area;
            let bc_y = w1 * inv_area;
            let bc_z = 1.0 - bc_x - bc_y;

            const ERR: f32 = -0.0001;
            if bc_x >= ERR && bc_y >= ERR && bc_z >= ERR {
                // 1/z interpolates linearly in screen space
                let inv_z = bc_x * inv_z1 + bc_y * inv_z2 + bc_z * inv_z3;
                let z = 1.0 / inv_z;

                let idx = y * fb.width + x;
                if z < fb.zbuffer[idx] {
                    // Perspective-correct attribute weights
                    let p1 = bc_x * inv_z1 * z;
                    let p2 = bc_y * inv_z2 * z;
                    let p3 = bc_z * inv_z3 * z;
                    let uv = surface.uv1 * p1 + surface.uv2 * p2 + surface.uv3 * p3;
                    let normal = surface.wn1 * p1 + surface.wn2 * p2 + surface.wn3 * p3;

                    if let Some(color) = shade_fragment(shading, lights, normal, uv) {
                        wrote |= if shading.transparent {
                            fb.blend_pixel_with_depth(x, y, z, color)
                        } else {
                            fb.set_pixel_with_depth(x, y, z, color)
                        };
                    }
                }
            }

            w0 += a0;
            w1 += a1;
        }

        w0_row += b0;
        w1_row += b1;
    }
    wrote
}

/// Render a world-space triangle mesh with one toon material
pub fn render_mesh(
    fb: &mut Framebuffer,
    vertices: &[Vertex],
    faces: &[Face],
    shading: &ToonShading,
    camera: &Camera,
    settings: &RasterSettings,
) -> RenderStats {
    let mut stats = RenderStats::default();
    let focal = camera.focal(fb.height);

    // === TRANSFORM PHASE ===
    let projected: Vec<Vec3> = vertices
        .iter()
        .map(|v| {
            let rel_pos = v.pos - camera.position;
            let cam_pos = perspective_transform(rel_pos, camera.basis_x, camera.basis_y, camera.basis_z);
            project(cam_pos, focal, fb.width, fb.height)
        })
        .collect();

    // === CULL PHASE ===
    let mut surfaces: Vec<Surface> = Vec::with_capacity(faces.len());
    for face in faces {
        let (Some(&v1), Some(&v2), Some(&v3)) =
            (projected.get(face.v0), projected.get(face.v1), projected.get(face.v2))
        else {
            stats.triangles_culled += 1;
            continue;
        };

        // Skip triangles with any vertex in front of the near plane or all beyond far
        let near = camera.near;
        if v1.z <= near || v2.z <= near || v3.z <= near {
            stats.triangles_culled += 1;
            continue;
        }
        if v1.z > camera.far && v2.z > camera.far && v3.z > camera.far {
            stats.triangles_culled += 1;
            continue;
        }

        // Counter-clockwise world winding shows up clockwise with y pointing down
        let signed_area = (v2.x - v1.x) * (v3.y - v1.y) - (v3.x - v1.x) * (v2.y - v1.y);
        if settings.backface_cull && signed_area >= 0.0 {
            stats.triangles_culled += 1;
            continue;
        }

        let (a, b, c) = (&vertices[face.v0], &vertices[face.v1], &vertices[face.v2]);
        surfaces.push(Surface {
            v1,
            v2,
            v3,
            wn1: a.normal,
            wn2: b.normal,
            wn3: c.normal,
            uv1: a.uv,
            uv2: b.uv,
            uv3: c.uv,
        });
    }

    // === SORT PHASE ===
    // Blended surfaces go back-to-front (far first)
    if shading.transparent {
        surfaces.sort_by(|a, b| b.center_depth().total_cmp(&a.center_depth()));
    }

    // === DRAW PHASE ===
    for surface in &surfaces {
        if rasterize_triangle(fb, surface, shading, &settings.lights) {
            stats.triangles_drawn += 1;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::types::Texture;

    fn front_quad(z: f32) -> (Vec<Vertex>, Vec<Face>) {
        // Facing +Z (toward a camera on the +Z axis), counter-clockwise
        let n = Vec3::Z;
        let vertices = vec![
            Vertex::new(Vec3::new(-1.0, -1.0, z), Vec2::new(0.0, 1.0), n),
            Vertex::new(Vec3::new(1.0, -1.0, z), Vec2::new(1.0, 1.0), n),
            Vertex::new(Vec3::new(1.0, 1.0, z), Vec2::new(1.0, 0.0), n),
            Vertex::new(Vec3::new(-1.0, 1.0, z), Vec2::new(0.0, 0.0), n),
        ];
        (vertices, vec![Face::new(0, 1, 2), Face::new(0, 2, 3)])
    }

    fn camera() -> Camera {
        let mut cam = Camera::default();
        cam.look_at(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO);
        cam
    }

    fn lit_settings() -> RasterSettings {
        RasterSettings {
            lights: vec![
                Light::ambient(Color::WHITE, 0.3),
                Light::directional(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Color::WHITE, 2.0),
            ],
            backface_cull: true,
        }
    }

    #[test]
    fn test_front_faces_draw_back_faces_cull() {
        let mut fb = Framebuffer::new(64, 48);
        fb.clear(Color::TRANSPARENT);
        let (vertices, faces) = front_quad(0.0);
        let stats = render_mesh(&mut fb, &vertices, &faces, &ToonShading::default(), &camera(), &lit_settings());
        assert_eq!(stats.triangles_drawn, 2);
        assert_eq!(fb.get_pixel(32, 24).a, 255);

        // Same quad seen from behind
        let mut behind = Camera::default();
        behind.look_at(Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO);
        let mut fb = Framebuffer::new(64, 48);
        fb.clear(Color::TRANSPARENT);
        let stats = render_mesh(&mut fb, &vertices, &faces, &ToonShading::default(), &behind, &lit_settings());
        assert_eq!(stats.triangles_drawn, 0);
        assert_eq!(stats.triangles_culled, 2);
        assert_eq!(fb.get_pixel(32, 24), Color::TRANSPARENT);
    }

    #[test]
    fn test_nearer_surface_wins_depth_test() {
        let mut fb = Framebuffer::new(64, 48);
        fb.clear(Color::TRANSPARENT);
        let cam = camera();
        let settings = lit_settings();
        let (near_v, faces) = front_quad(0.5);
        let (far_v, _) = front_quad(-0.5);
        let red = ToonShading { tint: [1.0, 0.0, 0.0], ..Default::default() };
        let blue = ToonShading { tint: [0.0, 0.0, 1.0], ..Default::default() };
        render_mesh(&mut fb, &near_v, &faces, &red, &cam, &settings);
        render_mesh(&mut fb, &far_v, &faces, &blue, &cam, &settings);
        let px = fb.get_pixel(32, 24);
        assert!(px.r > 0);
        assert_eq!(px.b, 0);
    }

    #[test]
    fn test_alpha_test_discards_masked_fragments() {
        let mut fb = Framebuffer::new(64, 48);
        fb.clear(Color::TRANSPARENT);
        let mut mask = Texture::new(1, 1);
        mask.pixels[0] = Color::new(255, 100, 255); // green 100/255 < 0.5
        let shading = ToonShading { alpha_map: Some(&mask), ..Default::default() };
        let (vertices, faces) = front_quad(0.0);
        let stats = render_mesh(&mut fb, &vertices, &faces, &shading, &camera(), &lit_settings());
        assert_eq!(stats.triangles_drawn, 0);
        assert_eq!(fb.get_pixel(32, 24), Color::TRANSPARENT);
    }

    #[test]
    fn test_toon_band_has_two_levels() {
        let key = Light::directional(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Color::WHITE, 1.0);
        let lit = toon_irradiance(Vec3::Z, &[key]);
        let grazing = toon_irradiance(Vec3::X, &[key]);
        let away = toon_irradiance(Vec3::NEG_Z, &[key]);
        assert!((lit[0] - 1.0 / PI).abs() < 1e-5);
        // half-Lambert 0.5 is below the switch point
        assert!((grazing[0] - 0.7 / PI).abs() < 1e-5);
        assert!((away[0] - 0.7 / PI).abs() < 1e-5);
    }

    #[test]
    fn test_transparent_surface_blends() {
        let mut fb = Framebuffer::new(64, 48);
        fb.clear(Color::new(0, 0, 255));
        let mut tex = Texture::new(1, 1);
        tex.pixels[0] = Color::with_alpha(255, 255, 255, 192);
        let shading = ToonShading { map: Some(&tex), transparent: true, ..Default::default() };
        let (vertices, faces) = front_quad(0.0);
        render_mesh(&mut fb, &vertices, &faces, &shading, &camera(), &lit_settings());
        let px = fb.get_pixel(32, 24);
        // Some of the blue background survives under the blended surface
        assert!(px.r > 0);
        assert!(px.b > px.r);
    }

    #[test]
    fn test_resize_reports_change() {
        let mut fb = Framebuffer::new(4, 4);
        assert!(!fb.resize(4, 4));
        assert!(fb.resize(8, 2));
        assert_eq!(fb.pixels.len(), 8 * 2 * 4);
        assert_eq!(fb.zbuffer.len(), 16);
    }
}
