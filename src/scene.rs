//! Scene rendering
//!
//! The stage is fixed: one ambient light, one key light, and whichever
//! models are visible. Opaque surfaces of every visible model go first so
//! blended ones land on a complete depth buffer.

use macroquad::math::Vec3;

use crate::config::ViewerConfig;
use crate::model::{DrawBatch, Model};
use crate::rasterizer::{render_mesh, Camera, Color, Framebuffer, Light, RasterSettings, RenderStats};

pub struct Scene {
    pub settings: RasterSettings,
    pub clear_color: Color,
}

fn vec3((x, y, z): (f32, f32, f32)) -> Vec3 {
    Vec3::new(x, y, z)
}

impl Scene {
    pub fn from_config(config: &ViewerConfig) -> Self {
        let ambient = Light::ambient(Color::from_tuple(config.ambient.color), config.ambient.intensity);
        let key = &config.key_light;
        let key = Light::directional(
            vec3(key.position),
            vec3(key.target),
            Color::from_tuple(key.color),
            key.intensity,
        );
        Self {
            settings: RasterSettings {
                lights: vec![ambient, key],
                ..Default::default()
            },
            clear_color: Color::from_tuple(config.clear_color),
        }
    }

    /// Clear and draw every visible model
    pub fn draw(&self, fb: &mut Framebuffer, camera: &Camera, models: &[Model]) -> RenderStats {
        fb.clear(self.clear_color);

        let posed: Vec<(&Model, Vec<DrawBatch<'_>>)> = models
            .iter()
            .filter(|m| m.wrapper.visible)
            .map(|m| (m, m.draw_batches()))
            .collect();

        let mut stats = RenderStats::default();
        for pass_transparent in [false, true] {
            for (model, batches) in &posed {
                for batch in batches.iter().filter(|b| b.material.transparent == pass_transparent) {
                    let shading = model.wrapper.shading(&batch.material);
                    stats += render_mesh(fb, &batch.vertices, batch.faces, &shading, camera, &self.settings);
                }
            }
        }
        stats
    }

    /// Render a freshly loaded model once visible and once hidden, so the
    /// first real frame it appears in holds no surprises. Leaves it hidden.
    pub fn warm_up(&self, fb: &mut Framebuffer, camera: &Camera, model: &mut Model) {
        model.wrapper.visible = true;
        let stats = self.draw(fb, camera, std::slice::from_ref(model));
        model.wrapper.visible = false;
        self.draw(fb, camera, std::slice::from_ref(model));
        log::debug!(
            "Warm-up {}: {} triangles drawn, {} culled",
            model.name,
            stats.triangles_drawn,
            stats.triangles_culled
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_rig::OrbitRig;
    use crate::model::gltf_import::{import_model, tests::triangle_glb};

    fn stage() -> (Scene, Framebuffer, Camera) {
        let config = ViewerConfig::embedded().unwrap();
        let scene = Scene::from_config(&config);
        let mut camera = Camera::new(
            config.projection.fov_y_degrees,
            config.projection.near,
            config.projection.far,
        );
        OrbitRig::new(&config.orbit).apply(&mut camera);
        (scene, Framebuffer::new(64, 48), camera)
    }

    fn model(alpha_mode: &str) -> Model {
        let mut m = import_model("t.glb", &triangle_glb(alpha_mode)).unwrap();
        m.wrapper.normalize_materials();
        m
    }

    fn painted(fb: &Framebuffer, clear: Color) -> usize {
        fb.pixels.chunks_exact(4).filter(|p| *p != clear.to_bytes()).count()
    }

    #[test]
    fn test_lights_from_config() {
        let (scene, _, _) = stage();
        assert_eq!(scene.settings.lights.len(), 2);
        assert!(scene.settings.lights.iter().any(|l| l.intensity == 2.0));
        assert_eq!(scene.clear_color, Color::WHITE);
    }

    #[test]
    fn test_hidden_models_are_not_drawn() {
        let (scene, mut fb, camera) = stage();
        let mut m = model("OPAQUE");
        let stats = scene.draw(&mut fb, &camera, std::slice::from_ref(&m));
        assert_eq!(stats.triangles_drawn, 0);
        assert_eq!(painted(&fb, scene.clear_color), 0);

        m.wrapper.visible = true;
        let stats = scene.draw(&mut fb, &camera, std::slice::from_ref(&m));
        assert_eq!(stats.triangles_drawn, 1);
        assert!(painted(&fb, scene.clear_color) > 0);
    }

    #[test]
    fn test_warm_up_leaves_model_hidden_and_frame_clear() {
        let (scene, mut fb, camera) = stage();
        let mut m = model("BLEND");
        scene.warm_up(&mut fb, &camera, &mut m);
        assert!(!m.wrapper.visible);
        assert_eq!(painted(&fb, scene.clear_color), 0);
    }
}
