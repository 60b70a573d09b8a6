//! Surface materials and the toon normalizer
//!
//! Imported surfaces arrive as `Material::Standard` (the glTF PBR fields the
//! viewer cares about). Before first draw every surface is rewritten to
//! `Material::Toon`, carrying over the color texture, tint, transparency and
//! transparency mask.

/// Alpha cutoff applied by every toon surface
pub const TOON_ALPHA_TEST: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque,
    Mask,
    Blend,
}

/// The subset of a glTF metallic-roughness material that survives normalization
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterial {
    pub name: String,
    /// Linear RGBA factor
    pub base_color_factor: [f32; 4],
    /// Index into the owning hierarchy's textures
    pub base_color_texture: Option<usize>,
    pub alpha_mode: AlphaMode,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            alpha_mode: AlphaMode::Opaque,
        }
    }
}

/// Cel-shaded surface
#[derive(Debug, Clone, PartialEq)]
pub struct ToonMaterial {
    pub map: Option<usize>,
    /// Linear RGB tint
    pub color: [f32; 3],
    pub transparent: bool,
    /// Green channel scales the fragment alpha
    pub alpha_map: Option<usize>,
    pub alpha_test: f32,
}

impl Default for ToonMaterial {
    fn default() -> Self {
        Self {
            map: None,
            color: [1.0, 1.0, 1.0],
            transparent: false,
            alpha_map: None,
            alpha_test: TOON_ALPHA_TEST,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Standard(StandardMaterial),
    Toon(ToonMaterial),
}

impl Default for Material {
    fn default() -> Self {
        Material::Standard(StandardMaterial::default())
    }
}

impl Material {
    /// Toon equivalent of this material. Never touches geometry and
    /// maps a toon material onto itself (apart from the fixed cutoff).
    pub fn to_toon(&self) -> ToonMaterial {
        match self {
            Material::Standard(standard) => {
                let [r, g, b, _] = standard.base_color_factor;
                ToonMaterial {
                    map: standard.base_color_texture,
                    color: [r, g, b],
                    transparent: standard.alpha_mode == AlphaMode::Blend,
                    alpha_map: None,
                    alpha_test: TOON_ALPHA_TEST,
                }
            }
            Material::Toon(toon) => ToonMaterial {
                alpha_test: TOON_ALPHA_TEST,
                ..toon.clone()
            },
        }
    }

    pub fn is_toon(&self) -> bool {
        matches!(self, Material::Toon(_))
    }
}

/// Replace a surface's material with its toon equivalent
pub fn normalize(material: &mut Material) {
    *material = Material::Toon(material.to_toon());
}
