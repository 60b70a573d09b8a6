//! Software rasterizer
//!
//! Features:
//! - Perspective-correct attribute interpolation
//! - Two-tone toon lighting (ambient + directional lights)
//! - Alpha test and back-to-front blended surfaces
//! - Z-buffer
//!
//! # Module Organization
//!
//! - `types` - Color, Texture, Light, Vertex, Face, ToonShading, RasterSettings
//! - `math` - projection and sRGB transfer helpers
//! - `camera` - Camera struct for 3D rendering
//! - `render` - Framebuffer and mesh rendering functions

pub mod camera;
pub mod math;
pub mod render;
pub mod types;

pub use camera::Camera;
pub use render::{render_mesh, Framebuffer, RenderStats};
pub use types::{Color, Face, Light, RasterSettings, Texture, ToonShading, Vertex};
