//! Viewer configuration
//!
//! The viewer has no runtime configuration surface: the model list and the
//! constants that go with it live in `assets/viewer.ron`, which is embedded
//! into the binary at build time and validated once at startup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loader::LoadPolicy;

/// Embedded configuration document
const EMBEDDED_CONFIG: &str = include_str!("../assets/viewer.ron");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("config lists no models")]
    NoModels,
    #[error("loop duration must be positive (got {0})")]
    LoopDuration(f64),
    #[error("orbit radius must be positive (got {0})")]
    OrbitRadius(f32),
    #[error("render height must be at least 16 lines (got {0})")]
    RenderHeight(usize),
}

/// Orbit camera constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitConfig {
    pub radius: f32,
    /// Camera height above the ground plane
    pub height: f32,
    pub look_at: (f32, f32, f32),
    pub initial_angle: f32,
    /// Radians per pixel of horizontal drag
    pub drag_gain: f32,
    /// Accumulated drag (px) above which a press stops being a click
    pub click_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbientConfig {
    pub color: (u8, u8, u8),
    pub intensity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyLightConfig {
    pub color: (u8, u8, u8),
    pub intensity: f32,
    pub position: (f32, f32, f32),
    pub target: (f32, f32, f32),
}

/// Everything the viewer needs to know before the first frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Model sources in presentation order
    pub models: Vec<String>,
    pub soundtrack: String,
    /// Seconds after which audio and every animation restart together
    pub loop_duration: f64,
    pub load_policy: LoadPolicy,
    pub orbit: OrbitConfig,
    pub projection: ProjectionConfig,
    pub ambient: AmbientConfig,
    pub key_light: KeyLightConfig,
    /// Software framebuffer height; width follows the window aspect
    pub render_height: usize,
    pub clear_color: (u8, u8, u8),
}

impl ViewerConfig {
    /// Parse and validate the configuration compiled into the binary
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_ron(EMBEDDED_CONFIG)
    }

    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::NoModels);
        }
        if !self.loop_duration.is_finite() || self.loop_duration <= 0.0 {
            return Err(ConfigError::LoopDuration(self.loop_duration));
        }
        if !self.orbit.radius.is_finite() || self.orbit.radius <= 0.0 {
            return Err(ConfigError::OrbitRadius(self.orbit.radius));
        }
        if self.render_height < 16 {
            return Err(ConfigError::RenderHeight(self.render_height));
        }
        Ok(())
    }
}
