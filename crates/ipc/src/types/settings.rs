//! Environment and render settings stored with a project.

use serde::{Deserialize, Serialize};

use super::AspectRatio;

/// Scene environment: sun, ambient fill, sky, and helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentSettings {
    /// Sun direction as normalized vector (pointing toward light source)
    pub sun_direction: [f32; 3],
    /// Sun color as RGB (0.0-1.0)
    pub sun_color: [f32; 3],
    pub sun_intensity: f32,
    /// Ambient light color as RGB (0.0-1.0)
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    /// Equirectangular sky image, if any
    pub skybox_url: Option<String>,
    pub show_grid: bool,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            // From upper-left-front
            sun_direction: [-0.5, -0.7, -0.5],
            // Warm white
            sun_color: [1.0, 0.98, 0.95],
            sun_intensity: 1.0,
            // Cool sky-blue
            ambient_color: [0.6, 0.7, 1.0],
            ambient_intensity: 0.5,
            skybox_url: None,
            show_grid: true,
        }
    }
}

/// Settings used when rendering the composed scene through an image model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderSettings {
    pub prompt: String,
    pub seed: Option<u64>,
    pub ratio: AspectRatio,
    /// How far the render may drift from the viewport capture (0.0-1.0)
    pub strength: f32,
    pub provider: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            seed: None,
            ratio: AspectRatio::default(),
            strength: 0.75,
            provider: "remote".to_string(),
        }
    }
}
