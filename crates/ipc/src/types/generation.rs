//! Generation history types for generative entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of asset a generation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Model,
}

/// Output aspect ratio for image generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    /// (width, height) terms of the ratio
    pub fn terms(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Portrait => (3, 4),
            AspectRatio::Landscape => (4, 3),
            AspectRatio::Tall => (9, 16),
            AspectRatio::Wide => (16, 9),
        }
    }

    /// Width divided by height
    pub fn value(self) -> f32 {
        let (w, h) = self.terms();
        w as f32 / h as f32
    }

    /// Pixel size for a given long edge, rounded down to a multiple of 8
    pub fn dimensions(self, long_edge: u32) -> (u32, u32) {
        let (w, h) = self.terms();
        let (width, height) = if w >= h {
            (long_edge, long_edge * h / w)
        } else {
            (long_edge * w / h, long_edge)
        };
        (width & !7, height & !7)
    }
}

/// Parameters used for one image generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParams {
    pub ratio: AspectRatio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

/// Image-to-3D services the editor can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelApiProvider {
    #[default]
    Trellis,
    Tripo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParams {
    pub api_provider: ModelApiProvider,
}

/// One successful generation. Entries are never edited once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub asset_type: AssetType,
    pub asset_url: String,
    /// For model entries: the image entry this model was converted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_params: Option<ImageParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_params: Option<ModelParams>,
}

/// Props bag of a generative entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerativeProps {
    #[serde(default)]
    pub generation_logs: Vec<GenerationLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_generation_id: Option<String>,
}

impl GenerativeProps {
    pub fn log(&self, id: &str) -> Option<&GenerationLog> {
        self.generation_logs.iter().find(|log| log.id == id)
    }

    /// Index of the current entry, if it exists
    pub fn current_index(&self) -> Option<usize> {
        let id = self.current_generation_id.as_deref()?;
        self.generation_logs.iter().position(|log| log.id == id)
    }
}

/// Processing status of a generative entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Generating2D,
    Generating3D,
    Error,
}

impl GenerationStatus {
    pub fn is_busy(self) -> bool {
        matches!(self, GenerationStatus::Generating2D | GenerationStatus::Generating3D)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_wire_format() {
        let json = serde_json::to_string(&AspectRatio::Wide).unwrap();
        assert_eq!(json, "\"16:9\"");
        let parsed: AspectRatio = serde_json::from_str("\"1:1\"").unwrap();
        assert_eq!(parsed, AspectRatio::Square);
    }

    #[test]
    fn test_aspect_ratio_dimensions() {
        assert_eq!(AspectRatio::Square.dimensions(1024), (1024, 1024));
        assert_eq!(AspectRatio::Wide.dimensions(1024), (1024, 576));
        assert_eq!(AspectRatio::Tall.dimensions(1024), (576, 1024));
    }

    #[test]
    fn test_current_index_ignores_unknown_id() {
        let props = GenerativeProps {
            generation_logs: Vec::new(),
            current_generation_id: Some("missing".to_string()),
        };
        assert_eq!(props.current_index(), None);
    }
}
