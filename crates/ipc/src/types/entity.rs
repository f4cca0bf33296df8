//! Persisted entity records and the per-variant props bags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Transform3D;

/// Model bundled with the editor and used for new characters.
pub const DEFAULT_CHARACTER_MODEL: &str = "assets/characters/mannequin.glb";

/// Closed set of entity variants the editor knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "shape")]
    Shape,
    #[serde(rename = "light")]
    Light,
    #[serde(rename = "character")]
    Character,
    #[serde(rename = "generative")]
    Generative,
    #[serde(rename = "basic3D")]
    Basic3D,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Shape,
        EntityType::Light,
        EntityType::Character,
        EntityType::Generative,
        EntityType::Basic3D,
    ];

    /// Tag written into `SerializedEntityData::entity_type`
    pub fn tag(self) -> &'static str {
        match self {
            EntityType::Shape => "shape",
            EntityType::Light => "light",
            EntityType::Character => "character",
            EntityType::Generative => "generative",
            EntityType::Basic3D => "basic3D",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.tag() == tag)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One entity as stored in a project document.
///
/// `entity_type` stays a plain string so that a document written by a newer
/// editor (or a corrupted one) still parses; the factory rejects unknown tags
/// per entity instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedEntityData {
    pub entity_type: String,
    pub uuid: Uuid,
    pub name: String,
    pub position: [f32; 3],
    /// Quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    pub scaling: [f32; 3],
    #[serde(default)]
    pub props: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl SerializedEntityData {
    pub fn transform(&self) -> Transform3D {
        Transform3D {
            position: self.position,
            rotation: self.rotation,
            scale: self.scaling,
        }
    }

    pub fn set_transform(&mut self, transform: Transform3D) {
        self.position = transform.position;
        self.rotation = transform.rotation;
        self.scaling = transform.scale;
    }
}

/// Primitive mesh types for shape entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    #[default]
    Cube,
    Sphere,
    Cylinder,
    Plane,
    Pyramid,
    Cone,
    Floor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeProps {
    pub shape_type: ShapeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightProps {
    /// RGB (0.0-1.0)
    pub color: [f32; 3],
    pub intensity: f32,
    pub shadow_enabled: bool,
}

impl Default for LightProps {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 0.7,
            shadow_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterProps {
    pub model_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_animation: Option<String>,
}

impl Default for CharacterProps {
    fn default() -> Self {
        Self {
            model_url: DEFAULT_CHARACTER_MODEL.to_string(),
            current_animation: None,
        }
    }
}

/// An imported external 3D file (glTF/GLB/FBX).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basic3DProps {
    pub model_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_tags_roundtrip() {
        for ty in EntityType::ALL {
            assert_eq!(EntityType::from_tag(ty.tag()), Some(ty));
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.tag()));
        }
        assert_eq!(EntityType::from_tag("basic3d"), None);
    }

    #[test]
    fn test_serialized_entity_uses_camel_case() {
        let data = SerializedEntityData {
            entity_type: EntityType::Shape.tag().to_string(),
            uuid: Uuid::nil(),
            name: "Cube".to_string(),
            position: [1.0, 2.0, 3.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scaling: [1.0, 1.0, 1.0],
            props: serde_json::to_value(ShapeProps::default()).unwrap(),
            created: None,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["entityType"], "shape");
        assert_eq!(json["props"]["shapeType"], "cube");
        assert!(json.get("created").is_none());
    }

    #[test]
    fn test_props_defaults() {
        let light = LightProps::default();
        assert_eq!(light.intensity, 0.7);
        assert_eq!(light.color, [1.0, 1.0, 1.0]);
        assert_eq!(CharacterProps::default().model_url, DEFAULT_CHARACTER_MODEL);
    }
}
