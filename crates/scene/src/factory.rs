//! EntityFactory
//!
//! A registry from entity-type tag to constructor. Creating with defaults,
//! creating from typed options and deserializing a project record all end in
//! the same constructor call.

use std::collections::HashMap;

use chrono::Utc;
use mud_ipc::{
    Basic3DProps, CharacterProps, EntityType, GenerativeProps, LightProps, SerializedEntityData,
    ShapeProps, ShapeType, Transform3D,
};
use thiserror::Error;
use uuid::Uuid;

use crate::entity::{Basic3DEntity, CharacterEntity, Entity, GenerativeEntity, LightEntity, ShapeEntity};
use crate::graph::{GraphError, SceneGraph};

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("unknown entity type {0:?}")]
    UnknownEntityType(String),

    #[error("invalid props for {entity_type} entity {uuid}: {source}")]
    InvalidProps {
        entity_type: String,
        uuid: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Builds an entity (detached from the scene) from its record
pub type EntityConstructor =
    fn(&mut dyn SceneGraph, &SerializedEntityData) -> Result<Entity, FactoryError>;

/// Type-specific props for a new entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityProps {
    Shape(ShapeProps),
    Light(LightProps),
    Character(CharacterProps),
    Generative(GenerativeProps),
    Basic3D(Basic3DProps),
}

impl EntityProps {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityProps::Shape(_) => EntityType::Shape,
            EntityProps::Light(_) => EntityType::Light,
            EntityProps::Character(_) => EntityType::Character,
            EntityProps::Generative(_) => EntityType::Generative,
            EntityProps::Basic3D(_) => EntityType::Basic3D,
        }
    }

    pub fn default_for(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Shape => EntityProps::Shape(ShapeProps::default()),
            EntityType::Light => EntityProps::Light(LightProps::default()),
            EntityType::Character => EntityProps::Character(CharacterProps::default()),
            EntityType::Generative => EntityProps::Generative(GenerativeProps::default()),
            EntityType::Basic3D => EntityProps::Basic3D(Basic3DProps::default()),
        }
    }

    fn default_name(&self) -> String {
        match self {
            EntityProps::Shape(props) => shape_name(props.shape_type).to_string(),
            EntityProps::Light(_) => "Light".to_string(),
            EntityProps::Character(_) => "Character".to_string(),
            EntityProps::Generative(_) => "Generative".to_string(),
            EntityProps::Basic3D(props) => props
                .file_name
                .clone()
                .unwrap_or_else(|| "Model".to_string()),
        }
    }

    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            EntityProps::Shape(props) => serde_json::to_value(props),
            EntityProps::Light(props) => serde_json::to_value(props),
            EntityProps::Character(props) => serde_json::to_value(props),
            EntityProps::Generative(props) => serde_json::to_value(props),
            EntityProps::Basic3D(props) => serde_json::to_value(props),
        }
    }
}

fn shape_name(shape: ShapeType) -> &'static str {
    match shape {
        ShapeType::Cube => "Cube",
        ShapeType::Sphere => "Sphere",
        ShapeType::Cylinder => "Cylinder",
        ShapeType::Plane => "Plane",
        ShapeType::Pyramid => "Pyramid",
        ShapeType::Cone => "Cone",
        ShapeType::Floor => "Floor",
    }
}

/// Everything needed to create a fresh entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityOptions {
    pub name: Option<String>,
    pub transform: Transform3D,
    pub props: EntityProps,
}

impl EntityOptions {
    pub fn new(props: EntityProps) -> Self {
        Self {
            name: None,
            transform: Transform3D::default(),
            props,
        }
    }

    pub fn shape(shape_type: ShapeType) -> Self {
        Self::new(EntityProps::Shape(ShapeProps { shape_type }))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.transform.position = position;
        self
    }

    /// Fresh record with a new uuid
    pub fn into_data(self) -> Result<SerializedEntityData, FactoryError> {
        let uuid = Uuid::new_v4();
        let entity_type = self.props.entity_type().tag().to_string();
        let props = self
            .props
            .to_value()
            .map_err(|source| FactoryError::InvalidProps {
                entity_type: entity_type.clone(),
                uuid,
                source,
            })?;
        let mut data = SerializedEntityData {
            entity_type,
            uuid,
            name: self.name.unwrap_or_else(|| self.props.default_name()),
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scaling: [1.0; 3],
            props,
            created: Some(Utc::now()),
        };
        data.set_transform(self.transform);
        Ok(data)
    }
}

pub struct EntityFactory {
    constructors: HashMap<String, EntityConstructor>,
}

impl Default for EntityFactory {
    fn default() -> Self {
        let mut factory = Self {
            constructors: HashMap::new(),
        };
        for entity_type in EntityType::ALL {
            factory.register(entity_type.tag(), builtin_constructor(entity_type));
        }
        factory
    }
}

/// Constructor for each built-in variant; a new variant fails to compile here
fn builtin_constructor(entity_type: EntityType) -> EntityConstructor {
    match entity_type {
        EntityType::Shape => ShapeEntity::build,
        EntityType::Light => LightEntity::build,
        EntityType::Character => CharacterEntity::build,
        EntityType::Generative => GenerativeEntity::build,
        EntityType::Basic3D => Basic3DEntity::build,
    }
}

impl EntityFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for a tag
    pub fn register(&mut self, tag: impl Into<String>, constructor: EntityConstructor) {
        self.constructors.insert(tag.into(), constructor);
    }

    pub fn supports(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    pub fn create_entity_default(
        &self,
        graph: &mut dyn SceneGraph,
        entity_type: EntityType,
    ) -> Result<Entity, FactoryError> {
        self.create_entity(graph, EntityOptions::new(EntityProps::default_for(entity_type)))
    }

    pub fn create_entity(
        &self,
        graph: &mut dyn SceneGraph,
        options: EntityOptions,
    ) -> Result<Entity, FactoryError> {
        self.deserialize_entity(graph, &options.into_data()?)
    }

    pub fn deserialize_entity(
        &self,
        graph: &mut dyn SceneGraph,
        data: &SerializedEntityData,
    ) -> Result<Entity, FactoryError> {
        let constructor = self
            .constructors
            .get(&data.entity_type)
            .ok_or_else(|| FactoryError::UnknownEntityType(data.entity_type.clone()))?;
        constructor(graph, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::LoadState;
    use crate::graph::MemorySceneGraph;
    use mud_ipc::{AspectRatio, AssetType, GenerationLog, ImageParams, DEFAULT_CHARACTER_MODEL};

    #[test]
    fn test_defaults_per_type() {
        let mut graph = MemorySceneGraph::new();
        let factory = EntityFactory::new();

        let cube = factory.create_entity_default(&mut graph, EntityType::Shape).unwrap();
        assert_eq!(cube.as_shape().unwrap().shape_type(), ShapeType::Cube);
        assert_eq!(cube.name(), "Cube");
        assert_eq!(cube.load_state(), &LoadState::Ready);

        let light = factory.create_entity_default(&mut graph, EntityType::Light).unwrap();
        let props = light.as_light().unwrap().props();
        assert_eq!(props.intensity, 0.7);
        assert_eq!(props.color, [1.0, 1.0, 1.0]);

        let character = factory
            .create_entity_default(&mut graph, EntityType::Character)
            .unwrap();
        assert_eq!(character.as_character().unwrap().model_url(), DEFAULT_CHARACTER_MODEL);
        assert_eq!(
            character.load_state(),
            &LoadState::Pending {
                url: DEFAULT_CHARACTER_MODEL.to_string()
            }
        );
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let mut graph = MemorySceneGraph::new();
        let factory = EntityFactory::new();
        let mut data = EntityOptions::shape(ShapeType::Cube).into_data().unwrap();
        data.entity_type = "hologram".to_string();

        let result = factory.deserialize_entity(&mut graph, &data);
        assert!(matches!(result, Err(FactoryError::UnknownEntityType(tag)) if tag == "hologram"));
    }

    #[test]
    fn test_invalid_props_reported() {
        let mut graph = MemorySceneGraph::new();
        let factory = EntityFactory::new();
        let mut data = EntityOptions::shape(ShapeType::Cube).into_data().unwrap();
        data.props = serde_json::json!({"shapeType": "dodecahedron"});

        assert!(matches!(
            factory.deserialize_entity(&mut graph, &data),
            Err(FactoryError::InvalidProps { .. })
        ));
    }

    #[test]
    fn test_each_variant_roundtrips() {
        let mut graph = MemorySceneGraph::new();
        let factory = EntityFactory::new();
        let image = GenerationLog {
            id: "gen-1".to_string(),
            timestamp: Utc::now(),
            prompt: "a red ball".to_string(),
            asset_type: AssetType::Image,
            asset_url: "mem://1/ball.png".to_string(),
            derived_from_id: None,
            image_params: Some(ImageParams {
                ratio: AspectRatio::Square,
                ..Default::default()
            }),
            model_params: None,
        };

        let all_props = [
            EntityProps::Shape(ShapeProps {
                shape_type: ShapeType::Cone,
            }),
            EntityProps::Light(LightProps {
                color: [1.0, 0.5, 0.0],
                intensity: 2.0,
                shadow_enabled: false,
            }),
            EntityProps::Character(CharacterProps {
                model_url: "mem://hero.glb".to_string(),
                current_animation: Some("Walk".to_string()),
            }),
            EntityProps::Generative(GenerativeProps {
                generation_logs: vec![image],
                current_generation_id: Some("gen-1".to_string()),
            }),
            EntityProps::Basic3D(Basic3DProps {
                model_url: "mem://chair.fbx".to_string(),
                file_name: Some("chair.fbx".to_string()),
            }),
        ];

        for props in all_props {
            let mut options = EntityOptions::new(props).at([1.0, -2.0, 3.5]);
            options.transform.rotation = [0.0, 0.70710677, 0.0, 0.70710677];
            options.transform.scale = [2.0, 1.0, 0.5];

            let entity = factory.create_entity(&mut graph, options).unwrap();
            let first = entity.serialize(&graph).unwrap();
            let rebuilt = factory.deserialize_entity(&mut graph, &first).unwrap();
            let second = rebuilt.serialize(&graph).unwrap();

            assert_eq!(rebuilt.uuid(), entity.uuid());
            assert_eq!(first, second, "{} did not roundtrip", first.entity_type);
        }
    }

    #[test]
    fn test_generative_current_id_repaired() {
        let mut graph = MemorySceneGraph::new();
        let factory = EntityFactory::new();
        let log = GenerationLog {
            id: "only".to_string(),
            timestamp: Utc::now(),
            prompt: "lamp".to_string(),
            asset_type: AssetType::Image,
            asset_url: "mem://lamp.png".to_string(),
            derived_from_id: None,
            image_params: None,
            model_params: None,
        };
        let mut options = EntityOptions::new(EntityProps::Generative(GenerativeProps {
            generation_logs: vec![log],
            current_generation_id: Some("missing".to_string()),
        }));
        options.name = Some("Lamp".to_string());

        let entity = factory.create_entity(&mut graph, options).unwrap();
        let generative = entity.as_generative().unwrap();
        assert_eq!(generative.current_generation().unwrap().id, "only");
    }

    #[test]
    fn test_registered_constructor_is_used() {
        fn as_cube(
            graph: &mut dyn SceneGraph,
            data: &SerializedEntityData,
        ) -> Result<Entity, FactoryError> {
            let mut data = data.clone();
            data.entity_type = "shape".to_string();
            data.props = serde_json::json!({"shapeType": "cube"});
            ShapeEntity::build(graph, &data)
        }

        let mut graph = MemorySceneGraph::new();
        let mut factory = EntityFactory::new();
        factory.register("crate", as_cube);
        let mut data = EntityOptions::shape(ShapeType::Sphere).into_data().unwrap();
        data.entity_type = "crate".to_string();

        let entity = factory.deserialize_entity(&mut graph, &data).unwrap();
        assert_eq!(entity.as_shape().unwrap().shape_type(), ShapeType::Cube);
    }
}
