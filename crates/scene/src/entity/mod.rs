//! Scene entities
//!
//! Every entity is an [`EntityBase`] (identity, root node, load state) plus
//! one variant from the closed [`EntityKind`] set. All variants are built from
//! a [`SerializedEntityData`] record, whether fresh from the factory or read
//! from a project file, so both paths share one constructor per variant.

pub mod asset_format;
mod basic3d;
mod character;
mod generative;
mod light;
mod shape;

pub use asset_format::AssetFormat;
pub use basic3d::Basic3DEntity;
pub use character::{AnimationError, BoneControl, CharacterEntity};
pub use generative::{
    GenerationFailure, GenerationJob, GenerationOutcome, GenerationRequest, GenerativeEntity,
    GenerativeMut,
};
pub use light::LightEntity;
pub use shape::ShapeEntity;

use chrono::{DateTime, Utc};
use mud_ipc::{EntityType, SerializedEntityData, Transform3D};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::factory::FactoryError;
use crate::graph::{GraphError, NodeDesc, NodeKind, NodeId, SceneGraph, Transform};

/// Called once when an entity's asset load settles; `degraded` holds the
/// failure reason when the entity ended up without a visual
pub type LoadCallback = Box<dyn FnOnce(Uuid, Option<&str>)>;

/// Asset loading progress of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing to load
    Ready,
    /// Waiting for a load job to be handed out
    Pending { url: String },
    /// A load job is in flight
    Loading { url: String },
    Loaded,
    /// Loading failed; the entity stays usable without a visual
    Degraded { reason: String },
}

impl LoadState {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            LoadState::Ready | LoadState::Loaded | LoadState::Degraded { .. }
        )
    }
}

/// State shared by every entity variant
pub struct EntityBase {
    uuid: Uuid,
    name: String,
    created: DateTime<Utc>,
    root: NodeId,
    load: LoadState,
    load_epoch: u64,
    disposed: bool,
    on_loaded: Option<LoadCallback>,
}

impl EntityBase {
    fn create(graph: &mut dyn SceneGraph, data: &SerializedEntityData) -> Self {
        let root = graph.create_node(
            NodeDesc::new(data.name.clone(), NodeKind::Group)
                .with_transform(Transform::from(data.transform())),
        );
        Self {
            uuid: data.uuid,
            name: data.name.clone(),
            created: data.created.unwrap_or_else(Utc::now),
            root,
            load: LoadState::Ready,
            load_epoch: 0,
            disposed: false,
            on_loaded: None,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn load_epoch(&self) -> u64 {
        self.load_epoch
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Queue a visual load; any job already in flight becomes stale
    pub(crate) fn request_load(&mut self, url: impl Into<String>) {
        self.load_epoch += 1;
        self.load = LoadState::Pending { url: url.into() };
    }

    /// Pending -> Loading, handing out the url and epoch for a job
    pub(crate) fn start_loading(&mut self) -> Option<(String, u64)> {
        let LoadState::Pending { url } = &self.load else {
            return None;
        };
        let url = url.clone();
        self.load = LoadState::Loading { url: url.clone() };
        Some((url, self.load_epoch))
    }

    /// Put an in-flight load back to pending (entity left the scene)
    pub(crate) fn suspend_loading(&mut self) {
        if let LoadState::Loading { url } = &self.load {
            let url = url.clone();
            self.request_load(url);
        }
    }

    pub(crate) fn settle_load(&mut self, degraded: Option<String>) {
        if let Some(callback) = self.on_loaded.take() {
            callback(self.uuid, degraded.as_deref());
        }
        self.load = match degraded {
            Some(reason) => LoadState::Degraded { reason },
            None => LoadState::Loaded,
        };
    }
}

/// The closed set of entity variants
pub enum EntityKind {
    Shape(ShapeEntity),
    Light(LightEntity),
    Character(CharacterEntity),
    Generative(GenerativeEntity),
    Basic3D(Basic3DEntity),
}

pub struct Entity {
    base: EntityBase,
    kind: EntityKind,
}

impl Entity {
    fn new(base: EntityBase, kind: EntityKind) -> Self {
        Self { base, kind }
    }

    pub fn base(&self) -> &EntityBase {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    pub fn uuid(&self) -> Uuid {
        self.base.uuid
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.base.name = name.into();
    }

    pub fn root(&self) -> NodeId {
        self.base.root
    }

    pub fn load_state(&self) -> &LoadState {
        &self.base.load
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn entity_type(&self) -> EntityType {
        match self.kind {
            EntityKind::Shape(_) => EntityType::Shape,
            EntityKind::Light(_) => EntityType::Light,
            EntityKind::Character(_) => EntityType::Character,
            EntityKind::Generative(_) => EntityType::Generative,
            EntityKind::Basic3D(_) => EntityType::Basic3D,
        }
    }

    /// Register a callback for when asset loading settles.
    ///
    /// Entities with nothing to load (or already settled) call it right away.
    pub fn on_loaded(&mut self, callback: LoadCallback) {
        match &self.base.load {
            LoadState::Ready | LoadState::Loaded => callback(self.base.uuid, None),
            LoadState::Degraded { reason } => callback(self.base.uuid, Some(reason)),
            LoadState::Pending { .. } | LoadState::Loading { .. } => {
                self.base.on_loaded = Some(callback);
            }
        }
    }

    pub fn as_shape(&self) -> Option<&ShapeEntity> {
        match &self.kind {
            EntityKind::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn as_shape_mut(&mut self) -> Option<&mut ShapeEntity> {
        match &mut self.kind {
            EntityKind::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&LightEntity> {
        match &self.kind {
            EntityKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut LightEntity> {
        match &mut self.kind {
            EntityKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_character(&self) -> Option<&CharacterEntity> {
        match &self.kind {
            EntityKind::Character(character) => Some(character),
            _ => None,
        }
    }

    pub fn as_character_mut(&mut self) -> Option<&mut CharacterEntity> {
        match &mut self.kind {
            EntityKind::Character(character) => Some(character),
            _ => None,
        }
    }

    pub fn as_generative(&self) -> Option<&GenerativeEntity> {
        match &self.kind {
            EntityKind::Generative(generative) => Some(generative),
            _ => None,
        }
    }

    pub fn as_basic3d(&self) -> Option<&Basic3DEntity> {
        match &self.kind {
            EntityKind::Basic3D(basic) => Some(basic),
            _ => None,
        }
    }

    pub(crate) fn generative_parts_mut(
        &mut self,
    ) -> Option<(&mut EntityBase, &mut GenerativeEntity)> {
        match &mut self.kind {
            EntityKind::Generative(generative) => Some((&mut self.base, generative)),
            _ => None,
        }
    }

    pub fn transform(&self, graph: &dyn SceneGraph) -> Transform {
        graph.transform(self.base.root).unwrap_or_default()
    }

    /// Node that shows the selection highlight
    pub(crate) fn highlight_node(&self) -> NodeId {
        let visual = match &self.kind {
            EntityKind::Shape(shape) => Some(shape.mesh()),
            EntityKind::Light(light) => Some(light.marker()),
            EntityKind::Character(character) => character.model(),
            EntityKind::Generative(generative) => generative.visual(),
            EntityKind::Basic3D(basic) => basic.model(),
        };
        visual.unwrap_or(self.base.root)
    }

    /// Snapshot of identity, transform and props; never does any loading
    pub fn serialize(&self, graph: &dyn SceneGraph) -> Result<SerializedEntityData, FactoryError> {
        let transform: Transform3D = self.transform(graph).into();
        let props = match &self.kind {
            EntityKind::Shape(shape) => self.props_value(shape.props()),
            EntityKind::Light(light) => self.props_value(light.props()),
            EntityKind::Character(character) => self.props_value(&character.persisted_props()),
            EntityKind::Generative(generative) => self.props_value(generative.props()),
            EntityKind::Basic3D(basic) => self.props_value(basic.props()),
        }?;

        let mut data = SerializedEntityData {
            entity_type: self.entity_type().tag().to_string(),
            uuid: self.base.uuid,
            name: self.base.name.clone(),
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scaling: [1.0; 3],
            props,
            created: Some(self.base.created),
        };
        data.set_transform(transform);
        Ok(data)
    }

    fn props_value<T: Serialize>(&self, props: &T) -> Result<serde_json::Value, FactoryError> {
        serde_json::to_value(props).map_err(|source| FactoryError::InvalidProps {
            entity_type: self.entity_type().tag().to_string(),
            uuid: self.base.uuid,
            source,
        })
    }

    /// Release every node this entity owns; safe to call repeatedly
    /// Abort an in-flight generation; false when none was running
    pub(crate) fn abort_generation(&mut self) -> bool {
        match &mut self.kind {
            EntityKind::Generative(generative) if generative.is_generating() => {
                generative.cancel_active();
                true
            }
            _ => false,
        }
    }

    pub fn dispose(&mut self, graph: &mut dyn SceneGraph) {
        if self.base.disposed {
            return;
        }
        match &mut self.kind {
            EntityKind::Shape(_) | EntityKind::Light(_) => {}
            EntityKind::Character(character) => character.forget_visual(),
            EntityKind::Generative(generative) => {
                generative.cancel_active();
                generative.forget_visual();
            }
            EntityKind::Basic3D(basic) => basic.forget_visual(),
        }
        graph.destroy_node(self.base.root);
        self.base.load_epoch += 1;
        self.base.disposed = true;
        debug!("Disposed entity {} ({})", self.base.name, self.base.uuid);
    }

    /// Install the visual for a finished load; `Err` is the degrade reason
    pub(crate) fn apply_asset(
        &mut self,
        graph: &mut dyn SceneGraph,
        url: &str,
        loaded: Result<AssetFormat, String>,
    ) -> Result<(), String> {
        let format = loaded?;
        let root = self.base.root;
        let applied = match &mut self.kind {
            EntityKind::Shape(_) | EntityKind::Light(_) => Ok(()),
            EntityKind::Character(character) => character.apply_asset(graph, root, url, format),
            EntityKind::Generative(generative) => generative.apply_asset(graph, root, url, format),
            EntityKind::Basic3D(basic) => basic.apply_asset(graph, root, url, format),
        };
        applied.map_err(|e| e.to_string())
    }
}

/// Parse a props bag; a missing bag means the variant's defaults
fn parse_props<T: DeserializeOwned + Default>(
    data: &SerializedEntityData,
) -> Result<T, FactoryError> {
    if data.props.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data.props.clone()).map_err(|source| FactoryError::InvalidProps {
        entity_type: data.entity_type.clone(),
        uuid: data.uuid,
        source,
    })
}

/// Create a child node under `parent`
fn spawn_child(
    graph: &mut dyn SceneGraph,
    parent: NodeId,
    desc: NodeDesc,
) -> Result<NodeId, GraphError> {
    let node = graph.create_node(desc);
    if let Err(e) = graph.add_node(node, Some(parent)) {
        graph.destroy_node(node);
        return Err(e);
    }
    Ok(node)
}

/// Errors raised while installing a loaded visual
#[derive(Debug, thiserror::Error)]
pub(crate) enum VisualError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("{0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::EntityOptions;
    use crate::graph::MemorySceneGraph;
    use glam::Vec3;
    use mud_ipc::{LightProps, ShapeType};

    /// Memory graph that refuses to parent nodes
    #[derive(Default)]
    struct NoChildrenGraph(MemorySceneGraph);

    impl SceneGraph for NoChildrenGraph {
        fn create_node(&mut self, desc: NodeDesc) -> NodeId {
            self.0.create_node(desc)
        }
        fn add_node(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), GraphError> {
            match parent {
                Some(parent) => Err(GraphError::Cycle { child: node, parent }),
                None => self.0.add_node(node, None),
            }
        }
        fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
            self.0.remove_node(node)
        }
        fn destroy_node(&mut self, node: NodeId) {
            self.0.destroy_node(node)
        }
        fn contains(&self, node: NodeId) -> bool {
            self.0.contains(node)
        }
        fn is_attached(&self, node: NodeId) -> bool {
            self.0.is_attached(node)
        }
        fn parent(&self, node: NodeId) -> Option<NodeId> {
            self.0.parent(node)
        }
        fn children(&self, node: NodeId) -> Vec<NodeId> {
            self.0.children(node)
        }
        fn root_nodes(&self) -> Vec<NodeId> {
            self.0.root_nodes()
        }
        fn transform(&self, node: NodeId) -> Option<Transform> {
            self.0.transform(node)
        }
        fn set_transform(&mut self, node: NodeId, transform: Transform) -> Result<(), GraphError> {
            self.0.set_transform(node, transform)
        }
        fn kind(&self, node: NodeId) -> Option<NodeKind> {
            self.0.kind(node)
        }
        fn set_kind(&mut self, node: NodeId, kind: NodeKind) -> Result<(), GraphError> {
            self.0.set_kind(node, kind)
        }
        fn set_visible(&mut self, node: NodeId, visible: bool) -> Result<(), GraphError> {
            self.0.set_visible(node, visible)
        }
        fn set_highlighted(&mut self, node: NodeId, highlighted: bool) -> Result<(), GraphError> {
            self.0.set_highlighted(node, highlighted)
        }
        fn is_highlighted(&self, node: NodeId) -> bool {
            self.0.is_highlighted(node)
        }
        fn pick_by_ray(&self, origin: Vec3, direction: Vec3) -> Option<NodeId> {
            self.0.pick_by_ray(origin, direction)
        }
        fn node_count(&self) -> usize {
            self.0.node_count()
        }
    }

    #[test]
    fn test_failed_shape_build_frees_its_nodes() {
        let mut graph = NoChildrenGraph::default();
        let data = EntityOptions::shape(ShapeType::Cube).into_data().unwrap();
        assert!(ShapeEntity::build(&mut graph, &data).is_err());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_failed_light_build_frees_its_nodes() {
        let mut graph = NoChildrenGraph::default();
        let data = EntityOptions::new(crate::factory::EntityProps::Light(LightProps::default()))
            .into_data()
            .unwrap();
        assert!(LightEntity::build(&mut graph, &data).is_err());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_spawn_child_under_missing_parent_leaves_no_node() {
        let mut graph = MemorySceneGraph::new();
        let err = spawn_child(&mut graph, NodeId(99), NodeDesc::new("c", NodeKind::Group));
        assert_eq!(err, Err(GraphError::UnknownNode(NodeId(99))));
        assert_eq!(graph.node_count(), 0);
    }
}
