//! Entity registration and the scene context
//!
//! [`SceneContext`] owns the scene graph, the registered entities and the
//! factory. Every path that adds or removes an entity goes through it so that
//! the set of registered entities and the set of top-level scene nodes stay
//! the same set.

use mud_ipc::{EditorEvent, GenerationStatus, SelectionTarget, SerializedEntityData};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entity::asset_format;
use crate::entity::{Entity, GenerativeMut};
use crate::events::EventQueue;
use crate::factory::{EntityFactory, EntityOptions, FactoryError};
use crate::graph::{GraphError, NodeId, SceneGraph, Transform};
use crate::jobs::{AssetLoadJob, AssetLoadResult};
use crate::selectable::Selectable;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("entity {0} is not in the scene")]
    EntityNotFound(Uuid),

    #[error("entity {0} is already in the scene")]
    DuplicateEntity(Uuid),

    #[error("character {character} has no bone {index}")]
    BoneNotFound { character: Uuid, index: usize },

    #[error("command has nothing to execute")]
    Exhausted,

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Registry and scene graph disagree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("{0} is in the scene but belongs to no registered entity")]
    OrphanNode(NodeId),

    #[error("entity {0} is registered but its root is not in the scene")]
    DanglingEntity(Uuid),
}

pub struct SceneContext {
    graph: Box<dyn SceneGraph>,
    entities: Vec<Entity>,
    factory: EntityFactory,
    pub events: EventQueue,
}

impl SceneContext {
    pub fn new(graph: Box<dyn SceneGraph>) -> Self {
        Self::with_factory(graph, EntityFactory::default())
    }

    pub fn with_factory(graph: Box<dyn SceneGraph>, factory: EntityFactory) -> Self {
        Self {
            graph,
            entities: Vec::new(),
            factory,
            events: EventQueue::default(),
        }
    }

    pub fn graph(&self) -> &dyn SceneGraph {
        self.graph.as_ref()
    }

    pub fn graph_mut(&mut self) -> &mut dyn SceneGraph {
        self.graph.as_mut()
    }

    pub fn graph_and_events(&mut self) -> (&mut dyn SceneGraph, &mut EventQueue) {
        (self.graph.as_mut(), &mut self.events)
    }

    pub fn factory(&self) -> &EntityFactory {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut EntityFactory {
        &mut self.factory
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, uuid: Uuid) -> bool {
        self.entities.iter().any(|e| e.uuid() == uuid)
    }

    pub fn entity(&self, uuid: Uuid) -> Option<&Entity> {
        self.entities.iter().find(|e| e.uuid() == uuid)
    }

    pub fn entity_mut(&mut self, uuid: Uuid) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.uuid() == uuid)
    }

    /// Entity together with the graph, for operations that need both
    pub fn entity_and_graph(&mut self, uuid: Uuid) -> Option<(&mut Entity, &mut dyn SceneGraph)> {
        let graph = self.graph.as_mut();
        let entity = self.entities.iter_mut().find(|e| e.uuid() == uuid)?;
        Some((entity, graph))
    }

    pub fn generative_mut(&mut self, uuid: Uuid) -> Option<GenerativeMut<'_>> {
        let graph = self.graph.as_mut();
        let events = &mut self.events;
        let entity = self.entities.iter_mut().find(|e| e.uuid() == uuid)?;
        let (base, entity) = entity.generative_parts_mut()?;
        Some(GenerativeMut {
            base,
            entity,
            graph,
            events,
        })
    }

    /// Attach a built entity to the scene and register it
    pub fn insert(&mut self, entity: Entity) -> Result<Uuid, CommandError> {
        let uuid = entity.uuid();
        if self.contains(uuid) {
            return Err(CommandError::DuplicateEntity(uuid));
        }
        self.graph.add_node(entity.root(), None)?;
        let entity_type = entity.entity_type();
        info!("Added {} entity {} ({})", entity_type, entity.name(), uuid);
        self.entities.push(entity);
        self.events.send(EditorEvent::EntityAdded { uuid, entity_type });
        Ok(uuid)
    }

    /// Build through the factory and insert
    pub fn spawn(&mut self, options: EntityOptions) -> Result<Uuid, CommandError> {
        let entity = self.factory.create_entity(self.graph.as_mut(), options)?;
        self.insert(entity)
    }

    pub fn spawn_from_data(&mut self, data: &SerializedEntityData) -> Result<Uuid, CommandError> {
        if self.contains(data.uuid) {
            return Err(CommandError::DuplicateEntity(data.uuid));
        }
        let entity = self.factory.deserialize_entity(self.graph.as_mut(), data)?;
        self.insert(entity)
    }

    /// Remove from the scene and the registry without freeing anything
    pub fn detach(&mut self, uuid: Uuid) -> Result<Entity, CommandError> {
        let index = self
            .entities
            .iter()
            .position(|e| e.uuid() == uuid)
            .ok_or(CommandError::EntityNotFound(uuid))?;
        let mut entity = self.entities.remove(index);
        if let Err(e) = self.graph.remove_node(entity.root()) {
            warn!("Entity {} root was already gone: {}", uuid, e);
        }
        entity.base_mut().suspend_loading();
        if entity.abort_generation() {
            info!("Cancelled running generation of removed entity {}", uuid);
            self.events.send(EditorEvent::GenerationProgress {
                uuid,
                status: GenerationStatus::Idle,
                message: Some("cancelled".to_string()),
            });
        }
        debug!("Detached entity {}", uuid);
        self.events.send(EditorEvent::EntityRemoved { uuid });
        Ok(entity)
    }

    /// Remove and dispose
    pub fn despawn(&mut self, uuid: Uuid) -> Result<(), CommandError> {
        let mut entity = self.detach(uuid)?;
        entity.dispose(self.graph.as_mut());
        Ok(())
    }

    /// Dispose every entity; leaves scene and registry empty
    pub fn clear(&mut self) {
        for mut entity in std::mem::take(&mut self.entities) {
            if let Err(e) = self.graph.remove_node(entity.root()) {
                debug!("Root of {} already gone: {}", entity.uuid(), e);
            }
            entity.dispose(self.graph.as_mut());
            self.events.send(EditorEvent::EntityRemoved {
                uuid: entity.uuid(),
            });
        }
    }

    pub fn serialize_entity(&self, uuid: Uuid) -> Result<SerializedEntityData, CommandError> {
        let entity = self.entity(uuid).ok_or(CommandError::EntityNotFound(uuid))?;
        Ok(entity.serialize(self.graph.as_ref())?)
    }

    /// Copy of an entity under a fresh uuid, inserted into the scene
    pub fn duplicate(&mut self, source: Uuid) -> Result<Uuid, CommandError> {
        let mut data = self.serialize_entity(source)?;
        data.uuid = Uuid::new_v4();
        data.name = format!("{} copy", data.name);
        data.created = Some(chrono::Utc::now());
        self.spawn_from_data(&data)
    }

    /// True once the entity's asset load settled (or it had none)
    pub fn is_settled(&self, uuid: Uuid) -> bool {
        self.entity(uuid).is_none_or(|e| e.load_state().is_settled())
    }

    fn target_node(&self, target: SelectionTarget) -> Result<NodeId, CommandError> {
        match target {
            SelectionTarget::Entity { uuid } => self
                .entity(uuid)
                .map(Entity::root)
                .ok_or(CommandError::EntityNotFound(uuid)),
            SelectionTarget::Bone { character, index } => {
                let entity = self
                    .entity(character)
                    .ok_or(CommandError::EntityNotFound(character))?;
                entity
                    .as_character()
                    .and_then(|c| c.bone(index))
                    .map(|bone| bone.node())
                    .ok_or(CommandError::BoneNotFound { character, index })
            }
        }
    }

    pub fn resolves(&self, target: SelectionTarget) -> bool {
        self.target_node(target).is_ok()
    }

    pub fn target_transform(&self, target: SelectionTarget) -> Result<Transform, CommandError> {
        let node = self.target_node(target)?;
        self.graph
            .transform(node)
            .ok_or(CommandError::Graph(GraphError::UnknownNode(node)))
    }

    /// Apply a transform to a target; bones only take the rotation
    pub fn set_target_transform(
        &mut self,
        target: SelectionTarget,
        transform: Transform,
    ) -> Result<(), CommandError> {
        let node = self.target_node(target)?;
        let transform = match target {
            SelectionTarget::Entity { .. } => transform,
            SelectionTarget::Bone { .. } => {
                let current = self
                    .graph
                    .transform(node)
                    .ok_or(CommandError::Graph(GraphError::UnknownNode(node)))?;
                Transform {
                    rotation: transform.rotation,
                    ..current
                }
            }
        };
        self.graph.set_transform(node, transform)?;
        Ok(())
    }

    /// Selectable object behind a target, with the graph for its hooks
    pub fn selectable_mut(
        &mut self,
        target: SelectionTarget,
    ) -> Option<(&mut dyn Selectable, &mut dyn SceneGraph)> {
        let graph = self.graph.as_mut();
        let entity = self
            .entities
            .iter_mut()
            .find(|e| e.uuid() == target.owner())?;
        let selectable: &mut dyn Selectable = match target {
            SelectionTarget::Entity { .. } => entity,
            SelectionTarget::Bone { index, .. } => entity.as_character_mut()?.bone_mut(index)?,
        };
        Some((selectable, graph))
    }

    /// Owner of a picked node: the nearest bone or entity root above it
    pub fn target_for_node(&self, node: NodeId) -> Option<SelectionTarget> {
        let mut current = Some(node);
        while let Some(id) = current {
            for entity in &self.entities {
                if entity.root() == id {
                    return Some(SelectionTarget::entity(entity.uuid()));
                }
                if let Some(index) = entity.as_character().and_then(|c| c.bone_for_node(id)) {
                    return Some(SelectionTarget::Bone {
                        character: entity.uuid(),
                        index,
                    });
                }
            }
            current = self.graph.parent(id);
        }
        None
    }

    /// Hand out a job for every pending load
    pub fn take_load_jobs(&mut self) -> Vec<AssetLoadJob> {
        self.entities
            .iter_mut()
            .filter_map(|entity| {
                let uuid = entity.uuid();
                entity
                    .base_mut()
                    .start_loading()
                    .map(|(url, epoch)| AssetLoadJob { entity: uuid, url, epoch })
            })
            .collect()
    }

    /// Install a finished load; returns false if the job was stale
    pub fn finish_load(&mut self, result: AssetLoadResult) -> bool {
        let AssetLoadResult { job, bytes } = result;
        let graph = self.graph.as_mut();
        let Some(entity) = self.entities.iter_mut().find(|e| e.uuid() == job.entity) else {
            debug!("Dropping load of {} for missing entity {}", job.url, job.entity);
            return false;
        };
        let current = matches!(
            entity.load_state(),
            crate::entity::LoadState::Loading { url } if *url == job.url
        );
        if !current || entity.base().load_epoch() != job.epoch {
            debug!("Dropping stale load of {} for {}", job.url, job.entity);
            return false;
        }

        let loaded = bytes.and_then(|bytes| asset_format::sniff(&bytes));
        let degraded = entity.apply_asset(graph, &job.url, loaded).err();
        match &degraded {
            Some(reason) => warn!("Entity {} loaded degraded: {}", job.entity, reason),
            None => debug!("Entity {} loaded {}", job.entity, job.url),
        }
        entity.base_mut().settle_load(degraded.clone());
        self.events.send(EditorEvent::EntityLoaded {
            uuid: job.entity,
            degraded,
        });
        true
    }

    /// Registered entities and top-level scene nodes must be the same set
    pub fn verify_consistency(&self) -> Result<(), ConsistencyError> {
        let roots = self.graph.root_nodes();
        if let Some(orphan) = roots
            .iter()
            .find(|node| !self.entities.iter().any(|e| e.root() == **node))
        {
            return Err(ConsistencyError::OrphanNode(*orphan));
        }
        if let Some(dangling) = self
            .entities
            .iter()
            .find(|e| !roots.contains(&e.root()) || !self.graph.is_attached(e.root()))
        {
            return Err(ConsistencyError::DanglingEntity(dangling.uuid()));
        }
        Ok(())
    }
}
