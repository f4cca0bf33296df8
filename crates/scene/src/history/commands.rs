//! Concrete scene commands

use mud_ipc::{SelectionTarget, SerializedEntityData};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::entity::Entity;
use crate::factory::EntityOptions;
use crate::graph::Transform;
use crate::registry::{CommandError, SceneContext};

use super::Command;

/// Creates an entity and inserts it into the scene, returning its uuid
pub type EntityBuilder = Box<dyn FnOnce(&mut SceneContext) -> Result<Uuid, CommandError>>;

/// Shared create/remove logic. The builder runs once; afterwards the
/// entity is recreated from the snapshot taken when it was last removed,
/// so redo brings back the same uuid and props.
struct Creation {
    builder: Option<EntityBuilder>,
    uuid: Option<Uuid>,
    snapshot: Option<SerializedEntityData>,
}

impl Creation {
    fn new(builder: EntityBuilder) -> Self {
        Self {
            builder: Some(builder),
            uuid: None,
            snapshot: None,
        }
    }

    fn create(&mut self, scene: &mut SceneContext) -> Result<Uuid, CommandError> {
        let uuid = match (&self.snapshot, self.builder.take()) {
            (Some(snapshot), _) => scene.spawn_from_data(snapshot)?,
            (None, Some(builder)) => builder(scene)?,
            (None, None) => return Err(CommandError::Exhausted),
        };
        self.uuid = Some(uuid);
        Ok(uuid)
    }

    fn remove(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        let uuid = self.uuid.ok_or(CommandError::Exhausted)?;
        self.snapshot = Some(scene.serialize_entity(uuid)?);
        scene.despawn(uuid)
    }
}

pub struct CreateEntityCommand {
    creation: Creation,
}

impl CreateEntityCommand {
    pub fn new(builder: EntityBuilder) -> Self {
        Self {
            creation: Creation::new(builder),
        }
    }

    pub fn from_options(options: EntityOptions) -> Self {
        Self::new(Box::new(move |scene| scene.spawn(options)))
    }

    pub fn entity(&self) -> Option<Uuid> {
        self.creation.uuid
    }
}

impl Command for CreateEntityCommand {
    fn label(&self) -> &str {
        "Create entity"
    }

    fn execute(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        self.creation.create(scene).map(|_| ())
    }

    fn undo(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        self.creation.remove(scene)
    }
}

/// Resolves to the created entity once its load settled
#[derive(Debug, Clone)]
pub struct AsyncEntityHandle {
    rx: watch::Receiver<Option<Uuid>>,
}

impl AsyncEntityHandle {
    /// The entity, if creation already settled
    pub fn entity(&self) -> Option<Uuid> {
        *self.rx.borrow()
    }

    /// Wait until creation settles; `None` if the command was dropped first
    pub async fn wait(&mut self) -> Option<Uuid> {
        self.rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|uuid| *uuid)
    }
}

/// Create an entity whose visual loads asynchronously. The history treats
/// the command as pending until the load settles.
pub struct CreateEntityAsyncCommand {
    label: String,
    creation: Creation,
    pending: Option<Uuid>,
    tx: watch::Sender<Option<Uuid>>,
}

impl CreateEntityAsyncCommand {
    pub fn new(builder: EntityBuilder) -> Self {
        Self::labelled("Create entity", builder)
    }

    pub fn from_options(options: EntityOptions) -> Self {
        Self::new(Box::new(move |scene| scene.spawn(options)))
    }

    fn labelled(label: &str, builder: EntityBuilder) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            label: label.to_string(),
            creation: Creation::new(builder),
            pending: None,
            tx,
        }
    }

    pub fn handle(&self) -> AsyncEntityHandle {
        AsyncEntityHandle {
            rx: self.tx.subscribe(),
        }
    }
}

impl Command for CreateEntityAsyncCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn execute(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        let uuid = self.creation.create(scene)?;
        if scene.is_settled(uuid) {
            self.pending = None;
            self.tx.send_replace(Some(uuid));
        } else {
            debug!("{} waiting on load of {}", self.label, uuid);
            self.pending = Some(uuid);
            self.tx.send_replace(None);
        }
        Ok(())
    }

    fn undo(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        self.creation.remove(scene)
    }

    fn awaiting_entity(&self) -> Option<Uuid> {
        self.pending
    }

    fn settle(&mut self, entity: Uuid) {
        if self.pending == Some(entity) {
            self.pending = None;
            self.tx.send_replace(Some(entity));
        }
    }
}

/// Copy an entity under a fresh uuid through the async create path
pub struct DuplicateEntityCommand {
    inner: CreateEntityAsyncCommand,
    source: Uuid,
}

impl DuplicateEntityCommand {
    pub fn new(source: Uuid) -> Self {
        Self {
            inner: CreateEntityAsyncCommand::labelled(
                "Duplicate entity",
                Box::new(move |scene| scene.duplicate(source)),
            ),
            source,
        }
    }

    pub fn source(&self) -> Uuid {
        self.source
    }

    pub fn handle(&self) -> AsyncEntityHandle {
        self.inner.handle()
    }
}

impl Command for DuplicateEntityCommand {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn execute(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        self.inner.execute(scene)
    }

    fn undo(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        self.inner.undo(scene)
    }

    fn awaiting_entity(&self) -> Option<Uuid> {
        self.inner.awaiting_entity()
    }

    fn settle(&mut self, entity: Uuid) {
        self.inner.settle(entity);
    }
}

/// Remove an entity. The detached entity is held (not disposed) so undo can
/// put the same instance back; it is disposed when the command is discarded.
pub struct DeleteEntityCommand {
    uuid: Uuid,
    detached: Option<Entity>,
}

impl DeleteEntityCommand {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            detached: None,
        }
    }

    pub fn entity(&self) -> Uuid {
        self.uuid
    }
}

impl Command for DeleteEntityCommand {
    fn label(&self) -> &str {
        "Delete entity"
    }

    fn execute(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        self.detached = Some(scene.detach(self.uuid)?);
        Ok(())
    }

    fn undo(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        let entity = self.detached.take().ok_or(CommandError::Exhausted)?;
        scene.insert(entity)?;
        Ok(())
    }

    fn discard(&mut self, scene: &mut SceneContext) {
        if let Some(mut entity) = self.detached.take() {
            debug!("Releasing deleted entity {}", self.uuid);
            entity.dispose(scene.graph_mut());
        }
    }
}

/// Before/after transform of one target
pub struct TransformCommand {
    target: SelectionTarget,
    before: Transform,
    after: Transform,
}

impl TransformCommand {
    /// Capture the current transform as "before"
    pub fn new(scene: &SceneContext, target: SelectionTarget) -> Result<Self, CommandError> {
        let before = scene.target_transform(target)?;
        Ok(Self {
            target,
            before,
            after: before,
        })
    }

    pub fn from_states(target: SelectionTarget, before: Transform, after: Transform) -> Self {
        Self {
            target,
            before,
            after,
        }
    }

    /// Capture the target's current transform as "after"
    pub fn update_final_state(&mut self, scene: &SceneContext) -> Result<(), CommandError> {
        self.after = scene.target_transform(self.target)?;
        Ok(())
    }

    pub fn target(&self) -> SelectionTarget {
        self.target
    }

    pub fn before(&self) -> Transform {
        self.before
    }

    pub fn after(&self) -> Transform {
        self.after
    }
}

impl Command for TransformCommand {
    fn label(&self) -> &str {
        "Transform"
    }

    fn execute(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        scene.set_target_transform(self.target, self.after)
    }

    fn undo(&mut self, scene: &mut SceneContext) -> Result<(), CommandError> {
        scene.set_target_transform(self.target, self.before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::EntityProps;
    use crate::history::{HistoryManager, HistoryOutcome};
    use crate::test_support::{finish_loads, loaded_character, scene};
    use glam::{Quat, Vec3};
    use mud_ipc::{Basic3DProps, ShapeType};

    #[test]
    fn test_cube_create_delete_leaves_scene_empty() {
        let mut scene = scene();
        let mut history = HistoryManager::new(10);

        let create = CreateEntityCommand::from_options(EntityOptions::shape(ShapeType::Cube));
        history.execute(Box::new(create), &mut scene).unwrap();
        let uuid = scene.entities().next().unwrap().uuid();
        scene.verify_consistency().unwrap();

        history
            .execute(Box::new(DeleteEntityCommand::new(uuid)), &mut scene)
            .unwrap();
        assert!(scene.is_empty());
        assert!(scene.graph().root_nodes().is_empty());
        scene.verify_consistency().unwrap();
    }

    #[test]
    fn test_cube_move_undo_redo_exact() {
        let mut scene = scene();
        let mut history = HistoryManager::new(10);
        let uuid = scene.spawn(EntityOptions::shape(ShapeType::Cube)).unwrap();
        let target = SelectionTarget::entity(uuid);

        let mut command = TransformCommand::new(&scene, target).unwrap();
        scene
            .set_target_transform(target, Transform::from_translation(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        command.update_final_state(&scene).unwrap();
        history.push(Box::new(command), &mut scene).unwrap();

        history.undo(&mut scene).unwrap();
        assert_eq!(scene.target_transform(target).unwrap().translation, Vec3::ZERO);
        history.redo(&mut scene).unwrap();
        assert_eq!(
            scene.target_transform(target).unwrap().translation,
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn test_redo_recreates_same_identity() {
        let mut scene = scene();
        let mut history = HistoryManager::new(10);
        let create = CreateEntityCommand::from_options(
            EntityOptions::shape(ShapeType::Sphere).with_name("Ball").at([4.0, 0.0, 0.0]),
        );
        history.execute(Box::new(create), &mut scene).unwrap();
        let uuid = scene.entities().next().unwrap().uuid();
        let before = scene.serialize_entity(uuid).unwrap();

        history.undo(&mut scene).unwrap();
        assert!(!scene.contains(uuid));
        history.redo(&mut scene).unwrap();

        assert_eq!(scene.serialize_entity(uuid).unwrap(), before);
        scene.verify_consistency().unwrap();
    }

    #[test]
    fn test_undo_delete_restores_same_instance() {
        let mut scene = scene();
        let mut history = HistoryManager::new(10);
        let uuid = scene.spawn(EntityOptions::shape(ShapeType::Cone)).unwrap();
        let root = scene.entity(uuid).unwrap().root();

        history
            .execute(Box::new(DeleteEntityCommand::new(uuid)), &mut scene)
            .unwrap();
        assert!(scene.graph().contains(root), "held, not destroyed");
        history.undo(&mut scene).unwrap();

        assert_eq!(scene.entity(uuid).unwrap().root(), root);
        scene.verify_consistency().unwrap();
    }

    #[test]
    fn test_discarded_delete_disposes_entity() {
        let mut scene = scene();
        let mut history = HistoryManager::new(1);
        let uuid = scene.spawn(EntityOptions::shape(ShapeType::Cube)).unwrap();
        let root = scene.entity(uuid).unwrap().root();

        history
            .execute(Box::new(DeleteEntityCommand::new(uuid)), &mut scene)
            .unwrap();
        let other = CreateEntityCommand::from_options(EntityOptions::shape(ShapeType::Plane));
        history.execute(Box::new(other), &mut scene).unwrap();

        assert!(!scene.graph().contains(root));
    }

    #[test]
    fn test_bone_transform_only_rotates() {
        let mut scene = scene();
        let character = loaded_character(&mut scene);
        let bone = SelectionTarget::Bone { character, index: 0 };
        let start = scene.target_transform(bone).unwrap();

        let turned = Transform {
            translation: Vec3::splat(9.0),
            rotation: Quat::from_rotation_z(0.5),
            scale: Vec3::splat(2.0),
        };
        let mut command = TransformCommand::from_states(bone, start, turned);
        command.execute(&mut scene).unwrap();

        let applied = scene.target_transform(bone).unwrap();
        assert_eq!(applied.translation, start.translation);
        assert_eq!(applied.rotation, turned.rotation);
        command.undo(&mut scene).unwrap();
        assert_eq!(scene.target_transform(bone).unwrap(), start);
    }

    #[tokio::test]
    async fn test_async_create_handle_resolves_on_settle() {
        let mut scene = scene();
        let mut history = HistoryManager::new(10);
        let props = Basic3DProps {
            model_url: "mem://1/chair.glb".to_string(),
            ..Basic3DProps::default()
        };
        let command = CreateEntityAsyncCommand::from_options(EntityOptions::new(
            EntityProps::Basic3D(props),
        ));
        let mut handle = command.handle();
        history.execute(Box::new(command), &mut scene).unwrap();
        assert_eq!(handle.entity(), None);
        let uuid = history.awaiting_entity().unwrap();

        // A move submitted meanwhile waits
        let shape = CreateEntityCommand::from_options(EntityOptions::shape(ShapeType::Cube));
        assert_eq!(
            history.execute(Box::new(shape), &mut scene).unwrap(),
            HistoryOutcome::Queued
        );
        assert_eq!(scene.len(), 1);

        finish_loads(&mut scene, |_| Err("offline".to_string()));
        assert!(history.settle(uuid, &mut scene));

        assert_eq!(handle.wait().await, Some(uuid));
        assert_eq!(scene.len(), 2);
        assert_eq!(history.undo_count(), 2);
    }

    #[test]
    fn test_duplicate_gets_fresh_identity() {
        let mut scene = scene();
        let mut history = HistoryManager::new(10);
        let source = scene
            .spawn(EntityOptions::shape(ShapeType::Cube).with_name("Box").at([1.0, 0.0, 0.0]))
            .unwrap();

        let command = DuplicateEntityCommand::new(source);
        let handle = command.handle();
        history.execute(Box::new(command), &mut scene).unwrap();

        let copy = handle.entity().unwrap();
        assert_ne!(copy, source);
        let copy = scene.entity(copy).unwrap();
        assert_eq!(copy.name(), "Box copy");
        assert_eq!(copy.transform(scene.graph()).translation, Vec3::X);

        history.undo(&mut scene).unwrap();
        assert_eq!(scene.len(), 1);
    }
}
