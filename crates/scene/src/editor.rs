//! The editor context
//!
//! [`Editor`] is the explicit handle the rest of the application talks to.
//! It owns the scene, the selection, the gizmo, the history and the project
//! state, and routes every user action through the history so undo stays
//! exact.

use std::path::{Path, PathBuf};

use glam::Vec3;
use mud_config::EditorConfig;
use mud_generation::GenerationProvider;
use mud_ipc::{EditorEvent, GizmoMode, ImageParams, ModelParams, ProjectData, SelectionTarget};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::{GenerationFailure, GenerationJob, GenerationOutcome};
use crate::events::EventQueue;
use crate::factory::EntityOptions;
use crate::graph::{MemorySceneGraph, SceneGraph, Transform};
use crate::history::{
    AsyncEntityHandle, CreateEntityAsyncCommand, DeleteEntityCommand, DuplicateEntityCommand,
    HistoryManager, HistoryOutcome, TransformCommand,
};
use crate::jobs::{AssetLoadJob, AssetLoadResult};
use crate::project::{
    LoadReport, ProjectError, ProjectManager, SUPPORTED_MAJOR_VERSION, read_project_file,
};
use crate::registry::{CommandError, ConsistencyError, SceneContext};
use crate::selection::{SelectionError, SelectionManager};
use crate::storage::FileStore;
use crate::transform_control::{GizmoError, TransformControlManager};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Gizmo(#[from] GizmoError),

    #[error(transparent)]
    Generation(#[from] GenerationFailure),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("nothing is selected")]
    NothingSelected,
}

pub struct Editor {
    config: EditorConfig,
    scene: SceneContext,
    selection: SelectionManager,
    gizmo: TransformControlManager,
    history: HistoryManager,
    project: ProjectManager,
    /// Created entity to select once its creation settles
    select_when_ready: Option<AsyncEntityHandle>,
    drag_target: Option<SelectionTarget>,
}

impl Editor {
    pub fn new(config: EditorConfig, graph: Box<dyn SceneGraph>) -> Self {
        Self::with_scene(config, SceneContext::new(graph))
    }

    /// Editor over an in-memory scene graph
    pub fn headless(config: EditorConfig) -> Self {
        Self::new(config, Box::new(MemorySceneGraph::new()))
    }

    pub fn with_scene(config: EditorConfig, scene: SceneContext) -> Self {
        Self {
            gizmo: TransformControlManager::new(&config),
            history: HistoryManager::new(config.max_history),
            selection: SelectionManager::new(),
            project: ProjectManager::new(),
            scene,
            config,
            select_when_ready: None,
            drag_target: None,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneContext {
        &self.scene
    }

    /// Direct access for non-undoable edits (light color, animation)
    pub fn scene_mut(&mut self) -> &mut SceneContext {
        &mut self.scene
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionManager {
        &mut self.selection
    }

    pub fn gizmo(&self) -> &TransformControlManager {
        &self.gizmo
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn project(&self) -> &ProjectManager {
        &self.project
    }

    pub fn project_mut(&mut self) -> &mut ProjectManager {
        &mut self.project
    }

    pub fn events(&mut self) -> &mut EventQueue {
        &mut self.scene.events
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        self.scene.events.drain()
    }

    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        self.scene.verify_consistency()
    }

    // Entity commands

    /// Create an entity and select it once it is ready
    pub fn create_entity(&mut self, options: EntityOptions) -> Result<AsyncEntityHandle, EditorError> {
        let command = CreateEntityAsyncCommand::from_options(options);
        let handle = command.handle();
        self.history.execute(Box::new(command), &mut self.scene)?;
        self.select_when_ready = Some(handle.clone());
        self.after_history_change();
        Ok(handle)
    }

    pub fn duplicate_entity(&mut self, source: Uuid) -> Result<AsyncEntityHandle, EditorError> {
        if !self.scene.contains(source) {
            return Err(CommandError::EntityNotFound(source).into());
        }
        let command = DuplicateEntityCommand::new(source);
        let handle = command.handle();
        self.history.execute(Box::new(command), &mut self.scene)?;
        self.select_when_ready = Some(handle.clone());
        self.after_history_change();
        Ok(handle)
    }

    pub fn delete_entity(&mut self, uuid: Uuid) -> Result<HistoryOutcome, EditorError> {
        if !self.scene.contains(uuid) {
            return Err(CommandError::EntityNotFound(uuid).into());
        }
        if self.selection.involves(uuid) {
            self.cancel_drag_if_any();
            self.selection.select(None, &mut self.scene, &mut self.gizmo)?;
        }
        let outcome = self
            .history
            .execute(Box::new(DeleteEntityCommand::new(uuid)), &mut self.scene)?;
        self.after_history_change();
        Ok(outcome)
    }

    /// Set a transform as one undoable step
    pub fn transform_entity(
        &mut self,
        target: SelectionTarget,
        transform: Transform,
    ) -> Result<HistoryOutcome, EditorError> {
        let before = self.scene.target_transform(target)?;
        let command = TransformCommand::from_states(target, before, transform);
        let outcome = self.history.execute(Box::new(command), &mut self.scene)?;
        self.after_history_change();
        Ok(outcome)
    }

    // Selection and gizmo

    /// Explicit selection; also drops any pending select of a new entity
    pub fn select(&mut self, target: Option<SelectionTarget>) -> Result<(), EditorError> {
        self.cancel_drag_if_any();
        self.select_when_ready = None;
        self.selection.select(target, &mut self.scene, &mut self.gizmo)?;
        Ok(())
    }

    /// Select whatever the ray hits first; a miss deselects all
    pub fn pick(&mut self, origin: Vec3, direction: Vec3) -> Result<Option<SelectionTarget>, EditorError> {
        let target = self
            .scene
            .graph()
            .pick_by_ray(origin, direction)
            .and_then(|node| self.scene.target_for_node(node));
        debug!("Pick hit {:?}", target);
        self.select(target)?;
        Ok(target)
    }

    pub fn set_gizmo_mode(&mut self, mode: GizmoMode) -> GizmoMode {
        self.gizmo.set_mode(mode, &mut self.scene.events)
    }

    pub fn begin_transform(&mut self) -> Result<Transform, EditorError> {
        let target = self.selection.current().ok_or(EditorError::NothingSelected)?;
        let (graph, events) = self.scene.graph_and_events();
        let start = self.gizmo.begin_drag(&*graph, events)?;
        self.drag_target = Some(target);
        self.scene.events.send(EditorEvent::TransformStarted { target });
        Ok(start)
    }

    /// Move the selection toward `proposed` within the active gizmo mode
    pub fn drag_transform(&mut self, proposed: Transform) -> Result<Transform, EditorError> {
        Ok(self.gizmo.drag_to(self.scene.graph_mut(), proposed)?)
    }

    /// Finish the drag; records one transform command if anything moved
    pub fn end_transform(&mut self) -> Result<bool, EditorError> {
        let target = self.drag_target.take();
        let (graph, events) = self.scene.graph_and_events();
        let result = self.gizmo.end_drag(&*graph, events)?;
        let Some(target) = target else {
            return Ok(false);
        };
        let changed = result.changed();
        if changed {
            let command = TransformCommand::from_states(target, result.before, result.after);
            self.history.push(Box::new(command), &mut self.scene)?;
        }
        self.scene
            .events
            .send(EditorEvent::TransformEnded { target, changed });
        self.after_history_change();
        Ok(changed)
    }

    pub fn cancel_transform(&mut self) -> Result<(), EditorError> {
        self.abort_drag()?;
        self.select_pending();
        Ok(())
    }

    fn abort_drag(&mut self) -> Result<(), EditorError> {
        let target = self.drag_target.take();
        let (graph, events) = self.scene.graph_and_events();
        self.gizmo.cancel_drag(graph, events)?;
        if let Some(target) = target {
            self.scene.events.send(EditorEvent::TransformEnded {
                target,
                changed: false,
            });
        }
        Ok(())
    }

    fn cancel_drag_if_any(&mut self) {
        if self.gizmo.is_dragging() {
            debug!("Cancelling drag in progress");
            if let Err(e) = self.abort_drag() {
                debug!("Drag cancel failed: {}", e);
            }
        }
    }

    /// Close out `drag_target` when the gizmo dropped the drag on its own
    fn sync_drag_target(&mut self) {
        if self.gizmo.is_dragging() {
            return;
        }
        if let Some(target) = self.drag_target.take() {
            debug!("Drag on {:?} ended by a selection change", target);
            self.scene.events.send(EditorEvent::TransformEnded {
                target,
                changed: false,
            });
        }
    }

    // History

    pub fn undo(&mut self) -> Result<HistoryOutcome, EditorError> {
        self.cancel_drag_if_any();
        let outcome = self.history.undo(&mut self.scene);
        self.after_history_change();
        Ok(outcome?)
    }

    pub fn redo(&mut self) -> Result<HistoryOutcome, EditorError> {
        self.cancel_drag_if_any();
        let outcome = self.history.redo(&mut self.scene);
        self.after_history_change();
        Ok(outcome?)
    }

    fn after_history_change(&mut self) {
        self.selection.reconcile(&mut self.scene, &mut self.gizmo);
        self.select_pending();
        self.sync_drag_target();
        self.scene.events.send(EditorEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    /// Select a newly created entity once it exists. Waits while a drag is
    /// in progress so the drag is never cut short.
    fn select_pending(&mut self) {
        if self.gizmo.is_dragging() {
            return;
        }
        if let Some(uuid) = self
            .select_when_ready
            .as_ref()
            .and_then(AsyncEntityHandle::entity)
        {
            self.select_when_ready = None;
            if self.scene.contains(uuid) {
                if let Err(e) = self.selection.select(
                    Some(SelectionTarget::entity(uuid)),
                    &mut self.scene,
                    &mut self.gizmo,
                ) {
                    debug!("Could not select new entity: {}", e);
                }
            }
        }
    }

    // Asset loading

    pub fn take_load_jobs(&mut self) -> Vec<AssetLoadJob> {
        self.scene.take_load_jobs()
    }

    /// Install a finished load; returns false if it was stale
    pub fn finish_load(&mut self, result: AssetLoadResult) -> bool {
        let entity = result.job.entity;
        if !self.scene.finish_load(result) {
            return false;
        }
        if self.history.settle(entity, &mut self.scene) {
            self.after_history_change();
        } else {
            self.selection.reconcile(&mut self.scene, &mut self.gizmo);
            self.sync_drag_target();
        }
        true
    }

    // Generation

    pub fn start_image_generation(
        &mut self,
        uuid: Uuid,
        prompt: &str,
        params: ImageParams,
    ) -> Result<GenerationJob, EditorError> {
        let mut generative = self
            .scene
            .generative_mut(uuid)
            .ok_or(GenerationFailure::NotGenerative(uuid))?;
        Ok(generative.begin_image_generation(prompt, params)?)
    }

    pub fn start_model_generation(
        &mut self,
        uuid: Uuid,
        source_id: &str,
        params: ModelParams,
    ) -> Result<GenerationJob, EditorError> {
        let mut generative = self
            .scene
            .generative_mut(uuid)
            .ok_or(GenerationFailure::NotGenerative(uuid))?;
        Ok(generative.begin_model_generation(source_id, params)?)
    }

    /// Record a finished generation job; returns the new log id.
    /// Results for an entity that has since been removed are discarded.
    pub fn finish_generation(&mut self, outcome: GenerationOutcome) -> Result<String, EditorError> {
        let uuid = outcome.entity;
        if !self.scene.contains(uuid) {
            debug!("Discarding generation {} for removed entity {}", outcome.ticket, uuid);
            return Err(GenerationFailure::Stale(outcome.ticket).into());
        }
        let mut generative = self
            .scene
            .generative_mut(uuid)
            .ok_or(GenerationFailure::NotGenerative(uuid))?;
        let id = generative.complete_generation(outcome)?;
        self.selection.reconcile(&mut self.scene, &mut self.gizmo);
        self.sync_drag_target();
        Ok(id)
    }

    pub fn cancel_generation(&mut self, uuid: Uuid) -> bool {
        self.scene
            .generative_mut(uuid)
            .is_some_and(|mut generative| generative.cancel_generation())
    }

    pub fn go_to_previous_generation(&mut self, uuid: Uuid) -> Result<bool, EditorError> {
        let mut generative = self
            .scene
            .generative_mut(uuid)
            .ok_or(GenerationFailure::NotGenerative(uuid))?;
        Ok(generative.go_to_previous_generation())
    }

    pub fn go_to_next_generation(&mut self, uuid: Uuid) -> Result<bool, EditorError> {
        let mut generative = self
            .scene
            .generative_mut(uuid)
            .ok_or(GenerationFailure::NotGenerative(uuid))?;
        Ok(generative.go_to_next_generation())
    }

    /// Generate an image for an entity and record it.
    ///
    /// Holds the editor for the whole provider round trip, which suits the
    /// CLI and tests. Interactive hosts use [`Editor::start_image_generation`]
    /// and [`Editor::finish_generation`] so the editor stays usable while the
    /// job runs.
    pub async fn generate_realtime_image<P, S>(
        &mut self,
        uuid: Uuid,
        prompt: &str,
        params: ImageParams,
        provider: &P,
        store: &S,
    ) -> Result<String, EditorError>
    where
        P: GenerationProvider,
        S: FileStore,
    {
        let job = self.start_image_generation(uuid, prompt, params)?;
        let outcome = job.run(provider, store).await;
        self.finish_generation(outcome)
    }

    /// Convert one of the entity's images into a model and record it.
    ///
    /// Blocks the editor like [`Editor::generate_realtime_image`]; the
    /// non-blocking path is [`Editor::start_model_generation`] followed by
    /// [`Editor::finish_generation`].
    pub async fn generate_3d_model<P, S>(
        &mut self,
        uuid: Uuid,
        source_id: &str,
        params: ModelParams,
        provider: &P,
        store: &S,
    ) -> Result<String, EditorError>
    where
        P: GenerationProvider,
        S: FileStore,
    {
        let job = self.start_model_generation(uuid, source_id, params)?;
        let outcome = job.run(provider, store).await;
        self.finish_generation(outcome)
    }

    // Projects

    pub fn serialize_project(&self) -> Result<ProjectData, EditorError> {
        Ok(self.project.serialize_project(&self.scene)?)
    }

    /// Replace the scene with a document; history starts over
    pub fn deserialize_project(&mut self, doc: ProjectData) -> Result<LoadReport, EditorError> {
        if doc.major_version() != Some(SUPPORTED_MAJOR_VERSION) {
            return Err(ProjectError::UnsupportedVersion(doc.version).into());
        }
        self.select(None)?;
        self.history.clear(&mut self.scene);
        self.select_when_ready = None;
        let report = self.project.deserialize_project(doc, &mut self.scene)?;
        self.scene.events.send(EditorEvent::ProjectLoaded {
            entity_count: report.loaded.len(),
            skipped: report.skipped.len(),
        });
        self.after_history_change();
        Ok(report)
    }

    pub fn new_project(&mut self) -> Result<(), EditorError> {
        self.deserialize_project(ProjectData::default())?;
        info!("Started a new project");
        Ok(())
    }

    pub async fn save_project_file(&self, path: impl AsRef<Path>) -> Result<PathBuf, EditorError> {
        Ok(self.project.save_project_file(&self.scene, path).await?)
    }

    pub async fn load_project_file(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, EditorError> {
        let doc = read_project_file(path).await?;
        self.deserialize_project(doc)
    }
}

/// Run asset loads against a store until none are pending
pub async fn drive_loads<S: FileStore>(editor: &mut Editor, store: &S) -> usize {
    let mut finished = 0;
    loop {
        let jobs = editor.take_load_jobs();
        if jobs.is_empty() {
            return finished;
        }
        let results = futures_util::future::join_all(jobs.into_iter().map(|job| job.run(store))).await;
        for result in results {
            if editor.finish_load(result) {
                finished += 1;
            }
        }
    }
}
