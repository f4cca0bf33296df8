//! Scene core of the mud editor
//!
//! Entities on top of a [`SceneGraph`], the selection and gizmo managers,
//! undo/redo history, the entity factory and project (de)serialization.
//! [`Editor`] wires these together; hosts drive it with input and drain
//! [`EventQueue`] for UI updates.

#[cfg(feature = "bevy")]
mod bevy_graph;
mod editor;
pub mod entity;
mod events;
mod factory;
mod graph;
mod history;
mod jobs;
mod project;
mod registry;
mod selectable;
mod selection;
mod storage;
#[cfg(test)]
mod test_support;
mod transform_control;

#[cfg(feature = "bevy")]
pub use bevy_graph::{BevySceneGraph, SceneNode};
pub use editor::{Editor, EditorError, drive_loads};
pub use entity::{
    AnimationError, AssetFormat, BoneControl, Entity, EntityBase, EntityKind, GenerationFailure,
    GenerationJob, GenerationOutcome, LoadCallback, LoadState,
};
pub use events::EventQueue;
pub use factory::{EntityConstructor, EntityFactory, EntityOptions, EntityProps, FactoryError};
pub use graph::{GraphError, MemorySceneGraph, NodeDesc, NodeId, NodeKind, SceneGraph, Transform};
pub use history::{
    AsyncEntityHandle, Command, CreateEntityAsyncCommand, CreateEntityCommand,
    DeleteEntityCommand, DuplicateEntityCommand, EntityBuilder, HistoryManager, HistoryOutcome,
    TransformCommand,
};
pub use jobs::{AssetLoadJob, AssetLoadResult};
pub use project::{
    LoadReport, ProjectError, ProjectManager, SkippedEntity, read_project_file,
    write_project_file,
};
pub use registry::{CommandError, ConsistencyError, SceneContext};
pub use selectable::{Selectable, SelectableConfig};
pub use selection::{ChildRelation, SelectionError, SelectionManager};
pub use storage::{FileStore, LocalFileStore, MemoryFileStore, StoreError};
pub use transform_control::{DragResult, GizmoError, TransformControlManager};
