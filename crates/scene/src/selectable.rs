//! Selectable capability
//!
//! Anything that can receive the transform gizmo implements [`Selectable`]
//! and describes itself with a fixed [`SelectableConfig`].

use mud_ipc::{GizmoMode, GizmoModeSet};
use tracing::debug;

use crate::entity::{BoneControl, Entity, EntityKind};
use crate::graph::{NodeId, SceneGraph};

/// Gizmo capability of a selectable object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectableConfig {
    pub allowed: GizmoModeSet,
    pub default_mode: GizmoMode,
    /// Visual size hint; `None` keeps the editor default
    pub gizmo_size: Option<f32>,
}

const FREE_TRANSFORM: SelectableConfig = SelectableConfig {
    allowed: GizmoModeSet::ALL,
    default_mode: GizmoMode::Position,
    gizmo_size: None,
};

const LIGHT: SelectableConfig = SelectableConfig {
    allowed: GizmoModeSet::only(GizmoMode::Position),
    default_mode: GizmoMode::Position,
    gizmo_size: Some(0.5),
};

const CHARACTER: SelectableConfig = SelectableConfig {
    allowed: GizmoModeSet::only(GizmoMode::Position)
        .with(GizmoMode::Rotation)
        .with(GizmoMode::Scale),
    default_mode: GizmoMode::Position,
    gizmo_size: None,
};

const BONE: SelectableConfig = SelectableConfig {
    allowed: GizmoModeSet::only(GizmoMode::Rotation),
    default_mode: GizmoMode::Rotation,
    gizmo_size: Some(0.3),
};

pub trait Selectable {
    fn selection_config(&self) -> SelectableConfig;

    /// Node the gizmo attaches to
    fn gizmo_target(&self) -> NodeId;

    /// Visual feedback when the object gains the selection
    fn on_select(&mut self, graph: &mut dyn SceneGraph);

    fn on_deselect(&mut self, graph: &mut dyn SceneGraph);
}

fn set_highlight(graph: &mut dyn SceneGraph, node: NodeId, highlighted: bool) {
    if let Err(e) = graph.set_highlighted(node, highlighted) {
        debug!("Could not update highlight: {}", e);
    }
}

impl Selectable for Entity {
    fn selection_config(&self) -> SelectableConfig {
        match self.kind() {
            EntityKind::Shape(_) | EntityKind::Generative(_) | EntityKind::Basic3D(_) => {
                FREE_TRANSFORM
            }
            EntityKind::Light(_) => LIGHT,
            EntityKind::Character(_) => CHARACTER,
        }
    }

    fn gizmo_target(&self) -> NodeId {
        self.root()
    }

    fn on_select(&mut self, graph: &mut dyn SceneGraph) {
        set_highlight(graph, self.highlight_node(), true);
    }

    fn on_deselect(&mut self, graph: &mut dyn SceneGraph) {
        set_highlight(graph, self.highlight_node(), false);
    }
}

impl Selectable for BoneControl {
    fn selection_config(&self) -> SelectableConfig {
        BONE
    }

    fn gizmo_target(&self) -> NodeId {
        self.node()
    }

    fn on_select(&mut self, graph: &mut dyn SceneGraph) {
        set_highlight(graph, self.node(), true);
    }

    fn on_deselect(&mut self, graph: &mut dyn SceneGraph) {
        set_highlight(graph, self.node(), false);
    }
}
