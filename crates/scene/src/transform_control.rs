//! TransformControlManager: the draggable gizmo
//!
//! Holds the active mode and the allowed set, the attached node, and the
//! drag in progress. One drag (begin → any number of updates → end) yields
//! exactly one before/after pair for the history.

use mud_config::EditorConfig;
use mud_ipc::{EditorEvent, GizmoMode, GizmoModeSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::events::EventQueue;
use crate::graph::{GraphError, NodeId, SceneGraph, Transform};
use crate::selectable::SelectableConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GizmoError {
    #[error("gizmo is not attached to anything")]
    Detached,

    #[error("a drag is already in progress")]
    DragInProgress,

    #[error("no drag in progress")]
    NoDrag,

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    node: NodeId,
    start: Transform,
}

/// Transforms captured around one drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragResult {
    pub node: NodeId,
    pub before: Transform,
    pub after: Transform,
}

impl DragResult {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

pub struct TransformControlManager {
    mode: GizmoMode,
    allowed: GizmoModeSet,
    last_used: Option<GizmoMode>,
    attached: Option<NodeId>,
    size: f32,
    default_size: f32,
    drag: Option<DragState>,
    navigation_enabled: bool,
}

impl TransformControlManager {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            mode: config.default_gizmo_mode,
            allowed: GizmoModeSet::ALL,
            last_used: None,
            attached: None,
            size: config.gizmo_size,
            default_size: config.gizmo_size,
            drag: None,
            navigation_enabled: true,
        }
    }

    pub fn mode(&self) -> GizmoMode {
        self.mode
    }

    pub fn allowed_modes(&self) -> GizmoModeSet {
        self.allowed
    }

    pub fn attached(&self) -> Option<NodeId> {
        self.attached
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// False while a drag suspends orbit/pan/zoom
    pub fn camera_navigation_enabled(&self) -> bool {
        self.navigation_enabled
    }

    /// Switch mode. A mode outside the allowed set falls back to the first
    /// allowed mode instead of failing.
    pub fn set_mode(&mut self, mode: GizmoMode, events: &mut EventQueue) -> GizmoMode {
        let chosen = if self.allowed.contains(mode) {
            mode
        } else {
            let fallback = self.allowed.first().unwrap_or(self.mode);
            debug!("Gizmo mode {:?} not allowed, using {:?}", mode, fallback);
            fallback
        };
        self.last_used = Some(chosen);
        self.apply(chosen, self.allowed, events);
        chosen
    }

    /// Replace the allowed set; empty sets are ignored
    pub fn set_allowed_modes(&mut self, modes: GizmoModeSet, events: &mut EventQueue) {
        if modes.is_empty() {
            warn!("Ignoring empty gizmo mode set");
            return;
        }
        let mode = if modes.contains(self.mode) {
            self.mode
        } else {
            modes.first().unwrap_or(self.mode)
        };
        self.apply(mode, modes, events);
    }

    /// Adopt a selectable's capability: allowed set, size, and mode
    /// (its default if allowed, else the last used mode, else the first)
    pub fn configure(&mut self, config: &SelectableConfig, events: &mut EventQueue) {
        let allowed = if config.allowed.is_empty() {
            GizmoModeSet::only(config.default_mode)
        } else {
            config.allowed
        };
        let mode = if allowed.contains(config.default_mode) {
            config.default_mode
        } else {
            self.last_used
                .filter(|mode| allowed.contains(*mode))
                .or_else(|| allowed.first())
                .unwrap_or(config.default_mode)
        };
        self.size = config.gizmo_size.unwrap_or(self.default_size);
        self.apply(mode, allowed, events);
    }

    fn apply(&mut self, mode: GizmoMode, allowed: GizmoModeSet, events: &mut EventQueue) {
        if mode == self.mode && allowed == self.allowed {
            return;
        }
        self.mode = mode;
        self.allowed = allowed;
        events.send(EditorEvent::GizmoModeChanged { mode, allowed });
    }

    /// Attach to a node, or detach with `None`. Any drag is dropped.
    /// Aim the gizmo at a node. A drag on a different node is cancelled
    /// first, so its node goes back to the start transform and camera
    /// navigation is re-enabled with an event.
    pub fn attach_to(
        &mut self,
        node: Option<NodeId>,
        graph: &mut dyn SceneGraph,
        events: &mut EventQueue,
    ) {
        if let Some(drag) = self.drag.filter(|drag| Some(drag.node) != node) {
            debug!("Gizmo re-aimed during a drag on {}, cancelling it", drag.node);
            if let Err(e) = self.cancel_drag(graph, events) {
                debug!("Drag of {} could not be restored: {}", drag.node, e);
            }
        }
        self.attached = node;
    }

    pub fn begin_drag(
        &mut self,
        graph: &dyn SceneGraph,
        events: &mut EventQueue,
    ) -> Result<Transform, GizmoError> {
        let node = self.attached.ok_or(GizmoError::Detached)?;
        if self.drag.is_some() {
            return Err(GizmoError::DragInProgress);
        }
        let start = graph.transform(node).ok_or(GraphError::UnknownNode(node))?;
        self.drag = Some(DragState { node, start });
        self.set_navigation(false, events);
        Ok(start)
    }

    /// Move the attached node toward `proposed`, keeping the components the
    /// active mode does not control
    pub fn drag_to(
        &mut self,
        graph: &mut dyn SceneGraph,
        proposed: Transform,
    ) -> Result<Transform, GizmoError> {
        let drag = self.drag.ok_or(GizmoError::NoDrag)?;
        let current = graph
            .transform(drag.node)
            .ok_or(GraphError::UnknownNode(drag.node))?;
        let next = match self.mode {
            GizmoMode::Position => Transform {
                translation: proposed.translation,
                ..current
            },
            GizmoMode::Rotation => Transform {
                rotation: proposed.rotation,
                ..current
            },
            GizmoMode::Scale => Transform {
                scale: proposed.scale,
                ..current
            },
            GizmoMode::BoundingBox => Transform {
                translation: proposed.translation,
                scale: proposed.scale,
                ..current
            },
        };
        graph.set_transform(drag.node, next)?;
        Ok(next)
    }

    pub fn end_drag(
        &mut self,
        graph: &dyn SceneGraph,
        events: &mut EventQueue,
    ) -> Result<DragResult, GizmoError> {
        let drag = self.drag.take().ok_or(GizmoError::NoDrag)?;
        self.set_navigation(true, events);
        let after = graph
            .transform(drag.node)
            .ok_or(GraphError::UnknownNode(drag.node))?;
        Ok(DragResult {
            node: drag.node,
            before: drag.start,
            after,
        })
    }

    /// Abort the drag and put the node back where it started
    pub fn cancel_drag(
        &mut self,
        graph: &mut dyn SceneGraph,
        events: &mut EventQueue,
    ) -> Result<(), GizmoError> {
        let drag = self.drag.take().ok_or(GizmoError::NoDrag)?;
        self.set_navigation(true, events);
        graph.set_transform(drag.node, drag.start)?;
        Ok(())
    }

    fn set_navigation(&mut self, enabled: bool, events: &mut EventQueue) {
        if self.navigation_enabled != enabled {
            self.navigation_enabled = enabled;
            events.send(EditorEvent::CameraNavigation { enabled });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{MemorySceneGraph, NodeDesc, NodeKind};
    use glam::{Quat, Vec3};

    fn setup() -> (TransformControlManager, MemorySceneGraph, NodeId, EventQueue) {
        let mut graph = MemorySceneGraph::new();
        let node = graph.create_node(NodeDesc::new("n", NodeKind::Group));
        graph.add_node(node, None).unwrap();
        let mut gizmo = TransformControlManager::new(&EditorConfig::default());
        let mut events = EventQueue::default();
        gizmo.attach_to(Some(node), &mut graph, &mut events);
        (gizmo, graph, node, events)
    }

    #[test]
    fn test_invalid_mode_clamped_to_allowed() {
        let (mut gizmo, _, _, mut events) = setup();
        gizmo.set_allowed_modes(GizmoModeSet::only(GizmoMode::Rotation), &mut events);
        assert_eq!(gizmo.mode(), GizmoMode::Rotation);

        for requested in GizmoMode::ALL.into_iter().cycle().take(12) {
            let chosen = gizmo.set_mode(requested, &mut events);
            assert_eq!(chosen, GizmoMode::Rotation);
            assert!(gizmo.allowed_modes().contains(gizmo.mode()));
        }
    }

    #[test]
    fn test_empty_allowed_set_ignored() {
        let (mut gizmo, _, _, mut events) = setup();
        gizmo.set_allowed_modes(GizmoModeSet::EMPTY, &mut events);
        assert_eq!(gizmo.allowed_modes(), GizmoModeSet::ALL);
        assert!(events.is_empty());
    }

    #[test]
    fn test_configure_falls_back_to_last_used() {
        let (mut gizmo, _, _, mut events) = setup();
        gizmo.set_mode(GizmoMode::Scale, &mut events);

        let config = SelectableConfig {
            allowed: GizmoModeSet::only(GizmoMode::Rotation).with(GizmoMode::Scale),
            default_mode: GizmoMode::Position,
            gizmo_size: Some(0.4),
        };
        gizmo.configure(&config, &mut events);
        assert_eq!(gizmo.mode(), GizmoMode::Scale);
        assert_eq!(gizmo.size(), 0.4);
    }

    #[test]
    fn test_position_drag_keeps_rotation_and_scale() {
        let (mut gizmo, mut graph, node, mut events) = setup();
        gizmo.begin_drag(&graph, &mut events).unwrap();
        assert!(!gizmo.camera_navigation_enabled());

        let proposed = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(1.0),
            scale: Vec3::splat(4.0),
        };
        gizmo.drag_to(&mut graph, proposed).unwrap();
        let result = gizmo.end_drag(&graph, &mut events).unwrap();

        assert!(gizmo.camera_navigation_enabled());
        assert_eq!(result.after.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(result.after.rotation, Quat::IDENTITY);
        assert_eq!(result.after.scale, Vec3::ONE);
        assert_eq!(graph.transform(node), Some(result.after));
        assert_eq!(
            events.drain(),
            vec![
                EditorEvent::CameraNavigation { enabled: false },
                EditorEvent::CameraNavigation { enabled: true },
            ]
        );
    }

    #[test]
    fn test_cancel_restores_start() {
        let (mut gizmo, mut graph, node, mut events) = setup();
        let start = gizmo.begin_drag(&graph, &mut events).unwrap();
        gizmo
            .drag_to(&mut graph, Transform::from_translation(Vec3::X))
            .unwrap();
        gizmo.cancel_drag(&mut graph, &mut events).unwrap();
        assert_eq!(graph.transform(node), Some(start));
        assert!(gizmo.camera_navigation_enabled());
    }

    #[test]
    fn test_drag_requires_attachment() {
        let (mut gizmo, mut graph, _, mut events) = setup();
        gizmo.attach_to(None, &mut graph, &mut events);
        assert_eq!(gizmo.begin_drag(&graph, &mut events), Err(GizmoError::Detached));
    }

    #[test]
    fn test_reattach_during_drag_cancels_it() {
        let (mut gizmo, mut graph, node, mut events) = setup();
        let other = graph.create_node(NodeDesc::new("other", NodeKind::Group));
        graph.add_node(other, None).unwrap();

        let start = gizmo.begin_drag(&graph, &mut events).unwrap();
        gizmo
            .drag_to(&mut graph, Transform::from_translation(Vec3::X))
            .unwrap();
        gizmo.attach_to(Some(other), &mut graph, &mut events);

        assert!(!gizmo.is_dragging());
        assert!(gizmo.camera_navigation_enabled());
        assert_eq!(graph.transform(node), Some(start));
        assert_eq!(
            events.drain(),
            vec![
                EditorEvent::CameraNavigation { enabled: false },
                EditorEvent::CameraNavigation { enabled: true },
            ]
        );
    }

    #[test]
    fn test_reattach_same_node_keeps_drag() {
        let (mut gizmo, mut graph, node, mut events) = setup();
        gizmo.begin_drag(&graph, &mut events).unwrap();
        gizmo.attach_to(Some(node), &mut graph, &mut events);
        assert!(gizmo.is_dragging());
        assert!(!gizmo.camera_navigation_enabled());
    }
}
