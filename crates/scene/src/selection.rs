//! Selection state and gizmo coordination
//!
//! The manager tracks one primary selection and, while a sub-part is being
//! edited, the parent it belongs to. Which targets count as sub-parts of
//! which is decided by a table of relation predicates so new kinds can be
//! added with [`SelectionManager::register_relation`].

use mud_ipc::{EditorEvent, SelectionTarget};
use thiserror::Error;
use tracing::debug;

use crate::graph::NodeId;
use crate::registry::SceneContext;
use crate::transform_control::TransformControlManager;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("selection target {0:?} does not exist")]
    UnknownTarget(SelectionTarget),
}

/// Returns true if `child` is a sub-part of `parent`
pub type ChildRelation = fn(child: &SelectionTarget, parent: &SelectionTarget) -> bool;

fn bone_of_character(child: &SelectionTarget, parent: &SelectionTarget) -> bool {
    matches!(
        (child, parent),
        (SelectionTarget::Bone { character, .. }, SelectionTarget::Entity { uuid })
            if character == uuid
    )
}

pub struct SelectionManager {
    current: Option<SelectionTarget>,
    parent: Option<SelectionTarget>,
    relations: Vec<ChildRelation>,
}

impl Default for SelectionManager {
    fn default() -> Self {
        Self {
            current: None,
            parent: None,
            relations: vec![bone_of_character],
        }
    }
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_relation(&mut self, relation: ChildRelation) {
        self.relations.push(relation);
    }

    pub fn current(&self) -> Option<SelectionTarget> {
        self.current
    }

    pub fn parent(&self) -> Option<SelectionTarget> {
        self.parent
    }

    /// True if the entity holds the selection directly or as a parent
    pub fn involves(&self, uuid: uuid::Uuid) -> bool {
        [self.current, self.parent]
            .into_iter()
            .flatten()
            .any(|target| target.owner() == uuid)
    }

    pub fn is_child_of(&self, child: &SelectionTarget, parent: &SelectionTarget) -> bool {
        self.relations.iter().any(|relation| relation(child, parent))
    }

    /// Select a target, or deselect everything with `None`
    pub fn select(
        &mut self,
        target: Option<SelectionTarget>,
        scene: &mut SceneContext,
        gizmo: &mut TransformControlManager,
    ) -> Result<(), SelectionError> {
        if let Some(target) = target.filter(|t| !scene.resolves(*t)) {
            return Err(SelectionError::UnknownTarget(target));
        }

        let previous = self.current.take();
        match (target, previous) {
            (Some(next), Some(prev)) if self.is_child_of(&next, &prev) => {
                // The outgoing selection stays active as the parent
                self.parent = Some(prev);
            }
            (Some(next), Some(prev))
                if self
                    .parent
                    .is_some_and(|parent| self.is_child_of(&next, &parent)) =>
            {
                notify_deselect(scene, prev);
            }
            _ => {
                if let Some(prev) = previous {
                    notify_deselect(scene, prev);
                }
                if let Some(parent) = self.parent.take().filter(|p| Some(*p) != previous) {
                    notify_deselect(scene, parent);
                }
            }
        }

        let (graph, events) = scene.graph_and_events();
        gizmo.attach_to(None, graph, events);

        if let Some(target) = target {
            let aim = scene.selectable_mut(target).map(|(selectable, graph)| {
                let config = selectable.selection_config();
                let node = selectable.gizmo_target();
                selectable.on_select(graph);
                (config, node)
            });
            if let Some((config, node)) = aim {
                gizmo.configure(&config, &mut scene.events);
                let (graph, events) = scene.graph_and_events();
                gizmo.attach_to(Some(node), graph, events);
            }
            self.current = Some(target);
            debug!("Selected {:?} (parent {:?})", target, self.parent);
        }

        scene.events.send(EditorEvent::SelectionChanged {
            selected: self.current,
            parent: self.parent,
        });
        Ok(())
    }

    /// Drop selections whose targets disappeared and re-aim the gizmo at
    /// the current target's node if it moved (e.g. after a reload)
    pub fn reconcile(&mut self, scene: &mut SceneContext, gizmo: &mut TransformControlManager) {
        let current_ok = self.current.is_none_or(|t| scene.resolves(t));
        let parent_ok = self.parent.is_none_or(|t| scene.resolves(t));

        if current_ok && parent_ok {
            let node = self.current.and_then(|target| gizmo_node(scene, target));
            if node != gizmo.attached() {
                let (graph, events) = scene.graph_and_events();
                gizmo.attach_to(node, graph, events);
            }
            return;
        }

        debug!("Selection target vanished, deselecting");
        for target in [self.current.take(), self.parent.take()].into_iter().flatten() {
            if scene.resolves(target) {
                notify_deselect(scene, target);
            }
        }
        let (graph, events) = scene.graph_and_events();
        gizmo.attach_to(None, graph, events);
        scene.events.send(EditorEvent::SelectionChanged {
            selected: None,
            parent: None,
        });
    }
}

fn notify_deselect(scene: &mut SceneContext, target: SelectionTarget) {
    if let Some((selectable, graph)) = scene.selectable_mut(target) {
        selectable.on_deselect(graph);
    }
}

fn gizmo_node(scene: &mut SceneContext, target: SelectionTarget) -> Option<NodeId> {
    scene
        .selectable_mut(target)
        .map(|(selectable, _)| selectable.gizmo_target())
}
