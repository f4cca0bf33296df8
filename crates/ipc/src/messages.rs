//! Notifications the editor core publishes to its observers (UI panels).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commands::{GizmoMode, GizmoModeSet};
use crate::types::{EntityType, GenerationStatus, SelectionTarget};

/// Messages from the editor core to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EditorEvent {
    /// Primary and parent selection changed
    SelectionChanged {
        selected: Option<SelectionTarget>,
        parent: Option<SelectionTarget>,
    },

    /// Active gizmo mode or its allowed set changed
    GizmoModeChanged {
        mode: GizmoMode,
        allowed: GizmoModeSet,
    },

    /// Camera orbit/pan/zoom suspended (false) or restored (true)
    CameraNavigation { enabled: bool },

    /// A gizmo drag started on a target
    TransformStarted { target: SelectionTarget },

    /// A gizmo drag finished; `changed` is false when nothing moved
    TransformEnded { target: SelectionTarget, changed: bool },

    /// Entity registered in the scene
    EntityAdded { uuid: Uuid, entity_type: EntityType },

    /// Entity unregistered from the scene
    EntityRemoved { uuid: Uuid },

    /// Asset loading for an entity settled
    EntityLoaded {
        uuid: Uuid,
        /// Reason the entity is shown without a visual, if it failed
        degraded: Option<String>,
    },

    /// The current generation of a generative entity changed
    GenerationChanged { uuid: Uuid, generation_id: String },

    /// Generation status update (errors carry a message)
    GenerationProgress {
        uuid: Uuid,
        status: GenerationStatus,
        message: Option<String>,
    },

    /// Undo/redo availability changed
    HistoryChanged { can_undo: bool, can_redo: bool },

    /// A project document finished loading
    ProjectLoaded { entity_count: usize, skipped: usize },

    /// Error notification
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_adjacently_tagged() {
        let event = EditorEvent::CameraNavigation { enabled: false };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CameraNavigation");
        assert_eq!(json["data"]["enabled"], false);
    }
}
