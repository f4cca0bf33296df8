//! Scene-related types shared between the core and its observers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 3D transform with position, rotation, and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub position: [f32; 3],
    pub rotation: [f32; 4], // Quaternion (x, y, z, w)
    pub scale: [f32; 3],
}

impl Default for Transform3D {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

/// Something that can hold the selection: a whole entity, or a sub-part of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SelectionTarget {
    /// A top-level entity
    Entity { uuid: Uuid },
    /// A skeleton joint handle owned by a character entity
    Bone { character: Uuid, index: usize },
}

impl SelectionTarget {
    pub fn entity(uuid: Uuid) -> Self {
        Self::Entity { uuid }
    }

    /// The entity that owns this target (itself for entity targets)
    pub fn owner(&self) -> Uuid {
        match *self {
            Self::Entity { uuid } => uuid,
            Self::Bone { character, .. } => character,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_of_bone_is_character() {
        let character = Uuid::new_v4();
        let bone = SelectionTarget::Bone { character, index: 3 };
        assert_eq!(bone.owner(), character);
        assert_eq!(SelectionTarget::entity(character).owner(), character);
    }

    #[test]
    fn test_selection_target_json_shape() {
        let uuid = Uuid::nil();
        let json = serde_json::to_value(SelectionTarget::entity(uuid)).unwrap();
        assert_eq!(json["kind"], "entity");
        assert_eq!(json["uuid"], uuid.to_string());
    }
}
