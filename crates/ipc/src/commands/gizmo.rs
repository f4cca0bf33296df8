//! Gizmo mode types for transform operations.

use serde::{Deserialize, Serialize};

/// Transform gizmo manipulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GizmoMode {
    #[default]
    Position,
    Rotation,
    Scale,
    /// Resize through bounding-box handles (moves and scales)
    BoundingBox,
}

impl GizmoMode {
    /// Canonical ordering; "first allowed mode" follows it
    pub const ALL: [GizmoMode; 4] = [
        GizmoMode::Position,
        GizmoMode::Rotation,
        GizmoMode::Scale,
        GizmoMode::BoundingBox,
    ];

    const fn bit(self) -> u8 {
        match self {
            GizmoMode::Position => 1 << 0,
            GizmoMode::Rotation => 1 << 1,
            GizmoMode::Scale => 1 << 2,
            GizmoMode::BoundingBox => 1 << 3,
        }
    }
}

/// Set of gizmo modes a selectable accepts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<GizmoMode>", into = "Vec<GizmoMode>")]
pub struct GizmoModeSet(u8);

impl GizmoModeSet {
    pub const EMPTY: GizmoModeSet = GizmoModeSet(0);
    pub const ALL: GizmoModeSet = GizmoModeSet(0b1111);

    pub const fn only(mode: GizmoMode) -> Self {
        Self(mode.bit())
    }

    pub const fn with(self, mode: GizmoMode) -> Self {
        Self(self.0 | mode.bit())
    }

    pub const fn contains(self, mode: GizmoMode) -> bool {
        self.0 & mode.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Lowest mode in canonical order
    pub fn first(self) -> Option<GizmoMode> {
        self.iter().next()
    }

    pub fn iter(self) -> impl Iterator<Item = GizmoMode> {
        GizmoMode::ALL.into_iter().filter(move |mode| self.contains(*mode))
    }
}

impl FromIterator<GizmoMode> for GizmoModeSet {
    fn from_iter<I: IntoIterator<Item = GizmoMode>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl From<Vec<GizmoMode>> for GizmoModeSet {
    fn from(modes: Vec<GizmoMode>) -> Self {
        modes.into_iter().collect()
    }
}

impl From<GizmoModeSet> for Vec<GizmoMode> {
    fn from(set: GizmoModeSet) -> Self {
        set.iter().collect()
    }
}

impl std::fmt::Debug for GizmoModeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
