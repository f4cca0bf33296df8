//! Command vocabulary the UI uses to drive the editor.

mod gizmo;

pub use gizmo::*;
