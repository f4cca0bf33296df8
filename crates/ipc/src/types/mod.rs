//! Type definitions shared by the editor core and its observers.

mod entity;
mod generation;
mod project;
mod scene;
mod settings;

pub use entity::*;
pub use generation::*;
pub use project::*;
pub use scene::*;
pub use settings::*;
