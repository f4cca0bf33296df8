//! Shared data protocol for the mud editor
//!
//! Defines the persisted project document, the per-entity records and props
//! bags, and the events the editor core publishes to the UI.

mod commands;
mod error;
mod messages;
mod types;

pub use commands::*;
pub use error::IpcError;
pub use messages::EditorEvent;
pub use types::*;
