//! Errors raised while reading or writing project documents

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("malformed project document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("project document has no version")]
    MissingVersion,
}
