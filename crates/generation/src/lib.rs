//! Asset generation for the mud editor
//!
//! Image diffusion and image-to-3D conversion are external services. The editor
//! core talks to all of them through [`GenerationProvider`]: success yields an
//! asset (a URL, or inline bytes the core stores itself), failure yields a
//! [`GenerationError`] and nothing else.

mod cancel;
mod remote;
mod scripted;

pub use cancel::CancellationToken;
pub use remote::RemoteProvider;
pub use scripted::{RecordedRequest, ScriptedProvider, ScriptedResponse};

use mud_ipc::{ImageParams, ModelParams};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing or invalid credentials for {0}")]
    Credentials(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Progress callback type, called with a fraction in 0.0..=1.0
pub type ProgressCallback = Box<dyn Fn(f32) + Send + Sync>;

/// Text-to-image request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub params: ImageParams,
    pub width: u32,
    pub height: u32,
}

impl ImageRequest {
    /// Request sized from the aspect ratio, long edge 1024
    pub fn new(prompt: impl Into<String>, params: ImageParams) -> Self {
        let (width, height) = params.ratio.dimensions(1024);
        Self {
            prompt: prompt.into(),
            params,
            width,
            height,
        }
    }
}

/// Image-to-3D request
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Source image, as recorded in the generation log
    pub image_url: String,
    pub params: ModelParams,
}

/// A generated asset as returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedAsset {
    /// The provider already stored the asset somewhere the editor can read
    Url(String),
    /// Raw bytes the editor must store before recording them
    Inline { bytes: Vec<u8>, file_name: String },
}

/// Trait for generation backends
#[allow(async_fn_in_trait)]
pub trait GenerationProvider {
    /// Short name used in logs and credential lookup
    fn name(&self) -> &str;

    /// Generate an image from a prompt
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedAsset, GenerationError>;

    /// Convert a previously generated image into a 3D model
    async fn convert_image_to_3d(
        &self,
        request: &ModelRequest,
    ) -> Result<GeneratedAsset, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mud_ipc::AspectRatio;

    #[test]
    fn test_image_request_sized_from_ratio() {
        let request = ImageRequest::new(
            "a red ball",
            ImageParams {
                ratio: AspectRatio::Wide,
                ..Default::default()
            },
        );
        assert_eq!((request.width, request.height), (1024, 576));
    }
}
