//! Remote generation server client

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::{
    GeneratedAsset, GenerationError, GenerationProvider, ImageRequest, ModelRequest,
    ProgressCallback,
};

/// Generation client that talks to a WebSocket server.
///
/// One connection per request. The server streams JSON progress frames and
/// finishes with either a JSON `{"assetUrl": ...}` frame or a binary frame
/// holding the asset itself.
pub struct RemoteProvider {
    server_url: String,
    api_key: Option<String>,
    on_progress: Option<ProgressCallback>,
}

impl RemoteProvider {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: None,
            on_progress: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    async fn run(&self, request: WireRequest<'_>) -> Result<GeneratedAsset, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GenerationError::Credentials(self.server_url.clone()));
        };

        let (ws_stream, _) = connect_async(self.server_url.as_str())
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        let request_json = serde_json::to_string(&WireEnvelope {
            api_key,
            request: &request,
        })
        .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        write
            .send(Message::Text(request_json.into()))
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                    Ok(ServerFrame::Progress { progress }) => {
                        debug!("Generation progress {:.0}%", progress * 100.0);
                        if let Some(ref callback) = self.on_progress {
                            callback(progress);
                        }
                    }
                    Ok(ServerFrame::Complete { asset_url }) => {
                        return Ok(GeneratedAsset::Url(asset_url));
                    }
                    Ok(ServerFrame::Failed { error }) => {
                        return Err(classify_server_error(error));
                    }
                    Err(e) => warn!("Ignoring unrecognised server frame: {}", e),
                },
                Ok(Message::Binary(data)) => {
                    return Ok(GeneratedAsset::Inline {
                        file_name: inline_file_name(&request, &data),
                        bytes: data.to_vec(),
                    });
                }
                Ok(Message::Close(_)) => break,
                Err(e) => return Err(GenerationError::Connection(e.to_string())),
                _ => {}
            }
        }

        Err(GenerationError::InvalidResponse("No asset received".into()))
    }
}

impl GenerationProvider for RemoteProvider {
    fn name(&self) -> &str {
        "remote"
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedAsset, GenerationError> {
        self.run(WireRequest::Image {
            prompt: &request.prompt,
            negative_prompt: request.params.negative_prompt.as_deref(),
            width: request.width,
            height: request.height,
            seed: request.params.seed,
        })
        .await
    }

    async fn convert_image_to_3d(
        &self,
        request: &ModelRequest,
    ) -> Result<GeneratedAsset, GenerationError> {
        self.run(WireRequest::Model {
            image_url: &request.image_url,
            api_provider: request.params.api_provider,
        })
        .await
    }
}

fn classify_server_error(error: String) -> GenerationError {
    if error.to_ascii_lowercase().contains("unauthorized") {
        GenerationError::Credentials(error)
    } else {
        GenerationError::Generation(error)
    }
}

/// Name for a binary payload: images keep their detected format, models are GLB
fn inline_file_name(request: &WireRequest<'_>, data: &[u8]) -> String {
    match request {
        WireRequest::Image { .. } => {
            let extension = image::guess_format(data)
                .ok()
                .and_then(|format| format.extensions_str().first().copied())
                .unwrap_or("png");
            format!("generated.{extension}")
        }
        WireRequest::Model { .. } => "generated.glb".to_string(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope<'a> {
    api_key: &'a str,
    request: &'a WireRequest<'a>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum WireRequest<'a> {
    #[serde(rename_all = "camelCase")]
    Image {
        prompt: &'a str,
        negative_prompt: Option<&'a str>,
        width: u32,
        height: u32,
        seed: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    Model {
        image_url: &'a str,
        api_provider: mud_ipc::ModelApiProvider,
    },
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum ServerFrame {
    Progress { progress: f32 },
    #[serde(rename_all = "camelCase")]
    Complete { asset_url: String },
    Failed { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_fails_before_connecting() {
        let provider = RemoteProvider::new("ws://127.0.0.1:9");
        let request = ImageRequest::new("a chair", Default::default());
        let result = provider.generate_image(&request).await;
        assert!(matches!(result, Err(GenerationError::Credentials(_))));
    }

    #[test]
    fn test_server_frames_parse() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"status":"complete","assetUrl":"mem://a.png"}"#).unwrap();
        assert!(matches!(frame, ServerFrame::Complete { asset_url } if asset_url == "mem://a.png"));

        let frame: ServerFrame =
            serde_json::from_str(r#"{"status":"progress","progress":0.5}"#).unwrap();
        assert!(matches!(frame, ServerFrame::Progress { progress } if progress == 0.5));
    }

    #[test]
    fn test_unauthorized_maps_to_credentials() {
        assert!(matches!(
            classify_server_error("401 Unauthorized".to_string()),
            GenerationError::Credentials(_)
        ));
        assert!(matches!(
            classify_server_error("CUDA out of memory".to_string()),
            GenerationError::Generation(_)
        ));
    }

    #[test]
    fn test_inline_model_payload_named_glb() {
        let request = WireRequest::Model {
            image_url: "mem://a.png",
            api_provider: Default::default(),
        };
        assert_eq!(inline_file_name(&request, b"glTF"), "generated.glb");
    }
}
