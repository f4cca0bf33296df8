//! Deterministic provider that replays canned responses.
//!
//! Used by tests and by headless tooling that must not reach the network.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{GeneratedAsset, GenerationError, GenerationProvider, ImageRequest, ModelRequest};

/// One queued reply
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Respond(Result<GeneratedAsset, GenerationError>),
    /// Never resolves; only cancellation ends the request
    Hang,
}

impl ScriptedResponse {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Respond(Ok(GeneratedAsset::Url(url.into())))
    }

    pub fn fail(error: GenerationError) -> Self {
        Self::Respond(Err(error))
    }
}

/// Request as seen by a [`ScriptedProvider`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    Image(ImageRequest),
    Model(ModelRequest),
}

#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: ScriptedResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    async fn reply(&self, request: RecordedRequest) -> Result<GeneratedAsset, GenerationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());
        match next {
            Some(ScriptedResponse::Respond(result)) => result,
            Some(ScriptedResponse::Hang) => std::future::pending().await,
            None => Err(GenerationError::Generation(
                "scripted provider has no response queued".into(),
            )),
        }
    }
}

impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedAsset, GenerationError> {
        self.reply(RecordedRequest::Image(request.clone())).await
    }

    async fn convert_image_to_3d(
        &self,
        request: &ModelRequest,
    ) -> Result<GeneratedAsset, GenerationError> {
        self.reply(RecordedRequest::Model(request.clone())).await
    }
}
