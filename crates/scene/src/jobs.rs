//! Asynchronous work handed out by the core
//!
//! Jobs own everything they need, so they run without borrowing the editor;
//! the results are fed back on the editor's task. Selection, gizmo and undo
//! of other entities stay usable while jobs are in flight.

use mud_generation::{GeneratedAsset, GenerationError, GenerationProvider};
use tracing::debug;
use uuid::Uuid;

use crate::entity::{GenerationJob, GenerationOutcome, GenerationRequest};
use crate::storage::FileStore;

/// Fetch of one entity's visual
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLoadJob {
    pub entity: Uuid,
    pub url: String,
    /// Load generation of the entity when the job was handed out
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetLoadResult {
    pub job: AssetLoadJob,
    pub bytes: Result<Vec<u8>, String>,
}

impl AssetLoadJob {
    pub async fn run<S: FileStore>(self, store: &S) -> AssetLoadResult {
        debug!("Loading {} for {}", self.url, self.entity);
        let bytes = store.read(&self.url).await.map_err(|e| e.to_string());
        AssetLoadResult { job: self, bytes }
    }
}

impl GenerationJob {
    /// Run against a provider. Inline assets are saved to the store first.
    /// Cancelling the job's token drops the provider request.
    pub async fn run<P, S>(self, provider: &P, store: &S) -> GenerationOutcome
    where
        P: GenerationProvider,
        S: FileStore,
    {
        let token = self.token.clone();
        let work = async {
            let asset = match &self.request {
                GenerationRequest::Image(request) => provider.generate_image(request).await?,
                GenerationRequest::Model(request) => provider.convert_image_to_3d(request).await?,
            };
            match asset {
                GeneratedAsset::Url(url) => Ok(url),
                GeneratedAsset::Inline { bytes, file_name } => store
                    .save(&bytes, &file_name)
                    .await
                    .map_err(|e| GenerationError::Generation(format!("could not store asset: {e}"))),
            }
        };

        let result = tokio::select! {
            _ = token.cancelled() => Err(GenerationError::Cancelled),
            result = work => result,
        };
        debug!(
            "Generation job {} via {} finished: ok={}",
            self.ticket,
            provider.name(),
            result.is_ok()
        );
        GenerationOutcome {
            entity: self.entity,
            ticket: self.ticket,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFileStore;
    use mud_generation::{CancellationToken, ImageRequest, ScriptedProvider, ScriptedResponse};
    use mud_ipc::ImageParams;

    fn image_job(token: CancellationToken) -> GenerationJob {
        GenerationJob {
            entity: Uuid::new_v4(),
            ticket: 1,
            token,
            request: GenerationRequest::Image(ImageRequest::new("a red ball", ImageParams::default())),
        }
    }

    #[tokio::test]
    async fn test_inline_asset_is_stored() {
        let store = MemoryFileStore::new();
        let provider = ScriptedProvider::new([ScriptedResponse::Respond(Ok(
            GeneratedAsset::Inline {
                bytes: b"png".to_vec(),
                file_name: "generated.png".to_string(),
            },
        ))]);

        let outcome = image_job(CancellationToken::new()).run(&provider, &store).await;
        let url = outcome.result.unwrap();
        assert_eq!(store.read(&url).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_cancel_aborts_hanging_request() {
        let store = MemoryFileStore::new();
        let provider = ScriptedProvider::new([ScriptedResponse::Hang]);
        let token = CancellationToken::new();
        let job = image_job(token.clone());

        let canceller = async {
            tokio::task::yield_now().await;
            token.cancel();
        };
        let (outcome, ()) = tokio::join!(job.run(&provider, &store), canceller);
        assert_eq!(outcome.result, Err(GenerationError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_asset_reported() {
        let store = MemoryFileStore::new();
        let job = AssetLoadJob {
            entity: Uuid::new_v4(),
            url: "mem://nowhere.glb".to_string(),
            epoch: 1,
        };
        let result = job.run(&store).await;
        assert!(result.bytes.is_err());
    }
}
