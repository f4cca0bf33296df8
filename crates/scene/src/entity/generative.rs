//! The AI-authored entity
//!
//! A generative entity carries an append-only list of successful generations
//! and shows whichever one is current. Generation itself runs outside the
//! entity: `begin_*` hands out a [`GenerationJob`] and flips the status, the
//! job runs against a provider, and `complete` records the outcome. Failed,
//! cancelled and stale outcomes never touch the log.

use chrono::Utc;
use mud_generation::{CancellationToken, GenerationError, ImageRequest, ModelRequest};
use mud_ipc::{
    AssetType, EditorEvent, GenerationLog, GenerationStatus, GenerativeProps, ImageParams,
    ModelParams, SerializedEntityData,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AssetFormat, Entity, EntityBase, EntityKind, VisualError, parse_props, spawn_child};
use crate::events::EventQueue;
use crate::factory::FactoryError;
use crate::graph::{NodeDesc, NodeId, NodeKind, SceneGraph};

/// Why a generation did not produce a log entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("a generation is already running on this entity")]
    Busy,

    #[error("{0}")]
    Provider(String),

    #[error("generation cancelled")]
    Cancelled,

    #[error("generation {0} is not an image on this entity")]
    InvalidSource(String),

    #[error("generation ticket {0} is no longer current")]
    Stale(u64),

    #[error("entity {0} is not a generative entity")]
    NotGenerative(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    Image(ImageRequest),
    Model(ModelRequest),
}

/// Work handed out by `begin_*`; run it, then feed the outcome back
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub entity: Uuid,
    pub ticket: u64,
    pub token: CancellationToken,
    pub request: GenerationRequest,
}

/// Result of a finished job: the stored asset URL or the provider error
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub entity: Uuid,
    pub ticket: u64,
    pub result: Result<String, GenerationError>,
}

struct ActiveGeneration {
    ticket: u64,
    token: CancellationToken,
    prompt: String,
    asset_type: AssetType,
    derived_from_id: Option<String>,
    image_params: Option<ImageParams>,
    model_params: Option<ModelParams>,
}

pub struct GenerativeEntity {
    props: GenerativeProps,
    status: GenerationStatus,
    last_error: Option<String>,
    visual: Option<NodeId>,
    active: Option<ActiveGeneration>,
    next_ticket: u64,
}

impl GenerativeEntity {
    pub(crate) fn build(
        graph: &mut dyn SceneGraph,
        data: &SerializedEntityData,
    ) -> Result<Entity, FactoryError> {
        let mut props: GenerativeProps = parse_props(data)?;
        if props.current_index().is_none() && props.current_generation_id.is_some() {
            warn!(
                "Entity {} points at missing generation {:?}; using the latest one",
                data.uuid, props.current_generation_id
            );
        }
        if props.current_index().is_none() {
            props.current_generation_id = props.generation_logs.last().map(|log| log.id.clone());
        }

        let mut base = EntityBase::create(graph, data);
        if let Some(index) = props.current_index() {
            base.request_load(props.generation_logs[index].asset_url.clone());
        }
        Ok(Entity::new(
            base,
            EntityKind::Generative(GenerativeEntity {
                props,
                status: GenerationStatus::Idle,
                last_error: None,
                visual: None,
                active: None,
                next_ticket: 0,
            }),
        ))
    }

    pub fn props(&self) -> &GenerativeProps {
        &self.props
    }

    pub fn generation_logs(&self) -> &[GenerationLog] {
        &self.props.generation_logs
    }

    pub fn current_generation(&self) -> Option<&GenerationLog> {
        self.props
            .current_index()
            .map(|index| &self.props.generation_logs[index])
    }

    pub fn current_index(&self) -> Option<usize> {
        self.props.current_index()
    }

    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    /// Message of the last failed generation, cleared by the next start
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn visual(&self) -> Option<NodeId> {
        self.visual
    }

    pub fn is_generating(&self) -> bool {
        self.active.is_some()
    }

    pub(super) fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
        }
        self.status = GenerationStatus::Idle;
    }

    pub(super) fn forget_visual(&mut self) {
        self.visual = None;
    }

    pub(super) fn apply_asset(
        &mut self,
        graph: &mut dyn SceneGraph,
        root: NodeId,
        url: &str,
        format: AssetFormat,
    ) -> Result<(), VisualError> {
        let kind = match format {
            AssetFormat::Image { width, height } => {
                let (width, height) = plane_size(width, height);
                NodeKind::ImagePlane {
                    url: url.to_string(),
                    width,
                    height,
                }
            }
            AssetFormat::Gltf(_) | AssetFormat::Fbx => NodeKind::Model {
                url: url.to_string(),
            },
        };
        if let Some(old) = self.visual.take() {
            graph.destroy_node(old);
        }
        self.visual = Some(spawn_child(
            graph,
            root,
            NodeDesc::new(format!("{url}#visual"), kind).pickable(0.75),
        )?);
        Ok(())
    }
}

/// Plane size with the long edge at one unit
fn plane_size(width: u32, height: u32) -> (f32, f32) {
    if width == 0 || height == 0 {
        return (1.0, 1.0);
    }
    if width >= height {
        (1.0, height as f32 / width as f32)
    } else {
        (width as f32 / height as f32, 1.0)
    }
}

/// Mutable access to a generative entity together with what its operations
/// touch: its base (for visual swaps), the scene graph and the event queue.
pub struct GenerativeMut<'a> {
    pub(crate) base: &'a mut EntityBase,
    pub(crate) entity: &'a mut GenerativeEntity,
    pub(crate) graph: &'a mut dyn SceneGraph,
    pub(crate) events: &'a mut EventQueue,
}

impl GenerativeMut<'_> {
    pub fn entity(&self) -> &GenerativeEntity {
        self.entity
    }

    /// idle -> generating2D
    pub fn begin_image_generation(
        &mut self,
        prompt: &str,
        params: ImageParams,
    ) -> Result<GenerationJob, GenerationFailure> {
        self.ensure_idle()?;
        let request = ImageRequest::new(prompt, params.clone());
        Ok(self.start(
            GenerationStatus::Generating2D,
            ActiveGeneration {
                ticket: 0,
                token: CancellationToken::new(),
                prompt: prompt.to_string(),
                asset_type: AssetType::Image,
                derived_from_id: None,
                image_params: Some(params),
                model_params: None,
            },
            GenerationRequest::Image(request),
        ))
    }

    /// idle -> generating3D, converting an image generation of this entity
    pub fn begin_model_generation(
        &mut self,
        source_id: &str,
        params: ModelParams,
    ) -> Result<GenerationJob, GenerationFailure> {
        self.ensure_idle()?;
        let source = self
            .entity
            .props
            .log(source_id)
            .filter(|log| log.asset_type == AssetType::Image)
            .ok_or_else(|| GenerationFailure::InvalidSource(source_id.to_string()))?;
        let request = ModelRequest {
            image_url: source.asset_url.clone(),
            params: params.clone(),
        };
        let prompt = source.prompt.clone();
        let image_params = source.image_params.clone();
        Ok(self.start(
            GenerationStatus::Generating3D,
            ActiveGeneration {
                ticket: 0,
                token: CancellationToken::new(),
                prompt,
                asset_type: AssetType::Model,
                derived_from_id: Some(source_id.to_string()),
                image_params,
                model_params: Some(params),
            },
            GenerationRequest::Model(request),
        ))
    }

    fn ensure_idle(&self) -> Result<(), GenerationFailure> {
        if self.entity.active.is_some() || self.entity.status.is_busy() {
            return Err(GenerationFailure::Busy);
        }
        Ok(())
    }

    fn start(
        &mut self,
        status: GenerationStatus,
        mut active: ActiveGeneration,
        request: GenerationRequest,
    ) -> GenerationJob {
        self.entity.next_ticket += 1;
        active.ticket = self.entity.next_ticket;
        let job = GenerationJob {
            entity: self.base.uuid(),
            ticket: active.ticket,
            token: active.token.clone(),
            request,
        };
        self.entity.active = Some(active);
        self.entity.status = status;
        self.entity.last_error = None;
        self.events.send(EditorEvent::GenerationProgress {
            uuid: self.base.uuid(),
            status,
            message: None,
        });
        debug!("Generation {} started on {}", job.ticket, self.base.uuid());
        job
    }

    /// Record a finished job; returns the id of the new log entry
    pub fn complete_generation(
        &mut self,
        outcome: GenerationOutcome,
    ) -> Result<String, GenerationFailure> {
        let ticket = outcome.ticket;
        let Some(active) = self.entity.active.take_if(|active| active.ticket == ticket) else {
            debug!("Discarding stale generation {} on {}", ticket, self.base.uuid());
            return Err(GenerationFailure::Stale(ticket));
        };
        let uuid = self.base.uuid();

        if active.token.is_cancelled() {
            self.entity.status = GenerationStatus::Idle;
            return Err(GenerationFailure::Cancelled);
        }

        match outcome.result {
            Ok(asset_url) => {
                let log = GenerationLog {
                    id: Uuid::new_v4().to_string(),
                    timestamp: Utc::now(),
                    prompt: active.prompt,
                    asset_type: active.asset_type,
                    asset_url,
                    derived_from_id: active.derived_from_id,
                    image_params: active.image_params,
                    model_params: active.model_params,
                };
                let id = log.id.clone();
                self.entity.props.generation_logs.push(log);
                self.entity.status = GenerationStatus::Idle;
                let index = self.entity.props.generation_logs.len() - 1;
                self.show(index);
                self.events.send(EditorEvent::GenerationProgress {
                    uuid,
                    status: GenerationStatus::Idle,
                    message: None,
                });
                info!("Generation {} recorded on {}", id, uuid);
                Ok(id)
            }
            Err(GenerationError::Cancelled) => {
                self.entity.status = GenerationStatus::Idle;
                Err(GenerationFailure::Cancelled)
            }
            Err(error) => {
                let message = error.to_string();
                warn!("Generation failed on {}: {}", uuid, message);
                self.entity.status = GenerationStatus::Error;
                self.entity.last_error = Some(message.clone());
                self.events.send(EditorEvent::GenerationProgress {
                    uuid,
                    status: GenerationStatus::Error,
                    message: Some(message.clone()),
                });
                Err(GenerationFailure::Provider(message))
            }
        }
    }

    /// Abort the in-flight generation; returns false when none was running
    pub fn cancel_generation(&mut self) -> bool {
        if self.entity.active.is_none() {
            return false;
        }
        self.entity.cancel_active();
        self.events.send(EditorEvent::GenerationProgress {
            uuid: self.base.uuid(),
            status: GenerationStatus::Idle,
            message: Some("cancelled".to_string()),
        });
        info!("Generation cancelled on {}", self.base.uuid());
        true
    }

    /// Step back one entry; no-op at the first entry
    pub fn go_to_previous_generation(&mut self) -> bool {
        match self.entity.props.current_index() {
            Some(index) if index > 0 => {
                self.show(index - 1);
                true
            }
            _ => false,
        }
    }

    /// Step forward one entry; no-op at the last entry
    pub fn go_to_next_generation(&mut self) -> bool {
        match self.entity.props.current_index() {
            Some(index) if index + 1 < self.entity.props.generation_logs.len() => {
                self.show(index + 1);
                true
            }
            _ => false,
        }
    }

    /// Make an existing entry current; unknown ids are ignored
    pub fn set_current_generation(&mut self, id: &str) -> bool {
        match self
            .entity
            .props
            .generation_logs
            .iter()
            .position(|log| log.id == id)
        {
            Some(index) => {
                if self.entity.props.current_index() != Some(index) {
                    self.show(index);
                }
                true
            }
            None => false,
        }
    }

    /// Make `index` current and swap the visual to its asset
    fn show(&mut self, index: usize) {
        let log = &self.entity.props.generation_logs[index];
        let id = log.id.clone();
        let url = log.asset_url.clone();
        self.entity.props.current_generation_id = Some(id.clone());
        if let Some(old) = self.entity.visual.take() {
            self.graph.destroy_node(old);
        }
        self.base.request_load(url);
        self.events.send(EditorEvent::GenerationChanged {
            uuid: self.base.uuid(),
            generation_id: id,
        });
    }
}
