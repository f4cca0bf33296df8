//! Project documents
//!
//! The project manager owns the project-level state that is not an entity
//! (environment, render settings and logs, timeline) and converts between
//! the live scene and a versioned [`ProjectData`] document.

use std::path::{Path, PathBuf};

use chrono::Utc;
use mud_ipc::{
    EnvironmentSettings, IpcError, ProjectData, RenderLog, RenderSettings, SerializedEntityData,
    PROJECT_EXTENSION, PROJECT_VERSION,
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::factory::FactoryError;
use crate::registry::{CommandError, SceneContext};
use crate::storage::{FileStore, StoreError};

/// Major document version this build reads
pub(crate) const SUPPORTED_MAJOR_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Format(#[from] IpcError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unsupported project version {0}")]
    UnsupportedVersion(String),

    #[error(transparent)]
    Serialize(#[from] FactoryError),

    #[error("project file is not valid UTF-8")]
    Encoding,
}

/// Entity left out of a load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntity {
    pub uuid: Uuid,
    pub entity_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<Uuid>,
    pub skipped: Vec<SkippedEntity>,
}

#[derive(Debug, Default)]
pub struct ProjectManager {
    environment: EnvironmentSettings,
    render_settings: RenderSettings,
    render_logs: Vec<RenderLog>,
    timeline: Option<serde_json::Value>,
    /// Entries that could not be built; written back unchanged on save
    unresolved: Vec<SerializedEntityData>,
}

impl ProjectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(&self) -> &EnvironmentSettings {
        &self.environment
    }

    pub fn set_environment(&mut self, environment: EnvironmentSettings) {
        self.environment = environment;
    }

    pub fn render_settings(&self) -> &RenderSettings {
        &self.render_settings
    }

    pub fn set_render_settings(&mut self, settings: RenderSettings) {
        self.render_settings = settings;
    }

    pub fn render_logs(&self) -> &[RenderLog] {
        &self.render_logs
    }

    pub fn add_render_log(&mut self, log: RenderLog) {
        self.render_logs.push(log);
    }

    pub fn unresolved(&self) -> &[SerializedEntityData] {
        &self.unresolved
    }

    /// Snapshot of the scene and project state
    pub fn serialize_project(&self, scene: &SceneContext) -> Result<ProjectData, ProjectError> {
        let mut entities = scene
            .entities()
            .map(|entity| entity.serialize(scene.graph()))
            .collect::<Result<Vec<_>, _>>()?;
        entities.extend(self.unresolved.iter().cloned());

        Ok(ProjectData {
            version: PROJECT_VERSION.to_string(),
            timestamp: Utc::now(),
            entities,
            environment: self.environment.clone(),
            render_settings: self.render_settings.clone(),
            render_logs: self.render_logs.clone(),
            timeline: self.timeline.clone(),
        })
    }

    /// Replace the scene with a document's contents. Entities that fail to
    /// build are skipped and reported; the rest still load.
    pub fn deserialize_project(
        &mut self,
        doc: ProjectData,
        scene: &mut SceneContext,
    ) -> Result<LoadReport, ProjectError> {
        if doc.major_version() != Some(SUPPORTED_MAJOR_VERSION) {
            return Err(ProjectError::UnsupportedVersion(doc.version));
        }

        // Release the old scene before building the new one
        scene.clear();
        self.unresolved.clear();

        self.environment = doc.environment;
        self.render_settings = doc.render_settings;
        self.render_logs = doc.render_logs;
        self.timeline = doc.timeline;

        let mut report = LoadReport::default();
        for data in doc.entities {
            match scene.spawn_from_data(&data) {
                Ok(uuid) => report.loaded.push(uuid),
                Err(e) => {
                    warn!(
                        "Skipping {} entity {} ({}): {}",
                        data.entity_type, data.name, data.uuid, e
                    );
                    report.skipped.push(SkippedEntity {
                        uuid: data.uuid,
                        entity_type: data.entity_type.clone(),
                        reason: e.to_string(),
                    });
                    if !matches!(e, CommandError::DuplicateEntity(_)) {
                        self.unresolved.push(data);
                    }
                }
            }
        }

        info!(
            "Loaded project: {} entities, {} skipped",
            report.loaded.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Write the project to a `.mud` file; returns the path written
    pub async fn save_project_file(
        &self,
        scene: &SceneContext,
        path: impl AsRef<Path>,
    ) -> Result<PathBuf, ProjectError> {
        let doc = self.serialize_project(scene)?;
        write_project_file(&doc, path).await
    }

    pub async fn load_project_file(
        &mut self,
        path: impl AsRef<Path>,
        scene: &mut SceneContext,
    ) -> Result<LoadReport, ProjectError> {
        let doc = read_project_file(path).await?;
        self.deserialize_project(doc, scene)
    }

    /// Save through a file store; returns the stored url
    pub async fn save_project<S: FileStore>(
        &self,
        scene: &SceneContext,
        store: &S,
        name: &str,
    ) -> Result<String, ProjectError> {
        let json = self.serialize_project(scene)?.to_json()?;
        let name = with_project_extension(Path::new(name));
        Ok(store.save(json.as_bytes(), &name.to_string_lossy()).await?)
    }

    pub async fn load_project<S: FileStore>(
        &mut self,
        store: &S,
        url: &str,
        scene: &mut SceneContext,
    ) -> Result<LoadReport, ProjectError> {
        let bytes = store.read(url).await?;
        let json = String::from_utf8(bytes).map_err(|_| ProjectError::Encoding)?;
        self.deserialize_project(ProjectData::from_json(&json)?, scene)
    }
}

fn with_project_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == PROJECT_EXTENSION) {
        path.to_path_buf()
    } else {
        path.with_extension(PROJECT_EXTENSION)
    }
}

/// Write a document, forcing the `.mud` extension
pub async fn write_project_file(
    doc: &ProjectData,
    path: impl AsRef<Path>,
) -> Result<PathBuf, ProjectError> {
    let path = with_project_extension(path.as_ref());
    let json = doc.to_json()?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| ProjectError::Io {
            path: path.clone(),
            source,
        })?;
    info!("Saved project to {}", path.display());
    Ok(path)
}

pub async fn read_project_file(path: impl AsRef<Path>) -> Result<ProjectData, ProjectError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(ProjectData::from_json(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{EntityOptions, EntityProps};
    use crate::storage::MemoryFileStore;
    use crate::test_support::{finish_loads, scene};
    use mud_ipc::{
        AssetType, Basic3DProps, CharacterProps, GenerationLog, GenerativeProps, ImageParams,
        LightProps, ShapeType,
    };

    fn populated_scene() -> SceneContext {
        let mut scene = scene();
        scene
            .spawn(EntityOptions::shape(ShapeType::Pyramid).at([1.0, 2.0, 3.0]))
            .unwrap();
        scene
            .spawn(EntityOptions::new(EntityProps::Light(LightProps {
                color: [1.0, 0.5, 0.0],
                intensity: 2.0,
                shadow_enabled: false,
            })))
            .unwrap();
        scene
            .spawn(EntityOptions::new(EntityProps::Character(CharacterProps {
                current_animation: Some("Walk".to_string()),
                ..CharacterProps::default()
            })))
            .unwrap();
        let log = GenerationLog {
            id: "gen-1".to_string(),
            timestamp: Utc::now(),
            prompt: "a red ball".to_string(),
            asset_type: AssetType::Image,
            asset_url: "mem://0/ball.png".to_string(),
            derived_from_id: None,
            image_params: Some(ImageParams::default()),
            model_params: None,
        };
        scene
            .spawn(EntityOptions::new(EntityProps::Generative(GenerativeProps {
                generation_logs: vec![log],
                current_generation_id: Some("gen-1".to_string()),
            })))
            .unwrap();
        scene
            .spawn(EntityOptions::new(EntityProps::Basic3D(Basic3DProps {
                model_url: "mem://0/chair.glb".to_string(),
                file_name: Some("chair.glb".to_string()),
            })))
            .unwrap();
        scene
    }

    #[test]
    fn test_round_trip_is_stable() {
        let source = populated_scene();
        let manager = ProjectManager::new();
        let first = manager.serialize_project(&source).unwrap();

        let mut target = scene();
        let mut loader = ProjectManager::new();
        let report = loader
            .deserialize_project(ProjectData::from_json(&first.to_json().unwrap()).unwrap(), &mut target)
            .unwrap();
        assert_eq!(report.loaded.len(), 5);
        assert!(report.skipped.is_empty());

        let second = loader.serialize_project(&target).unwrap();
        assert_eq!(second.entities, first.entities);
        assert_eq!(second.environment, first.environment);
        target.verify_consistency().unwrap();
    }

    #[test]
    fn test_failed_assets_still_round_trip() {
        let mut source = populated_scene();
        finish_loads(&mut source, |_| Err("offline".to_string()));
        let manager = ProjectManager::new();
        let doc = manager.serialize_project(&source).unwrap();
        let character = doc.entities.iter().find(|e| e.entity_type == "character").unwrap();
        assert_eq!(character.props["currentAnimation"], "Walk");
    }

    #[test]
    fn test_unknown_type_skipped_and_retained() {
        let mut doc = ProjectManager::new().serialize_project(&populated_scene()).unwrap();
        let mut alien = doc.entities[0].clone();
        alien.uuid = Uuid::new_v4();
        alien.entity_type = "hologram".to_string();
        doc.entities.push(alien.clone());

        let mut target = scene();
        let mut manager = ProjectManager::new();
        let report = manager.deserialize_project(doc, &mut target).unwrap();

        assert_eq!(report.loaded.len(), 5);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].entity_type, "hologram");

        let resaved = manager.serialize_project(&target).unwrap();
        assert_eq!(resaved.entities.len(), 6);
        assert!(resaved.entities.contains(&alien));
    }

    #[test]
    fn test_load_clears_previous_scene() {
        let mut target = populated_scene();
        let mut manager = ProjectManager::new();
        let report = manager
            .deserialize_project(ProjectData::default(), &mut target)
            .unwrap();
        assert!(report.loaded.is_empty());
        assert!(target.is_empty());
        assert!(target.graph().root_nodes().is_empty());
        assert_eq!(target.graph().node_count(), 0);
    }

    #[test]
    fn test_unsupported_version_leaves_scene_alone() {
        let mut target = populated_scene();
        let doc = ProjectData {
            version: "2.0".to_string(),
            ..ProjectData::default()
        };
        let result = ProjectManager::new().deserialize_project(doc, &mut target);
        assert!(matches!(result, Err(ProjectError::UnsupportedVersion(v)) if v == "2.0"));
        assert_eq!(target.len(), 5);
    }

    #[test]
    fn test_project_state_replaced_on_load() {
        let mut manager = ProjectManager::new();
        manager.add_render_log(RenderLog {
            id: "r1".to_string(),
            timestamp: Utc::now(),
            prompt: "sunset".to_string(),
            image_url: "mem://0/r1.png".to_string(),
            seed: Some(7),
        });
        let mut doc = manager.serialize_project(&scene()).unwrap();
        doc.environment.show_grid = false;
        doc.timeline = Some(serde_json::json!({"frames": 24}));

        let mut other = ProjectManager::new();
        other.deserialize_project(doc, &mut scene()).unwrap();
        assert_eq!(other.render_logs().len(), 1);
        assert!(!other.environment().show_grid);
        let resaved = other.serialize_project(&scene()).unwrap();
        assert_eq!(resaved.timeline, Some(serde_json::json!({"frames": 24})));
    }

    #[tokio::test]
    async fn test_file_round_trip_enforces_extension() {
        let dir = tempfile::tempdir().unwrap();
        let source = populated_scene();
        let manager = ProjectManager::new();

        let written = manager
            .save_project_file(&source, dir.path().join("scene.json"))
            .await
            .unwrap();
        assert_eq!(written.extension().unwrap(), "mud");

        let mut target = scene();
        let report = ProjectManager::new()
            .load_project_file(&written, &mut target)
            .await
            .unwrap();
        assert_eq!(report.loaded.len(), 5);
    }

    #[tokio::test]
    async fn test_store_round_trip() {
        let store = MemoryFileStore::new();
        let source = populated_scene();
        let url = ProjectManager::new()
            .save_project(&source, &store, "scene")
            .await
            .unwrap();
        assert!(url.ends_with("scene.mud"));

        let mut target = scene();
        let report = ProjectManager::new()
            .load_project(&store, &url, &mut target)
            .await
            .unwrap();
        assert_eq!(report.loaded.len(), 5);
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.mud");
        let err = read_project_file(&path).await.unwrap_err();
        assert!(matches!(err, ProjectError::Io { path: p, .. } if p == path));
    }
}
