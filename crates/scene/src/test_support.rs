//! Shared fixtures for the core's unit tests

use mud_ipc::CharacterProps;
use uuid::Uuid;

use crate::entity::asset_format::fixtures::RIGGED_GLTF;
use crate::factory::{EntityOptions, EntityProps};
use crate::graph::MemorySceneGraph;
use crate::jobs::AssetLoadResult;
use crate::registry::SceneContext;

pub(crate) fn scene() -> SceneContext {
    SceneContext::new(Box::new(MemorySceneGraph::new()))
}

/// Complete every pending load with bytes chosen by url
pub(crate) fn finish_loads(
    scene: &mut SceneContext,
    bytes_for: impl Fn(&str) -> Result<Vec<u8>, String>,
) -> usize {
    let jobs = scene.take_load_jobs();
    let count = jobs.len();
    for job in jobs {
        let bytes = bytes_for(&job.url);
        scene.finish_load(AssetLoadResult { job, bytes });
    }
    count
}

/// Character whose model resolved to a two-bone rig
pub(crate) fn loaded_character(scene: &mut SceneContext) -> Uuid {
    let uuid = scene
        .spawn(EntityOptions::new(EntityProps::Character(CharacterProps::default())))
        .unwrap();
    finish_loads(scene, |_| Ok(RIGGED_GLTF.as_bytes().to_vec()));
    uuid
}
