use glam::{Quat, Vec3};
use mud_ipc::{CharacterProps, SerializedEntityData};
use thiserror::Error;

use super::{AssetFormat, Entity, EntityBase, EntityKind, VisualError, parse_props, spawn_child};
use crate::factory::FactoryError;
use crate::graph::{NodeDesc, NodeId, NodeKind, SceneGraph, Transform};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnimationError {
    #[error("animation {index} out of range ({count} clips)")]
    OutOfRange { index: usize, count: usize },
}

/// Handle on one skeleton joint; selectable, rotation only
#[derive(Debug, Clone, PartialEq)]
pub struct BoneControl {
    name: String,
    index: usize,
    node: NodeId,
}

impl BoneControl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// Skinned character with its clip list and bone controls
pub struct CharacterEntity {
    props: CharacterProps,
    model: Option<NodeId>,
    bones: Vec<BoneControl>,
    animations: Vec<String>,
    current_animation: Option<usize>,
}

impl CharacterEntity {
    pub(crate) fn build(
        graph: &mut dyn SceneGraph,
        data: &SerializedEntityData,
    ) -> Result<Entity, FactoryError> {
        let props: CharacterProps = parse_props(data)?;
        let mut base = EntityBase::create(graph, data);
        base.request_load(props.model_url.clone());
        Ok(Entity::new(
            base,
            EntityKind::Character(CharacterEntity {
                props,
                model: None,
                bones: Vec::new(),
                animations: Vec::new(),
                current_animation: None,
            }),
        ))
    }

    pub fn model_url(&self) -> &str {
        &self.props.model_url
    }

    pub fn model(&self) -> Option<NodeId> {
        self.model
    }

    pub fn bones(&self) -> &[BoneControl] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&BoneControl> {
        self.bones.get(index)
    }

    pub(crate) fn bone_mut(&mut self, index: usize) -> Option<&mut BoneControl> {
        self.bones.get_mut(index)
    }

    pub(crate) fn bone_for_node(&self, node: NodeId) -> Option<usize> {
        self.bones.iter().position(|bone| bone.node == node)
    }

    pub fn animations(&self) -> &[String] {
        &self.animations
    }

    pub fn current_animation(&self) -> Option<&str> {
        self.current_animation
            .and_then(|index| self.animations.get(index))
            .map(String::as_str)
    }

    pub fn play_animation(&mut self, index: usize) -> Result<(), AnimationError> {
        if index >= self.animations.len() {
            return Err(AnimationError::OutOfRange {
                index,
                count: self.animations.len(),
            });
        }
        self.current_animation = Some(index);
        self.props.current_animation = Some(self.animations[index].clone());
        Ok(())
    }

    pub fn stop_animation(&mut self) {
        self.current_animation = None;
        self.props.current_animation = None;
    }

    /// Props as persisted; the stored clip name survives even when the loaded
    /// model has no clip of that name
    pub(super) fn persisted_props(&self) -> CharacterProps {
        self.props.clone()
    }

    pub(super) fn forget_visual(&mut self) {
        self.model = None;
        self.bones.clear();
    }

    pub(super) fn apply_asset(
        &mut self,
        graph: &mut dyn SceneGraph,
        root: NodeId,
        url: &str,
        format: AssetFormat,
    ) -> Result<(), VisualError> {
        let summary = match format {
            AssetFormat::Gltf(summary) => summary,
            AssetFormat::Fbx => Default::default(),
            AssetFormat::Image { .. } => {
                return Err(VisualError::Unsupported(format!(
                    "{url} is an image, not a character model"
                )));
            }
        };

        if let Some(old) = self.model.take() {
            graph.destroy_node(old);
        }
        self.bones.clear();

        let model = spawn_child(
            graph,
            root,
            NodeDesc::new(format!("{url}#model"), NodeKind::Model { url: url.to_string() })
                .pickable(1.0),
        )?;
        self.model = Some(model);

        for (index, joint) in summary.joints.iter().enumerate() {
            let transform = Transform {
                translation: Vec3::from_array(joint.translation),
                rotation: Quat::from_array(joint.rotation),
                scale: Vec3::ONE,
            };
            let node = spawn_child(
                graph,
                model,
                NodeDesc::new(joint.name.clone(), NodeKind::BoneHandle { joint: index })
                    .with_transform(transform)
                    .pickable(0.1),
            )?;
            self.bones.push(BoneControl {
                name: joint.name.clone(),
                index,
                node,
            });
        }

        self.animations = summary.animations;
        self.current_animation = self
            .props
            .current_animation
            .as_ref()
            .and_then(|name| self.animations.iter().position(|clip| clip == name));
        tracing::debug!(
            "Character model {} loaded with {} bones and {} clips",
            url,
            self.bones.len(),
            self.animations.len()
        );
        Ok(())
    }
}
