use mud_ipc::{Basic3DProps, SerializedEntityData};

use super::{AssetFormat, Entity, EntityBase, EntityKind, VisualError, parse_props, spawn_child};
use crate::factory::FactoryError;
use crate::graph::{NodeDesc, NodeId, NodeKind, SceneGraph};

/// Imported glTF/GLB/FBX file without generation history
pub struct Basic3DEntity {
    props: Basic3DProps,
    model: Option<NodeId>,
}

impl Basic3DEntity {
    pub(crate) fn build(
        graph: &mut dyn SceneGraph,
        data: &SerializedEntityData,
    ) -> Result<Entity, FactoryError> {
        let props: Basic3DProps = parse_props(data)?;
        let mut base = EntityBase::create(graph, data);
        if props.model_url.is_empty() {
            base.settle_load(Some("no model file".to_string()));
        } else {
            base.request_load(props.model_url.clone());
        }
        Ok(Entity::new(
            base,
            EntityKind::Basic3D(Basic3DEntity { props, model: None }),
        ))
    }

    pub fn props(&self) -> &Basic3DProps {
        &self.props
    }

    pub fn model(&self) -> Option<NodeId> {
        self.model
    }

    pub(super) fn forget_visual(&mut self) {
        self.model = None;
    }

    pub(super) fn apply_asset(
        &mut self,
        graph: &mut dyn SceneGraph,
        root: NodeId,
        url: &str,
        format: AssetFormat,
    ) -> Result<(), VisualError> {
        if !format.is_model() {
            return Err(VisualError::Unsupported(format!(
                "{url} is not a glTF, GLB or FBX model"
            )));
        }
        if let Some(old) = self.model.take() {
            graph.destroy_node(old);
        }
        let name = self.props.file_name.clone().unwrap_or_else(|| url.to_string());
        self.model = Some(spawn_child(
            graph,
            root,
            NodeDesc::new(name, NodeKind::Model { url: url.to_string() }).pickable(1.0),
        )?);
        Ok(())
    }
}
