use mud_ipc::{SerializedEntityData, ShapeProps, ShapeType};

use super::{Entity, EntityBase, EntityKind, parse_props, spawn_child};
use crate::factory::FactoryError;
use crate::graph::{GraphError, NodeDesc, NodeId, NodeKind, SceneGraph};

/// Primitive mesh entity
pub struct ShapeEntity {
    props: ShapeProps,
    mesh: NodeId,
}

fn pick_radius(shape: ShapeType) -> f32 {
    match shape {
        ShapeType::Floor => 5.0,
        ShapeType::Plane => 1.0,
        _ => 0.75,
    }
}

impl ShapeEntity {
    pub(crate) fn build(
        graph: &mut dyn SceneGraph,
        data: &SerializedEntityData,
    ) -> Result<Entity, FactoryError> {
        let props: ShapeProps = parse_props(data)?;
        let base = EntityBase::create(graph, data);
        let mesh = spawn_child(
            graph,
            base.root(),
            NodeDesc::new(
                format!("{}_mesh", data.name),
                NodeKind::Mesh {
                    shape: props.shape_type,
                },
            )
            .pickable(pick_radius(props.shape_type)),
        )
        .inspect_err(|_| graph.destroy_node(base.root()))?;
        Ok(Entity::new(base, EntityKind::Shape(ShapeEntity { props, mesh })))
    }

    pub fn props(&self) -> &ShapeProps {
        &self.props
    }

    pub fn shape_type(&self) -> ShapeType {
        self.props.shape_type
    }

    pub fn mesh(&self) -> NodeId {
        self.mesh
    }

    /// Swap the primitive in place
    pub fn set_shape_type(
        &mut self,
        graph: &mut dyn SceneGraph,
        shape: ShapeType,
    ) -> Result<(), GraphError> {
        graph.set_kind(self.mesh, NodeKind::Mesh { shape })?;
        self.props.shape_type = shape;
        Ok(())
    }
}
