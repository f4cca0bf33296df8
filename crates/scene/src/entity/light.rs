use mud_ipc::{LightProps, SerializedEntityData};

use super::{Entity, EntityBase, EntityKind, parse_props, spawn_child};
use crate::factory::FactoryError;
use crate::graph::{GraphError, NodeDesc, NodeId, NodeKind, SceneGraph};

/// Point light plus the small marker mesh that makes it pickable
pub struct LightEntity {
    props: LightProps,
    light: NodeId,
    marker: NodeId,
}

impl LightEntity {
    pub(crate) fn build(
        graph: &mut dyn SceneGraph,
        data: &SerializedEntityData,
    ) -> Result<Entity, FactoryError> {
        let props: LightProps = parse_props(data)?;
        let base = EntityBase::create(graph, data);
        let light = spawn_child(
            graph,
            base.root(),
            NodeDesc::new(format!("{}_light", data.name), light_kind(&props)),
        )
        .inspect_err(|_| graph.destroy_node(base.root()))?;
        let marker = spawn_child(
            graph,
            base.root(),
            NodeDesc::new(format!("{}_marker", data.name), NodeKind::LightMarker).pickable(0.3),
        )
        // Destroying the root frees the light node with it
        .inspect_err(|_| graph.destroy_node(base.root()))?;
        Ok(Entity::new(
            base,
            EntityKind::Light(LightEntity {
                props,
                light,
                marker,
            }),
        ))
    }

    pub fn props(&self) -> &LightProps {
        &self.props
    }

    pub fn light(&self) -> NodeId {
        self.light
    }

    pub fn marker(&self) -> NodeId {
        self.marker
    }

    pub fn set_color(&mut self, graph: &mut dyn SceneGraph, color: [f32; 3]) -> Result<(), GraphError> {
        let mut props = self.props.clone();
        props.color = color.map(|c| c.clamp(0.0, 1.0));
        self.apply(graph, props)
    }

    /// Negative intensities are clamped to zero
    pub fn set_intensity(&mut self, graph: &mut dyn SceneGraph, intensity: f32) -> Result<(), GraphError> {
        let mut props = self.props.clone();
        props.intensity = intensity.max(0.0);
        self.apply(graph, props)
    }

    pub fn set_shadow_enabled(&mut self, graph: &mut dyn SceneGraph, enabled: bool) -> Result<(), GraphError> {
        let mut props = self.props.clone();
        props.shadow_enabled = enabled;
        self.apply(graph, props)
    }

    fn apply(&mut self, graph: &mut dyn SceneGraph, props: LightProps) -> Result<(), GraphError> {
        graph.set_kind(self.light, light_kind(&props))?;
        self.props = props;
        Ok(())
    }
}

fn light_kind(props: &LightProps) -> NodeKind {
    NodeKind::Light {
        color: props.color,
        intensity: props.intensity,
        shadows: props.shadow_enabled,
    }
}
