//! SceneGraph over a Bevy ECS world
//!
//! Every node is an ECS entity carrying a [`SceneNode`] and a `Name`;
//! parenting uses Bevy's `ChildOf`/`Children` relationship so a render app
//! can consume the same world.

use std::collections::HashMap;

use bevy::ecs::prelude::*;
use glam::{Affine3A, Vec3};
use tracing::debug;

use crate::graph::{GraphError, NodeDesc, NodeId, NodeKind, SceneGraph, Transform, pick_nearest};

/// Editor data attached to each node entity
#[derive(Component, Debug, Clone)]
pub struct SceneNode {
    pub id: NodeId,
    pub desc: NodeDesc,
    pub visible: bool,
    pub highlighted: bool,
}

#[derive(Default)]
pub struct BevySceneGraph {
    world: World,
    entities: HashMap<NodeId, Entity>,
    top_level: Vec<NodeId>,
    next_id: u64,
}

impl BevySceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// ECS entity backing a node
    pub fn entity(&self, node: NodeId) -> Option<Entity> {
        self.entities.get(&node).copied()
    }

    fn require(&self, node: NodeId) -> Result<Entity, GraphError> {
        self.entity(node).ok_or(GraphError::UnknownNode(node))
    }

    fn scene_node(&self, node: NodeId) -> Option<&SceneNode> {
        self.world.get::<SceneNode>(self.entity(node)?)
    }

    fn scene_node_mut(&mut self, node: NodeId) -> Result<Mut<'_, SceneNode>, GraphError> {
        let entity = self.require(node)?;
        self.world
            .get_mut::<SceneNode>(entity)
            .ok_or(GraphError::UnknownNode(node))
    }

    fn node_of(&self, entity: Entity) -> Option<NodeId> {
        self.world.get::<SceneNode>(entity).map(|n| n.id)
    }

    fn unlink(&mut self, node: NodeId) {
        if let Some(entity) = self.entity(node) {
            self.world.entity_mut(entity).remove::<ChildOf>();
        }
        self.top_level.retain(|n| *n != node);
    }

    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id));
        }
        out
    }

    fn world_transform(&self, node: NodeId) -> Option<Affine3A> {
        let mut world = self.scene_node(node)?.desc.transform.to_affine();
        let mut current = self.parent(node);
        while let Some(parent) = current {
            world = self.scene_node(parent)?.desc.transform.to_affine() * world;
            current = self.parent(parent);
        }
        Some(world)
    }

    fn is_effectively_visible(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.scene_node(id) {
                Some(n) if n.visible => current = self.parent(id),
                _ => return false,
            }
        }
        true
    }
}

impl SceneGraph for BevySceneGraph {
    fn create_node(&mut self, desc: NodeDesc) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        let name = Name::new(desc.name.clone());
        let entity = self
            .world
            .spawn((
                SceneNode {
                    id,
                    desc,
                    visible: true,
                    highlighted: false,
                },
                name,
            ))
            .id();
        self.entities.insert(id, entity);
        id
    }

    fn add_node(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), GraphError> {
        let entity = self.require(node)?;
        let parent_entity = match parent {
            Some(parent) => {
                let parent_entity = self.require(parent)?;
                let mut ancestor = Some(parent);
                while let Some(a) = ancestor {
                    if a == node {
                        return Err(GraphError::Cycle { child: node, parent });
                    }
                    ancestor = self.parent(a);
                }
                Some(parent_entity)
            }
            None => None,
        };

        self.unlink(node);
        match parent_entity {
            Some(parent_entity) => {
                self.world.entity_mut(entity).insert(ChildOf(parent_entity));
            }
            None => self.top_level.push(node),
        }
        Ok(())
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.require(node)?;
        self.unlink(node);
        Ok(())
    }

    fn destroy_node(&mut self, node: NodeId) {
        let Some(entity) = self.entity(node) else {
            return;
        };
        let doomed = self.subtree(node);
        self.unlink(node);
        // Despawning also despawns the Children relationship targets
        self.world.despawn(entity);
        for id in &doomed {
            self.entities.remove(id);
        }
        debug!("Despawned {} ({} nodes)", node, doomed.len());
    }

    fn contains(&self, node: NodeId) -> bool {
        self.entities.contains_key(&node)
    }

    fn is_attached(&self, node: NodeId) -> bool {
        if !self.contains(node) {
            return false;
        }
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        self.top_level.contains(&current)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let entity = self.entity(node)?;
        let parent = self.world.get::<ChildOf>(entity)?.parent();
        self.node_of(parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.entity(node)
            .and_then(|entity| self.world.get::<Children>(entity))
            .map(|children| {
                let entities: &[Entity] = children;
                entities.iter().filter_map(|c| self.node_of(*c)).collect()
            })
            .unwrap_or_default()
    }

    fn root_nodes(&self) -> Vec<NodeId> {
        self.top_level.clone()
    }

    fn transform(&self, node: NodeId) -> Option<Transform> {
        self.scene_node(node).map(|n| n.desc.transform)
    }

    fn set_transform(&mut self, node: NodeId, transform: Transform) -> Result<(), GraphError> {
        self.scene_node_mut(node)?.desc.transform = transform;
        Ok(())
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.scene_node(node).map(|n| n.desc.kind.clone())
    }

    fn set_kind(&mut self, node: NodeId, kind: NodeKind) -> Result<(), GraphError> {
        self.scene_node_mut(node)?.desc.kind = kind;
        Ok(())
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) -> Result<(), GraphError> {
        self.scene_node_mut(node)?.visible = visible;
        Ok(())
    }

    fn set_highlighted(&mut self, node: NodeId, highlighted: bool) -> Result<(), GraphError> {
        self.scene_node_mut(node)?.highlighted = highlighted;
        Ok(())
    }

    fn is_highlighted(&self, node: NodeId) -> bool {
        self.scene_node(node).is_some_and(|n| n.highlighted)
    }

    fn pick_by_ray(&self, origin: Vec3, direction: Vec3) -> Option<NodeId> {
        let candidates = self.entities.keys().filter_map(|id| {
            let radius = self.scene_node(*id)?.desc.pick_radius?;
            if !self.is_attached(*id) || !self.is_effectively_visible(*id) {
                return None;
            }
            Some((*id, self.world_transform(*id)?, radius))
        });
        pick_nearest(candidates, origin, direction)
    }

    fn node_count(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_uses_child_of() {
        let mut graph = BevySceneGraph::new();
        let root = graph.create_node(NodeDesc::new("root", NodeKind::Group));
        let child = graph.create_node(
            NodeDesc::new("child", NodeKind::Group)
                .with_transform(Transform::from_translation(Vec3::Y))
                .pickable(0.5),
        );
        graph.add_node(child, Some(root)).unwrap();
        graph.add_node(root, None).unwrap();

        let child_entity = graph.entity(child).unwrap();
        let parent = graph.world().get::<ChildOf>(child_entity).unwrap().parent();
        assert_eq!(Some(parent), graph.entity(root));
        assert_eq!(graph.children(root), vec![child]);
        assert!(graph.is_attached(child));
        assert_eq!(graph.pick_by_ray(Vec3::new(0.0, 1.0, 5.0), Vec3::NEG_Z), Some(child));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = BevySceneGraph::new();
        let a = graph.create_node(NodeDesc::new("a", NodeKind::Group));
        let b = graph.create_node(NodeDesc::new("b", NodeKind::Group));
        graph.add_node(b, Some(a)).unwrap();
        assert_eq!(
            graph.add_node(a, Some(b)),
            Err(GraphError::Cycle { child: a, parent: b })
        );
    }

    #[test]
    fn test_destroy_despawns_subtree() {
        let mut graph = BevySceneGraph::new();
        let root = graph.create_node(NodeDesc::new("root", NodeKind::Group));
        let child = graph.create_node(NodeDesc::new("child", NodeKind::Group));
        graph.add_node(child, Some(root)).unwrap();
        graph.add_node(root, None).unwrap();

        let child_entity = graph.entity(child).unwrap();
        graph.destroy_node(root);
        assert_eq!(graph.node_count(), 0);
        assert!(graph.world().get::<SceneNode>(child_entity).is_none());
        assert!(graph.root_nodes().is_empty());
    }
}
