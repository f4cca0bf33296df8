//! SceneGraph collaborator
//!
//! The core never touches renderer internals. Everything it needs from the
//! scene (node lifetime, parenting, transforms, visibility, highlight and ray
//! picking) goes through [`SceneGraph`]. [`MemorySceneGraph`] is the headless
//! implementation; the `bevy` feature adds one over an ECS world.

use std::collections::HashMap;

use glam::{Affine3A, Quat, Vec3};
use mud_ipc::{ShapeType, Transform3D};
use thiserror::Error;

/// Handle to a node owned by a scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("{0} does not exist")]
    UnknownNode(NodeId),

    #[error("cannot parent {child} under {parent}: would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },
}

/// Local transform of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl From<Transform3D> for Transform {
    fn from(t: Transform3D) -> Self {
        Self {
            translation: Vec3::from_array(t.position),
            rotation: Quat::from_array(t.rotation),
            scale: Vec3::from_array(t.scale),
        }
    }
}

impl From<Transform> for Transform3D {
    fn from(t: Transform) -> Self {
        Self {
            position: t.translation.to_array(),
            rotation: t.rotation.to_array(),
            scale: t.scale.to_array(),
        }
    }
}

/// What a node renders
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Empty transform node (entity roots)
    Group,
    Mesh { shape: ShapeType },
    Light {
        color: [f32; 3],
        intensity: f32,
        shadows: bool,
    },
    /// Small mesh marking where a light sits
    LightMarker,
    Model { url: String },
    ImagePlane { url: String, width: f32, height: f32 },
    BoneHandle { joint: usize },
}

/// Description of a node to create
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDesc {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    /// Radius of the pick sphere; `None` means the ray passes through
    pub pick_radius: Option<f32>,
}

impl NodeDesc {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::IDENTITY,
            pick_radius: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn pickable(mut self, radius: f32) -> Self {
        self.pick_radius = Some(radius);
        self
    }
}

/// Scene graph surface consumed by the editor core.
///
/// Nodes are created detached. `add_node(node, None)` puts a node at the top
/// level of the scene; `add_node(node, Some(parent))` parents it (detached
/// parents are fine). A node is *attached* when its ancestor chain ends at a
/// top-level node. `remove_node` detaches without freeing, `destroy_node`
/// frees a whole subtree.
pub trait SceneGraph {
    fn create_node(&mut self, desc: NodeDesc) -> NodeId;

    fn add_node(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), GraphError>;

    fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError>;

    /// Free the node and its descendants; unknown nodes are ignored
    fn destroy_node(&mut self, node: NodeId);

    fn contains(&self, node: NodeId) -> bool;

    fn is_attached(&self, node: NodeId) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Top-level attached nodes, in insertion order
    fn root_nodes(&self) -> Vec<NodeId>;

    fn transform(&self, node: NodeId) -> Option<Transform>;

    fn set_transform(&mut self, node: NodeId, transform: Transform) -> Result<(), GraphError>;

    fn kind(&self, node: NodeId) -> Option<NodeKind>;

    fn set_kind(&mut self, node: NodeId, kind: NodeKind) -> Result<(), GraphError>;

    fn set_visible(&mut self, node: NodeId, visible: bool) -> Result<(), GraphError>;

    fn set_highlighted(&mut self, node: NodeId, highlighted: bool) -> Result<(), GraphError>;

    fn is_highlighted(&self, node: NodeId) -> bool;

    /// Nearest attached, visible, pickable node hit by the ray
    fn pick_by_ray(&self, origin: Vec3, direction: Vec3) -> Option<NodeId>;

    /// Number of live (not destroyed) nodes
    fn node_count(&self) -> usize;
}

/// Distance along a normalized ray to the first hit of a sphere
pub(crate) fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let to_center = center - origin;
    let along = to_center.dot(direction);
    let closest_sq = to_center.length_squared() - along * along;
    let radius_sq = radius * radius;
    if closest_sq > radius_sq {
        return None;
    }
    let half_chord = (radius_sq - closest_sq).sqrt();
    let near = along - half_chord;
    let far = along + half_chord;
    if far < 0.0 {
        None
    } else if near >= 0.0 {
        Some(near)
    } else {
        // Origin inside the sphere
        Some(0.0)
    }
}

/// Pick the nearest candidate `(node, world transform, radius)` on the ray
pub(crate) fn pick_nearest(
    candidates: impl IntoIterator<Item = (NodeId, Affine3A, f32)>,
    origin: Vec3,
    direction: Vec3,
) -> Option<NodeId> {
    let direction = direction.try_normalize()?;
    candidates
        .into_iter()
        .filter_map(|(node, world, radius)| {
            let (scale, _, center) = world.to_scale_rotation_translation();
            let radius = radius * scale.abs().max_element();
            ray_sphere(origin, direction, center, radius).map(|distance| (node, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(node, _)| node)
}

#[derive(Debug, Clone)]
struct MemoryNode {
    desc: NodeDesc,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    visible: bool,
    highlighted: bool,
}

/// Headless scene graph kept in a hash map
#[derive(Debug, Default)]
pub struct MemorySceneGraph {
    nodes: HashMap<NodeId, MemoryNode>,
    top_level: Vec<NodeId>,
    next_id: u64,
}

impl MemorySceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.desc.name.as_str())
    }

    fn node(&self, node: NodeId) -> Result<&MemoryNode, GraphError> {
        self.nodes.get(&node).ok_or(GraphError::UnknownNode(node))
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut MemoryNode, GraphError> {
        self.nodes.get_mut(&node).ok_or(GraphError::UnknownNode(node))
    }

    fn unlink(&mut self, node: NodeId) {
        let parent = self.nodes.get_mut(&node).and_then(|n| n.parent.take());
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != node);
            }
        }
        self.top_level.retain(|n| *n != node);
    }

    fn world_transform(&self, node: NodeId) -> Option<Affine3A> {
        let mut world = self.nodes.get(&node)?.desc.transform.to_affine();
        let mut current = self.nodes.get(&node)?.parent;
        while let Some(parent) = current {
            let p = self.nodes.get(&parent)?;
            world = p.desc.transform.to_affine() * world;
            current = p.parent;
        }
        Some(world)
    }

    fn is_effectively_visible(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.nodes.get(&id) {
                Some(n) if n.visible => current = n.parent,
                _ => return false,
            }
        }
        true
    }
}

impl SceneGraph for MemorySceneGraph {
    fn create_node(&mut self, desc: NodeDesc) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            MemoryNode {
                desc,
                parent: None,
                children: Vec::new(),
                visible: true,
                highlighted: false,
            },
        );
        id
    }

    fn add_node(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), GraphError> {
        self.node(node)?;
        if let Some(parent) = parent {
            self.node(parent)?;
            let mut ancestor = Some(parent);
            while let Some(a) = ancestor {
                if a == node {
                    return Err(GraphError::Cycle { child: node, parent });
                }
                ancestor = self.nodes.get(&a).and_then(|n| n.parent);
            }
        }

        self.unlink(node);
        match parent {
            Some(parent) => {
                self.node_mut(node)?.parent = Some(parent);
                self.node_mut(parent)?.children.push(node);
            }
            None => self.top_level.push(node),
        }
        Ok(())
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.node(node)?;
        self.unlink(node);
        Ok(())
    }

    fn destroy_node(&mut self, node: NodeId) {
        if !self.nodes.contains_key(&node) {
            return;
        }
        self.unlink(node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&id) {
                stack.extend(removed.children);
            }
        }
    }

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            match self.nodes.get(&current) {
                Some(MemoryNode {
                    parent: Some(parent),
                    ..
                }) => current = *parent,
                Some(_) => return self.top_level.contains(&current),
                None => return false,
            }
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn root_nodes(&self) -> Vec<NodeId> {
        self.top_level.clone()
    }

    fn transform(&self, node: NodeId) -> Option<Transform> {
        self.nodes.get(&node).map(|n| n.desc.transform)
    }

    fn set_transform(&mut self, node: NodeId, transform: Transform) -> Result<(), GraphError> {
        self.node_mut(node)?.desc.transform = transform;
        Ok(())
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(&node).map(|n| n.desc.kind.clone())
    }

    fn set_kind(&mut self, node: NodeId, kind: NodeKind) -> Result<(), GraphError> {
        self.node_mut(node)?.desc.kind = kind;
        Ok(())
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) -> Result<(), GraphError> {
        self.node_mut(node)?.visible = visible;
        Ok(())
    }

    fn set_highlighted(&mut self, node: NodeId, highlighted: bool) -> Result<(), GraphError> {
        self.node_mut(node)?.highlighted = highlighted;
        Ok(())
    }

    fn is_highlighted(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.highlighted)
    }

    fn pick_by_ray(&self, origin: Vec3, direction: Vec3) -> Option<NodeId> {
        let candidates = self.nodes.iter().filter_map(|(id, node)| {
            let radius = node.desc.pick_radius?;
            if !self.is_attached(*id) || !self.is_effectively_visible(*id) {
                return None;
            }
            Some((*id, self.world_transform(*id)?, radius))
        });
        pick_nearest(candidates, origin, direction)
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
