//! Scene graph
//!
//! A tree of positioned nodes. Inner nodes are plain trees; leaves carry a
//! client surface and its size. Subtree roots created for an entity are
//! tagged with a [`NodeOwner`] so that a hit on any leaf can be traced back
//! to the typed object that owns it by walking parent links.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;

use crate::compositor::error::SceneError;
use crate::compositor::geometry::{Point, Size};
use crate::compositor::{DragIconId, LayerId, PopupId, SurfaceId, ToplevelId};

/// Unique identifier for scene nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

impl NodeId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        NodeId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Typed owner recorded on an entity's subtree root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeOwner {
    Toplevel(ToplevelId),
    Layer(LayerId),
    Popup(PopupId),
    DragIcon(DragIconId),
}

/// Fixed stacking bands directly under the root, bottom to top
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneLayer {
    Background,
    Bottom,
    Toplevel,
    Top,
    Overlay,
    DragIcon,
}

impl SceneLayer {
    pub const ALL: [SceneLayer; 6] = [
        SceneLayer::Background,
        SceneLayer::Bottom,
        SceneLayer::Toplevel,
        SceneLayer::Top,
        SceneLayer::Overlay,
        SceneLayer::DragIcon,
    ];

    fn index(self) -> usize {
        match self {
            SceneLayer::Background => 0,
            SceneLayer::Bottom => 1,
            SceneLayer::Toplevel => 2,
            SceneLayer::Top => 3,
            SceneLayer::Overlay => 4,
            SceneLayer::DragIcon => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Tree,
    Surface { surface: SurfaceId, size: Size },
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    position: Point,
    enabled: bool,
    kind: NodeKind,
    owner: Option<NodeOwner>,
}

impl Node {
    fn new(parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            parent,
            children: Vec::new(),
            position: Point::default(),
            enabled: true,
            kind,
            owner: None,
        }
    }
}

/// Result of a hit test: the surface leaf and the point in its local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub node: NodeId,
    pub surface: SurfaceId,
    pub local_x: f64,
    pub local_y: f64,
}

/// The compositor's scene graph
#[derive(Debug)]
pub struct SceneGraph {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    layers: [NodeId; 6],
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        let root = NodeId::new();
        nodes.insert(root, Node::new(None, NodeKind::Tree));

        let layers = SceneLayer::ALL.map(|_| {
            let id = NodeId::new();
            nodes.insert(id, Node::new(Some(root), NodeKind::Tree));
            id
        });
        if let Some(root_node) = nodes.get_mut(&root) {
            root_node.children.extend_from_slice(&layers);
        }

        Self {
            nodes,
            root,
            layers,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Tree node of a stacking band
    pub fn layer(&self, layer: SceneLayer) -> NodeId {
        self.layers[layer.index()]
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create an empty subtree on top of `parent`'s children
    pub fn create_tree(&mut self, parent: NodeId) -> Result<NodeId, SceneError> {
        self.insert(parent, NodeKind::Tree)
    }

    /// Create a surface leaf on top of `parent`'s children
    pub fn create_surface(
        &mut self,
        parent: NodeId,
        surface: SurfaceId,
        size: Size,
    ) -> Result<NodeId, SceneError> {
        self.insert(parent, NodeKind::Surface { surface, size })
    }

    fn insert(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, SceneError> {
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(SceneError::MissingNode(parent))?;
        let id = NodeId::new();
        parent_node.children.push(id);
        self.nodes.insert(id, Node::new(Some(parent), kind));
        Ok(id)
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(&node).map(|n| n.kind)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(&node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Set the position relative to the parent node
    pub fn set_position(&mut self, node: NodeId, position: Point) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.position = position;
        }
    }

    pub fn position(&self, node: NodeId) -> Option<Point> {
        self.nodes.get(&node).map(|n| n.position)
    }

    /// Position in layout coordinates, summing every ancestor's offset
    pub fn global_position(&self, node: NodeId) -> Option<Point> {
        let mut current = self.nodes.get(&node)?;
        let mut pos = current.position;
        while let Some(parent) = current.parent {
            current = self.nodes.get(&parent)?;
            pos = pos + current.position;
        }
        Some(pos)
    }

    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, node: NodeId) -> bool {
        self.nodes.get(&node).map(|n| n.enabled).unwrap_or(false)
    }

    /// Whether the node and every ancestor is enabled
    pub fn is_visible(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.nodes.get(&id) {
                Some(n) if n.enabled => current = n.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn set_surface_size(&mut self, node: NodeId, new_size: Size) {
        if let Some(Node {
            kind: NodeKind::Surface { size, .. },
            ..
        }) = self.nodes.get_mut(&node)
        {
            *size = new_size;
        }
    }

    /// Move `node` under `new_parent`, on top of its new siblings
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) -> Result<(), SceneError> {
        if node == self.root {
            return Err(SceneError::Root(node));
        }
        if !self.nodes.contains_key(&new_parent) {
            return Err(SceneError::MissingNode(new_parent));
        }
        let mut ancestor = Some(new_parent);
        while let Some(id) = ancestor {
            if id == node {
                return Err(SceneError::Cycle {
                    node,
                    parent: new_parent,
                });
            }
            ancestor = self.parent(id);
        }

        let old_parent = self
            .nodes
            .get(&node)
            .ok_or(SceneError::MissingNode(node))?
            .parent;
        if let Some(old) = old_parent.and_then(|p| self.nodes.get_mut(&p)) {
            old.children.retain(|c| *c != node);
        }
        if let Some(parent) = self.nodes.get_mut(&new_parent) {
            parent.children.push(node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = Some(new_parent);
        }
        Ok(())
    }

    /// Restack `node` above all of its siblings
    pub fn raise_to_top(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node);
            p.children.push(node);
        }
    }

    pub fn set_owner(&mut self, node: NodeId, owner: Option<NodeOwner>) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.owner = owner;
        }
    }

    /// Walk up from `node` to the nearest tagged subtree root
    pub fn owner_from_node(&self, node: NodeId) -> Option<NodeOwner> {
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.nodes.get(&id)?;
            if let Some(owner) = n.owner {
                return Some(owner);
            }
            current = n.parent;
        }
        None
    }

    pub fn surface_from_node(&self, node: NodeId) -> Option<SurfaceId> {
        match self.nodes.get(&node)?.kind {
            NodeKind::Surface { surface, .. } => Some(surface),
            NodeKind::Tree => None,
        }
    }

    /// Topmost enabled surface leaf under a layout point
    pub fn node_at(&self, x: f64, y: f64) -> Option<SceneHit> {
        self.hit(self.root, x, y)
    }

    fn hit(&self, id: NodeId, x: f64, y: f64) -> Option<SceneHit> {
        let node = self.nodes.get(&id)?;
        if !node.enabled {
            return None;
        }
        let lx = x - node.position.x as f64;
        let ly = y - node.position.y as f64;

        if let NodeKind::Surface { surface, size } = node.kind {
            let inside = lx >= 0.0 && ly >= 0.0 && lx < size.width as f64 && ly < size.height as f64;
            return inside.then_some(SceneHit {
                node: id,
                surface,
                local_x: lx,
                local_y: ly,
            });
        }

        node.children
            .iter()
            .rev()
            .find_map(|child| self.hit(*child, lx, ly))
    }

    /// Remove `node` and its whole subtree
    pub fn destroy(&mut self, node: NodeId) {
        if node == self.root || self.layers.contains(&node) {
            warn!("Refusing to destroy scene band {:?}", node);
            return;
        }
        if let Some(owner) = self.nodes.get(&node).and_then(|n| n.owner) {
            warn!("Destroying scene node {:?} still tagged with {:?}", node, owner);
        }
        if let Some(parent) = self.parent(node).and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }

        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.remove(&id) {
                stack.extend(n.children);
            }
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
