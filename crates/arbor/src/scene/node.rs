//! # Scene Graph Nodes
//!
//! Nodes live in a [`NodeGraph`] arena and refer to each other by [`NodeKey`].
//! Every mutation that can move geometry goes through the graph so dirty flags
//! propagate along parent and child links:
//!
//! - a dirty transform cascades to **all descendants** and marks the **parent
//!   chain** bounds dirty
//! - dirty bounds only travel upward
//!
//! Nothing is recomputed eagerly (with the single exception of
//! [`NodeGraph::scale`]); [`NodeGraph::update`] refreshes transforms on the
//! way down and bounds on the way back up.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::foundation::math::{utils, Mat4, Unit, UnitQuaternion, Vec3};
use crate::physics::RigidBodyHandle;
use crate::platform::InputState;
use crate::render::{Descriptors, Mesh, PipelineState};
use crate::scene::{
    Aabb, Culler, DefaultCuller, DefaultLightExtractor, DefaultPhysicsComponent, InputComponent, Light,
    LightExtractor, PhysicsComponent, Updater,
};

new_key_type! {
    /// Stable handle to a node in a [`NodeGraph`]
    pub struct NodeKey;
}

/// Custom world bounds hook
///
/// Called after the node's bounds have been grown to cover its mesh and
/// children; whatever it returns becomes the node's world bounds.
pub type BoundsCallback = Arc<dyn Fn(&Node) -> Aabb + Send + Sync>;

/// Graph structure errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The key does not refer to a live node
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeKey),

    /// Attaching the child would make it its own ancestor
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    Cycle {
        /// Prospective parent
        parent: NodeKey,
        /// Prospective child
        child: NodeKey,
    },
}

/// Scene graph node
#[derive(Clone)]
pub struct Node {
    name: String,
    active: bool,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,

    transform: Mat4,
    world_transform: Mat4,
    inverse_world_transform: Mat4,

    bounds: Option<Aabb>,
    world_bounds: Aabb,
    bounds_callback: Option<BoundsCallback>,

    dirty_transform: bool,
    dirty_bounds: bool,

    state: Option<Arc<PipelineState>>,
    material_data: Descriptors,

    mesh: Option<Arc<Mesh>>,
    light: Option<Light>,
    rigid_body: Option<RigidBodyHandle>,

    light_extractor: Option<Arc<dyn LightExtractor>>,
    input_component: Option<Arc<dyn InputComponent>>,
    update_component: Option<Arc<dyn Updater>>,
    cull_component: Option<Arc<dyn Culler>>,
    physics_component: Option<Arc<dyn PhysicsComponent>>,
}

impl Node {
    /// Create a detached node with identity transforms and default components
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            parent: None,
            children: Vec::new(),
            transform: Mat4::identity(),
            world_transform: Mat4::identity(),
            inverse_world_transform: Mat4::identity(),
            bounds: Some(Aabb::empty()),
            world_bounds: Aabb::empty(),
            bounds_callback: None,
            dirty_transform: true,
            dirty_bounds: true,
            state: None,
            material_data: Descriptors::new(),
            mesh: None,
            light: None,
            rigid_body: None,
            light_extractor: Some(Arc::new(DefaultLightExtractor)),
            input_component: None,
            update_component: None,
            cull_component: Some(Arc::new(DefaultCuller)),
            physics_component: Some(Arc::new(DefaultPhysicsComponent)),
        }
    }

    /// Create a node that never contributes to its parent's bounds
    ///
    /// Used for camera mount points.
    pub fn without_bounds(name: impl Into<String>) -> Self {
        Self {
            bounds: None,
            ..Self::new(name)
        }
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the node takes part in culling and light extraction
    pub fn active(&self) -> bool {
        self.active
    }

    /// Mark the node active or inactive
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Parent key, `None` for roots and detached nodes
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Local to parent transform
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    /// Local to world transform as of the last update
    pub fn world_transform(&self) -> &Mat4 {
        &self.world_transform
    }

    /// Inverse of [`Node::world_transform`]
    pub fn inverse_world_transform(&self) -> &Mat4 {
        &self.inverse_world_transform
    }

    /// Object-space bounds; `None` for nodes that opt out of bounds
    pub fn bounds(&self) -> Option<&Aabb> {
        self.bounds.as_ref()
    }

    /// World-space bounds as of the last update
    pub fn world_bounds(&self) -> &Aabb {
        &self.world_bounds
    }

    /// Install or clear the custom world bounds hook
    pub fn set_bounds_callback(&mut self, callback: Option<BoundsCallback>) {
        self.bounds_callback = callback;
    }

    /// Whether the world transform needs recomputing
    pub fn dirty_transform(&self) -> bool {
        self.dirty_transform
    }

    /// Whether the bounds need recomputing
    pub fn dirty_bounds(&self) -> bool {
        self.dirty_bounds
    }

    /// Pipeline state drawables are rendered with
    pub fn state(&self) -> Option<&Arc<PipelineState>> {
        self.state.as_ref()
    }

    /// Set the pipeline state
    pub fn set_state(&mut self, state: Option<Arc<PipelineState>>) {
        self.state = state;
    }

    /// Material descriptors
    pub fn material_data(&self) -> &Descriptors {
        &self.material_data
    }

    /// Mutable material descriptors
    pub fn material_data_mut(&mut self) -> &mut Descriptors {
        &mut self.material_data
    }

    /// Attached mesh
    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh.as_ref()
    }

    /// Attached light
    pub fn light(&self) -> Option<&Light> {
        self.light.as_ref()
    }

    /// Mutable attached light
    pub fn light_mut(&mut self) -> Option<&mut Light> {
        self.light.as_mut()
    }

    /// Attached rigid body
    pub fn rigid_body(&self) -> Option<RigidBodyHandle> {
        self.rigid_body
    }

    /// Attach or detach a rigid body
    pub fn set_rigid_body(&mut self, rigid_body: Option<RigidBodyHandle>) {
        self.rigid_body = rigid_body;
    }

    /// Light extractor
    pub fn light_extractor(&self) -> Option<&Arc<dyn LightExtractor>> {
        self.light_extractor.as_ref()
    }

    /// Replace the light extractor
    pub fn set_light_extractor(&mut self, component: Option<Arc<dyn LightExtractor>>) {
        self.light_extractor = component;
    }

    /// Input component
    pub fn input_component(&self) -> Option<&Arc<dyn InputComponent>> {
        self.input_component.as_ref()
    }

    /// Replace the input component
    pub fn set_input_component(&mut self, component: Option<Arc<dyn InputComponent>>) {
        self.input_component = component;
    }

    /// Update component
    pub fn update_component(&self) -> Option<&Arc<dyn Updater>> {
        self.update_component.as_ref()
    }

    /// Replace the update component
    pub fn set_update_component(&mut self, component: Option<Arc<dyn Updater>>) {
        self.update_component = component;
    }

    /// Cull component
    pub fn cull_component(&self) -> Option<&Arc<dyn Culler>> {
        self.cull_component.as_ref()
    }

    /// Replace the cull component
    pub fn set_cull_component(&mut self, component: Option<Arc<dyn Culler>>) {
        self.cull_component = component;
    }

    /// Physics component
    pub fn physics_component(&self) -> Option<&Arc<dyn PhysicsComponent>> {
        self.physics_component.as_ref()
    }

    /// Replace the physics component
    pub fn set_physics_component(&mut self, component: Option<Arc<dyn PhysicsComponent>>) {
        self.physics_component = component;
    }

    /// Translation of the world transform
    pub fn world_position(&self) -> Vec3 {
        utils::world_position(&self.world_transform)
    }

    /// Distance between the world positions of two nodes
    pub fn world_distance(&self, other: &Node) -> f64 {
        (other.world_position() - self.world_position()).norm()
    }

    fn strip_components(&mut self) {
        self.mesh = None;
        self.input_component = None;
        self.update_component = None;
        self.cull_component = None;
        self.physics_component = None;
        self.light_extractor = None;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("active", &self.active)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("dirty_transform", &self.dirty_transform)
            .field("dirty_bounds", &self.dirty_bounds)
            .field("world_bounds", &self.world_bounds)
            .field("state", &self.state.as_ref().map(|s| s.name.as_str()))
            .field("mesh", &self.mesh.as_ref().map(|m| m.name()))
            .field("has_light", &self.light.is_some())
            .finish_non_exhaustive()
    }
}

/// Arena owning every node of a scene
#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    nodes: SlotMap<NodeKey, Node>,
}

impl NodeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a detached node
    pub fn insert(&mut self, node: Node) -> NodeKey {
        self.nodes.insert(node)
    }

    /// Insert a detached default node named `name`
    pub fn create(&mut self, name: impl Into<String>) -> NodeKey {
        self.insert(Node::new(name))
    }

    /// Node by key
    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Mutable node by key
    ///
    /// Fields touched through this do not propagate dirty flags; use the
    /// graph operations for anything that moves geometry.
    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Whether `key` refers to a live node
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, key: NodeKey) -> Result<&Node, GraphError> {
        self.nodes.get(key).ok_or(GraphError::NodeNotFound(key))
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(key).ok_or(GraphError::NodeNotFound(key))
    }

    /// Keys of the subtree rooted at `root`, depth-first pre-order
    pub fn subtree(&self, root: NodeKey) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            if let Some(node) = self.nodes.get(key) {
                keys.push(key);
                stack.extend(node.children.iter().rev());
            }
        }
        keys
    }

    /// First node named `name` in the subtree of `root`, pre-order
    pub fn find_by_name(&self, root: NodeKey, name: &str) -> Option<NodeKey> {
        self.subtree(root)
            .into_iter()
            .find(|&key| self.nodes.get(key).is_some_and(|n| n.name == name))
    }

    /// Set the active flag of every direct child
    pub fn set_children_active(&mut self, key: NodeKey, active: bool) {
        let children = self.nodes.get(key).map(|n| n.children.clone()).unwrap_or_default();
        for child in children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.active = active;
            }
        }
    }

    pub(crate) fn set_dirty_bounds(&mut self, key: NodeKey) {
        let mut current = Some(key);
        while let Some(k) = current {
            match self.nodes.get_mut(k) {
                Some(node) => {
                    node.dirty_bounds = true;
                    current = node.parent;
                }
                None => break,
            }
        }
    }

    pub(crate) fn set_dirty_transform(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.dirty_transform = true;
        let parent = node.parent;
        let children = node.children.clone();

        if let Some(parent) = parent {
            self.set_dirty_bounds(parent);
        }
        for child in children {
            self.set_dirty_transform(child);
        }
    }

    /// Attach `child` as the last child of `parent`
    ///
    /// A child that already has a parent is detached from it first.
    pub fn add_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), GraphError> {
        self.node(parent)?;
        self.node(child)?;

        let mut ancestor = Some(parent);
        while let Some(k) = ancestor {
            if k == child {
                return Err(GraphError::Cycle { parent, child });
            }
            ancestor = self.nodes.get(k).and_then(|n| n.parent);
        }

        if let Some(old_parent) = self.node(child)?.parent {
            self.remove_child(old_parent, child);
        }

        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.set_dirty_transform(child);
        self.set_dirty_bounds(parent);
        Ok(())
    }

    /// Detach `child` from `parent`, leaving it as a detached subtree root
    ///
    /// Returns whether `child` was a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeKey, child: NodeKey) -> bool {
        let Some(node) = self.nodes.get_mut(parent) else {
            return false;
        };
        let Some(index) = node.children.iter().position(|&c| c == child) else {
            return false;
        };
        node.children.remove(index);

        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }
        self.set_dirty_bounds(parent);
        true
    }

    /// Release every descendant of `key`
    ///
    /// Behaviour components and meshes are stripped before the nodes are
    /// removed from the arena.
    pub fn remove_children(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        let children = std::mem::take(&mut node.children);

        for child in children {
            for descendant in self.subtree(child) {
                if let Some(mut node) = self.nodes.remove(descendant) {
                    node.strip_components();
                    log::trace!("Released node '{}'", node.name);
                }
            }
        }
        self.set_dirty_bounds(key);
    }

    /// Detach `key` from its parent and release its whole subtree
    pub fn destroy(&mut self, key: NodeKey) {
        if let Some(parent) = self.nodes.get(key).and_then(|n| n.parent) {
            self.remove_child(parent, key);
        }
        self.remove_children(key);
        if let Some(mut node) = self.nodes.remove(key) {
            node.strip_components();
            log::debug!("Destroyed node '{}'", node.name);
        }
    }

    /// Right-multiply the local transform by a translation
    pub fn translate(&mut self, key: NodeKey, v: &Vec3) -> Result<(), GraphError> {
        let node = self.node_mut(key)?;
        node.transform *= Mat4::new_translation(v);
        self.set_dirty_transform(key);
        self.set_dirty_bounds(key);
        Ok(())
    }

    /// Right-multiply the local transform by a rotation of `degrees` around `axis`
    pub fn rotate(&mut self, key: NodeKey, degrees: f64, axis: &Vec3) -> Result<(), GraphError> {
        let rotation = UnitQuaternion::from_axis_angle(&Unit::new_normalize(*axis), utils::deg_to_rad(degrees));
        let node = self.node_mut(key)?;
        node.transform *= rotation.to_homogeneous();
        self.set_dirty_transform(key);
        self.set_dirty_bounds(key);
        Ok(())
    }

    /// Right-multiply the local transform by a scale
    ///
    /// Unlike translate and rotate, bounds are recomputed immediately (against
    /// the current world transform) instead of being deferred to the next
    /// update.
    pub fn scale(&mut self, key: NodeKey, s: &Vec3) -> Result<(), GraphError> {
        let node = self.node_mut(key)?;
        node.transform *= Mat4::new_nonuniform_scaling(s);
        self.set_dirty_transform(key);
        self.update_bounds(key);
        Ok(())
    }

    /// Set the world transform, deriving the local transform from the parent
    pub fn set_world_transform(&mut self, key: NodeKey, m: Mat4) -> Result<(), GraphError> {
        let parent_inverse = match self.node(key)?.parent {
            Some(parent) => Some(self.node(parent)?.inverse_world_transform),
            None => None,
        };

        let node = self.node_mut(key)?;
        match parent_inverse {
            Some(inverse) => node.transform = inverse * m,
            None => {
                node.transform = m;
                node.world_transform = m;
            }
        }
        self.set_dirty_transform(key);
        self.set_dirty_bounds(key);
        Ok(())
    }

    /// Replace the local transform outright
    pub fn set_transform(&mut self, key: NodeKey, m: Mat4) -> Result<(), GraphError> {
        self.node_mut(key)?.transform = m;
        self.set_dirty_transform(key);
        self.set_dirty_bounds(key);
        Ok(())
    }

    /// Attach or detach a mesh
    pub fn set_mesh(&mut self, key: NodeKey, mesh: Option<Arc<Mesh>>) -> Result<(), GraphError> {
        self.node_mut(key)?.mesh = mesh;
        self.set_dirty_bounds(key);
        Ok(())
    }

    /// Attach or detach a light
    pub fn set_light(&mut self, key: NodeKey, light: Option<Light>) -> Result<(), GraphError> {
        self.node_mut(key)?.light = light;
        self.set_dirty_bounds(key);
        Ok(())
    }

    /// Run the per-frame update traversal from `root`
    ///
    /// Pre-order: input commands, update component, world transform. Then
    /// the children. Post-order: bounds.
    pub fn update(&mut self, root: NodeKey, dt: f64, input: &InputState) {
        let Some(node) = self.nodes.get(root) else {
            return;
        };
        let input_component = node.input_component.clone();
        let update_component = node.update_component.clone();

        if let Some(component) = input_component {
            let commands = match self.nodes.get(root) {
                Some(node) => component.run(node, input),
                None => Vec::new(),
            };
            for command in commands {
                command.run(self, root);
            }
        }

        if let Some(component) = update_component {
            component.run(self, root, dt);
        }

        if self.nodes.get(root).is_some_and(|n| n.dirty_transform) {
            self.update_transforms(root);
        }

        let children = match self.nodes.get(root) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.update(child, dt, input);
        }

        if self.nodes.get(root).is_some_and(|n| n.dirty_bounds) {
            self.update_bounds(root);
        }
    }

    fn update_transforms(&mut self, key: NodeKey) {
        let parent_world = self
            .nodes
            .get(key)
            .and_then(|n| n.parent)
            .and_then(|p| self.nodes.get(p))
            .map(|p| p.world_transform);

        if let Some(node) = self.nodes.get_mut(key) {
            node.world_transform = match parent_world {
                Some(parent_world) => parent_world * node.transform,
                None => node.transform,
            };
            node.inverse_world_transform = utils::inverse_or_nan(&node.world_transform);
            node.dirty_transform = false;
        }
    }

    fn update_bounds(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        if node.bounds.is_none() || node.light.is_some() {
            if let Some(node) = self.nodes.get_mut(key) {
                node.dirty_bounds = false;
            }
            return;
        }

        let mut bounds = Aabb::empty();
        match &node.mesh {
            Some(mesh) => bounds.extend_with_box(&mesh.bounds()),
            None => bounds.extend_with_point(&Vec3::zeros()),
        }
        for &child in &node.children {
            if let Some(c) = self.nodes.get(child) {
                if let (Some(child_bounds), None) = (&c.bounds, &c.light) {
                    bounds.extend_with_box(&child_bounds.transformed(&c.transform));
                }
            }
        }

        let parent = node.parent;
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.bounds = Some(bounds);

        match node.bounds_callback.clone() {
            Some(callback) => {
                node.world_bounds = callback(node);
                node.bounds = Some(node.world_bounds.transformed(&node.inverse_world_transform));
                node.dirty_bounds = false;
                if let Some(parent) = parent {
                    self.set_dirty_bounds(parent);
                }
            }
            None => {
                node.world_bounds = bounds.transformed(&node.world_transform);
                node.dirty_bounds = false;
            }
        }
    }

    /// Deep copy the subtree of `key` from `source` into this graph
    ///
    /// Material descriptors are cloned (textures by handle); meshes, states,
    /// lights and components are shared. The copy is returned detached.
    pub fn import_subtree(&mut self, source: &NodeGraph, key: NodeKey) -> Result<NodeKey, GraphError> {
        let root = source.node(key)?;
        let mut copy = root.clone();
        copy.parent = None;
        copy.children = Vec::new();
        let new_root = self.nodes.insert(copy);

        for &child in &root.children {
            let new_child = self.import_subtree(source, child)?;
            self.nodes[new_child].parent = Some(new_root);
            self.nodes[new_root].children.push(new_child);
        }
        Ok(new_root)
    }

    /// Deep copy the subtree of `key` within this graph
    pub fn copy_subtree(&mut self, key: NodeKey) -> Result<NodeKey, GraphError> {
        let source = self.extract_subtree(key)?;
        self.import_subtree(&source.0, source.1)
    }

    fn extract_subtree(&self, key: NodeKey) -> Result<(NodeGraph, NodeKey), GraphError> {
        let mut graph = NodeGraph::new();
        let root = graph.import_subtree(self, key)?;
        Ok((graph, root))
    }
}

/// Stable sort by pipeline state name, program, per-sampler texture, then mesh
pub fn sort_by_material(graph: &NodeGraph, nodes: &mut [NodeKey]) {
    nodes.sort_by(|&a, &b| match (graph.get(a), graph.get(b)) {
        (Some(a), Some(b)) => compare_material(a, b),
        _ => Ordering::Equal,
    });
}

fn compare_material(a: &Node, b: &Node) -> Ordering {
    let state_name = |n: &Node| n.state.as_ref().map(|s| s.name.clone());
    let program_name = |n: &Node| n.state.as_ref().map(|s| s.program_name.clone());

    state_name(a)
        .cmp(&state_name(b))
        .then_with(|| program_name(a).cmp(&program_name(b)))
        // (sampler, texture) pairs in sampler order, so differing sampler sets still order totally
        .then_with(|| a.material_data.textures().iter().cmp(b.material_data.textures().iter()))
        .then_with(|| a.mesh.as_ref().map(|m| m.id()).cmp(&b.mesh.as_ref().map(|m| m.id())))
}

/// Stable sort by distance from `reference`, nearest first
pub fn sort_by_camera_distance(graph: &NodeGraph, nodes: &mut [NodeKey], reference: &Vec3) {
    let distance = |key: NodeKey| {
        graph
            .get(key)
            .map_or(f64::INFINITY, |n| (n.world_position() - reference).norm())
    };
    nodes.sort_by(|&a, &b| distance(a).partial_cmp(&distance(b)).unwrap_or(Ordering::Equal));
}

/// Stable sort by node name
pub fn sort_by_name(graph: &NodeGraph, nodes: &mut [NodeKey]) {
    nodes.sort_by(|&a, &b| {
        let name = |k: NodeKey| graph.get(k).map(|n| n.name.as_str());
        name(a).cmp(&name(b))
    });
}
