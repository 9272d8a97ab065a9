//! Per-node behaviour components
//!
//! Each concern (culling, light extraction, physics gathering, update, input)
//! is a narrow trait with a default implementation. Nodes hold them as shared
//! `Arc<dyn _>` strategy objects; traversals always dispatch through the
//! component of the node being visited, so a subtree can opt into a different
//! policy without touching its ancestors.

use std::sync::Arc;

use crate::foundation::math::{Vec3, Vec4};
use crate::platform::InputState;
use crate::scene::{Camera, Node, NodeGraph, NodeKey};

/// Decides which drawables of a subtree a camera sees
pub trait Culler: Send + Sync {
    /// Cull the subtree rooted at `key` into `camera`'s render buckets
    fn run(&self, graph: &NodeGraph, camera: &mut Camera, key: NodeKey);
}

/// Collects light-carrying nodes for the frame
pub trait LightExtractor: Send + Sync {
    /// Append light nodes of the subtree rooted at `key` to `lights`
    fn run(&self, graph: &mut NodeGraph, key: NodeKey, lights: &mut Vec<NodeKey>);
}

/// Collects nodes that take part in the physics step
pub trait PhysicsComponent: Send + Sync {
    /// Append simulated nodes of the subtree rooted at `key` to `bucket`
    fn run(&self, graph: &NodeGraph, key: NodeKey, bucket: &mut Vec<NodeKey>);
}

/// Per-frame node logic
pub trait Updater: Send + Sync {
    /// Update the node at `key`
    fn run(&self, graph: &mut NodeGraph, key: NodeKey, dt: f64);
}

/// A deferred mutation produced by an input component
pub trait NodeCommand {
    /// Apply the command to the node at `key`
    fn run(&self, graph: &mut NodeGraph, key: NodeKey);
}

/// Translates raw input into node commands
pub trait InputComponent: Send + Sync {
    /// Produce the commands to apply to `node` for this frame's input
    fn run(&self, node: &Node, input: &InputState) -> Vec<Box<dyn NodeCommand>>;
}

impl<F> Updater for F
where
    F: Fn(&mut NodeGraph, NodeKey, f64) + Send + Sync,
{
    fn run(&self, graph: &mut NodeGraph, key: NodeKey, dt: f64) {
        self(graph, key, dt);
    }
}

impl<F> NodeCommand for F
where
    F: Fn(&mut NodeGraph, NodeKey),
{
    fn run(&self, graph: &mut NodeGraph, key: NodeKey) {
        self(graph, key);
    }
}

fn add_drawable(camera: &mut Camera, key: NodeKey, node: &Node) {
    if node.mesh().is_none() {
        return;
    }
    match node.state() {
        Some(state) => camera.add_node_to_render_buckets(key, state),
        None => log::warn!("Node '{}' has a mesh but no pipeline state, skipping", node.name()),
    }
}

fn cull_children(graph: &NodeGraph, camera: &mut Camera, node: &Node) {
    for &child in node.children() {
        if let Some(culler) = graph.get(child).and_then(|c| c.cull_component()) {
            culler.run(graph, camera, child);
        }
    }
}

/// Frustum culler
///
/// A node outside the frustum, or inactive, prunes its whole subtree.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCuller;

impl Culler for DefaultCuller {
    fn run(&self, graph: &NodeGraph, camera: &mut Camera, key: NodeKey) {
        let Some(node) = graph.get(key) else {
            return;
        };
        if !node.world_bounds().in_frustum(camera.frustum()) {
            return;
        }
        if !node.active() {
            return;
        }

        add_drawable(camera, key, node);
        cull_children(graph, camera, node);
    }
}

/// Culler that skips the frustum test
///
/// Meant for overlays that must always draw. Inactive nodes are still pruned.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPassCuller;

impl Culler for AlwaysPassCuller {
    fn run(&self, graph: &NodeGraph, camera: &mut Camera, key: NodeKey) {
        let Some(node) = graph.get(key) else {
            return;
        };
        if !node.active() {
            return;
        }

        add_drawable(camera, key, node);
        cull_children(graph, camera, node);
    }
}

/// Collects active light nodes and refreshes their block position
///
/// The block position's `xyz` is set from the node's world position; `w` is
/// kept as configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLightExtractor;

impl LightExtractor for DefaultLightExtractor {
    fn run(&self, graph: &mut NodeGraph, key: NodeKey, lights: &mut Vec<NodeKey>) {
        let Some(node) = graph.get_mut(key) else {
            return;
        };
        if !node.active() {
            return;
        }

        let position: Vec3 = node.world_position();
        if let Some(light) = node.light_mut() {
            let w = f64::from(light.block.position[3]);
            light.set_position(&Vec4::new(position.x, position.y, position.z, w));
            lights.push(key);
        }

        let children = node.children().to_vec();
        for child in children {
            let extractor = graph.get(child).and_then(|c| c.light_extractor()).map(Arc::clone);
            if let Some(extractor) = extractor {
                extractor.run(graph, child, lights);
            }
        }
    }
}

/// Collects every node carrying a rigid body
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPhysicsComponent;

impl PhysicsComponent for DefaultPhysicsComponent {
    fn run(&self, graph: &NodeGraph, key: NodeKey, bucket: &mut Vec<NodeKey>) {
        let Some(node) = graph.get(key) else {
            return;
        };
        if node.rigid_body().is_some() {
            bucket.push(key);
        }

        for &child in node.children() {
            if let Some(component) = graph.get(child).and_then(|c| c.physics_component()) {
                component.run(graph, child, bucket);
            }
        }
    }
}
