//! Scenes
//!
//! A scene owns a node graph, its cameras (kept in ascending render order)
//! and the lights extracted on the last cull. It drives the three per-frame
//! phases, always in this order: [`Scene::update`], [`Scene::cull`],
//! [`Scene::draw`].

use crate::physics::PhysicsSystem;
use crate::platform::InputState;
use crate::render::{CommandSink, RenderContext, RenderError, RenderSystem};
use crate::resources::ResourceManager;
use crate::scene::{Camera, GraphError, LightBlock, Node, NodeGraph, NodeKey, Projection, SceneError};

/// A node graph plus the cameras that render it
#[derive(Debug)]
pub struct Scene {
    name: String,
    graph: NodeGraph,
    root: NodeKey,
    active: bool,
    cameras: Vec<Camera>,
    lights: Vec<NodeKey>,
}

impl Scene {
    /// Create an active scene with an empty root node
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut graph = NodeGraph::new();
        let root = graph.create(name.clone());
        log::info!("Created scene '{}'", name);

        Self {
            name,
            graph,
            root,
            active: true,
            cameras: Vec::new(),
            lights: Vec::new(),
        }
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root node
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Use another node of the graph as root
    pub fn set_root(&mut self, root: NodeKey) -> Result<(), GraphError> {
        if !self.graph.contains(root) {
            return Err(GraphError::NodeNotFound(root));
        }
        self.root = root;
        Ok(())
    }

    /// Node graph
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Mutable node graph
    ///
    /// Mutations must happen between frames, never while a phase runs.
    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.graph
    }

    /// Whether the scene manager runs this scene
    pub fn active(&self) -> bool {
        self.active
    }

    /// Enable or disable the scene
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Cameras in render order
    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    /// Mutable cameras in render order
    pub fn cameras_mut(&mut self) -> &mut [Camera] {
        &mut self.cameras
    }

    /// Camera by name
    pub fn camera(&self, name: &str) -> Option<&Camera> {
        self.cameras.iter().find(|c| c.name() == name)
    }

    /// Mutable camera by name
    pub fn camera_mut(&mut self, name: &str) -> Option<&mut Camera> {
        self.cameras.iter_mut().find(|c| c.name() == name)
    }

    /// Light nodes extracted on the last cull
    pub fn lights(&self) -> &[NodeKey] {
        &self.lights
    }

    /// Mount `camera` on a new node under `parent`
    ///
    /// A camera without a scene root culls from the scene root. Cameras are
    /// re-sorted (stably) by render order. Returns the mount node.
    pub fn add_camera(&mut self, parent: NodeKey, mut camera: Camera) -> Result<NodeKey, GraphError> {
        if !self.graph.contains(parent) {
            return Err(GraphError::NodeNotFound(parent));
        }

        let mount = self.graph.insert(Node::without_bounds(camera.name()));
        self.graph.add_child(parent, mount)?;
        camera.set_node(Some(mount));
        if camera.scene_root().is_none() {
            camera.set_scene_root(Some(self.root));
        }

        log::debug!("Scene '{}': added camera '{}'", self.name, camera.name());
        self.cameras.push(camera);
        self.cameras.sort_by_key(Camera::render_order);
        Ok(mount)
    }

    /// Step physics, then run the node update traversal
    pub fn update(&mut self, dt: f64, physics: &mut dyn PhysicsSystem, input: &InputState) {
        let mut bodies = Vec::new();
        if let Some(component) = self.graph.get(self.root).and_then(|n| n.physics_component()) {
            component.run(&self.graph, self.root, &mut bodies);
        }
        physics.update(dt, &mut self.graph, &bodies);

        self.graph.update(self.root, dt, input);
    }

    /// Refresh cameras, extract lights and fill every camera's sorted buckets
    pub fn cull(&mut self, window_size: [f32; 2]) {
        for camera in &mut self.cameras {
            if camera.auto_frustum() {
                let scene_bounds = camera
                    .scene_root()
                    .and_then(|k| self.graph.get(k))
                    .map(|n| *n.world_bounds());
                if let Some(bounds) = scene_bounds {
                    let distance = (camera.position(&self.graph) - bounds.center()).norm();
                    let radius = bounds.size().norm() / 2.0;
                    camera.set_clip_distance((distance - radius).max(1.0), distance + radius);
                }
            }
            camera.reshape(&self.graph, window_size);
        }

        self.lights.clear();
        let extractor = self.graph.get(self.root).and_then(|n| n.light_extractor()).cloned();
        if let Some(extractor) = extractor {
            extractor.run(&mut self.graph, self.root, &mut self.lights);
        }

        for camera in &mut self.cameras {
            camera.clear_buckets();
            if let Some(root) = camera.scene_root() {
                if let Some(culler) = self.graph.get(root).and_then(|n| n.cull_component()) {
                    culler.run(&self.graph, camera, root);
                }
            }
            camera.sort_buckets(&self.graph);
            log::trace!(
                "Camera '{}': {} buckets, {} opaque",
                camera.name(),
                camera.state_buckets().len(),
                camera.visible_opaque_nodes().len()
            );
        }
    }

    /// Record shadow passes and each camera's technique into `sink`
    ///
    /// Fails fast on the first resource that cannot be resolved.
    pub fn draw(
        &mut self,
        render: &dyn RenderSystem,
        resources: &mut ResourceManager,
        sink: &mut dyn CommandSink,
    ) -> Result<(), SceneError> {
        for camera in &mut self.cameras {
            if camera.projection() == Projection::Perspective {
                for &key in &self.lights {
                    let Some(light) = self.graph.get(key).and_then(|n| n.light()).cloned() else {
                        continue;
                    };
                    let Some(shadower) = light.shadower else {
                        continue;
                    };

                    let mut block = light.block;
                    let mut guard = shadower.lock().map_err(|_| {
                        RenderError::ShadowerPoisoned(self.graph.get(key).map(|n| n.name().to_string()).unwrap_or_default())
                    })?;
                    guard.render(&mut block, camera, &mut self.graph, render, resources, sink)?;

                    if let Some(light) = self.graph.get_mut(key).and_then(|n| n.light_mut()) {
                        light.block = block;
                    }
                }
            }

            let blocks: Vec<LightBlock> = self
                .lights
                .iter()
                .filter_map(|&k| self.graph.get(k).and_then(|n| n.light()).map(|l| l.block))
                .collect();
            let (projection, view) = (*camera.projection_matrix(), *camera.view_matrix());
            camera.constants_mut().set_data(&projection, &view, &blocks, sink);

            if let Some(technique) = camera.render_technique() {
                let mut ctx = RenderContext {
                    camera,
                    graph: &self.graph,
                    render,
                    resources: &mut *resources,
                    sink: &mut *sink,
                };
                technique(&mut ctx)?;
            }
        }
        Ok(())
    }
}
