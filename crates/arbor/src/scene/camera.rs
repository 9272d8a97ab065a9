//! Cameras
//!
//! A camera turns a subtree of the graph into render buckets. Each cull pass
//! it refreshes its view from its mount node, rebuilds the projection when a
//! parameter changed, and recomputes the frustum planes and the world-space
//! boxes of its shadow cascades.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::foundation::math::{utils, GpuVec4, Mat4, Vec2, Vec3, Vec4};
use crate::render::{
    default_render_technique, CameraConstants, ClearMode, FramebufferHandle, PipelineState, RenderError,
    RenderSystem, RenderTechniqueFn, TechniqueOptions,
};
use crate::scene::{sort_by_camera_distance, sort_by_material, Aabb, NodeGraph, NodeKey};

/// Number of shadow cascades a camera partitions its depth range into
pub const NUM_CASCADES: usize = 3;

/// Projection model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Vertical field of view based perspective
    Perspective,
    /// Viewport rectangle based orthographic
    Orthographic,
}

/// Visible drawables sharing one pipeline state
#[derive(Debug, Clone)]
pub struct RenderBucket {
    /// State all nodes in the bucket are drawn with
    pub state: Arc<PipelineState>,
    /// Nodes in draw order
    pub nodes: Vec<NodeKey>,
}

/// Scene camera
pub struct Camera {
    name: String,
    auto_reshape: bool,
    auto_frustum: bool,
    projection: Projection,
    clear_color: GpuVec4,
    clear_depth: f32,
    clear_mode: ClearMode,
    node: Option<NodeKey>,
    scene_root: Option<NodeKey>,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    viewport: [f32; 4],
    vert_fov: f64,
    clip_distance: Vec2,
    dirty: bool,
    render_order: u8,
    framebuffer: Option<FramebufferHandle>,
    frustum: [Vec4; 6],
    cascade_aabbs: [Aabb; NUM_CASCADES],
    cascade_z_cuts: [f64; NUM_CASCADES],
    constants: CameraConstants,
    render_technique: Option<RenderTechniqueFn>,
    technique_options: TechniqueOptions,
    state_buckets: BTreeMap<String, RenderBucket>,
    visible_opaque_nodes: Vec<NodeKey>,
}

impl Camera {
    /// Create a camera, allocating its constant buffer
    ///
    /// The camera is not mounted anywhere until it is added to a scene.
    pub fn new(name: impl Into<String>, projection: Projection, render: &mut dyn RenderSystem) -> Result<Self, RenderError> {
        let buffer = render.new_uniform_buffer()?;
        Ok(Self {
            name: name.into(),
            auto_reshape: false,
            auto_frustum: false,
            projection,
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_mode: ClearMode::COLOR | ClearMode::DEPTH,
            node: None,
            scene_root: None,
            view_matrix: Mat4::identity(),
            projection_matrix: Mat4::identity(),
            viewport: [0.0; 4],
            vert_fov: 0.0,
            clip_distance: Vec2::zeros(),
            dirty: true,
            render_order: 0,
            framebuffer: None,
            frustum: [Vec4::zeros(); 6],
            cascade_aabbs: [Aabb::empty(); NUM_CASCADES],
            cascade_z_cuts: [0.0; NUM_CASCADES],
            constants: CameraConstants::new(buffer),
            render_technique: Some(default_render_technique),
            technique_options: TechniqueOptions::default(),
            state_buckets: BTreeMap::new(),
            visible_opaque_nodes: Vec::new(),
        })
    }

    /// Camera name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mount node
    pub fn node(&self) -> Option<NodeKey> {
        self.node
    }

    pub(crate) fn set_node(&mut self, node: Option<NodeKey>) {
        self.node = node;
    }

    /// Root of the subtree this camera culls
    pub fn scene_root(&self) -> Option<NodeKey> {
        self.scene_root
    }

    /// Cull a different subtree, e.g. an off-tree post-processing quad
    pub fn set_scene_root(&mut self, root: Option<NodeKey>) {
        self.scene_root = root;
    }

    /// Track the window size in the viewport
    pub fn set_auto_reshape(&mut self, auto_reshape: bool) {
        self.auto_reshape = auto_reshape;
    }

    /// Whether the viewport tracks the window size
    pub fn auto_reshape(&self) -> bool {
        self.auto_reshape
    }

    /// Derive near/far from the scene bounds every frame
    pub fn set_auto_frustum(&mut self, auto_frustum: bool) {
        self.auto_frustum = auto_frustum;
    }

    /// Whether near/far are derived from the scene bounds
    pub fn auto_frustum(&self) -> bool {
        self.auto_frustum
    }

    /// Projection model
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Change the projection model
    pub fn set_projection(&mut self, projection: Projection) {
        self.dirty = true;
        self.projection = projection;
    }

    /// Viewport `[x, y, width, height]`
    pub fn viewport(&self) -> [f32; 4] {
        self.viewport
    }

    /// Set the viewport `[x, y, width, height]`
    pub fn set_viewport(&mut self, viewport: [f32; 4]) {
        self.dirty = true;
        self.viewport = viewport;
    }

    /// Vertical field of view in degrees
    pub fn vertical_fov(&self) -> f64 {
        self.vert_fov
    }

    /// Set the vertical field of view in degrees; ignored by orthographic cameras
    pub fn set_vertical_fov(&mut self, degrees: f64) {
        self.dirty = true;
        self.vert_fov = degrees;
    }

    /// Near and far clip distances
    pub fn clip_distance(&self) -> Vec2 {
        self.clip_distance
    }

    /// Set the near and far clip distances
    pub fn set_clip_distance(&mut self, near: f64, far: f64) {
        self.dirty = true;
        self.clip_distance = Vec2::new(near, far);
    }

    /// Clear color
    pub fn clear_color(&self) -> GpuVec4 {
        self.clear_color
    }

    /// Set the clear color
    pub fn set_clear_color(&mut self, color: GpuVec4) {
        self.clear_color = color;
    }

    /// Clear depth
    pub fn clear_depth(&self) -> f32 {
        self.clear_depth
    }

    /// Set the clear depth
    pub fn set_clear_depth(&mut self, depth: f32) {
        self.clear_depth = depth;
    }

    /// Clear mode
    pub fn clear_mode(&self) -> ClearMode {
        self.clear_mode
    }

    /// Set the clear mode
    pub fn set_clear_mode(&mut self, mode: ClearMode) {
        self.clear_mode = mode;
    }

    /// Render order within the scene, ascending
    pub fn render_order(&self) -> u8 {
        self.render_order
    }

    /// Set the render order; takes effect when the camera is added to a scene
    pub fn set_render_order(&mut self, order: u8) {
        self.render_order = order;
    }

    /// Render target; `None` is the default framebuffer
    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    /// Set the render target
    pub fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.framebuffer = framebuffer;
    }

    /// Technique the camera's buckets are drawn with
    pub fn render_technique(&self) -> Option<RenderTechniqueFn> {
        self.render_technique
    }

    /// Replace the technique; `None` disables drawing
    pub fn set_render_technique(&mut self, technique: Option<RenderTechniqueFn>) {
        self.render_technique = technique;
    }

    /// Technique pass options
    pub fn technique_options(&self) -> TechniqueOptions {
        self.technique_options
    }

    /// Set the technique pass options
    pub fn set_technique_options(&mut self, options: TechniqueOptions) {
        self.technique_options = options;
    }

    /// Constant buffer
    pub fn constants(&self) -> &CameraConstants {
        &self.constants
    }

    /// Mutable constant buffer
    pub fn constants_mut(&mut self) -> &mut CameraConstants {
        &mut self.constants
    }

    /// World to view
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    /// Override the view matrix; replaced on the next reshape if mounted
    pub fn set_view_matrix(&mut self, m: Mat4) {
        self.view_matrix = m;
    }

    /// View to clip
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// Override the projection matrix; replaced on the next reshape if a
    /// projection parameter changes
    pub fn set_projection_matrix(&mut self, m: Mat4) {
        self.projection_matrix = m;
    }

    /// Frustum planes as of the last reshape
    pub fn frustum(&self) -> &[Vec4; 6] {
        &self.frustum
    }

    /// World-space box of cascade `cascade`
    pub fn cascade_aabb(&self, cascade: usize) -> &Aabb {
        &self.cascade_aabbs[cascade]
    }

    /// Far split distance of cascade `cascade`
    pub fn cascade_z_cut(&self, cascade: usize) -> f64 {
        self.cascade_z_cuts[cascade]
    }

    /// Visible drawables grouped by pipeline state name
    pub fn state_buckets(&self) -> &BTreeMap<String, RenderBucket> {
        &self.state_buckets
    }

    /// Visible opaque drawables, nearest first
    pub fn visible_opaque_nodes(&self) -> &[NodeKey] {
        &self.visible_opaque_nodes
    }

    /// World position of the camera
    pub fn position(&self, graph: &NodeGraph) -> Vec3 {
        match self.node.and_then(|k| graph.get(k)) {
            Some(node) => node.world_position(),
            None => utils::world_position(&utils::inverse_or_nan(&self.view_matrix)),
        }
    }

    /// Append a visible drawable under its state's bucket
    ///
    /// Non-blending drawables also go to the opaque list.
    pub fn add_node_to_render_buckets(&mut self, key: NodeKey, state: &Arc<PipelineState>) {
        self.state_buckets
            .entry(state.name.clone())
            .or_insert_with(|| RenderBucket {
                state: Arc::clone(state),
                nodes: Vec::new(),
            })
            .nodes
            .push(key);

        if !state.blending {
            self.visible_opaque_nodes.push(key);
        }
    }

    /// Drop last frame's visibility results
    pub fn clear_buckets(&mut self) {
        self.state_buckets.clear();
        self.visible_opaque_nodes.clear();
    }

    /// Sort every bucket by material and the opaque list by distance
    pub fn sort_buckets(&mut self, graph: &NodeGraph) {
        for bucket in self.state_buckets.values_mut() {
            sort_by_material(graph, &mut bucket.nodes);
        }
        let position = self.position(graph);
        sort_by_camera_distance(graph, &mut self.visible_opaque_nodes, &position);
    }

    fn aspect(&self) -> f64 {
        f64::from(self.viewport[2] / self.viewport[3])
    }

    /// Refresh view, projection, cascades and frustum
    pub fn reshape(&mut self, graph: &NodeGraph, window_size: [f32; 2]) {
        if self.auto_reshape && (window_size[0] != self.viewport[2] || window_size[1] != self.viewport[3]) {
            self.set_viewport([0.0, 0.0, window_size[0], window_size[1]]);
        }

        if let Some(node) = self.node.and_then(|k| graph.get(k)) {
            self.view_matrix = *node.inverse_world_transform();
        }

        if self.dirty {
            let (near, far) = (self.clip_distance.x, self.clip_distance.y);
            self.projection_matrix = match self.projection {
                Projection::Perspective => utils::perspective(utils::deg_to_rad(self.vert_fov), self.aspect(), near, far),
                Projection::Orthographic => {
                    let vp = self.viewport.map(f64::from);
                    utils::orthographic(vp[0], vp[2], vp[3], vp[1], near, far)
                }
            };
            self.dirty = false;
        }

        self.update_cascades();
        self.frustum = make_frustum(&self.projection_matrix, &self.view_matrix);
    }

    /// Split `[near, far]` into cascades, each a quarter of the next
    ///
    /// Cascade `c` ends at `near + (far - near) / 4^(n - c - 1)`, so the last
    /// one ends exactly at `far`. The cuts are offset by `near` rather than
    /// being a bare `(far - near) / 4^(n - c - 1)`, which keeps every cut inside
    /// the clip range.
    fn update_cascades(&mut self) {
        const NDC_CORNERS: [[f64; 3]; 8] = [
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [-1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ];

        let (near, far) = (self.clip_distance.x, self.clip_distance.y);
        let range = far - near;
        let fov = utils::deg_to_rad(self.vert_fov);
        let aspect = self.aspect();

        let mut min_range = near;
        for cascade in 0..NUM_CASCADES {
            let exponent = 2 * (NUM_CASCADES - cascade - 1) as i32;
            let max_range = near + range / 2f64.powi(exponent);

            let projection = utils::perspective(fov, aspect, min_range, max_range);
            let inverse = utils::inverse_or_nan(&(projection * self.view_matrix));

            let mut aabb = Aabb::empty();
            for corner in &NDC_CORNERS {
                aabb.extend_with_point(&utils::transform_coordinate(&Vec3::from(*corner), &inverse));
            }
            self.cascade_aabbs[cascade] = aabb;
            self.cascade_z_cuts[cascade] = max_range;
            min_range = max_range;
        }
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("name", &self.name)
            .field("projection", &self.projection)
            .field("node", &self.node)
            .field("scene_root", &self.scene_root)
            .field("viewport", &self.viewport)
            .field("clip_distance", &self.clip_distance)
            .field("render_order", &self.render_order)
            .field("buckets", &self.state_buckets.len())
            .finish_non_exhaustive()
    }
}

/// Six normalized frustum planes of `p * v`
///
/// Order: left, right, bottom, top, near, far. Each plane is `xyz` normal,
/// `w` offset, pointing inward.
pub fn make_frustum(p: &Mat4, v: &Mat4) -> [Vec4; 6] {
    let view_projection = p * v;
    let row = |i: usize| -> Vec4 { view_projection.row(i).transpose() };
    let (x, y, z, w) = (row(0), row(1), row(2), row(3));

    let mut planes = [w + x, w - x, w + y, w - y, w + z, w - z];
    for plane in &mut planes {
        let length = plane.xyz().norm();
        *plane /= length;
    }
    planes
}
