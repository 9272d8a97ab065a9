//! Lights
//!
//! A light is a GPU property block plus an optional [`Shadower`]. The block is
//! uploaded verbatim into every camera's constant buffer.

use std::fmt;
use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{utils, GpuMat4, GpuVec4, Vec4};
use crate::render::{CommandSink, RenderSystem, TextureHandle};
use crate::resources::{ResourceError, ResourceManager};
use crate::scene::{Camera, NodeGraph};

/// Upper bound on cascades stored per light block
pub const MAX_CASCADES: usize = 10;

/// GPU layout of a light
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightBlock {
    /// Bias-adjusted light view-projection per cascade
    pub vp_matrix: [GpuMat4; MAX_CASCADES],
    /// Far split of each cascade in `x`
    pub z_cuts: [GpuVec4; MAX_CASCADES],
    /// World position in `xyz`
    pub position: GpuVec4,
    /// Light color
    pub color: GpuVec4,
}

impl Default for LightBlock {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Shadow casting strategy of a light
pub trait Shadower: Send {
    /// Shadow textures, one per cascade
    fn textures(&self) -> &[TextureHandle];

    /// Render the shadow passes of `block` for `camera`
    ///
    /// Writes the per-cascade matrices and splits into `block`.
    fn render(
        &mut self,
        block: &mut LightBlock,
        camera: &Camera,
        graph: &mut NodeGraph,
        render: &dyn RenderSystem,
        resources: &mut ResourceManager,
        sink: &mut dyn CommandSink,
    ) -> Result<(), ResourceError>;
}

/// Shared shadower handle
pub type SharedShadower = Arc<Mutex<dyn Shadower>>;

/// A light attached to a node
#[derive(Clone, Default)]
pub struct Light {
    /// Property block
    pub block: LightBlock,
    /// Optional shadow caster
    pub shadower: Option<SharedShadower>,
}

impl Light {
    /// Light with the given color and no shadows
    pub fn new(color: GpuVec4) -> Self {
        Self {
            block: LightBlock {
                color,
                ..LightBlock::default()
            },
            shadower: None,
        }
    }

    /// Attach a shadow caster
    pub fn with_shadower(mut self, shadower: SharedShadower) -> Self {
        self.shadower = Some(shadower);
        self
    }

    /// Set the block position
    pub fn set_position(&mut self, position: &Vec4) {
        self.block.position = utils::vec4_to_gpu(position);
    }
}

impl fmt::Debug for Light {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Light")
            .field("position", &self.block.position)
            .field("color", &self.block.color)
            .field("shadowed", &self.shadower.is_some())
            .finish()
    }
}
