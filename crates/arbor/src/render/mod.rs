//! # Rendering System
//!
//! The scenegraph never talks to a GPU API directly. It produces an ordered
//! stream of [`RenderCommand`]s and asks a [`RenderSystem`] implementation for
//! the few things it cannot decide itself: resource creation and whether two
//! descriptor sets may share an instanced draw.
//!
//! ## Architecture
//!
//! - **RenderSystem**: backend capability trait (OpenGL, Metal, test doubles)
//! - **Commands**: typed command stream plus the [`CommandSink`] it is written to
//! - **Batching**: merges adjacent compatible drawables into instanced draws
//! - **Techniques**: per-camera pass structure (z-prepass, opaque, blending, AABB)
//! - **Shadow**: cascaded shadow map shadower

pub mod batching;
pub mod commands;
pub mod constants;
pub mod descriptors;
pub mod mesh;
pub mod shadow;
pub mod state;
pub mod technique;

pub use batching::{partition_batches, render_batch, render_batched_nodes, InstanceData, MAX_INSTANCES};
pub use commands::{dispatch_commands, ClearMode, CommandSink, RenderCommand};
pub use constants::{CameraConstants, SceneBlock, MAX_LIGHTS};
pub use descriptors::{Descriptors, UniformValue};
pub use mesh::{aabb_mesh, screen_quad_mesh, Mesh, MeshId, PrimitiveType};
pub use shadow::{shadow_texture_name, ShadowMap};
pub use state::{BlendFactor, CullFace, DepthFunc, PipelineState};
pub use technique::{
    aabb_render_technique, debug_render_technique, default_render_technique, RenderContext,
    RenderTechniqueFn, TechniqueOptions, CAMERA_CONSTANTS_BLOCK,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Opaque handle to a backend texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureHandle(pub u32);

/// Opaque handle to a backend framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FramebufferHandle(pub u32);

/// Opaque handle to a backend uniform buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniformBufferHandle(pub u32);

/// Opaque handle to a compiled GPU program
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramHandle(pub u32);

/// Texture dimensionality
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureTarget {
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Cubemap,
}

/// Texture component layout
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureFormat {
    R,
    Rg,
    Rgb,
    Rgba,
    Depth,
}

/// Texture component layout and size
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureSizedFormat {
    R8,
    R16F,
    R32F,
    Rg8,
    Rg16F,
    Rg32F,
    Rgb8,
    Rgb16F,
    Rgb32F,
    Rgba8,
    Rgba16F,
    Rgba32F,
    Depth32F,
}

/// Texture sampling filter
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureFilter {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

/// Texture addressing mode
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureWrapMode {
    Repeat,
    ClampEdge,
}

/// Everything a backend needs to allocate a texture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDescriptor {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Whether to allocate a mip chain
    pub mipmaps: bool,
    /// Dimensionality
    pub target: TextureTarget,
    /// Component layout
    pub format: TextureFormat,
    /// Component layout and size
    pub sized_format: TextureSizedFormat,
    /// Sampling filter
    pub filter: TextureFilter,
    /// Addressing mode
    pub wrap_mode: TextureWrapMode,
}

impl TextureDescriptor {
    /// Two-channel 32-bit float render target, as used by shadow cascades
    pub fn shadow_target(size: u32) -> Self {
        Self {
            width: size,
            height: size,
            mipmaps: false,
            target: TextureTarget::Texture2D,
            format: TextureFormat::Rg,
            sized_format: TextureSizedFormat::Rg32F,
            filter: TextureFilter::Linear,
            wrap_mode: TextureWrapMode::Repeat,
        }
    }
}

/// Main rendering backend trait
///
/// Implemented by concrete GPU backends. The scenegraph only creates resources
/// through it, executes commands through [`dispatch_commands`], and asks it for
/// the batching policy.
pub trait RenderSystem {
    /// Create a texture, optionally with initial raw contents
    fn new_texture(&mut self, descriptor: &TextureDescriptor, data: Option<&[u8]>) -> BackendResult<TextureHandle>;

    /// Create a framebuffer with no attachments
    fn new_framebuffer(&mut self) -> BackendResult<FramebufferHandle>;

    /// Attach `texture` as color attachment `index` of `framebuffer`
    fn set_color_attachment(&mut self, framebuffer: FramebufferHandle, index: u32, texture: TextureHandle) -> BackendResult<()>;

    /// Create an empty uniform buffer
    fn new_uniform_buffer(&mut self) -> BackendResult<UniformBufferHandle>;

    /// Compile a program from its resource description
    fn new_program(&mut self, name: &str, source: &[u8]) -> BackendResult<ProgramHandle>;

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Release a framebuffer
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Whether drawables bound with `a` and `b` may share one instanced draw
    fn can_batch(&self, a: &Descriptors, b: &Descriptors) -> bool;

    /// Execute one command
    ///
    /// Returning an error does not stop the frame; see [`dispatch_commands`].
    fn execute(&mut self, command: &RenderCommand) -> BackendResult<()>;
}

/// Rendering errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A resource could not be created by the backend
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// The backend does not know how to execute a command
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    /// A command failed while executing
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// A shared shadower was poisoned by a panic on another thread
    #[error("Shadower for light '{0}' is poisoned")]
    ShadowerPoisoned(String),
}
