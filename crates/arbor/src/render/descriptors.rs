//! Per-drawable material data
//!
//! A [`Descriptors`] set carries everything bound alongside a pipeline state
//! for one drawable: sampler textures, loose uniform values, uniform buffers
//! and four free-form per-instance vectors.

use std::collections::BTreeMap;

use crate::foundation::math::{GpuMat4, GpuVec4};
use crate::render::{TextureHandle, UniformBufferHandle};

/// A loose uniform value
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4(GpuVec4),
    Mat4(GpuMat4),
}

/// Material descriptor set of a drawable
///
/// Maps are ordered by name so iteration (and therefore sorting and
/// command emission) is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptors {
    uniforms: BTreeMap<String, UniformValue>,
    uniform_buffers: BTreeMap<String, UniformBufferHandle>,
    textures: BTreeMap<String, TextureHandle>,
    custom: [GpuVec4; 4],
}

impl Descriptors {
    /// Create an empty descriptor set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a uniform value
    pub fn set_uniform(&mut self, name: impl Into<String>, value: UniformValue) {
        self.uniforms.insert(name.into(), value);
    }

    /// Uniform value by name
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    /// All uniform values
    pub fn uniforms(&self) -> &BTreeMap<String, UniformValue> {
        &self.uniforms
    }

    /// Bind a uniform buffer under `name`
    pub fn set_uniform_buffer(&mut self, name: impl Into<String>, buffer: UniformBufferHandle) {
        self.uniform_buffers.insert(name.into(), buffer);
    }

    /// Uniform buffer by name
    pub fn uniform_buffer(&self, name: &str) -> Option<UniformBufferHandle> {
        self.uniform_buffers.get(name).copied()
    }

    /// All uniform buffers
    pub fn uniform_buffers(&self) -> &BTreeMap<String, UniformBufferHandle> {
        &self.uniform_buffers
    }

    /// Bind `texture` to the sampler called `name`
    pub fn set_texture(&mut self, name: impl Into<String>, texture: TextureHandle) {
        self.textures.insert(name.into(), texture);
    }

    /// Texture bound to sampler `name`
    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        self.textures.get(name).copied()
    }

    /// All sampler bindings
    pub fn textures(&self) -> &BTreeMap<String, TextureHandle> {
        &self.textures
    }

    /// Free-form per-instance slot `index` (0..4)
    pub fn custom(&self, index: usize) -> GpuVec4 {
        self.custom[index]
    }

    /// All four per-instance slots
    pub fn customs(&self) -> &[GpuVec4; 4] {
        &self.custom
    }

    /// Set per-instance slot `index` (0..4)
    pub fn set_custom(&mut self, index: usize, value: GpuVec4) {
        self.custom[index] = value;
    }

    /// Whether both sets bind the same texture to every sampler
    pub fn same_textures(&self, other: &Descriptors) -> bool {
        self.textures == other.textures
    }
}
