//! Per-camera constant buffer
//!
//! Every camera (and every shadow cascade) owns one uniform buffer holding its
//! view and projection matrices plus the light blocks extracted this frame.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{utils, GpuMat4, GpuVec4, Mat4};
use crate::render::{CommandSink, RenderCommand, UniformBufferHandle};
use crate::scene::LightBlock;

/// Maximum number of lights uploaded per camera; extra lights are dropped
pub const MAX_LIGHTS: usize = 16;

/// GPU layout of the camera constant buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SceneBlock {
    /// World to view
    pub view: GpuMat4,
    /// View to clip
    pub projection: GpuMat4,
    /// World to clip
    pub view_projection: GpuMat4,
    /// Number of valid entries in `lights`, splatted across all components
    pub light_count: GpuVec4,
    /// Light blocks
    pub lights: [LightBlock; MAX_LIGHTS],
}

/// Camera constant buffer and its CPU-side mirror
#[derive(Debug, Clone)]
pub struct CameraConstants {
    buffer: UniformBufferHandle,
    block: Box<SceneBlock>,
}

impl CameraConstants {
    /// Wrap a backend uniform buffer
    pub fn new(buffer: UniformBufferHandle) -> Self {
        Self {
            buffer,
            block: Box::new(SceneBlock::zeroed()),
        }
    }

    /// Backend buffer handle
    pub fn buffer(&self) -> UniformBufferHandle {
        self.buffer
    }

    /// Last uploaded block
    pub fn block(&self) -> &SceneBlock {
        &self.block
    }

    /// Refresh the block and emit the buffer update
    pub fn set_data(&mut self, projection: &Mat4, view: &Mat4, lights: &[LightBlock], sink: &mut dyn CommandSink) {
        let count = lights.len().min(MAX_LIGHTS);
        if lights.len() > MAX_LIGHTS {
            log::trace!("Dropping {} lights over the per-camera cap", lights.len() - MAX_LIGHTS);
        }

        let block = &mut *self.block;
        block.view = utils::mat4_to_gpu(view);
        block.projection = utils::mat4_to_gpu(projection);
        block.view_projection = utils::mat4_to_gpu(&(projection * view));
        block.light_count = [count as f32; 4];
        block.lights = [LightBlock::zeroed(); MAX_LIGHTS];
        block.lights[..count].copy_from_slice(&lights[..count]);

        sink.submit(RenderCommand::UpdateUniformBuffer {
            buffer: self.buffer,
            data: bytemuck::bytes_of(block).to_vec(),
        });
    }
}
