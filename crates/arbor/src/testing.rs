//! Recording backend for unit tests

use std::collections::HashSet;

use crate::render::{
    BackendResult, Descriptors, FramebufferHandle, ProgramHandle, RenderCommand, RenderError, RenderSystem,
    TextureDescriptor, TextureHandle, UniformBufferHandle,
};

/// Batching policy of the recording backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Every pair batches
    Always,
    /// No pair batches
    Never,
    /// Pairs batch when they bind the same textures
    SameTextures,
}

/// Backend that hands out sequential handles and records executed commands
#[derive(Debug)]
pub struct RecordingRenderSystem {
    next_handle: u32,
    policy: BatchPolicy,
    rejected: HashSet<&'static str>,
    executed: Vec<RenderCommand>,
    attachments: Vec<(FramebufferHandle, u32, TextureHandle)>,
    textures_created: usize,
    programs_created: usize,
    destroyed_textures: Vec<TextureHandle>,
}

impl RecordingRenderSystem {
    pub fn new() -> Self {
        Self::with_policy(BatchPolicy::SameTextures)
    }

    pub fn with_policy(policy: BatchPolicy) -> Self {
        Self {
            next_handle: 0,
            policy,
            rejected: HashSet::new(),
            executed: Vec::new(),
            attachments: Vec::new(),
            textures_created: 0,
            programs_created: 0,
            destroyed_textures: Vec::new(),
        }
    }

    /// Fail every command of this kind
    pub fn reject_kind(&mut self, kind: &'static str) {
        self.rejected.insert(kind);
    }

    pub fn executed(&self) -> &[RenderCommand] {
        &self.executed
    }

    pub fn executed_kinds(&self) -> Vec<&'static str> {
        self.executed.iter().map(RenderCommand::kind).collect()
    }

    pub fn attachments(&self) -> &[(FramebufferHandle, u32, TextureHandle)] {
        &self.attachments
    }

    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    pub fn programs_created(&self) -> usize {
        self.programs_created
    }

    pub fn destroyed_textures(&self) -> &[TextureHandle] {
        &self.destroyed_textures
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl Default for RecordingRenderSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSystem for RecordingRenderSystem {
    fn new_texture(&mut self, _descriptor: &TextureDescriptor, _data: Option<&[u8]>) -> BackendResult<TextureHandle> {
        self.textures_created += 1;
        Ok(TextureHandle(self.next()))
    }

    fn new_framebuffer(&mut self) -> BackendResult<FramebufferHandle> {
        Ok(FramebufferHandle(self.next()))
    }

    fn set_color_attachment(&mut self, framebuffer: FramebufferHandle, index: u32, texture: TextureHandle) -> BackendResult<()> {
        self.attachments.push((framebuffer, index, texture));
        Ok(())
    }

    fn new_uniform_buffer(&mut self) -> BackendResult<UniformBufferHandle> {
        Ok(UniformBufferHandle(self.next()))
    }

    fn new_program(&mut self, name: &str, _source: &[u8]) -> BackendResult<ProgramHandle> {
        if name.is_empty() {
            return Err(RenderError::ResourceCreationFailed("program without a name".into()));
        }
        self.programs_created += 1;
        Ok(ProgramHandle(self.next()))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.destroyed_textures.push(texture);
    }

    fn destroy_framebuffer(&mut self, _framebuffer: FramebufferHandle) {}

    fn can_batch(&self, a: &Descriptors, b: &Descriptors) -> bool {
        match self.policy {
            BatchPolicy::Always => true,
            BatchPolicy::Never => false,
            BatchPolicy::SameTextures => a.same_textures(b),
        }
    }

    fn execute(&mut self, command: &RenderCommand) -> BackendResult<()> {
        if self.rejected.contains(command.kind()) {
            return Err(RenderError::UnsupportedCommand(command.kind().to_string()));
        }
        self.executed.push(command.clone());
        Ok(())
    }
}
