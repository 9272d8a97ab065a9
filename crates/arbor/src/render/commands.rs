//! Render command stream
//!
//! Techniques emit [`RenderCommand`]s into a [`CommandSink`] in the exact
//! order the backend must execute them. The sink may be a plain vector (tests,
//! recording) or a channel feeding a render thread; either way emission is
//! synchronous and ordering is preserved.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use bitflags::bitflags;

use crate::foundation::math::GpuVec4;
use crate::render::{
    Descriptors, FramebufferHandle, InstanceData, Mesh, PipelineState, RenderSystem, UniformBufferHandle,
};

bitflags! {
    /// Which attachments a clear affects
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMode: u32 {
        /// Clear the color attachments
        const COLOR = 1 << 0;
        /// Clear the depth attachment
        const DEPTH = 1 << 1;
    }
}

/// One backend instruction
#[derive(Debug, Clone)]
pub enum RenderCommand {
    /// Free-form marker, useful when reading captured streams
    Debug(String),

    /// Bind a framebuffer; `None` is the default (window) framebuffer
    SetFramebuffer(Option<FramebufferHandle>),

    /// Set the viewport rectangle `[x, y, width, height]`
    SetViewport([f32; 4]),

    /// Clear the bound framebuffer
    Clear {
        /// Attachments to clear
        mode: ClearMode,
        /// Clear color
        color: GpuVec4,
        /// Clear depth
        depth: f32,
    },

    /// Bind a pipeline state (and its program)
    BindState(Arc<PipelineState>),

    /// Bind a uniform buffer to the named block
    BindUniformBuffer {
        /// Uniform block name
        name: String,
        /// Buffer to bind
        buffer: UniformBufferHandle,
    },

    /// Replace the contents of a uniform buffer
    UpdateUniformBuffer {
        /// Target buffer
        buffer: UniformBufferHandle,
        /// Raw `std140`-compatible bytes
        data: Vec<u8>,
    },

    /// Bind a drawable's material descriptors
    BindDescriptors(Descriptors),

    /// Draw a mesh once
    Draw {
        /// Mesh to draw
        mesh: Arc<Mesh>,
    },

    /// Draw a mesh once per instance record
    DrawInstanced {
        /// Mesh to draw
        mesh: Arc<Mesh>,
        /// Number of instances
        instance_count: usize,
        /// Per-instance data, `instance_count` entries
        instances: Vec<InstanceData>,
    },
}

impl RenderCommand {
    /// Short command name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            RenderCommand::Debug(_) => "Debug",
            RenderCommand::SetFramebuffer(_) => "SetFramebuffer",
            RenderCommand::SetViewport(_) => "SetViewport",
            RenderCommand::Clear { .. } => "Clear",
            RenderCommand::BindState(_) => "BindState",
            RenderCommand::BindUniformBuffer { .. } => "BindUniformBuffer",
            RenderCommand::UpdateUniformBuffer { .. } => "UpdateUniformBuffer",
            RenderCommand::BindDescriptors(_) => "BindDescriptors",
            RenderCommand::Draw { .. } => "Draw",
            RenderCommand::DrawInstanced { .. } => "DrawInstanced",
        }
    }
}

/// Destination of emitted commands
pub trait CommandSink {
    /// Append one command
    fn submit(&mut self, command: RenderCommand);
}

impl CommandSink for Vec<RenderCommand> {
    fn submit(&mut self, command: RenderCommand) {
        self.push(command);
    }
}

impl CommandSink for Sender<RenderCommand> {
    fn submit(&mut self, command: RenderCommand) {
        if let Err(err) = self.send(command) {
            log::warn!("Render command receiver dropped, discarding {}", err.0.kind());
        }
    }
}

/// Execute a command stream in order
///
/// Failed commands are logged and skipped so the frame still completes.
/// Returns the number of commands that failed.
pub fn dispatch_commands<I>(render: &mut dyn RenderSystem, commands: I) -> usize
where
    I: IntoIterator<Item = RenderCommand>,
{
    let mut failures = 0;
    for command in commands {
        if let Err(err) = render.execute(&command) {
            log::warn!("Skipping {} command: {}", command.kind(), err);
            failures += 1;
        }
    }
    failures
}
