//! Pipeline states
//!
//! A pipeline state is the named bundle of fixed-function settings plus the
//! program a drawable is rendered with. States are loaded and cached by the
//! resource manager; the depth pre-pass variant of state `X` is the state
//! named `X-z`.

use serde::{Deserialize, Serialize};

/// Blend factor
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Depth comparison function
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthFunc {
    Never,
    Less,
    LessEqual,
    Equal,
    Greater,
    Always,
}

/// Face culling mode
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CullFace {
    None,
    Back,
    Front,
}

/// Named pipeline state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineState {
    /// Cache name; filled in by the resource manager on load
    pub name: String,
    /// Name of the program bound by this state
    pub program_name: String,
    /// Whether fragments are blended (drawn in the transparency pass)
    pub blending: bool,
    /// Source blend factor
    pub blend_src: BlendFactor,
    /// Destination blend factor
    pub blend_dst: BlendFactor,
    /// Whether depth testing is enabled
    pub depth_test: bool,
    /// Whether depth writes are enabled
    pub depth_write: bool,
    /// Depth comparison
    pub depth_func: DepthFunc,
    /// Face culling
    pub cull_face: CullFace,
    /// Whether color writes are enabled
    pub color_mask: bool,
    /// Whether scissor testing is enabled
    pub scissor_test: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            name: String::new(),
            program_name: String::new(),
            blending: false,
            blend_src: BlendFactor::One,
            blend_dst: BlendFactor::Zero,
            depth_test: true,
            depth_write: true,
            depth_func: DepthFunc::Less,
            cull_face: CullFace::Back,
            color_mask: true,
            scissor_test: false,
        }
    }
}

impl PipelineState {
    /// Create an opaque state with the given name and program
    pub fn new(name: impl Into<String>, program_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program_name: program_name.into(),
            ..Self::default()
        }
    }

    /// Turn on alpha blending
    pub fn with_blending(mut self) -> Self {
        self.blending = true;
        self.blend_src = BlendFactor::SrcAlpha;
        self.blend_dst = BlendFactor::OneMinusSrcAlpha;
        self.depth_write = false;
        self
    }

    /// Name of the depth pre-pass variant of this state
    pub fn z_pass_name(&self) -> String {
        format!("{}-z", self.name)
    }
}
