//! # Arbor
//!
//! A scenegraph toolkit for real-time 3D rendering. Arbor owns the frame
//! pipeline (transform and bounds propagation, frustum culling, state
//! bucketing, instanced batching and cascaded shadow maps) and emits a typed
//! command stream that a pluggable backend executes.
//!
//! ## Features
//!
//! - **Node graph**: arena-backed hierarchy with dirty-flag propagation
//! - **Components**: swappable culling, light extraction, physics, update and input behavior
//! - **Cameras**: perspective and orthographic, with cascade splits for shadows
//! - **Techniques**: z-prepass, opaque and blending passes, AABB and debug overlays
//! - **Backends**: rendering, physics, windowing and resource loading behind traits
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arbor::prelude::*;
//!
//! fn frame(ctx: &mut EngineContext, manager: &mut SceneManager) -> Result<(), SceneError> {
//!     let failures = manager.run_frame(ctx, 1.0 / 60.0)?;
//!     if failures > 0 {
//!         log::warn!("{} commands failed", failures);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod context;
pub mod foundation;
pub mod physics;
pub mod platform;
pub mod render;
pub mod resources;
pub mod scene;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use context::EngineContext;
pub use scene::{Scene, SceneError, SceneManager};

/// Common imports for toolkit users
pub mod prelude {
    pub use crate::{
        config::{Config, EngineConfig},
        context::EngineContext,
        foundation::math::{Mat4, Vec3, Vec4},
        physics::{NullPhysicsSystem, PhysicsSystem},
        platform::{HeadlessWindow, InputState, WindowSystem},
        render::{
            default_render_technique, CommandSink, PipelineState, RenderCommand, RenderSystem, ShadowMap,
        },
        resources::{MemoryResourceSystem, ResourceKind, ResourceManager, ResourceSystem},
        scene::{
            Aabb, Camera, DefaultCuller, DefaultLightExtractor, Light, Node, NodeGraph, NodeKey, Projection, Scene,
            SceneError, SceneManager,
        },
    };
}
