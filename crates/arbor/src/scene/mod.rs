//! Scenegraph
//!
//! Nodes live in a [`NodeGraph`] arena and carry their behavior as pluggable
//! components. A [`Scene`] runs three phases per frame:
//!
//! ```text
//! update   input -> updater -> transform -> children -> bounds
//!    |
//! cull     cameras reshape, lights extracted, buckets filled and sorted
//!    |
//! draw     shadow passes, camera constants, render technique
//! ```
//!
//! The [`SceneManager`] stacks scenes and runs the phases over all of them.

mod aabb;
mod camera;
mod components;
mod light;
mod node;
#[allow(clippy::module_inception)]
mod scene;
mod scene_manager;

#[cfg(test)]
mod pipeline_tests;

pub use aabb::Aabb;
pub use camera::{make_frustum, Camera, Projection, RenderBucket, NUM_CASCADES};
pub use components::{
    AlwaysPassCuller, Culler, DefaultCuller, DefaultLightExtractor, DefaultPhysicsComponent, InputComponent,
    LightExtractor, NodeCommand, PhysicsComponent, Updater,
};
pub use light::{Light, LightBlock, Shadower, SharedShadower, MAX_CASCADES};
pub use node::{sort_by_camera_distance, sort_by_material, sort_by_name, BoundsCallback, GraphError, Node, NodeGraph, NodeKey};
pub use scene::Scene;
pub use scene_manager::SceneManager;

use thiserror::Error;

use crate::render::RenderError;
use crate::resources::ResourceError;

/// Errors raised while running a scene phase
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// A named resource could not be resolved
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The backend failed to provide a resource
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A graph operation referenced an invalid node
    #[error(transparent)]
    Graph(#[from] GraphError),
}
