//! Engine context
//!
//! The platform services a frame needs, bundled so the run loop can be
//! handed one value instead of five.

use crate::config::EngineConfig;
use crate::physics::{NullPhysicsSystem, PhysicsSystem};
use crate::platform::{HeadlessWindow, WindowSystem};
use crate::render::{RenderError, RenderSystem, ShadowMap};
use crate::resources::{ResourceManager, ResourceSystem};
use crate::scene::{Camera, Projection};

/// Services shared by every scene of a frame
pub struct EngineContext {
    /// Rendering backend
    pub render: Box<dyn RenderSystem>,

    /// Named resource cache
    pub resources: ResourceManager,

    /// Physics world
    pub physics: Box<dyn PhysicsSystem>,

    /// Window and input source
    pub window: Box<dyn WindowSystem>,

    /// Tunables
    pub config: EngineConfig,
}

impl EngineContext {
    /// Assemble a context from its services
    pub fn new(
        render: Box<dyn RenderSystem>,
        resources: Box<dyn ResourceSystem>,
        physics: Box<dyn PhysicsSystem>,
        window: Box<dyn WindowSystem>,
        config: EngineConfig,
    ) -> Self {
        log::info!(
            "Engine context ready (shadow maps {}px, transparent sorting {})",
            config.shadow_map_size,
            config.sort_transparent_back_to_front
        );
        Self {
            render,
            resources: ResourceManager::new(resources),
            physics,
            window,
            config,
        }
    }

    /// Context without physics and with a fixed-size window
    pub fn headless(
        render: Box<dyn RenderSystem>,
        resources: Box<dyn ResourceSystem>,
        config: EngineConfig,
    ) -> Self {
        let (width, height) = config.default_window_size;
        Self::new(
            render,
            resources,
            Box::new(NullPhysicsSystem::new()),
            Box::new(HeadlessWindow::new(width, height)),
            config,
        )
    }

    /// Camera allocated on this context's backend, with the configured pass options
    pub fn new_camera(&mut self, name: impl Into<String>, projection: Projection) -> Result<Camera, RenderError> {
        let mut camera = Camera::new(name, projection, self.render.as_mut())?;
        camera.set_technique_options(self.config.technique_options());
        Ok(camera)
    }

    /// Cascaded shadow map at the configured resolution
    pub fn new_shadow_map(&mut self) -> Result<ShadowMap, RenderError> {
        ShadowMap::new(self.config.shadow_map_size, self.render.as_mut())
    }
}
