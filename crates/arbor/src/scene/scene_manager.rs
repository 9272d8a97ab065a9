//! Scene stack
//!
//! The front scene (the most recently pushed) updates first, so it sees input
//! before the scenes below it, and draws last, so it ends up on top.

use crate::context::EngineContext;
use crate::physics::PhysicsSystem;
use crate::platform::InputState;
use crate::render::{dispatch_commands, CommandSink, RenderCommand, RenderSystem};
use crate::resources::ResourceManager;
use crate::scene::{Scene, SceneError};

/// LIFO stack of scenes
#[derive(Debug, Default)]
pub struct SceneManager {
    scenes: Vec<Scene>,
}

impl SceneManager {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a scene on top
    pub fn push_scene(&mut self, scene: Scene) {
        log::info!("Pushing scene '{}'", scene.name());
        self.scenes.push(scene);
    }

    /// Remove and return the front scene
    pub fn pop_scene(&mut self) -> Option<Scene> {
        let scene = self.scenes.pop();
        if let Some(scene) = &scene {
            log::info!("Popped scene '{}'", scene.name());
        }
        scene
    }

    /// Most recently pushed scene
    pub fn front_scene(&self) -> Option<&Scene> {
        self.scenes.last()
    }

    /// Mutable front scene
    pub fn front_scene_mut(&mut self) -> Option<&mut Scene> {
        self.scenes.last_mut()
    }

    /// Scenes from bottom to front
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Number of scenes on the stack
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether the stack is empty
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Update active scenes, front first
    pub fn update(&mut self, dt: f64, physics: &mut dyn PhysicsSystem, input: &InputState) {
        for scene in self.scenes.iter_mut().rev().filter(|s| s.active()) {
            scene.update(dt, physics, input);
        }
    }

    /// Cull active scenes, bottom first
    pub fn cull(&mut self, window_size: [f32; 2]) {
        for scene in self.scenes.iter_mut().filter(|s| s.active()) {
            scene.cull(window_size);
        }
    }

    /// Draw active scenes, bottom first
    pub fn draw(
        &mut self,
        render: &dyn RenderSystem,
        resources: &mut ResourceManager,
        sink: &mut dyn CommandSink,
    ) -> Result<(), SceneError> {
        for scene in self.scenes.iter_mut().filter(|s| s.active()) {
            scene.draw(render, resources, sink)?;
        }
        Ok(())
    }

    /// Run one frame: update, cull, draw, then execute the recorded commands
    ///
    /// Frames longer than the configured maximum step physics with the
    /// fallback delta instead. Returns the number of commands the backend
    /// failed to execute.
    pub fn run_frame(&mut self, ctx: &mut EngineContext, frame_time: f64) -> Result<usize, SceneError> {
        let dt = ctx.config.physics_dt(frame_time);
        self.update(dt, ctx.physics.as_mut(), ctx.window.input_state());
        self.cull(ctx.window.window_size());

        let mut commands: Vec<RenderCommand> = Vec::new();
        self.draw(ctx.render.as_ref(), &mut ctx.resources, &mut commands)?;
        Ok(dispatch_commands(ctx.render.as_mut(), commands))
    }
}
