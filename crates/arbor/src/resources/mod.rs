//! Resource management
//!
//! [`ResourceManager`] resolves named resources through a [`ResourceSystem`]
//! and caches the result: pipeline states (RON documents), programs (compiled
//! by the render system), textures and model templates. Models are returned
//! as deep copies of the cached template so every instance can be moved and
//! re-materialed independently.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::render::{aabb_mesh, Mesh, PipelineState, ProgramHandle, RenderError, RenderSystem, TextureDescriptor, TextureHandle};
use crate::scene::{GraphError, NodeGraph, NodeKey};

/// Kind of a named resource
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    State,
    Program,
    ProgramData,
    Texture,
    Model,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::State => "state",
            ResourceKind::Program => "program",
            ResourceKind::ProgramData => "program data",
            ResourceKind::Texture => "texture",
            ResourceKind::Model => "model",
        };
        f.write_str(name)
    }
}

/// Resource errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// The resource system has nothing under that name
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Resource kind
        kind: ResourceKind,
        /// Requested name
        name: String,
    },

    /// The resource exists but could not be parsed
    #[error("Cannot parse {kind} '{name}': {reason}")]
    Parse {
        /// Resource kind
        kind: ResourceKind,
        /// Requested name
        name: String,
        /// Parser message
        reason: String,
    },

    /// The backend refused to create the resource
    #[error("Backend error: {0}")]
    Backend(#[from] RenderError),

    /// A cached model template is broken
    #[error("Model template error: {0}")]
    Graph(#[from] GraphError),
}

/// Source of raw resource bytes
pub trait ResourceSystem {
    /// Raw bytes of the named resource
    fn load(&self, kind: ResourceKind, name: &str) -> Result<Vec<u8>, ResourceError>;
}

/// Resource system backed by an in-memory table
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceSystem {
    entries: HashMap<(ResourceKind, String), Vec<u8>>,
}

impl MemoryResourceSystem {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource
    pub fn insert(&mut self, kind: ResourceKind, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.entries.insert((kind, name.into()), data.into());
    }

    /// Builder form of [`MemoryResourceSystem::insert`]
    pub fn with(mut self, kind: ResourceKind, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(kind, name, data);
        self
    }
}

impl ResourceSystem for MemoryResourceSystem {
    fn load(&self, kind: ResourceKind, name: &str) -> Result<Vec<u8>, ResourceError> {
        self.entries
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| ResourceError::NotFound {
                kind,
                name: name.to_string(),
            })
    }
}

struct ModelTemplate {
    graph: NodeGraph,
    root: NodeKey,
}

/// Caching front end to a [`ResourceSystem`]
pub struct ResourceManager {
    system: Box<dyn ResourceSystem>,
    states: HashMap<String, Arc<PipelineState>>,
    programs: HashMap<String, ProgramHandle>,
    textures: HashMap<String, TextureHandle>,
    models: HashMap<String, ModelTemplate>,
    aabb_mesh: Option<Arc<Mesh>>,
}

impl ResourceManager {
    /// Wrap a resource system
    pub fn new(system: Box<dyn ResourceSystem>) -> Self {
        Self {
            system,
            states: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            models: HashMap::new(),
            aabb_mesh: None,
        }
    }

    /// Pipeline state by name, parsed from RON on first use
    ///
    /// The state's `name` is always the requested name.
    pub fn state(&mut self, name: &str) -> Result<Arc<PipelineState>, ResourceError> {
        if let Some(state) = self.states.get(name) {
            return Ok(Arc::clone(state));
        }

        let bytes = self.system.load(ResourceKind::State, name)?;
        let text = String::from_utf8_lossy(&bytes);
        let mut state: PipelineState = ron::from_str(&text).map_err(|e| ResourceError::Parse {
            kind: ResourceKind::State,
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        state.name = name.to_string();

        log::debug!("Loaded pipeline state '{}'", name);
        let state = Arc::new(state);
        self.states.insert(name.to_string(), Arc::clone(&state));
        Ok(state)
    }

    /// Register an already built pipeline state under its own name
    pub fn insert_state(&mut self, state: PipelineState) -> Arc<PipelineState> {
        let state = Arc::new(state);
        self.states.insert(state.name.clone(), Arc::clone(&state));
        state
    }

    /// Compiled program by name
    pub fn program(&mut self, name: &str, render: &mut dyn RenderSystem) -> Result<ProgramHandle, ResourceError> {
        if let Some(&program) = self.programs.get(name) {
            return Ok(program);
        }

        let source = self.system.load(ResourceKind::Program, name)?;
        let program = render.new_program(name, &source)?;
        log::debug!("Compiled program '{}'", name);
        self.programs.insert(name.to_string(), program);
        Ok(program)
    }

    /// Raw sub-resource of a program, for backends assembling program sources
    pub fn program_data(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        self.system.load(ResourceKind::ProgramData, name)
    }

    /// Texture by name, created from raw texel data on first use
    pub fn texture(
        &mut self,
        name: &str,
        descriptor: &TextureDescriptor,
        render: &mut dyn RenderSystem,
    ) -> Result<TextureHandle, ResourceError> {
        if let Some(&texture) = self.textures.get(name) {
            return Ok(texture);
        }

        let data = self.system.load(ResourceKind::Texture, name)?;
        let texture = render.new_texture(descriptor, Some(&data))?;
        self.textures.insert(name.to_string(), texture);
        Ok(texture)
    }

    /// Cache the subtree at `root` of `graph` as the template for `name`
    pub fn register_model(&mut self, name: impl Into<String>, graph: &NodeGraph, root: NodeKey) -> Result<(), ResourceError> {
        let mut template = NodeGraph::new();
        let template_root = template.import_subtree(graph, root)?;
        self.models.insert(
            name.into(),
            ModelTemplate {
                graph: template,
                root: template_root,
            },
        );
        Ok(())
    }

    /// Deep copy of the model template `name` into `dest`, returned detached
    pub fn model(&self, name: &str, dest: &mut NodeGraph) -> Result<NodeKey, ResourceError> {
        let template = self.models.get(name).ok_or_else(|| ResourceError::NotFound {
            kind: ResourceKind::Model,
            name: name.to_string(),
        })?;
        Ok(dest.import_subtree(&template.graph, template.root)?)
    }

    /// Shared unit line cube drawn by the bounding box technique
    pub fn aabb_mesh(&mut self) -> Arc<Mesh> {
        Arc::clone(self.aabb_mesh.get_or_insert_with(|| Arc::new(aabb_mesh())))
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("states", &self.states.len())
            .field("programs", &self.programs.len())
            .field("textures", &self.textures.len())
            .field("models", &self.models.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRenderSystem;

    fn manager() -> ResourceManager {
        let system = MemoryResourceSystem::new()
            .with(ResourceKind::State, "phong", "(program_name: \"phong\")")
            .with(ResourceKind::State, "broken", "(program_name: ")
            .with(ResourceKind::Program, "phong", "void main() {}");
        ResourceManager::new(Box::new(system))
    }

    #[test]
    fn test_state_is_parsed_named_and_cached() {
        let mut resources = manager();
        let a = resources.state("phong").unwrap();
        let b = resources.state("phong").unwrap();

        assert_eq!(a.name, "phong");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_missing_and_malformed_states_fail() {
        let mut resources = manager();
        assert!(matches!(resources.state("nope"), Err(ResourceError::NotFound { .. })));
        assert!(matches!(resources.state("broken"), Err(ResourceError::Parse { .. })));
    }

    #[test]
    fn test_program_compiled_once() {
        let mut resources = manager();
        let mut render = RecordingRenderSystem::new();
        let a = resources.program("phong", &mut render).unwrap();
        let b = resources.program("phong", &mut render).unwrap();
        assert_eq!(a, b);
        assert_eq!(render.programs_created(), 1);
    }

    #[test]
    fn test_model_instances_are_independent_copies() {
        let mut resources = manager();
        let mut source = NodeGraph::new();
        let root = source.create("ship");
        let hull = source.create("hull");
        source.add_child(root, hull).unwrap();
        resources.register_model("ship", &source, root).unwrap();

        let mut scene = NodeGraph::new();
        let first = resources.model("ship", &mut scene).unwrap();
        let second = resources.model("ship", &mut scene).unwrap();

        assert_ne!(first, second);
        assert_eq!(scene.len(), 4);
        assert!(scene.find_by_name(second, "hull").is_some());
        assert!(matches!(resources.model("rock", &mut scene), Err(ResourceError::NotFound { .. })));
    }
}
