//! Mesh representation
//!
//! Meshes are plain geometry owned by the resource manager and shared between
//! nodes through `Arc<Mesh>`. Each mesh gets a process-unique [`MeshId`] at
//! construction, which is what sorting and batching compare.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::foundation::math::Vec3;
use crate::scene::Aabb;

static NEXT_MESH_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique mesh identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(pub u32);

impl MeshId {
    fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Primitive assembly mode
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveType {
    #[default]
    Triangles,
    Lines,
    Points,
}

/// Indexed geometry
#[derive(Debug, Clone)]
pub struct Mesh {
    id: MeshId,
    name: String,
    primitive: PrimitiveType,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    tex_coords: Vec<[f32; 3]>,
    indices: Vec<u16>,
    bounds: Aabb,
}

impl Mesh {
    /// Create a mesh and compute its object-space bounds from `positions`
    pub fn new(name: impl Into<String>, primitive: PrimitiveType, positions: Vec<[f32; 3]>, indices: Vec<u16>) -> Self {
        let mut bounds = Aabb::empty();
        for p in &positions {
            bounds.extend_with_point(&Vec3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2])));
        }

        Self {
            id: MeshId::next(),
            name: name.into(),
            primitive,
            positions,
            normals: Vec::new(),
            tex_coords: Vec::new(),
            indices,
            bounds,
        }
    }

    /// Attach per-vertex normals
    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    /// Attach per-vertex texture coordinates
    pub fn with_tex_coords(mut self, tex_coords: Vec<[f32; 3]>) -> Self {
        self.tex_coords = tex_coords;
        self
    }

    /// Mesh identity
    pub fn id(&self) -> MeshId {
        self.id
    }

    /// Mesh name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primitive assembly mode
    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    /// Vertex positions
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    /// Vertex normals
    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    /// Vertex texture coordinates
    pub fn tex_coords(&self) -> &[[f32; 3]] {
        &self.tex_coords
    }

    /// Index list
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Object-space bounds
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }
}

/// Quad covering `[0, width] x [0, height]`, for orthographic overlay cameras
pub fn screen_quad_mesh(width: f32, height: f32) -> Mesh {
    let positions = vec![
        [0.0, 0.0, 0.0],
        [width, 0.0, 0.0],
        [width, height, 0.0],
        [0.0, height, 0.0],
    ];
    let normals = vec![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
    let tex_coords = vec![[0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]];

    Mesh::new("ScreenQuadMesh", PrimitiveType::Triangles, positions, vec![0, 1, 2, 2, 3, 0])
        .with_normals(normals)
        .with_tex_coords(tex_coords)
}

/// Unit line cube centered at the origin
///
/// Drawn by the AABB technique, translated and scaled to each node's bounds.
pub fn aabb_mesh() -> Mesh {
    let positions = vec![
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ];
    let indices = vec![0, 1, 1, 2, 2, 3, 3, 0, 4, 5, 5, 6, 6, 7, 7, 4, 0, 4, 1, 5, 2, 6, 3, 7];

    Mesh::new("AABB", PrimitiveType::Lines, positions.clone(), indices)
        .with_normals(positions.clone())
        .with_tex_coords(positions)
}
