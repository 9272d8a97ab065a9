//! Physics interface
//!
//! The scenegraph does not simulate anything itself. Each frame it gathers the
//! nodes carrying rigid bodies and hands them, with the frame delta, to a
//! [`PhysicsSystem`], which syncs body and node transforms and steps the world.

use crate::foundation::math::{UnitQuaternion, Vec3};
use crate::scene::{NodeGraph, NodeKey};

/// Opaque handle to a backend rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RigidBodyHandle(pub u32);

/// Collision geometry used to create rigid bodies
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionShape {
    /// Infinite plane `normal . p = constant`
    StaticPlane {
        /// Plane normal
        normal: Vec3,
        /// Plane offset
        constant: f64,
    },
    /// Sphere
    Sphere {
        /// Radius
        radius: f64,
    },
    /// Box with the given half extents
    Box {
        /// Half extents
        half_extents: Vec3,
    },
    /// Capsule along +Y
    Capsule {
        /// Radius
        radius: f64,
        /// Height of the cylindrical part
        height: f64,
    },
    /// Cone along +Y
    Cone {
        /// Base radius
        radius: f64,
        /// Height
        height: f64,
    },
    /// Cylinder along +Y
    Cylinder {
        /// Radius
        radius: f64,
        /// Height
        height: f64,
    },
    /// Union of posed child shapes
    Compound {
        /// Child shapes with their local position and orientation
        children: Vec<(CollisionShape, Vec3, UnitQuaternion<f64>)>,
    },
    /// Convex hull of a point cloud
    ConvexHull {
        /// Hull points
        points: Vec<Vec3>,
    },
}

impl CollisionShape {
    /// Add a posed child to a compound shape; ignored for other shapes
    pub fn add_child_shape(&mut self, shape: CollisionShape, position: Vec3, orientation: UnitQuaternion<f64>) {
        if let CollisionShape::Compound { children } = self {
            children.push((shape, position, orientation));
        }
    }

    /// Add a point to a convex hull; ignored for other shapes
    pub fn add_vertex(&mut self, point: Vec3) {
        if let CollisionShape::ConvexHull { points } = self {
            points.push(point);
        }
    }
}

/// Physics backend
pub trait PhysicsSystem {
    /// Sync the given nodes with their bodies and advance the simulation by `dt`
    fn update(&mut self, dt: f64, graph: &mut NodeGraph, nodes: &[NodeKey]);

    /// Set the global gravity vector
    fn set_gravity(&mut self, gravity: Vec3);

    /// Create a rigid body and add it to the world
    fn create_rigid_body(&mut self, mass: f32, shape: CollisionShape) -> RigidBodyHandle;

    /// Remove a rigid body from the world and release it
    fn remove_rigid_body(&mut self, body: RigidBodyHandle);
}

/// Physics system that never moves anything
#[derive(Debug, Default)]
pub struct NullPhysicsSystem {
    next_body: u32,
    gravity: Vec3,
}

impl NullPhysicsSystem {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Current gravity
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }
}

impl PhysicsSystem for NullPhysicsSystem {
    fn update(&mut self, dt: f64, _graph: &mut NodeGraph, nodes: &[NodeKey]) {
        log::trace!("Physics step of {:.4}s over {} bodies", dt, nodes.len());
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn create_rigid_body(&mut self, _mass: f32, _shape: CollisionShape) -> RigidBodyHandle {
        self.next_body += 1;
        RigidBodyHandle(self.next_body)
    }

    fn remove_rigid_body(&mut self, _body: RigidBodyHandle) {}
}
