//! Axis-aligned bounding boxes
//!
//! An [`Aabb`] may be empty: after [`Aabb::reset`] its `min` is `+inf` and its
//! `max` is `-inf` on every axis, so the first extension always wins.

use std::fmt;

use crate::foundation::math::{utils, Mat4, Vec3, Vec4};

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// An empty box containing no volume
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f64::INFINITY),
            max: Vec3::repeat(f64::NEG_INFINITY),
        }
    }

    /// Create a box from its min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a box centered at a point with the given half extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self::new(center - extents, center + extents)
    }

    /// Return the box to its initial empty state
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// Minimum corner
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Maximum corner
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Whether no point has been added since the last reset
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Grow the box to contain `p`
    pub fn extend_with_point(&mut self, p: &Vec3) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    /// Grow the box to contain the volume of `other`
    pub fn extend_with_box(&mut self, other: &Aabb) {
        self.extend_with_point(&other.min);
        self.extend_with_point(&other.max);
    }

    /// Whether `p` lies inside or on the boundary
    pub fn contains_point(&self, p: &Vec3) -> bool {
        let gt = p.x >= self.min.x && p.y >= self.min.y && p.z >= self.min.z;
        let lt = p.x <= self.max.x && p.y <= self.max.y && p.z <= self.max.z;
        gt && lt
    }

    /// Whether `other` lies fully inside this box
    pub fn contains_box(&self, other: &Aabb) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Minimum and maximum distance from `p` to any of the eight corners
    pub fn distance_to_point(&self, p: &Vec3) -> (f64, f64) {
        self.corners()
            .iter()
            .map(|c| (c - p).norm())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| (lo.min(d), hi.max(d)))
    }

    /// Box enclosing the eight corners mapped through `m`
    ///
    /// Conservative for rotations: the result encloses the rotated box but is
    /// generally larger than it.
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        let mut result = Aabb::empty();
        for corner in &self.corners() {
            result.extend_with_point(&utils::transform_coordinate(corner, m));
        }
        result
    }

    /// Frustum test against six normalized planes (`xyz` normal, `w` offset)
    ///
    /// Rejects the box only when its most-positive corner along some plane
    /// normal lies behind that plane. Boxes straddling several planes near a
    /// frustum corner can pass even though they are outside.
    pub fn in_frustum(&self, planes: &[Vec4; 6]) -> bool {
        let mut inside_or_intersect = true;

        for plane in planes {
            let mut vmin = Vec3::zeros();
            let mut vmax = Vec3::zeros();
            for axis in 0..3 {
                if plane[axis] > 0.0 {
                    vmin[axis] = self.min[axis];
                    vmax[axis] = self.max[axis];
                } else {
                    vmin[axis] = self.max[axis];
                    vmax[axis] = self.min[axis];
                }
            }

            let normal = plane.xyz();
            if normal.dot(&vmax) + plane.w < 0.0 {
                return false;
            }
            if normal.dot(&vmin) + plane.w <= 0.0 {
                inside_or_intersect = true;
            }
        }

        inside_or_intersect
    }
}

impl fmt::Display for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AABB min: [{}, {}, {}] max: [{}, {}, {}]",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}
