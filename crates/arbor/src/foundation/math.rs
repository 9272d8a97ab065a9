//! Math utilities and types
//!
//! Scenegraph math runs in double precision. Anything handed to a render
//! backend is converted to `f32` column-major arrays at the boundary.

pub use nalgebra::{Matrix4, Unit, UnitQuaternion, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f64>;

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 4D vector type (also used for frustum planes: `xyz` normal, `w` offset)
pub type Vec4 = Vector4<f64>;

/// 4x4 affine/projective matrix type
pub type Mat4 = Matrix4<f64>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f64>;

/// Column-major `f32` matrix as laid out in GPU buffers
pub type GpuMat4 = [[f32; 4]; 4];

/// `f32` vector as laid out in GPU buffers
pub type GpuVec4 = [f32; 4];

/// Math constants
pub mod constants {
    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;
}

/// Math utility functions
pub mod utils {
    use super::{constants, GpuMat4, GpuVec4, Mat4, Point3, Vec3, Vec4};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f64) -> f64 {
        radians * constants::RAD_TO_DEG
    }

    /// Constrain a value to lie between two other values
    pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    /// Hermite interpolation between two edges
    pub fn smooth_step(from: f64, to: f64, t: f64) -> f64 {
        let t = clamp((t - from) / (to - from), 0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }

    /// Invert a matrix, propagating NaN for singular input instead of failing.
    ///
    /// Degenerate transforms are not validated by the scenegraph; whatever
    /// numeric result comes out flows downstream.
    pub fn inverse_or_nan(m: &Mat4) -> Mat4 {
        m.try_inverse().unwrap_or_else(|| Mat4::from_element(f64::NAN))
    }

    /// Translation column of an affine transform
    pub fn world_position(m: &Mat4) -> Vec3 {
        Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
    }

    /// Transform a point through `m`, including the perspective divide
    pub fn transform_coordinate(p: &Vec3, m: &Mat4) -> Vec3 {
        let h = m * Vec4::new(p.x, p.y, p.z, 1.0);
        if h.w == 0.0 {
            return h.xyz();
        }
        h.xyz() / h.w
    }

    /// Convert a double precision matrix into a GPU `f32` array
    pub fn mat4_to_gpu(m: &Mat4) -> GpuMat4 {
        m.cast::<f32>().into()
    }

    /// Convert a double precision vector into a GPU `f32` array
    pub fn vec4_to_gpu(v: &Vec4) -> GpuVec4 {
        [v.x as f32, v.y as f32, v.z as f32, v.w as f32]
    }

    /// Right-handed look-at view matrix
    pub fn look_at(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(*eye), &Point3::from(*target), up)
    }

    /// OpenGL-style perspective projection (clip depth in `[-1, 1]`)
    pub fn perspective(fov_y_radians: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y_radians, near, far)
    }

    /// OpenGL-style orthographic projection
    pub fn orthographic(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }
}
