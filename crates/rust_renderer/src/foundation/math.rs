//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the handful of helpers the render
//! pipeline needs (local transform composition, projection helpers,
//! normal matrices).

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Linear RGB color
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
}

impl Color {
    /// White
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    /// Black
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);

    /// Build a color from its three channels
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build a color from a packed `0xRRGGBB` value
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Channels as an array
    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Channels scaled by `intensity`, optionally squared for gamma-space input
    pub fn scaled(self, intensity: f32, gamma_input: bool) -> [f32; 3] {
        if gamma_input {
            [
                self.r * self.r * intensity * intensity,
                self.g * self.g * intensity * intensity,
                self.b * self.b * intensity * intensity,
            ]
        } else {
            [self.r * intensity, self.g * intensity, self.b * intensity]
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position relative to the parent
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Compose translation * rotation * scale
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Mat3, Mat4, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Translation column of an affine matrix
    pub fn translation_of(matrix: &Mat4) -> Vec3 {
        Vec3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)])
    }

    /// Largest axis scale baked into an affine matrix
    pub fn max_scale_on_axis(matrix: &Mat4) -> f32 {
        let sx = Vec3::new(matrix[(0, 0)], matrix[(1, 0)], matrix[(2, 0)]).norm_squared();
        let sy = Vec3::new(matrix[(0, 1)], matrix[(1, 1)], matrix[(2, 1)]).norm_squared();
        let sz = Vec3::new(matrix[(0, 2)], matrix[(1, 2)], matrix[(2, 2)]).norm_squared();
        sx.max(sy).max(sz).sqrt()
    }

    /// Inverse-transpose of the upper 3x3 block, identity when singular
    pub fn normal_matrix(model_view: &Mat4) -> Mat3 {
        let upper: Mat3 = model_view.fixed_view::<3, 3>(0, 0).into_owned();
        upper
            .try_inverse()
            .map_or_else(Mat3::identity, |inverse| inverse.transpose())
    }

    /// Column-major flattening for uniform uploads
    pub fn mat4_to_array(matrix: &Mat4) -> [f32; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(matrix.as_slice());
        out
    }

    /// Column-major flattening for uniform uploads
    pub fn mat3_to_array(matrix: &Mat3) -> [f32; 9] {
        let mut out = [0.0; 9];
        out.copy_from_slice(matrix.as_slice());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_composition_order() {
        let transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_axis_angle(&Vec3::y_axis(), constants::PI * 0.5),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        let p = transform.to_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.0, 2.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_max_scale_on_axis() {
        let m = Mat4::new_nonuniform_scaling(&Vec3::new(1.0, 4.0, 2.0));
        assert_relative_eq!(utils::max_scale_on_axis(&m), 4.0);
    }

    #[test]
    fn test_normal_matrix_of_singular_is_identity() {
        let m = Mat4::new_nonuniform_scaling(&Vec3::new(0.0, 1.0, 1.0));
        assert_eq!(utils::normal_matrix(&m), Mat3::identity());
    }

    #[test]
    fn test_color_from_hex() {
        let c = Color::from_hex(0xff8000);
        assert_relative_eq!(c.r, 1.0);
        assert_relative_eq!(c.g, 128.0 / 255.0);
        assert_relative_eq!(c.b, 0.0);
    }
}
