//! View frustum for visibility culling
//!
//! Planes are extracted with the Gribb-Hartmann method from a combined
//! `projection * view` matrix and normalized so that signed distances are in
//! world units. The sphere test is conservative: a sphere straddling a plane
//! or sitting just outside a frustum corner still counts as visible.

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Half-space boundary `normal . p + distance = 0`, normal pointing inside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Inward normal, unit length once normalized
    pub normal: Vec3,
    /// Offset along the normal
    pub distance: f32,
}

impl Plane {
    /// Normalized plane from an unscaled normal and offset
    pub fn new(normal: Vec3, distance: f32) -> Self {
        let mut plane = Self { normal, distance };
        plane.normalize();
        plane
    }

    fn from_row(row: Vec4) -> Self {
        Self::new(row.xyz(), row.w)
    }

    /// Scale to a unit normal; degenerate planes are left untouched
    pub fn normalize(&mut self) {
        let length = self.normal.norm();
        if length > 0.0 {
            self.normal /= length;
            self.distance /= length;
        }
    }

    /// Signed distance of `point`, positive on the inner side
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Six clip planes of a camera
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Default for Frustum {
    fn default() -> Self {
        Self::from_matrix(&Mat4::identity())
    }
}

impl Frustum {
    /// Frustum of a combined `projection * view` matrix
    pub fn from_matrix(combined: &Mat4) -> Self {
        let mut frustum = Self {
            planes: [Plane { normal: Vec3::zeros(), distance: 0.0 }; 6],
        };
        frustum.set_from_matrix(combined);
        frustum
    }

    /// Re-extract the planes in place
    pub fn set_from_matrix(&mut self, combined: &Mat4) {
        let r0: Vec4 = combined.row(0).transpose();
        let r1: Vec4 = combined.row(1).transpose();
        let r2: Vec4 = combined.row(2).transpose();
        let r3: Vec4 = combined.row(3).transpose();

        self.planes = [
            Plane::from_row(r3 + r0),
            Plane::from_row(r3 - r0),
            Plane::from_row(r3 + r1),
            Plane::from_row(r3 - r1),
            Plane::from_row(r3 + r2),
            Plane::from_row(r3 - r2),
        ];
    }

    /// False only when the sphere is fully behind one of the planes
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(center) >= -radius)
    }

    /// Whether a point is inside every plane
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera_frustum() -> Frustum {
        // Camera at origin looking down -Z
        let projection = Mat4::new_perspective(1.0, std::f32::consts::FRAC_PI_2, 1.0, 100.0);
        Frustum::from_matrix(&projection)
    }

    #[test]
    fn test_planes_are_normalized() {
        for plane in camera_frustum().planes {
            assert_relative_eq!(plane.normal.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_contained_sphere_is_visible() {
        let frustum = camera_frustum();
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -10.0), 1.0));
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
    }

    #[test]
    fn test_sphere_behind_camera_is_culled() {
        let frustum = camera_frustum();
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn test_sphere_beyond_far_plane_is_culled() {
        let frustum = camera_frustum();
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, -150.0), 10.0));
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -105.0), 10.0));
    }

    #[test]
    fn test_straddling_sphere_is_kept() {
        let frustum = camera_frustum();
        // 90 degree fov: the left plane passes through x = z
        assert!(frustum.intersects_sphere(Vec3::new(-10.5, 0.0, -10.0), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(-20.0, 0.0, -10.0), 1.0));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let m = Mat4::new_perspective(1.5, 0.8, 0.1, 50.0)
            * Mat4::new_translation(&Vec3::new(1.0, -2.0, 3.0));
        assert_eq!(Frustum::from_matrix(&m), Frustum::from_matrix(&m));
    }
}
