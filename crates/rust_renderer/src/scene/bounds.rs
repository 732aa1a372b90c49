//! Bounding volumes used for coarse visibility tests

use crate::foundation::math::{utils, Mat4, Point3, Vec3};

/// Box aligned with the geometry axes, the seed of a bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Componentwise smallest point
    pub min: Vec3,
    /// Componentwise largest point
    pub max: Vec3,
}

impl Aabb {
    /// Box spanning `min` to `max`
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box holding every point, `None` for an empty set
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let mut aabb = Self::new(first, first);
        for p in &points[1..] {
            aabb.min = aabb.min.inf(p);
            aabb.max = aabb.max.sup(p);
        }
        Some(aabb)
    }

    /// Midpoint of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Sphere bounding a geometry's vertex set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Center in geometry space
    pub center: Vec3,
    /// Radius in geometry space
    pub radius: f32,
}

impl BoundingSphere {
    /// Sphere centered on the points' bounding box
    ///
    /// Not the minimal sphere, but always encloses every point.
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(aabb) = Aabb::from_points(points) else {
            return Self { center: Vec3::zeros(), radius: 0.0 };
        };
        let center = aabb.center();
        let radius = points
            .iter()
            .map(|p| (p - center).norm_squared())
            .fold(0.0_f32, f32::max)
            .sqrt();
        Self { center, radius }
    }

    /// The sphere carried into world space by an affine matrix
    ///
    /// The radius is scaled by the largest axis scale so the result stays
    /// conservative under non-uniform scaling.
    pub fn transformed(&self, world: &Mat4) -> Self {
        let center = world.transform_point(&Point3::from(self.center)).coords;
        Self {
            center,
            radius: self.radius * utils::max_scale_on_axis(world),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_spans_every_point() {
        let points = [Vec3::new(1.0, -2.0, 0.0), Vec3::new(-3.0, 4.0, 2.0)];
        let aabb = Aabb::from_points(&points).unwrap();
        assert_eq!(aabb.min, Vec3::new(-3.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 2.0));
        assert_eq!(aabb.center(), Vec3::new(-1.0, 1.0, 1.0));
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn test_sphere_encloses_all_points() {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(3.0, 1.0, 0.0),
            Vec3::new(-1.0, 2.0, 5.0),
        ];
        let sphere = BoundingSphere::from_points(&points);
        for p in &points {
            assert!((p - sphere.center).norm() <= sphere.radius + 1e-6);
        }
    }

    #[test]
    fn test_empty_sphere() {
        let sphere = BoundingSphere::from_points(&[]);
        assert_eq!(sphere.radius, 0.0);
    }

    #[test]
    fn test_transformed_sphere_uses_max_scale() {
        let sphere = BoundingSphere { center: Vec3::new(1.0, 0.0, 0.0), radius: 1.0 };
        let world = Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0))
            * Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 3.0, 1.0));
        let moved = sphere.transformed(&world);
        assert_relative_eq!(moved.center, Vec3::new(2.0, 5.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(moved.radius, 3.0, epsilon = 1e-6);
    }
}
