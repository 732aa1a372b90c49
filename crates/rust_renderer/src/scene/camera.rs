//! # Camera
//!
//! Perspective and orthographic cameras. A camera can float freely or be
//! attached to a scene node through `parent`, in which case its world matrix
//! follows that node after transform propagation.
//!
//! ## Conventions
//! - Right-handed, Y-up view space, camera looks down -Z
//! - Clip space depth in `[-1, 1]`

use crate::foundation::math::{utils, Mat4, Quat, Transform, Vec3};
use crate::scene::node::NodeId;

/// Projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
        /// Width / height
        aspect: f32,
        /// Near clip distance
        near: f32,
        /// Far clip distance
        far: f32,
    },
    /// Orthographic projection
    Orthographic {
        /// Left edge
        left: f32,
        /// Right edge
        right: f32,
        /// Bottom edge
        bottom: f32,
        /// Top edge
        top: f32,
        /// Near clip distance
        near: f32,
        /// Far clip distance
        far: f32,
    },
}

impl Projection {
    /// Projection matrix
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Self::Perspective { fov_y, aspect, near, far } => {
                Mat4::new_perspective(aspect, fov_y, near, far)
            }
            Self::Orthographic { left, right, bottom, top, near, far } => {
                Mat4::new_orthographic(left, right, bottom, top, near, far)
            }
        }
    }
}

/// 3D camera
#[derive(Debug, Clone)]
pub struct Camera {
    /// Local transform (relative to `parent` when attached)
    pub transform: Transform,
    /// Node the camera is attached to
    pub parent: Option<NodeId>,
    projection: Projection,
    projection_matrix: Mat4,
    world_matrix: Mat4,
    view_matrix: Mat4,
}

impl Camera {
    /// Perspective camera, field of view in degrees
    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::with_projection(Projection::Perspective {
            fov_y: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        })
    }

    /// Orthographic camera
    pub fn orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        Self::with_projection(Projection::Orthographic { left, right, bottom, top, near, far })
    }

    /// Camera with an explicit projection
    pub fn with_projection(projection: Projection) -> Self {
        Self {
            transform: Transform::identity(),
            parent: None,
            projection,
            projection_matrix: projection.matrix(),
            world_matrix: Mat4::identity(),
            view_matrix: Mat4::identity(),
        }
    }

    /// Move the camera
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Orient the camera so that -Z points at `target`
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let backward = self.transform.position - target;
        if backward.norm_squared() <= f32::EPSILON {
            log::warn!("[CAMERA] look_at target coincides with camera position, ignored");
            return;
        }
        self.transform.rotation = Quat::face_towards(&backward, &up);
    }

    /// Current projection
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Replace the projection and rebuild its matrix
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.projection_matrix = projection.matrix();
    }

    /// Update the aspect ratio of a perspective camera
    pub fn set_aspect(&mut self, new_aspect: f32) {
        if let Projection::Perspective { fov_y, near, far, .. } = self.projection {
            self.set_projection(Projection::Perspective { fov_y, aspect: new_aspect, near, far });
        }
    }

    /// Recompute world and view matrices
    ///
    /// `parent_world` is the world matrix of the node in `parent`, if any.
    pub fn update_world_matrix(&mut self, parent_world: Option<&Mat4>) {
        let local = self.transform.to_matrix();
        self.world_matrix = parent_world.map_or(local, |p| p * local);
        self.view_matrix = self
            .world_matrix
            .try_inverse()
            .unwrap_or_else(|| {
                log::warn!("[CAMERA] world matrix is singular, using identity view");
                Mat4::identity()
            });
    }

    /// Projection matrix
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// Inverse of the world matrix
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    /// Camera to world
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// `projection * view`
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    /// Camera position in world space
    pub fn world_position(&self) -> Vec3 {
        utils::translation_of(&self.world_matrix)
    }

    /// Distance in front of the camera along its view axis
    pub fn view_depth(&self, world_point: &Vec3) -> f32 {
        let row = self.view_matrix.row(2);
        -(row[0] * world_point.x + row[1] * world_point.y + row[2] * world_point.z + row[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_look_at_points_negative_z_at_target() {
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        camera.set_position(Vec3::new(0.0, 0.0, 10.0));
        camera.look_at(Vec3::zeros(), Vec3::y());
        camera.update_world_matrix(None);

        assert_relative_eq!(camera.view_depth(&Vec3::zeros()), 10.0, epsilon = 1e-5);
        assert_relative_eq!(camera.view_depth(&Vec3::new(0.0, 0.0, 20.0)), -10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_parent_world_is_applied() {
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        camera.set_position(Vec3::new(0.0, 0.0, 1.0));
        let parent = Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0));
        camera.update_world_matrix(Some(&parent));
        assert_relative_eq!(camera.world_position(), Vec3::new(5.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_set_aspect_rebuilds_projection() {
        let mut camera = Camera::perspective(90.0, 1.0, 1.0, 10.0);
        let before = *camera.projection_matrix();
        camera.set_aspect(2.0);
        assert_relative_eq!(camera.projection_matrix()[(0, 0)], before[(0, 0)] * 0.5, epsilon = 1e-6);
    }
}
