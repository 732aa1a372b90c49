//! Per-frame uniform values
//!
//! Values shared by every draw of a frame are computed once and pushed into
//! whichever program becomes current. Uniforms a program does not declare
//! are skipped silently.

use crate::foundation::math::{utils, Mat4};
use crate::render::gpu::{GpuContext, UniformValue};
use crate::render::lights::LightUniforms;
use crate::render::program::ProgramCacheEntry;
use crate::scene::camera::Camera;
use crate::scene::graph::Fog;
use crate::scene::light::LightCounts;
use crate::scene::material::Material;

/// Camera, light and fog state of one frame
#[derive(Debug, Clone)]
pub struct FrameUniforms {
    view: Mat4,
    projection: [f32; 16],
    view_array: [f32; 16],
    camera_position: [f32; 3],
    point_scale: f32,
    /// Scene fog
    pub fog: Option<Fog>,
    /// Lights per kind baked into programs this frame
    pub light_counts: LightCounts,
    lights: LightUniforms,
}

impl FrameUniforms {
    /// Snapshot the camera; `viewport_height` scales attenuated points
    #[allow(clippy::cast_precision_loss)]
    pub fn new(
        camera: &Camera,
        fog: Option<Fog>,
        viewport_height: u32,
        light_counts: LightCounts,
        lights: LightUniforms,
    ) -> Self {
        let position = camera.world_position();
        Self {
            view: *camera.view_matrix(),
            projection: utils::mat4_to_array(camera.projection_matrix()),
            view_array: utils::mat4_to_array(camera.view_matrix()),
            camera_position: [position.x, position.y, position.z],
            point_scale: viewport_height as f32 * 0.5,
            fog,
            light_counts,
            lights,
        }
    }

    /// Projection, view and eye position
    pub fn apply_camera(&self, program: &ProgramCacheEntry, ctx: &mut dyn GpuContext) {
        set(program, ctx, "projectionMatrix", UniformValue::Mat4(self.projection));
        set(program, ctx, "viewMatrix", UniformValue::Mat4(self.view_array));
        set(program, ctx, "cameraPosition", UniformValue::Vec3(self.camera_position));
    }

    /// Light arrays
    pub fn apply_lights(&self, program: &ProgramCacheEntry, ctx: &mut dyn GpuContext) {
        let l = &self.lights;
        set(program, ctx, "ambientLightColor", UniformValue::Vec3(l.ambient));
        let arrays = [
            ("directionalLightColor", &l.directional_colors),
            ("directionalLightDirection", &l.directional_directions),
            ("pointLightColor", &l.point_colors),
            ("pointLightPosition", &l.point_positions),
            ("spotLightColor", &l.spot_colors),
            ("spotLightPosition", &l.spot_positions),
            ("spotLightDirection", &l.spot_directions),
            ("hemisphereLightSkyColor", &l.hemisphere_sky_colors),
            ("hemisphereLightGroundColor", &l.hemisphere_ground_colors),
            ("hemisphereLightDirection", &l.hemisphere_directions),
        ];
        for (name, values) in arrays {
            if !values.is_empty() {
                set(program, ctx, name, UniformValue::Vec3Array(values.clone()));
            }
        }
        let scalars = [
            ("pointLightDistance", &l.point_distances),
            ("spotLightDistance", &l.spot_distances),
            ("spotLightAngleCos", &l.spot_angles_cos),
            ("spotLightExponent", &l.spot_exponents),
        ];
        for (name, values) in scalars {
            if !values.is_empty() {
                set(program, ctx, name, UniformValue::FloatArray(values.clone()));
            }
        }
    }

    /// Fog parameters
    pub fn apply_fog(&self, program: &ProgramCacheEntry, ctx: &mut dyn GpuContext) {
        match self.fog {
            Some(Fog::Linear { color, near, far }) => {
                set(program, ctx, "fogColor", UniformValue::Vec3(color.to_array()));
                set(program, ctx, "fogNear", UniformValue::Float(near));
                set(program, ctx, "fogFar", UniformValue::Float(far));
            }
            Some(Fog::Exp2 { color, density }) => {
                set(program, ctx, "fogColor", UniformValue::Vec3(color.to_array()));
                set(program, ctx, "fogDensity", UniformValue::Float(density));
            }
            None => {}
        }
    }

    /// Material constants
    pub fn apply_material(&self, program: &ProgramCacheEntry, material: &Material, ctx: &mut dyn GpuContext) {
        set(program, ctx, "diffuse", UniformValue::Vec3(material.color.to_array()));
        set(program, ctx, "opacity", UniformValue::Float(material.opacity));
        set(program, ctx, "size", UniformValue::Float(material.size));
        set(program, ctx, "scale", UniformValue::Float(self.point_scale));
        if material.alpha_test > 0.0 {
            set(program, ctx, "alphaTest", UniformValue::Float(material.alpha_test));
        }
    }

    /// Object matrices
    pub fn apply_object(&self, program: &ProgramCacheEntry, world: &Mat4, ctx: &mut dyn GpuContext) {
        let model_view = self.view * world;
        set(program, ctx, "modelMatrix", UniformValue::Mat4(utils::mat4_to_array(world)));
        set(program, ctx, "modelViewMatrix", UniformValue::Mat4(utils::mat4_to_array(&model_view)));
        if program.uniform("normalMatrix").is_some() {
            let normal = utils::normal_matrix(&model_view);
            set(program, ctx, "normalMatrix", UniformValue::Mat3(utils::mat3_to_array(&normal)));
        }
    }
}

fn set(program: &ProgramCacheEntry, ctx: &mut dyn GpuContext, name: &str, value: UniformValue) {
    if let Some(location) = program.uniform(name) {
        ctx.set_uniform(location, &value);
    }
}
