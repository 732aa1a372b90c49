//! Light uniform packing

use crate::foundation::math::Vec3;
use crate::scene::graph::SceneLight;
use crate::scene::light::{LightCounts, LightKind};

/// Flattened light arrays uploaded to lit programs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightUniforms {
    /// Per-kind counts the arrays were filled for
    pub counts: LightCounts,
    /// Sum of ambient light colors
    pub ambient: [f32; 3],
    /// Directional colors, 3 floats each
    pub directional_colors: Vec<f32>,
    /// Directional directions towards the light, 3 floats each
    pub directional_directions: Vec<f32>,
    /// Point colors
    pub point_colors: Vec<f32>,
    /// Point world positions
    pub point_positions: Vec<f32>,
    /// Point ranges
    pub point_distances: Vec<f32>,
    /// Spot colors
    pub spot_colors: Vec<f32>,
    /// Spot world positions
    pub spot_positions: Vec<f32>,
    /// Spot directions towards the light
    pub spot_directions: Vec<f32>,
    /// Spot ranges
    pub spot_distances: Vec<f32>,
    /// Cosine of the spot cone half angle
    pub spot_angles_cos: Vec<f32>,
    /// Spot falloff exponents
    pub spot_exponents: Vec<f32>,
    /// Hemisphere sky colors
    pub hemisphere_sky_colors: Vec<f32>,
    /// Hemisphere ground colors
    pub hemisphere_ground_colors: Vec<f32>,
    /// Hemisphere up directions
    pub hemisphere_directions: Vec<f32>,
}

impl LightUniforms {
    /// Pack scene lights, keeping at most `counts` of each kind in scene order
    pub fn collect(lights: &[SceneLight<'_>], counts: LightCounts, gamma_input: bool) -> Self {
        let mut out = Self { counts, ..Self::default() };
        let mut seen = LightCounts::default();

        for scene_light in lights {
            let light = scene_light.light;
            if !light.contributes() {
                continue;
            }
            let color = light.color.scaled(light.intensity, gamma_input);
            let position = scene_light.position;

            match &light.kind {
                LightKind::Ambient => {
                    let ambient = light.color.scaled(1.0, gamma_input);
                    for (sum, c) in out.ambient.iter_mut().zip(ambient) {
                        *sum += c;
                    }
                }
                LightKind::Directional { target } => {
                    if seen.directional >= counts.directional {
                        continue;
                    }
                    seen.directional += 1;
                    out.directional_colors.extend_from_slice(&color);
                    push(&mut out.directional_directions, direction(position, *target));
                }
                LightKind::Point { distance } => {
                    if seen.point >= counts.point {
                        continue;
                    }
                    seen.point += 1;
                    out.point_colors.extend_from_slice(&color);
                    push(&mut out.point_positions, position);
                    out.point_distances.push(*distance);
                }
                LightKind::Spot { target, distance, angle, exponent } => {
                    if seen.spot >= counts.spot {
                        continue;
                    }
                    seen.spot += 1;
                    out.spot_colors.extend_from_slice(&color);
                    push(&mut out.spot_positions, position);
                    push(&mut out.spot_directions, direction(position, *target));
                    out.spot_distances.push(*distance);
                    out.spot_angles_cos.push(angle.cos());
                    out.spot_exponents.push(*exponent);
                }
                LightKind::Hemisphere { ground_color } => {
                    if seen.hemisphere >= counts.hemisphere {
                        continue;
                    }
                    seen.hemisphere += 1;
                    out.hemisphere_sky_colors.extend_from_slice(&color);
                    out.hemisphere_ground_colors
                        .extend_from_slice(&ground_color.scaled(light.intensity, gamma_input));
                    push(&mut out.hemisphere_directions, position.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::y));
                }
            }
        }
        out
    }
}

fn direction(position: Vec3, target: Vec3) -> Vec3 {
    (position - target).try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z)
}

fn push(out: &mut Vec<f32>, v: Vec3) {
    out.extend_from_slice(&[v.x, v.y, v.z]);
}
