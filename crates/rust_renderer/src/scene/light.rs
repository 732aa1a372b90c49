//! Scene lights
//!
//! Lights are scene-graph nodes. Their world position comes from the node,
//! so a light parented to a moving object follows it.

use crate::foundation::math::{Color, Vec3};

/// Light variants
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    /// Uniform light from every direction
    Ambient,
    /// Parallel rays from the node position towards `target`
    Directional {
        /// World point the light shines at
        target: Vec3,
    },
    /// Omni light with optional range
    Point {
        /// Range, `0.0` for infinite
        distance: f32,
    },
    /// Cone light
    Spot {
        /// World point the light shines at
        target: Vec3,
        /// Range, `0.0` for infinite
        distance: f32,
        /// Cone half angle in radians
        angle: f32,
        /// Falloff exponent
        exponent: f32,
    },
    /// Sky / ground gradient
    Hemisphere {
        /// Color from below
        ground_color: Color,
    },
}

/// Light attached to a scene node
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Variant and variant parameters
    pub kind: LightKind,
    /// Light color
    pub color: Color,
    /// Intensity multiplier
    pub intensity: f32,
    /// Rendered into a shadow map when shadows are enabled
    pub cast_shadow: bool,
    /// Debug-only lights never reach the shader
    pub only_shadow: bool,
}

impl Light {
    /// Light with unit intensity
    pub fn new(kind: LightKind, color: Color) -> Self {
        Self {
            kind,
            color,
            intensity: 1.0,
            cast_shadow: false,
            only_shadow: false,
        }
    }

    /// Ambient light
    pub fn ambient(color: Color) -> Self {
        Self::new(LightKind::Ambient, color)
    }

    /// Directional light aimed at the origin
    pub fn directional(color: Color, intensity: f32) -> Self {
        Self {
            intensity,
            ..Self::new(LightKind::Directional { target: Vec3::zeros() }, color)
        }
    }

    /// Point light
    pub fn point(color: Color, intensity: f32, distance: f32) -> Self {
        Self {
            intensity,
            ..Self::new(LightKind::Point { distance }, color)
        }
    }

    /// Whether the light affects shading (as opposed to only shadows)
    pub fn contributes(&self) -> bool {
        !self.only_shadow
    }
}

/// Number of lights per kind that a program is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LightCounts {
    /// Directional lights
    pub directional: u32,
    /// Point lights
    pub point: u32,
    /// Spot lights
    pub spot: u32,
    /// Hemisphere lights
    pub hemisphere: u32,
    /// Shadow casting lights
    pub shadows: u32,
}

impl LightCounts {
    /// Count lights, then cap the total at `max_lights`
    ///
    /// Directional lights are kept first, then point, spot and hemisphere,
    /// which matches the order lights are uploaded in.
    pub fn from_lights<'a>(lights: impl IntoIterator<Item = &'a Light>, max_lights: u32) -> Self {
        let mut counts = Self::default();
        for light in lights {
            if light.cast_shadow {
                counts.shadows += 1;
            }
            if !light.contributes() {
                continue;
            }
            match light.kind {
                LightKind::Ambient => {}
                LightKind::Directional { .. } => counts.directional += 1,
                LightKind::Point { .. } => counts.point += 1,
                LightKind::Spot { .. } => counts.spot += 1,
                LightKind::Hemisphere { .. } => counts.hemisphere += 1,
            }
        }

        let mut budget = max_lights;
        for slot in [
            &mut counts.directional,
            &mut counts.point,
            &mut counts.spot,
            &mut counts.hemisphere,
        ] {
            *slot = (*slot).min(budget);
            budget -= *slot;
        }
        counts
    }

    /// Lights that reach the shader
    pub fn total(&self) -> u32 {
        self.directional + self.point + self.spot + self.hemisphere
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_respect_budget_in_priority_order() {
        let lights = vec![
            Light::point(Color::WHITE, 1.0, 0.0),
            Light::directional(Color::WHITE, 1.0),
            Light::directional(Color::WHITE, 1.0),
            Light::point(Color::WHITE, 1.0, 0.0),
            Light::ambient(Color::WHITE),
        ];
        let counts = LightCounts::from_lights(&lights, 3);
        assert_eq!(counts.directional, 2);
        assert_eq!(counts.point, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_shadow_only_lights_count_as_shadows() {
        let mut light = Light::directional(Color::WHITE, 1.0);
        light.cast_shadow = true;
        light.only_shadow = true;
        let counts = LightCounts::from_lights(&[light], 4);
        assert_eq!(counts.directional, 0);
        assert_eq!(counts.shadows, 1);
    }
}
