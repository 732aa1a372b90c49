//! Program permutations
//!
//! A [`PermutationDescriptor`] captures everything that changes shader text:
//! the shader family, enabled features, light and shadow counts, bone and
//! morph limits, alpha test threshold, shadow filter and precision. Equal
//! descriptors share one linked program.

use std::fmt::Write as _;

use bitflags::bitflags;

use crate::config::{Precision, RendererConfig, ShadowMapType};
use crate::render::program::shader_lib::ShaderId;
use crate::scene::graph::Fog;
use crate::scene::light::LightCounts;
use crate::scene::material::{Material, MaterialKind, Side, VertexColors};

bitflags! {
    /// Shader features toggled by `#define`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureFlags: u32 {
        /// Diffuse texture
        const MAP = 1 << 0;
        /// Environment texture
        const ENV_MAP = 1 << 1;
        /// Light map
        const LIGHT_MAP = 1 << 2;
        /// Bump map
        const BUMP_MAP = 1 << 3;
        /// Normal map
        const NORMAL_MAP = 1 << 4;
        /// Specular map
        const SPECULAR_MAP = 1 << 5;
        /// Per-vertex colors
        const VERTEX_COLORS = 1 << 6;
        /// Skinned vertices
        const SKINNING = 1 << 7;
        /// Morph target positions
        const MORPH_TARGETS = 1 << 8;
        /// Morph target normals
        const MORPH_NORMALS = 1 << 9;
        /// Linear fog
        const FOG = 1 << 10;
        /// Exponential squared fog
        const FOG_EXP2 = 1 << 11;
        /// Receives shadows
        const SHADOW_MAP = 1 << 12;
        /// Lights both faces
        const DOUBLE_SIDED = 1 << 13;
        /// Lights back faces
        const FLIP_SIDED = 1 << 14;
        /// Point size shrinks with distance
        const SIZE_ATTENUATION = 1 << 15;
        /// Fragments below a threshold are discarded
        const ALPHA_TEST = 1 << 16;
        /// Wrapped diffuse lighting
        const WRAP_AROUND = 1 << 17;
        /// Metallic specular
        const METAL = 1 << 18;
        /// Lighting evaluated per fragment
        const PER_PIXEL = 1 << 19;
        /// Colors given in gamma space
        const GAMMA_INPUT = 1 << 20;
        /// Output gamma corrected
        const GAMMA_OUTPUT = 1 << 21;
        /// Physically based specular
        const PHYSICALLY_BASED = 1 << 22;
        /// Shadow cascade debug overlay
        const SHADOW_DEBUG = 1 << 23;
    }
}

/// Which inputs a material kind reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindProfile {
    /// Shader family
    pub shader: ShaderId,
    /// Uses scene lights
    pub lit: bool,
    /// Samples feature textures
    pub textured: bool,
    /// Applies scene fog
    pub fog: bool,
    /// Supports morph targets
    pub morphs: bool,
    /// Supports skinning
    pub skinning: bool,
    /// Receives shadows
    pub shadows: bool,
    /// Rasterized as points
    pub points: bool,
}

/// Permutation dispatch table, one row per material kind
///
/// Row columns: shader, lit, textured, fog, morphs, skinning, shadows, points.
pub fn kind_profile(kind: &MaterialKind) -> KindProfile {
    let row = |shader, lit, textured, fog, morphs, skinning, shadows, points| KindProfile {
        shader,
        lit,
        textured,
        fog,
        morphs,
        skinning,
        shadows,
        points,
    };
    match kind {
        MaterialKind::Basic => row(ShaderId::Basic, false, true, true, true, true, true, false),
        MaterialKind::Lambert => row(ShaderId::Lambert, true, true, true, true, true, true, false),
        MaterialKind::Phong => row(ShaderId::Phong, true, true, true, true, true, true, false),
        MaterialKind::Depth => row(ShaderId::Depth, false, false, false, true, false, false, false),
        MaterialKind::Normal => row(ShaderId::Normal, false, false, false, true, false, false, false),
        MaterialKind::LineBasic => row(ShaderId::LineBasic, false, false, true, false, false, false, false),
        MaterialKind::LineDashed => row(ShaderId::LineDashed, false, false, true, false, false, false, false),
        MaterialKind::Points => row(ShaderId::Points, false, true, true, false, false, false, true),
        MaterialKind::Shader(template) => {
            row(ShaderId::Custom(template.id()), true, true, true, true, true, false, false)
        }
    }
}

/// Structured program key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermutationDescriptor {
    /// Shader family
    pub shader: ShaderId,
    /// Enabled features
    pub features: FeatureFlags,
    /// Light counts; all zero for unlit kinds
    pub lights: LightCounts,
    /// Bones baked into the skinning uniform array
    pub max_bones: u32,
    /// Morph target attribute slots
    pub morph_targets: u32,
    /// Morph normal attribute slots
    pub morph_normals: u32,
    /// `f32::to_bits` of the alpha test threshold
    pub alpha_test_bits: u32,
    /// Shadow filter
    pub shadow_map_type: ShadowMapType,
    /// Float precision
    pub precision: Precision,
}

impl PermutationDescriptor {
    /// Descriptor for drawing `material` under the current scene state
    pub fn for_material(
        material: &Material,
        lights: LightCounts,
        fog: Option<&Fog>,
        config: &RendererConfig,
    ) -> Self {
        let profile = kind_profile(&material.kind);
        let mut features = FeatureFlags::empty();

        if profile.textured {
            features.set(FeatureFlags::MAP, material.map.is_some());
            features.set(FeatureFlags::ENV_MAP, material.env_map.is_some());
            features.set(FeatureFlags::LIGHT_MAP, material.light_map.is_some());
            features.set(FeatureFlags::SPECULAR_MAP, material.specular_map.is_some());
        }
        if profile.textured && profile.lit {
            features.set(FeatureFlags::BUMP_MAP, material.bump_map.is_some());
            features.set(FeatureFlags::NORMAL_MAP, material.normal_map.is_some());
        }
        features.set(FeatureFlags::VERTEX_COLORS, material.vertex_colors != VertexColors::None);

        let skinning = profile.skinning && material.skinning;
        let morphs = profile.morphs && material.morph_targets;
        let morph_normals = morphs && material.morph_normals;
        features.set(FeatureFlags::SKINNING, skinning);
        features.set(FeatureFlags::MORPH_TARGETS, morphs);
        features.set(FeatureFlags::MORPH_NORMALS, morph_normals);

        if profile.fog && material.fog {
            match fog {
                Some(Fog::Linear { .. }) => features |= FeatureFlags::FOG,
                Some(Fog::Exp2 { .. }) => features |= FeatureFlags::FOG | FeatureFlags::FOG_EXP2,
                None => {}
            }
        }

        let shadows = profile.shadows && config.shadow_map_enabled;
        features.set(FeatureFlags::SHADOW_MAP, shadows);
        features.set(FeatureFlags::SHADOW_DEBUG, shadows && config.shadow_map_debug);

        features.set(FeatureFlags::DOUBLE_SIDED, material.side == Side::Double);
        features.set(FeatureFlags::FLIP_SIDED, material.side == Side::Back);
        features.set(FeatureFlags::SIZE_ATTENUATION, profile.points && material.size_attenuation);
        features.set(FeatureFlags::ALPHA_TEST, material.alpha_test > 0.0);

        if profile.lit {
            features.set(FeatureFlags::WRAP_AROUND, material.wrap_around);
            features.set(FeatureFlags::METAL, material.metal);
            features.set(FeatureFlags::PER_PIXEL, material.per_pixel);
            features.set(FeatureFlags::PHYSICALLY_BASED, config.physically_based_shading);
        }
        features.set(FeatureFlags::GAMMA_INPUT, config.gamma_input);
        features.set(FeatureFlags::GAMMA_OUTPUT, config.gamma_output);

        let mut light_counts = if profile.lit { lights } else { LightCounts::default() };
        light_counts.shadows = if shadows { lights.shadows } else { 0 };

        Self {
            shader: profile.shader,
            features,
            lights: light_counts,
            max_bones: if skinning { config.max_bones } else { 0 },
            morph_targets: if morphs { config.max_morph_targets } else { 0 },
            morph_normals: if morph_normals { config.max_morph_normals } else { 0 },
            alpha_test_bits: if material.alpha_test > 0.0 { material.alpha_test.to_bits() } else { 0 },
            shadow_map_type: config.shadow_map_type,
            precision: config.precision,
        }
    }

    /// `#define` block prepended to both shader stages
    pub fn defines(&self) -> String {
        let mut out = String::new();
        let q = self.precision.qualifier();
        let _ = writeln!(out, "precision {q} float;");
        let _ = writeln!(out, "precision {q} int;");
        let _ = writeln!(out, "#define MAX_DIR_LIGHTS {}", self.lights.directional);
        let _ = writeln!(out, "#define MAX_POINT_LIGHTS {}", self.lights.point);
        let _ = writeln!(out, "#define MAX_SPOT_LIGHTS {}", self.lights.spot);
        let _ = writeln!(out, "#define MAX_HEMI_LIGHTS {}", self.lights.hemisphere);
        let _ = writeln!(out, "#define MAX_SHADOWS {}", self.lights.shadows);
        let _ = writeln!(out, "#define MAX_BONES {}", self.max_bones);
        if self.features.contains(FeatureFlags::ALPHA_TEST) {
            let _ = writeln!(out, "#define ALPHATEST {:?}", f32::from_bits(self.alpha_test_bits));
        }
        if self.features.contains(FeatureFlags::SHADOW_MAP) {
            let filter = match self.shadow_map_type {
                ShadowMapType::Basic => None,
                ShadowMapType::Pcf => Some("SHADOWMAP_TYPE_PCF"),
                ShadowMapType::PcfSoft => Some("SHADOWMAP_TYPE_PCF_SOFT"),
            };
            if let Some(filter) = filter {
                let _ = writeln!(out, "#define {filter}");
            }
        }
        for (flag, name) in FEATURE_DEFINES {
            if self.features.contains(*flag) {
                let _ = writeln!(out, "#define {name}");
            }
        }
        out
    }

    /// Uniform names that depend on the permutation
    pub fn uniform_names(&self) -> Vec<String> {
        let mut names: Vec<&str> = vec![
            "modelMatrix",
            "modelViewMatrix",
            "projectionMatrix",
            "viewMatrix",
            "normalMatrix",
            "cameraPosition",
            "diffuse",
            "opacity",
        ];
        if self.lights.total() > 0 || self.shader == ShaderId::Lambert || self.shader == ShaderId::Phong {
            names.push("ambientLightColor");
        }
        if self.lights.directional > 0 {
            names.extend(["directionalLightColor", "directionalLightDirection"]);
        }
        if self.lights.point > 0 {
            names.extend(["pointLightColor", "pointLightPosition", "pointLightDistance"]);
        }
        if self.lights.spot > 0 {
            names.extend([
                "spotLightColor",
                "spotLightPosition",
                "spotLightDirection",
                "spotLightDistance",
                "spotLightAngleCos",
                "spotLightExponent",
            ]);
        }
        if self.lights.hemisphere > 0 {
            names.extend(["hemisphereLightSkyColor", "hemisphereLightGroundColor", "hemisphereLightDirection"]);
        }
        if self.features.contains(FeatureFlags::FOG) {
            names.extend(["fogColor", "fogNear", "fogFar", "fogDensity"]);
        }
        if self.features.contains(FeatureFlags::SKINNING) {
            names.push("boneGlobalMatrices");
        }
        if self.features.contains(FeatureFlags::MORPH_TARGETS) {
            names.push("morphTargetInfluences");
        }
        if self.features.contains(FeatureFlags::ALPHA_TEST) {
            names.push("alphaTest");
        }
        if self.features.contains(FeatureFlags::SIZE_ATTENUATION) || self.shader == ShaderId::Points {
            names.extend(["size", "scale"]);
        }
        for (flag, name) in TEXTURE_UNIFORMS {
            if self.features.contains(*flag) {
                names.push(name);
            }
        }
        names.into_iter().map(String::from).collect()
    }

    /// Attribute names that depend on the permutation
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["position", "normal", "uv", "uv2", "color", "tangent"]
            .into_iter()
            .map(String::from)
            .collect();
        if self.features.contains(FeatureFlags::SKINNING) {
            names.extend(["skinIndex".to_string(), "skinWeight".to_string()]);
        }
        names.extend((0..self.morph_targets).map(|i| format!("morphTarget{i}")));
        names.extend((0..self.morph_normals).map(|i| format!("morphNormal{i}")));
        names
    }
}

const FEATURE_DEFINES: &[(FeatureFlags, &str)] = &[
    (FeatureFlags::MAP, "USE_MAP"),
    (FeatureFlags::ENV_MAP, "USE_ENVMAP"),
    (FeatureFlags::LIGHT_MAP, "USE_LIGHTMAP"),
    (FeatureFlags::BUMP_MAP, "USE_BUMPMAP"),
    (FeatureFlags::NORMAL_MAP, "USE_NORMALMAP"),
    (FeatureFlags::SPECULAR_MAP, "USE_SPECULARMAP"),
    (FeatureFlags::VERTEX_COLORS, "USE_COLOR"),
    (FeatureFlags::SKINNING, "USE_SKINNING"),
    (FeatureFlags::MORPH_TARGETS, "USE_MORPHTARGETS"),
    (FeatureFlags::MORPH_NORMALS, "USE_MORPHNORMALS"),
    (FeatureFlags::FOG, "USE_FOG"),
    (FeatureFlags::FOG_EXP2, "FOG_EXP2"),
    (FeatureFlags::SHADOW_MAP, "USE_SHADOWMAP"),
    (FeatureFlags::SHADOW_DEBUG, "SHADOWMAP_DEBUG"),
    (FeatureFlags::DOUBLE_SIDED, "DOUBLE_SIDED"),
    (FeatureFlags::FLIP_SIDED, "FLIP_SIDED"),
    (FeatureFlags::SIZE_ATTENUATION, "USE_SIZEATTENUATION"),
    (FeatureFlags::WRAP_AROUND, "WRAP_AROUND"),
    (FeatureFlags::METAL, "METAL"),
    (FeatureFlags::PER_PIXEL, "PHONG_PER_PIXEL"),
    (FeatureFlags::GAMMA_INPUT, "GAMMA_INPUT"),
    (FeatureFlags::GAMMA_OUTPUT, "GAMMA_OUTPUT"),
    (FeatureFlags::PHYSICALLY_BASED, "PHYSICALLY_BASED_SHADING"),
];

const TEXTURE_UNIFORMS: &[(FeatureFlags, &str)] = &[
    (FeatureFlags::MAP, "map"),
    (FeatureFlags::ENV_MAP, "envMap"),
    (FeatureFlags::LIGHT_MAP, "lightMap"),
    (FeatureFlags::BUMP_MAP, "bumpMap"),
    (FeatureFlags::NORMAL_MAP, "normalMap"),
    (FeatureFlags::SPECULAR_MAP, "specularMap"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Color;
    use crate::scene::texture::Texture;

    fn lights() -> LightCounts {
        LightCounts { directional: 1, point: 2, ..Default::default() }
    }

    #[test]
    fn test_equal_materials_produce_equal_descriptors() {
        let config = RendererConfig::default();
        let a = Material::phong(Color::WHITE);
        let b = Material::phong(Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(
            PermutationDescriptor::for_material(&a, lights(), None, &config),
            PermutationDescriptor::for_material(&b, lights(), None, &config)
        );
    }

    #[test]
    fn test_one_flag_changes_the_descriptor() {
        let config = RendererConfig::default();
        let plain = Material::phong(Color::WHITE);
        let mapped = Material::phong(Color::WHITE).with_map(Texture::new(1, 1, vec![0_u8; 4]).into_shared());
        let a = PermutationDescriptor::for_material(&plain, lights(), None, &config);
        let b = PermutationDescriptor::for_material(&mapped, lights(), None, &config);
        assert_ne!(a, b);
        assert!(b.features.contains(FeatureFlags::MAP));
        assert!(b.defines().contains("#define USE_MAP"));
    }

    #[test]
    fn test_unlit_kinds_ignore_light_counts() {
        let config = RendererConfig::default();
        let basic = Material::basic(Color::WHITE);
        let a = PermutationDescriptor::for_material(&basic, lights(), None, &config);
        let b = PermutationDescriptor::for_material(&basic, LightCounts::default(), None, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fog_kind_selects_defines() {
        let config = RendererConfig::default();
        let fog = Fog::Exp2 { color: Color::WHITE, density: 0.1 };
        let descriptor = PermutationDescriptor::for_material(&Material::lambert(Color::WHITE), lights(), Some(&fog), &config);
        let defines = descriptor.defines();
        assert!(defines.contains("#define USE_FOG"));
        assert!(defines.contains("#define FOG_EXP2"));
        assert!(defines.contains("#define MAX_POINT_LIGHTS 2"));
        assert!(descriptor.uniform_names().iter().any(|n| n == "fogDensity"));
    }

    #[test]
    fn test_morph_slots_follow_config() {
        let config = RendererConfig::default();
        let mut material = Material::lambert(Color::WHITE);
        material.morph_targets = true;
        let descriptor = PermutationDescriptor::for_material(&material, lights(), None, &config);
        assert_eq!(descriptor.morph_targets, config.max_morph_targets);
        assert!(descriptor.attribute_names().iter().any(|n| n == "morphTarget0"));
    }
}
