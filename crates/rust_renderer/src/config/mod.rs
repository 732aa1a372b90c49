//! Configuration system
//!
//! `RendererConfig` holds every knob the renderer reads at construction
//! and per frame. It can be loaded from or saved to TOML and RON files.

pub use serde::{Serialize, Deserialize};

use crate::foundation::math::Color;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Float precision requested in generated shader prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    /// `highp`
    High,
    /// `mediump`
    Medium,
    /// `lowp`
    Low,
}

impl Precision {
    /// GLSL qualifier
    pub fn qualifier(self) -> &'static str {
        match self {
            Self::High => "highp",
            Self::Medium => "mediump",
            Self::Low => "lowp",
        }
    }
}

/// Shadow map filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowMapType {
    /// Single tap
    Basic,
    /// Percentage-closer filtering
    Pcf,
    /// Smoothed percentage-closer filtering
    PcfSoft,
}

/// Renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Shader float precision
    pub precision: Precision,
    /// Color used by `clear`
    pub clear_color: Color,
    /// Alpha used by `clear`
    pub clear_alpha: f32,
    /// Clear at the start of every `render` call
    pub auto_clear: bool,
    /// Clear the color buffer when auto clearing
    pub auto_clear_color: bool,
    /// Clear the depth buffer when auto clearing
    pub auto_clear_depth: bool,
    /// Clear the stencil buffer when auto clearing
    pub auto_clear_stencil: bool,
    /// Depth-sort the render lists
    pub sort_objects: bool,
    /// Upper bound on lights of all kinds baked into a program
    pub max_lights: u32,
    /// Upper bound on skinning bones baked into a program
    pub max_bones: u32,
    /// Upper bound on morph targets bound per draw
    pub max_morph_targets: u32,
    /// Upper bound on morph normals bound per draw
    pub max_morph_normals: u32,
    /// Shadow maps are rendered by a plugin when enabled
    pub shadow_map_enabled: bool,
    /// Shadow map filter
    pub shadow_map_type: ShadowMapType,
    /// Draw shadow map cascades for debugging
    pub shadow_map_debug: bool,
    /// Light colors are given in gamma space
    pub gamma_input: bool,
    /// Output is gamma corrected
    pub gamma_output: bool,
    /// Use physically based light falloff
    pub physically_based_shading: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            precision: Precision::High,
            clear_color: Color::BLACK,
            clear_alpha: 0.0,
            auto_clear: true,
            auto_clear_color: true,
            auto_clear_depth: true,
            auto_clear_stencil: true,
            sort_objects: true,
            max_lights: 4,
            max_bones: 64,
            max_morph_targets: 8,
            max_morph_normals: 4,
            shadow_map_enabled: false,
            shadow_map_type: ShadowMapType::Pcf,
            shadow_map_debug: false,
            gamma_input: false,
            gamma_output: false,
            physically_based_shading: false,
        }
    }
}

impl Config for RendererConfig {}
