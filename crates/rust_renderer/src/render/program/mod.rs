//! Shader programs
//!
//! - [`shader_lib`]: opaque shader templates and where they come from
//! - [`permutation`]: the structured key a program is linked for
//! - [`cache`]: usage counted programs shared between materials

pub mod cache;
pub mod permutation;
pub mod shader_lib;

pub use cache::{ProgramCache, ProgramCacheEntry, ProgramError};
pub use permutation::{kind_profile, FeatureFlags, KindProfile, PermutationDescriptor};
pub use shader_lib::{ShaderId, ShaderLibrary, ShaderTemplate, TemplateCatalog, WithCustom};
