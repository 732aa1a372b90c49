//! Reference counted program cache

use std::collections::HashMap;

use thiserror::Error;

use crate::foundation::ids::{IdAllocator, ProgramId};
use crate::render::gpu::{GpuContext, ProgramHandle, UniformLocation};
use crate::render::program::permutation::PermutationDescriptor;
use crate::render::program::shader_lib::{ShaderId, ShaderLibrary};

/// Program acquisition errors
#[derive(Debug, Error)]
pub enum ProgramError {
    /// The library has no template for the shader family
    #[error("No shader template for {0:?}")]
    MissingTemplate(ShaderId),

    /// Compilation or linking failed
    #[error("Program link failed for {shader:?}: {log}")]
    Link {
        /// Shader family
        shader: ShaderId,
        /// Driver info log
        log: String,
    },
}

/// One linked program variant
#[derive(Debug)]
pub struct ProgramCacheEntry {
    id: ProgramId,
    descriptor: PermutationDescriptor,
    handle: ProgramHandle,
    uniforms: HashMap<String, UniformLocation>,
    attributes: HashMap<String, u32>,
    usage: usize,
}

impl ProgramCacheEntry {
    /// Program id
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Key the program was linked for
    pub fn descriptor(&self) -> &PermutationDescriptor {
        &self.descriptor
    }

    /// GPU handle
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Number of materials holding the program
    pub fn usage(&self) -> usize {
        self.usage
    }

    /// Location of an active uniform
    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    /// Location of an active attribute
    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    /// Every active attribute location
    pub fn attribute_locations(&self) -> impl Iterator<Item = u32> + '_ {
        self.attributes.values().copied()
    }
}

/// Programs keyed by permutation
///
/// Materials with equal descriptors share one entry. Every `acquire` must be
/// paired with one `release`; the program is deleted when the last holder
/// lets go.
#[derive(Debug, Default)]
pub struct ProgramCache {
    by_descriptor: HashMap<PermutationDescriptor, ProgramId>,
    entries: HashMap<ProgramId, ProgramCacheEntry>,
}

impl ProgramCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or link the program for `descriptor`, taking one usage
    pub fn acquire(
        &mut self,
        descriptor: &PermutationDescriptor,
        library: &dyn ShaderLibrary,
        ctx: &mut dyn GpuContext,
    ) -> Result<ProgramId, ProgramError> {
        if let Some(id) = self.by_descriptor.get(descriptor) {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.usage += 1;
                log::trace!("[PROGRAM] Reusing {} (usage {})", entry.id, entry.usage);
                return Ok(entry.id);
            }
        }

        let template = library
            .template(descriptor.shader)
            .ok_or(ProgramError::MissingTemplate(descriptor.shader))?;

        let prefix = descriptor.defines();
        let vertex = format!("{prefix}{}", template.vertex);
        let fragment = format!("{prefix}{}", template.fragment);

        let handle = ctx.create_program(&vertex, &fragment).map_err(|info_log| {
            log::error!(
                "[PROGRAM] Link failed for {:?}:\n{}\n--- vertex ---\n{}\n--- fragment ---\n{}",
                descriptor.shader,
                info_log,
                vertex,
                fragment
            );
            ProgramError::Link { shader: descriptor.shader, log: info_log }
        })?;

        let mut uniforms = HashMap::new();
        for name in descriptor.uniform_names().into_iter().chain(template.uniforms.iter().cloned()) {
            if let Some(location) = ctx.uniform_location(handle, &name) {
                uniforms.insert(name, location);
            }
        }
        let mut attributes = HashMap::new();
        for name in descriptor.attribute_names().into_iter().chain(template.attributes.iter().cloned()) {
            if let Some(location) = ctx.attribute_location(handle, &name) {
                attributes.insert(name, location);
            }
        }

        let id = IdAllocator::program();
        log::debug!(
            "[PROGRAM] Linked {} for {:?} ({} uniforms, {} attributes)",
            id,
            descriptor.shader,
            uniforms.len(),
            attributes.len()
        );
        self.by_descriptor.insert(*descriptor, id);
        self.entries.insert(
            id,
            ProgramCacheEntry {
                id,
                descriptor: *descriptor,
                handle,
                uniforms,
                attributes,
                usage: 1,
            },
        );
        Ok(id)
    }

    /// Drop one usage; deletes the program at zero. Returns true if deleted.
    pub fn release(&mut self, id: ProgramId, ctx: &mut dyn GpuContext) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            log::warn!("[PROGRAM] Release of unknown {}", id);
            return false;
        };
        entry.usage = entry.usage.saturating_sub(1);
        if entry.usage > 0 {
            return false;
        }

        if let Some(entry) = self.entries.remove(&id) {
            self.by_descriptor.remove(&entry.descriptor);
            ctx.delete_program(entry.handle);
            log::debug!("[PROGRAM] Deleted {}", id);
        }
        true
    }

    /// Entry for a program id
    pub fn get(&self, id: ProgramId) -> Option<&ProgramCacheEntry> {
        self.entries.get(&id)
    }

    /// Live programs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no program is alive
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::foundation::math::Color;
    use crate::render::gpu::{GpuCommand, RecordingContext};
    use crate::render::program::shader_lib::TemplateCatalog;
    use crate::scene::light::LightCounts;
    use crate::scene::material::Material;

    fn descriptor(material: &Material) -> PermutationDescriptor {
        PermutationDescriptor::for_material(material, LightCounts::default(), None, &RendererConfig::default())
    }

    #[test]
    fn test_equal_descriptors_share_an_entry() {
        let library = TemplateCatalog::builtin();
        let mut ctx = RecordingContext::new();
        let mut cache = ProgramCache::new();

        let a = cache.acquire(&descriptor(&Material::basic(Color::WHITE)), &library, &mut ctx).unwrap();
        let b = cache.acquire(&descriptor(&Material::basic(Color::BLACK)), &library, &mut ctx).unwrap();

        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(a).unwrap().usage(), 2);
        assert_eq!(ctx.count(|c| matches!(c, GpuCommand::CreateProgram(_))), 1);
    }

    #[test]
    fn test_differing_flag_gets_a_distinct_entry() {
        let library = TemplateCatalog::builtin();
        let mut ctx = RecordingContext::new();
        let mut cache = ProgramCache::new();

        let mut alpha_tested = Material::basic(Color::WHITE);
        alpha_tested.alpha_test = 0.5;
        let a = cache.acquire(&descriptor(&Material::basic(Color::WHITE)), &library, &mut ctx).unwrap();
        let b = cache.acquire(&descriptor(&alpha_tested), &library, &mut ctx).unwrap();

        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_release_at_zero_deletes_the_program() {
        let library = TemplateCatalog::builtin();
        let mut ctx = RecordingContext::new();
        let mut cache = ProgramCache::new();
        let key = descriptor(&Material::basic(Color::WHITE));

        let id = cache.acquire(&key, &library, &mut ctx).unwrap();
        cache.acquire(&key, &library, &mut ctx).unwrap();

        assert!(!cache.release(id, &mut ctx));
        assert_eq!(ctx.live_programs(), 1);
        assert!(cache.release(id, &mut ctx));
        assert!(cache.is_empty());
        assert_eq!(ctx.live_programs(), 0);

        let again = cache.acquire(&key, &library, &mut ctx).unwrap();
        assert_ne!(again, id);
    }

    #[test]
    fn test_link_failure_is_returned_not_cached() {
        let mut library = TemplateCatalog::new();
        library.insert(ShaderId::Basic, crate::render::program::ShaderTemplate::new("BROKEN", ""));
        let mut ctx = RecordingContext::new();
        ctx.fail_link_when("BROKEN");
        let mut cache = ProgramCache::new();

        let result = cache.acquire(&descriptor(&Material::basic(Color::WHITE)), &library, &mut ctx);
        assert!(matches!(result, Err(ProgramError::Link { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let library = TemplateCatalog::new();
        let mut ctx = RecordingContext::new();
        let mut cache = ProgramCache::new();

        let result = cache.acquire(&descriptor(&Material::basic(Color::WHITE)), &library, &mut ctx);
        assert!(matches!(result, Err(ProgramError::MissingTemplate(ShaderId::Basic))));
    }

    #[test]
    fn test_locations_are_cached_by_name() {
        let library = TemplateCatalog::builtin();
        let mut ctx = RecordingContext::new();
        let mut cache = ProgramCache::new();

        let id = cache.acquire(&descriptor(&Material::basic(Color::WHITE)), &library, &mut ctx).unwrap();
        let entry = cache.get(id).unwrap();
        assert!(entry.uniform("modelViewMatrix").is_some());
        assert!(entry.attribute("position").is_some());
        assert!(entry.uniform("boneGlobalMatrices").is_none());
    }
}
