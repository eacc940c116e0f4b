//! Cross-file resource lookup
//!
//! Every constructor that may need a resource from another file receives a
//! [`ResourceResolver`] explicitly. There is no global registry.

use std::sync::Arc;

use crate::library::{FileLibraries, FrameAnimation, Material, Texture, VMeshData};

/// Lookup surface over a set of loaded libraries.
///
/// Implementations may chain several libraries but must resolve
/// deterministically: the same query against the same loaded state always
/// returns the same record.
pub trait ResourceResolver {
    /// Find a material by its CRC identifier.
    fn find_material(&self, id: u32) -> Option<Arc<Material>>;

    /// Find a texture by name (case-insensitive).
    fn find_texture(&self, name: &str) -> Option<Arc<Texture>>;

    /// Find an animated frame sequence by name (case-insensitive).
    fn try_get_frame_animation(&self, name: &str) -> Option<Arc<FrameAnimation>>;

    /// Find a vertex mesh by the CRC of its library entry name.
    fn find_mesh(&self, id: u32) -> Option<Arc<VMeshData>>;

    /// A texture name counts as present if it names either a texture or a
    /// frame animation.
    fn texture_exists(&self, name: &str) -> bool {
        self.find_texture(name).is_some() || self.try_get_frame_animation(name).is_some()
    }
}

/// Resolver with nothing loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyResolver;

impl ResourceResolver for EmptyResolver {
    fn find_material(&self, _id: u32) -> Option<Arc<Material>> {
        None
    }

    fn find_texture(&self, _name: &str) -> Option<Arc<Texture>> {
        None
    }

    fn try_get_frame_animation(&self, _name: &str) -> Option<Arc<FrameAnimation>> {
        None
    }

    fn find_mesh(&self, _id: u32) -> Option<Arc<VMeshData>> {
        None
    }
}

/// Resolves against one file's own libraries first, then a fallback.
pub struct LayeredResolver<'a> {
    local: &'a FileLibraries,
    fallback: &'a dyn ResourceResolver,
}

impl<'a> LayeredResolver<'a> {
    pub fn new(local: &'a FileLibraries, fallback: &'a dyn ResourceResolver) -> Self {
        Self { local, fallback }
    }
}

impl ResourceResolver for LayeredResolver<'_> {
    fn find_material(&self, id: u32) -> Option<Arc<Material>> {
        self.local
            .find_material(id)
            .or_else(|| self.fallback.find_material(id))
    }

    fn find_texture(&self, name: &str) -> Option<Arc<Texture>> {
        self.local
            .find_texture(name)
            .or_else(|| self.fallback.find_texture(name))
    }

    fn try_get_frame_animation(&self, name: &str) -> Option<Arc<FrameAnimation>> {
        self.local
            .try_get_frame_animation(name)
            .or_else(|| self.fallback.try_get_frame_animation(name))
    }

    fn find_mesh(&self, id: u32) -> Option<Arc<VMeshData>> {
        self.local.find_mesh(id).or_else(|| self.fallback.find_mesh(id))
    }
}
