//! Lancer Assets - Drawables and resource libraries for UTF node trees
//!
//! Takes node trees produced by an external UTF reader and turns them into:
//! - Material, texture and vertex mesh libraries
//! - One of four drawables (sphere, single-level model, compound model,
//!   deformable model), chosen by looking at the tree's top-level children
//! - Missing-resource diagnostics for editor tooling
//!
//! Cross-file lookups go through a [`ResourceResolver`], usually a
//! [`ResourceManager`] holding every loaded resource file.

mod diagnostics;
mod dispatch;
mod drawable;
mod error;
mod library;
mod manager;
mod resolver;

#[cfg(test)]
mod fixtures;

pub use diagnostics::{MissingKind, MissingReference};
pub use dispatch::{classify, classify_node, load_drawable, DrawableKind};
pub use drawable::{
    Bone, BoneBinding, CompoundModel, Constraint, ConstraintKind, DeformableModel, DrawCall,
    DrawList, DrawParameters, Drawable, DrawableAsset, HierarchyNode, MaterialBinding, MeshGroup,
    MeshSource, ModelFile, ModelLevel, Part, Segment, SegmentMesh, Skeleton, SphereFile, VMeshRef,
};
pub use error::AssetError;
pub use library::{
    build_libraries, load_resource_file, FileLibraries, FrameAnimation, FrameRect, Material,
    MaterialLibrary, MeshHeader, Texture, TextureData, TextureLibrary, VMeshData, VMeshLibrary,
    Vertex,
};
pub use manager::{LibraryHandle, ResourceManager, TreeSource};
pub use resolver::{EmptyResolver, LayeredResolver, ResourceResolver};
