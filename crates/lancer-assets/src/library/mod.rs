//! Resource library builders
//!
//! A resource file holds up to three top-level sections: a material library,
//! a texture library and a vertex mesh library. Drawable files often embed
//! the same sections alongside their geometry.

mod material;
mod texture;
mod vmesh;

use std::path::Path;
use std::sync::Arc;

use lancer_utf::{normalize, Node, NodeError};
use tracing::{debug, info, warn};

use crate::error::AssetError;
use crate::resolver::{LayeredResolver, ResourceResolver};

pub use material::{Material, MaterialLibrary};
pub use texture::{FrameAnimation, FrameRect, Texture, TextureData, TextureLibrary};
pub use vmesh::{MeshHeader, VMeshData, VMeshLibrary, Vertex};

/// The libraries built from one source file.
#[derive(Debug, Default, Clone)]
pub struct FileLibraries {
    pub materials: Option<MaterialLibrary>,
    pub textures: Option<TextureLibrary>,
    pub vmesh: Option<VMeshLibrary>,
}

impl FileLibraries {
    pub fn is_empty(&self) -> bool {
        self.materials.is_none() && self.textures.is_none() && self.vmesh.is_none()
    }
}

impl ResourceResolver for FileLibraries {
    fn find_material(&self, id: u32) -> Option<Arc<Material>> {
        self.materials.as_ref()?.get(id)
    }

    fn find_texture(&self, name: &str) -> Option<Arc<Texture>> {
        self.textures.as_ref()?.get(name)
    }

    fn try_get_frame_animation(&self, name: &str) -> Option<Arc<FrameAnimation>> {
        self.textures.as_ref()?.animation(name)
    }

    fn find_mesh(&self, id: u32) -> Option<Arc<VMeshData>> {
        self.vmesh.as_ref()?.get_by_crc(id)
    }
}

/// Build every library section found among `tree`'s immediate children.
///
/// Unknown sections are ignored. Only the first section of each kind is
/// used. Textures and meshes are built before materials so that a
/// material's texture references can be checked against this file's own
/// textures as well as `resolver`.
pub fn build_libraries(
    tree: &Node,
    resolver: &dyn ResourceResolver,
) -> Result<FileLibraries, NodeError> {
    let mut material_node = None;
    let mut texture_node = None;
    let mut vmesh_node = None;

    for child in tree.iter() {
        let slot = match normalize(&child.name).as_str() {
            "material library" => &mut material_node,
            "texture library" => &mut texture_node,
            "vmeshlibrary" => &mut vmesh_node,
            _ => continue,
        };
        if slot.is_some() {
            warn!("Ignoring duplicate '{}' section in '{}'", child.name, tree.name);
            continue;
        }
        *slot = Some(child);
    }

    let within = |e: NodeError| e.within(&tree.name);
    let mut libraries = FileLibraries {
        textures: texture_node
            .map(TextureLibrary::build)
            .transpose()
            .map_err(within)?,
        vmesh: vmesh_node
            .map(VMeshLibrary::build)
            .transpose()
            .map_err(within)?,
        materials: None,
    };

    if let Some(node) = material_node {
        let layered = LayeredResolver::new(&libraries, resolver);
        let materials = MaterialLibrary::build(node, &layered).map_err(within)?;
        libraries.materials = Some(materials);
    }

    debug!(
        "Built libraries from '{}': materials={}, textures={}, meshes={}",
        tree.name,
        libraries.materials.as_ref().map_or(0, MaterialLibrary::len),
        libraries.textures.as_ref().map_or(0, TextureLibrary::len),
        libraries.vmesh.as_ref().map_or(0, VMeshLibrary::len),
    );
    Ok(libraries)
}

/// Build the libraries of a resource file, attributing structural errors to
/// `path`.
pub fn load_resource_file(
    path: &Path,
    tree: &Node,
    resolver: &dyn ResourceResolver,
) -> Result<FileLibraries, AssetError> {
    let libraries = build_libraries(tree, resolver).map_err(AssetError::malformed(path))?;
    if libraries.is_empty() {
        info!("'{}' contains no resource libraries", path.display());
    }
    Ok(libraries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::resolver::EmptyResolver;
    use lancer_core::model_crc;

    #[test]
    fn builds_all_three_sections() {
        let tree = Node::interior(
            "\\",
            vec![
                fixtures::material_library(&[fixtures::material_entry(
                    "hull",
                    [1.0, 1.0, 1.0],
                    Some("hull_diffuse"),
                )]),
                fixtures::texture_library(&["hull_diffuse"]),
                fixtures::vmesh_library("ship.vms", &["hull"]),
            ],
        );
        let libs = build_libraries(&tree, &EmptyResolver).unwrap();
        assert!(libs.find_material(model_crc("hull")).is_some());
        assert!(libs.find_texture("HULL_DIFFUSE").is_some());
        assert!(libs.find_mesh(model_crc("ship.vms")).is_some());
    }

    #[test]
    fn section_names_are_case_insensitive() {
        let tree = Node::interior(
            "\\",
            vec![
                Node::interior("MATERIAL LIBRARY", vec![]),
                Node::interior("Texture Library", vec![]),
                Node::interior("vmeshlibrary", vec![]),
            ],
        );
        let libs = build_libraries(&tree, &EmptyResolver).unwrap();
        assert!(libs.materials.is_some());
        assert!(libs.textures.is_some());
        assert!(libs.vmesh.is_some());
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let tree = Node::interior(
            "\\",
            vec![
                Node::interior("Animation", vec![]),
                Node::leaf("Exporter Version", b"1.0\0".to_vec()),
            ],
        );
        let libs = build_libraries(&tree, &EmptyResolver).unwrap();
        assert!(libs.is_empty());
    }

    #[test]
    fn leaf_section_is_malformed() {
        let tree = Node::interior("\\", vec![Node::leaf("Material library", vec![1, 2])]);
        let err = build_libraries(&tree, &EmptyResolver).unwrap_err();
        assert!(matches!(err, NodeError::ExpectedInterior(_)));
        assert_eq!(err.path(), "\\/Material library");
    }

    #[test]
    fn only_first_section_of_a_kind_is_used() {
        let tree = Node::interior(
            "\\",
            vec![
                fixtures::material_library(&[fixtures::material_entry("a", [1.0, 0.0, 0.0], None)]),
                fixtures::material_library(&[fixtures::material_entry("b", [0.0, 1.0, 0.0], None)]),
            ],
        );
        let libs = build_libraries(&tree, &EmptyResolver).unwrap();
        assert!(libs.find_material(model_crc("a")).is_some());
        assert!(libs.find_material(model_crc("b")).is_none());
    }

    #[test]
    fn load_resource_file_names_the_file() {
        let tree = Node::interior("\\", vec![Node::leaf("Texture library", vec![])]);
        let err = load_resource_file(Path::new("data/ships.txm"), &tree, &EmptyResolver).unwrap_err();
        assert!(err.to_string().contains("data/ships.txm"));
    }
}
