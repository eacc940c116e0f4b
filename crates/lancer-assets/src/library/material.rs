use std::collections::HashMap;
use std::sync::Arc;

use lancer_core::{model_crc, Color};
use lancer_utf::{normalize, Node, NodeError};
use tracing::{debug, warn};

use crate::resolver::ResourceResolver;

/// A material record decoded from a material library entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Identifier used by meshes to reference this material.
    pub crc: u32,
    /// Shader family, e.g. `DcDt` or `DcDtEc`.
    pub kind: String,
    pub diffuse_color: Color,
    pub ambient_color: Color,
    pub emissive_color: Color,
    pub opacity: f32,
    pub diffuse_texture: Option<String>,
    pub diffuse_flags: u32,
    pub emissive_texture: Option<String>,
}

impl Material {
    /// Names of every texture this material samples.
    pub fn textures(&self) -> impl Iterator<Item = &str> {
        self.diffuse_texture
            .as_deref()
            .into_iter()
            .chain(self.emissive_texture.as_deref())
    }

    fn from_node(node: &Node) -> Result<Self, NodeError> {
        let within = |e: NodeError| e.within(&node.name);
        node.children()?;

        let mut material = Material {
            name: node.name.clone(),
            crc: model_crc(&node.name),
            kind: "DcDt".to_string(),
            diffuse_color: Color::WHITE,
            ambient_color: Color::WHITE,
            emissive_color: Color::BLACK,
            opacity: 1.0,
            diffuse_texture: None,
            diffuse_flags: 0,
            emissive_texture: None,
        };

        for child in node.iter() {
            match normalize(&child.name).as_str() {
                "type" => material.kind = child.read_string().map_err(within)?,
                "dc" => material.diffuse_color = read_color(child).map_err(within)?,
                "ac" => material.ambient_color = read_color(child).map_err(within)?,
                "ec" => material.emissive_color = read_color(child).map_err(within)?,
                "oc" => material.opacity = child.read_f32().map_err(within)?,
                "dt_name" => material.diffuse_texture = Some(child.read_string().map_err(within)?),
                "dt_flags" => material.diffuse_flags = child.read_u32().map_err(within)?,
                "et_name" => material.emissive_texture = Some(child.read_string().map_err(within)?),
                "crc" => material.crc = child.read_u32().map_err(within)?,
                _ => debug!("Ignoring material property '{}' on '{}'", child.name, node.name),
            }
        }

        Ok(material)
    }
}

fn read_color(node: &Node) -> Result<Color, NodeError> {
    let values = node.read_f32s()?;
    Color::from_components(&values).ok_or_else(|| NodeError::Truncated {
        path: node.name.clone(),
        offset: 0,
        needed: 12,
        len: values.len() * 4,
    })
}

/// Materials from one source file, keyed by CRC.
#[derive(Debug, Default, Clone)]
pub struct MaterialLibrary {
    materials: HashMap<u32, Arc<Material>>,
}

impl MaterialLibrary {
    /// Decode every entry of a `Material library` node.
    ///
    /// Texture names are checked against `resolver` so that a library whose
    /// textures live elsewhere is noticed at load time, but an unresolved
    /// name does not prevent the material from being built.
    pub fn build(node: &Node, resolver: &dyn ResourceResolver) -> Result<Self, NodeError> {
        let mut library = Self::default();
        for entry in node.children()? {
            let material = Material::from_node(entry).map_err(|e| e.within(&node.name))?;
            for texture in material.textures() {
                if !resolver.texture_exists(texture) {
                    debug!(
                        "Material '{}' references texture '{}' which is not loaded yet",
                        material.name, texture
                    );
                }
            }
            library.insert(material);
        }
        Ok(library)
    }

    /// Bind a material under its CRC. An identifier that is already bound
    /// keeps its first material.
    pub fn insert(&mut self, material: Material) -> bool {
        match self.materials.entry(material.crc) {
            std::collections::hash_map::Entry::Occupied(existing) => {
                warn!(
                    "Material '{}' (0x{:08X}) duplicates '{}', keeping the first",
                    material.name,
                    material.crc,
                    existing.get().name
                );
                false
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                debug!("Added material '{}' (0x{:08X})", material.name, material.crc);
                slot.insert(Arc::new(material));
                true
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<Arc<Material>> {
        self.materials.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Arc<Material>)> {
        self.materials.iter().map(|(id, material)| (*id, material))
    }
}
