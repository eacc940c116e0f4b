use std::collections::HashSet;
use std::sync::Arc;

use lancer_core::{model_crc, Mat4};
use lancer_utf::{Node, NodeError};
use tracing::debug;

use super::{DrawCall, DrawList, DrawParameters, DrawableAsset, HierarchyNode, MaterialBinding, MeshSource};
use crate::diagnostics::{context, MissingReference, ResourceWalk};
use crate::library::{build_libraries, FileLibraries};
use crate::resolver::{LayeredResolver, ResourceResolver};

const MAX_SIDES: u32 = 6;

/// A sphere primitive (planets, suns) with up to six cube-face materials.
///
/// Materials are looked up when drawn, not when loaded.
#[derive(Debug, Clone)]
pub struct SphereFile {
    pub name: String,
    pub radius: f32,
    pub sides: u32,
    /// Material names for faces `M0..M5`, in face order.
    pub side_materials: Vec<String>,
    libraries: Arc<FileLibraries>,
    clock: f64,
}

impl SphereFile {
    pub fn from_node(
        name: &str,
        tree: &Node,
        resolver: &dyn ResourceResolver,
    ) -> Result<Self, NodeError> {
        let libraries = build_libraries(tree, resolver)?;
        let within = |e: NodeError| e.within(&tree.name);

        let sphere = tree.require("Sphere").map_err(within)?;
        sphere.children().map_err(within)?;
        let within_sphere = |e: NodeError| e.within(&sphere.name).within(&tree.name);

        let radius = sphere
            .require("Radius")
            .map_err(within)?
            .read_f32()
            .map_err(within_sphere)?;
        let sides = match sphere.find("Sides") {
            Some(node) => node.read_u32().map_err(within_sphere)?.min(MAX_SIDES),
            None => MAX_SIDES,
        };

        let mut side_materials = Vec::new();
        for face in 0..sides {
            match sphere.find(&format!("M{face}")) {
                Some(node) => side_materials.push(node.read_string().map_err(within_sphere)?),
                None => break,
            }
        }

        debug!(
            "Loaded sphere '{}' radius={} with {} face materials",
            name,
            radius,
            side_materials.len()
        );

        Ok(Self {
            name: name.to_string(),
            radius,
            sides,
            side_materials,
            libraries: Arc::new(libraries),
            clock: 0.0,
        })
    }

    fn face_material(&self, resolver: &dyn ResourceResolver, face: usize) -> MaterialBinding {
        match self.side_materials.get(face) {
            Some(material) => MaterialBinding::resolve(resolver, model_crc(material)),
            None => MaterialBinding::Default,
        }
    }
}

impl DrawableAsset for SphereFile {
    fn draw(&self, transform: Mat4, params: &DrawParameters<'_>, out: &mut DrawList) {
        let resolver = LayeredResolver::new(&self.libraries, params.resolver);
        for face in 0..self.sides {
            let material = self.face_material(&resolver, face as usize);
            out.push(DrawCall {
                world: transform,
                mesh: MeshSource::SphereFace {
                    radius: self.radius,
                    face,
                },
                tint: material.tint(params.tint),
                material,
                time: self.clock,
            });
        }
    }

    fn update(&mut self, elapsed: f64) {
        self.clock += elapsed;
    }

    fn detect_resources(
        &self,
        resolver: &dyn ResourceResolver,
        missing: &mut Vec<MissingReference>,
        material_refs: &mut HashSet<u32>,
        texture_refs: &mut HashSet<String>,
        reported: &mut HashSet<MissingReference>,
    ) {
        let resolver = LayeredResolver::new(&self.libraries, resolver);
        let mut walk = ResourceWalk {
            resolver: &resolver,
            missing,
            material_refs,
            texture_refs,
            reported,
        };
        for (face, material) in self.side_materials.iter().enumerate() {
            walk.material(model_crc(material), &context(&format!("M{face}"), &self.name));
        }
    }

    fn on_reset(&mut self) {
        self.clock = 0.0;
    }

    fn hierarchy(&self) -> HierarchyNode {
        let mut root = HierarchyNode::new(self.name.clone(), "Sphere");
        root.children = self
            .side_materials
            .iter()
            .enumerate()
            .map(|(face, material)| HierarchyNode::new(format!("M{face}: {material}"), "Material"))
            .collect();
        root
    }
}
