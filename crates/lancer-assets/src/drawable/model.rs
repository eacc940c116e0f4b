use std::collections::HashSet;
use std::sync::Arc;

use lancer_core::{Mat4, Vec3};
use lancer_utf::{name_eq, normalize, Node, NodeError};
use tracing::{debug, warn};

use super::{DrawCall, DrawList, DrawParameters, DrawableAsset, HierarchyNode, MaterialBinding, MeshSource};
use crate::diagnostics::{context, MissingReference, ResourceWalk};
use crate::library::{build_libraries, FileLibraries, VMeshData};
use crate::resolver::{LayeredResolver, ResourceResolver};

/// Reference from a model part into a shared VMeshData block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VMeshRef {
    /// CRC of the VMeshLibrary entry name.
    pub vmesh_crc: u32,
    pub start_vertex: u16,
    pub vertex_count: u16,
    pub start_index: u16,
    pub index_count: u16,
    pub start_mesh: u16,
    pub mesh_count: u16,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

impl VMeshRef {
    pub fn parse(node: &Node) -> Result<Self, NodeError> {
        let mut reader = node.reader()?;
        let _header_size = reader.u32()?;
        let vmesh_crc = reader.u32()?;
        let start_vertex = reader.u16()?;
        let vertex_count = reader.u16()?;
        let start_index = reader.u16()?;
        let index_count = reader.u16()?;
        let start_mesh = reader.u16()?;
        let mesh_count = reader.u16()?;
        let [max_x, min_x, max_y, min_y, max_z, min_z] = reader.f32s::<6>()?;
        let center = Vec3::from(reader.vec3()?);
        let radius = reader.f32()?;

        Ok(Self {
            vmesh_crc,
            start_vertex,
            vertex_count,
            start_index,
            index_count,
            start_mesh,
            mesh_count,
            bounds_min: Vec3::new(min_x, min_y, min_z),
            bounds_max: Vec3::new(max_x, max_y, max_z),
            center,
            radius,
        })
    }
}

/// A contiguous range of indices drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshGroup {
    pub material_crc: u32,
    pub base_vertex: u32,
    pub start_index: u32,
    pub index_count: u32,
    /// The material could not be resolved when the model was loaded.
    pub placeholder: bool,
}

/// One level of detail.
#[derive(Debug, Clone)]
pub struct ModelLevel {
    pub name: String,
    pub mesh_ref: VMeshRef,
    /// `None` when the referenced VMeshData was not found.
    pub mesh: Option<Arc<VMeshData>>,
    pub groups: Vec<MeshGroup>,
    pub visible: bool,
}

impl ModelLevel {
    fn load(
        name: &str,
        part: &Node,
        drawable: &str,
        resolver: &dyn ResourceResolver,
    ) -> Result<Self, NodeError> {
        part.children()?;
        let mesh_ref = VMeshRef::parse(part.require("VMeshRef")?).map_err(|e| e.within(&part.name))?;

        let mesh = resolver.find_mesh(mesh_ref.vmesh_crc);
        let groups = match &mesh {
            Some(data) => mesh_groups(&mesh_ref, data, resolver, name, drawable),
            None => {
                warn!(
                    "{} in '{}' references missing VMesh 0x{:08X}",
                    name, drawable, mesh_ref.vmesh_crc
                );
                Vec::new()
            }
        };

        Ok(Self {
            name: name.to_string(),
            mesh_ref,
            mesh,
            groups,
            visible: true,
        })
    }

    /// Number of groups drawing with the placeholder material.
    pub fn placeholder_count(&self) -> usize {
        self.groups.iter().filter(|group| group.placeholder).count()
    }
}

fn mesh_groups(
    mesh_ref: &VMeshRef,
    data: &VMeshData,
    resolver: &dyn ResourceResolver,
    level: &str,
    drawable: &str,
) -> Vec<MeshGroup> {
    let start = mesh_ref.start_mesh as usize;
    let count = mesh_ref.mesh_count as usize;
    if start + count > data.meshes.len() {
        warn!(
            "{} in '{}' references meshes {}..{} but '{}' has {}",
            level,
            drawable,
            start,
            start + count,
            data.name,
            data.meshes.len()
        );
    }

    let mut start_index = mesh_ref.start_index as u32;
    data.meshes
        .iter()
        .skip(start)
        .take(count)
        .map(|header| {
            let placeholder = resolver.find_material(header.material_crc).is_none();
            if placeholder {
                warn!(
                    "{} in '{}' uses missing material 0x{:08X}, drawing placeholder",
                    level, drawable, header.material_crc
                );
            }
            let group = MeshGroup {
                material_crc: header.material_crc,
                base_vertex: mesh_ref.start_vertex as u32 + header.start_vertex as u32,
                start_index,
                index_count: header.index_count as u32,
                placeholder,
            };
            start_index += header.index_count as u32;
            group
        })
        .collect()
}

/// Parse `Level<n>` child names.
fn level_index(name: &str) -> Option<u32> {
    let lower = normalize(name);
    let digits = lower.strip_prefix("level")?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// A single mesh model, optionally with several levels of detail.
#[derive(Debug, Clone)]
pub struct ModelFile {
    pub name: String,
    levels: Vec<ModelLevel>,
    /// Camera distances at which each level starts, from `Switch2`.
    switch_distances: Vec<f32>,
    libraries: Arc<FileLibraries>,
    clock: f64,
}

impl ModelFile {
    pub fn from_node(
        name: &str,
        tree: &Node,
        resolver: &dyn ResourceResolver,
    ) -> Result<Self, NodeError> {
        let libraries = build_libraries(tree, resolver)?;
        let layered = LayeredResolver::new(&libraries, resolver);
        let within = |e: NodeError| e.within(&tree.name);

        let mut levels = Vec::new();
        let mut switch_distances = Vec::new();

        if let Some(part) = tree.find("VMeshPart") {
            levels.push(ModelLevel::load("Level0", part, name, &layered).map_err(within)?);
        } else {
            let multi = tree.require("MultiLevel").map_err(within)?;
            multi.children().map_err(within)?;
            let within_multi = |e: NodeError| e.within(&multi.name).within(&tree.name);

            let mut numbered = Vec::new();
            for child in multi.iter() {
                if name_eq(&child.name, "Switch2") {
                    switch_distances = child.read_f32s().map_err(within_multi)?;
                } else if let Some(index) = level_index(&child.name) {
                    numbered.push((index, child));
                }
            }
            numbered.sort_by_key(|(index, _)| *index);

            for (_, level) in numbered {
                level.children().map_err(within_multi)?;
                let part = level.require("VMeshPart").map_err(within_multi)?;
                let loaded = ModelLevel::load(&level.name, part, name, &layered)
                    .map_err(|e| within_multi(e.within(&level.name)))?;
                levels.push(loaded);
            }
        }

        debug!(
            "Loaded model '{}' with {} levels ({} placeholder groups)",
            name,
            levels.len(),
            levels.iter().map(ModelLevel::placeholder_count).sum::<usize>()
        );

        Ok(Self {
            name: name.to_string(),
            levels,
            switch_distances,
            libraries: Arc::new(libraries),
            clock: 0.0,
        })
    }

    pub fn levels(&self) -> &[ModelLevel] {
        &self.levels
    }

    pub fn switch_distances(&self) -> &[f32] {
        &self.switch_distances
    }

    /// True if any mesh group is drawing with the placeholder material.
    pub fn uses_placeholder(&self) -> bool {
        self.levels.iter().any(|level| level.placeholder_count() > 0)
    }

    /// Level of detail to draw at `distance` from the camera.
    ///
    /// `Switch2` holds one more entry than there are levels: the distance at
    /// which each level starts, followed by the cutoff of the last one.
    pub fn lod_for_distance(&self, distance: f32) -> usize {
        if self.levels.is_empty() {
            return 0;
        }
        let level = self
            .switch_distances
            .iter()
            .skip(1)
            .take_while(|&&start| distance >= start)
            .count();
        level.min(self.levels.len() - 1)
    }
}

impl DrawableAsset for ModelFile {
    fn draw(&self, transform: Mat4, params: &DrawParameters<'_>, out: &mut DrawList) {
        let Some(level) = self.levels.get(self.lod_for_distance(params.camera_distance)) else {
            return;
        };
        if !level.visible {
            return;
        }
        let Some(data) = &level.mesh else {
            return;
        };
        let resolver = LayeredResolver::new(&self.libraries, params.resolver);
        for group in &level.groups {
            let material = MaterialBinding::resolve(&resolver, group.material_crc);
            out.push(DrawCall {
                world: transform,
                mesh: MeshSource::VMesh {
                    data: Arc::clone(data),
                    base_vertex: group.base_vertex,
                    start_index: group.start_index,
                    index_count: group.index_count,
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
        for level in &self.levels {
            let ctx = context(&level.name, &self.name);
            if level.mesh.is_none() {
                walk.mesh(level.mesh_ref.vmesh_crc, &ctx);
            }
            for group in &level.groups {
                walk.material(group.material_crc, &ctx);
            }
        }
    }

    fn on_reset(&mut self) {
        self.clock = 0.0;
        for level in &mut self.levels {
            level.visible = true;
        }
    }

    fn hierarchy(&self) -> HierarchyNode {
        let mut root = HierarchyNode::new(self.name.clone(), "Model");
        root.children = self
            .levels
            .iter()
            .map(|level| {
                let mut node = HierarchyNode::new(level.name.clone(), "Level");
                node.visible = level.visible;
                node.children = level
                    .groups
                    .iter()
                    .enumerate()
                    .map(|(i, group)| {
                        HierarchyNode::new(format!("Mesh {i} (0x{:08X})", group.material_crc), "Mesh")
                    })
                    .collect();
                node
            })
            .collect();
        root
    }

    fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        match self.levels.iter_mut().find(|level| name_eq(&level.name, name)) {
            Some(level) => {
                level.visible = visible;
                true
            }
            None => false,
        }
    }

    fn is_visible(&self, name: &str) -> Option<bool> {
        self.levels
            .iter()
            .find(|level| name_eq(&level.name, name))
            .map(|level| level.visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::resolver::EmptyResolver;
    use lancer_core::model_crc;

    #[test]
    fn vmesh_ref_layout() {
        let node = Node::leaf("VMeshRef", fixtures::vmesh_ref("ship.vms", 2));
        let mesh_ref = VMeshRef::parse(&node).unwrap();
        assert_eq!(mesh_ref.vmesh_crc, model_crc("ship.vms"));
        assert_eq!(mesh_ref.mesh_count, 2);
        assert_eq!(mesh_ref.index_count, 6);
        assert_eq!(mesh_ref.bounds_max, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(mesh_ref.bounds_min, Vec3::ZERO);
        assert_eq!(mesh_ref.radius, 0.75);
    }

    #[test]
    fn groups_follow_mesh_headers() {
        let tree = fixtures::model_file("ship.vms", &["hull", "glass"]);
        let model = ModelFile::from_node("ship.3db", &tree, &EmptyResolver).unwrap();
        let level = &model.levels()[0];
        assert!(level.mesh.is_some());
        assert_eq!(level.groups.len(), 2);
        assert_eq!(level.groups[1].base_vertex, 3);
        assert_eq!(level.groups[1].start_index, 3);
        assert_eq!(level.groups[1].material_crc, model_crc("glass"));
    }

    #[test]
    fn unresolved_material_uses_placeholder() {
        let tree = fixtures::model_file("ship.vms", &["hull"]);
        let model = ModelFile::from_node("ship.3db", &tree, &EmptyResolver).unwrap();
        assert!(model.uses_placeholder());

        let mut missing = Vec::new();
        model.detect_resources(
            &EmptyResolver,
            &mut missing,
            &mut HashSet::new(),
            &mut HashSet::new(),
            &mut HashSet::new(),
        );
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].context, "Level0 in ship.3db");
    }

    #[test]
    fn missing_texture_is_reported_once() {
        let mut tree = fixtures::model_file("ship.vms", &["hull"]);
        if let lancer_utf::NodePayload::Interior(children) = &mut tree.payload {
            children.push(fixtures::material_library(&[fixtures::material_entry(
                "hull",
                [1.0, 1.0, 1.0],
                Some("hull_diffuse"),
            )]));
        }
        let model = ModelFile::from_node("ship.3db", &tree, &EmptyResolver).unwrap();
        assert!(!model.uses_placeholder());

        let mut missing = Vec::new();
        let mut material_refs = HashSet::new();
        let mut texture_refs = HashSet::new();
        let mut reported = HashSet::new();
        model.detect_resources(
            &EmptyResolver,
            &mut missing,
            &mut material_refs,
            &mut texture_refs,
            &mut reported,
        );
        assert_eq!(missing.len(), 1);
        assert!(missing[0].description.contains("hull_diffuse"));

        model.detect_resources(
            &EmptyResolver,
            &mut missing,
            &mut material_refs,
            &mut texture_refs,
            &mut reported,
        );
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn missing_mesh_library_degrades() {
        let tree = Node::interior("\\", vec![fixtures::vmesh_part("absent.vms", 1)]);
        let model = ModelFile::from_node("ship.3db", &tree, &EmptyResolver).unwrap();
        assert!(model.levels()[0].mesh.is_none());

        let mut list = DrawList::new();
        model.draw(Mat4::IDENTITY, &DrawParameters::new(&EmptyResolver), &mut list);
        assert!(list.is_empty());

        let mut missing = Vec::new();
        model.detect_resources(
            &EmptyResolver,
            &mut missing,
            &mut HashSet::new(),
            &mut HashSet::new(),
            &mut HashSet::new(),
        );
        assert_eq!(missing.len(), 1);
        assert_eq!(
            missing[0].kind,
            crate::MissingKind::Mesh(model_crc("absent.vms"))
        );
    }

    #[test]
    fn vmeshpart_leaf_is_malformed() {
        let tree = Node::interior("\\", vec![Node::leaf("VMeshPart", vec![0u8; 60])]);
        let err = ModelFile::from_node("ship.3db", &tree, &EmptyResolver).unwrap_err();
        assert!(matches!(err, NodeError::ExpectedInterior(_)));
        assert_eq!(err.path(), "\\/VMeshPart");
    }

    #[test]
    fn multilevel_levels_and_switch_distances() {
        let tree = Node::interior(
            "\\",
            vec![
                fixtures::vmesh_library("ship.vms", &["hull"]),
                Node::interior(
                    "MultiLevel",
                    vec![
                        Node::interior("Level1", vec![fixtures::vmesh_part("ship.vms", 1)]),
                        Node::interior("Level0", vec![fixtures::vmesh_part("ship.vms", 1)]),
                        Node::f32_leaf("Switch2", &[0.0, 100.0, 400.0]),
                    ],
                ),
            ],
        );
        let model = ModelFile::from_node("ship.3db", &tree, &EmptyResolver).unwrap();
        let names: Vec<_> = model.levels().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Level0", "Level1"]);
        assert_eq!(model.lod_for_distance(50.0), 0);
        assert_eq!(model.lod_for_distance(150.0), 1);
        assert_eq!(model.lod_for_distance(5000.0), 1);
    }

    #[test]
    fn multilevel_level_without_part_reports_path() {
        let tree = Node::interior(
            "\\",
            vec![Node::interior(
                "MultiLevel",
                vec![Node::interior("Level0", vec![Node::leaf("VMeshPart", vec![])])],
            )],
        );
        let err = ModelFile::from_node("ship.3db", &tree, &EmptyResolver).unwrap_err();
        assert_eq!(err.path(), "\\/MultiLevel/Level0/VMeshPart");
    }

    #[test]
    fn hidden_level_is_not_drawn() {
        let tree = fixtures::model_file("ship.vms", &["hull"]);
        let mut model = ModelFile::from_node("ship.3db", &tree, &EmptyResolver).unwrap();
        let params = DrawParameters::new(&EmptyResolver);

        let mut list = DrawList::new();
        model.draw(Mat4::IDENTITY, &params, &mut list);
        assert_eq!(list.len(), 1);
        assert!(list.calls[0].material.is_placeholder());
        assert_eq!(list.calls[0].tint, lancer_core::Color::PLACEHOLDER);

        assert!(model.set_visible("level0", false));
        assert_eq!(model.is_visible("Level0"), Some(false));
        list.clear();
        model.draw(Mat4::IDENTITY, &params, &mut list);
        assert!(list.is_empty());

        model.on_reset();
        assert_eq!(model.is_visible("Level0"), Some(true));
        assert!(!model.set_visible("Level7", false));
    }
}
