use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lancer_core::{model_crc, Mat4, Quat, Transform, Vec3};
use lancer_utf::{name_eq, normalize, Node, NodeError};
use tracing::{debug, warn};

use super::{
    first_cycle, DrawCall, DrawList, DrawParameters, DrawableAsset, HierarchyNode,
    MaterialBinding, MeshSource,
};
use crate::diagnostics::{context, MissingKind, MissingReference, ResourceWalk};
use crate::library::{build_libraries, FileLibraries};
use crate::resolver::{LayeredResolver, ResourceResolver};

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Rest pose relative to the parent bone.
    pub local: Transform,
}

/// Named bone hierarchy of a deformable model.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
    pub roots: Vec<usize>,
}

impl Skeleton {
    fn parse(
        node: &Node,
        drawable: &str,
        diagnostics: &mut Vec<MissingReference>,
    ) -> Result<Self, NodeError> {
        let mut bones = Vec::new();
        let mut parent_names = Vec::new();
        for entry in node.iter() {
            entry.children()?;
            let within = |e: NodeError| e.within(&entry.name);
            let position = match entry.find("Position") {
                Some(leaf) => Vec3::from(leaf.reader().map_err(within)?.vec3().map_err(within)?),
                None => Vec3::ZERO,
            };
            let rotation = match entry.find("Rotation") {
                Some(leaf) => {
                    let [x, y, z, w] = leaf.reader().map_err(within)?.f32s::<4>().map_err(within)?;
                    Quat::from_xyzw(x, y, z, w).normalize()
                }
                None => Quat::IDENTITY,
            };
            let parent = entry.string_child("Parent")?.filter(|name| !name.is_empty());
            parent_names.push(parent);
            bones.push(Bone {
                name: entry.name.clone(),
                parent: None,
                children: Vec::new(),
                local: Transform::from_position_rotation(position, rotation),
            });
        }

        // First declaration wins, matching `find`.
        let mut lookup: HashMap<String, usize> = HashMap::new();
        for (i, bone) in bones.iter().enumerate() {
            if *lookup.entry(normalize(&bone.name)).or_insert(i) != i {
                warn!("Skeleton of '{}' declares bone '{}' twice", drawable, bone.name);
            }
        }

        for (i, parent) in parent_names.into_iter().enumerate() {
            let Some(parent) = parent else {
                continue;
            };
            match lookup.get(&normalize(&parent)) {
                Some(&index) => bones[i].parent = Some(index),
                None => {
                    warn!(
                        "Bone '{}' of '{}' names undeclared parent '{}', treating as root",
                        bones[i].name, drawable, parent
                    );
                    diagnostics.push(MissingReference::new(
                        MissingKind::Bone(parent),
                        context(&bones[i].name, drawable),
                    ));
                }
            }
        }

        let parents: Vec<Option<usize>> = bones.iter().map(|bone| bone.parent).collect();
        if let Some(index) = first_cycle(&parents) {
            return Err(NodeError::ParentCycle(bones[index].name.clone()));
        }

        let mut roots = Vec::new();
        for i in 0..bones.len() {
            match bones[i].parent {
                Some(parent) => bones[parent].children.push(i),
                None => roots.push(i),
            }
        }

        Ok(Self { bones, roots })
    }

    /// Find a bone index by name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| name_eq(&bone.name, name))
    }

    /// Model-space rest transform of every bone, indexed like `bones`.
    pub fn world_transforms(&self) -> Vec<Mat4> {
        let mut world = vec![Mat4::IDENTITY; self.bones.len()];
        let mut stack: Vec<(usize, Mat4)> =
            self.roots.iter().map(|&root| (root, Mat4::IDENTITY)).collect();
        while let Some((index, parent)) = stack.pop() {
            let bone = &self.bones[index];
            world[index] = parent * bone.local.matrix();
            for &child in &bone.children {
                stack.push((child, world[index]));
            }
        }
        world
    }

    fn bone_hierarchy(&self, index: usize) -> HierarchyNode {
        let bone = &self.bones[index];
        let mut node = HierarchyNode::new(bone.name.clone(), "Bone");
        node.children = bone
            .children
            .iter()
            .map(|&child| self.bone_hierarchy(child))
            .collect();
        node
    }
}

/// Geometry of one segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u16>,
}

/// Weights a segment assigns to one bone.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneBinding {
    pub bone: usize,
    /// `(vertex index, weight)` pairs.
    pub weights: Vec<(u32, f32)>,
}

/// Mesh piece skinned to the skeleton.
#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    pub material: Option<String>,
    pub mesh: Arc<SegmentMesh>,
    pub bindings: Vec<BoneBinding>,
    /// False when a bone group could not be resolved; the segment then
    /// renders rigidly.
    pub bound: bool,
    pub visible: bool,
}

fn read_positions(leaf: &Node) -> Result<Vec<Vec3>, NodeError> {
    let values = leaf.read_f32s()?;
    if values.len() % 3 != 0 {
        return Err(NodeError::Truncated {
            path: leaf.name.clone(),
            offset: values.len() / 3 * 12,
            needed: 12,
            len: values.len() * 4,
        });
    }
    Ok(values.chunks_exact(3).map(Vec3::from_slice).collect())
}

impl Segment {
    fn parse(
        node: &Node,
        skeleton: &Skeleton,
        drawable: &str,
        diagnostics: &mut Vec<MissingReference>,
    ) -> Result<Self, NodeError> {
        node.children()?;
        let within = |e: NodeError| e.within(&node.name);

        let material = node.string_child("Material")?;
        let positions = match node.find("Positions") {
            Some(leaf) => read_positions(leaf).map_err(within)?,
            None => Vec::new(),
        };
        let indices = match node.find("Indices") {
            Some(leaf) => leaf.read_u16s().map_err(within)?,
            None => Vec::new(),
        };

        let mut bindings = Vec::new();
        let mut bound = true;
        if let Some(groups) = node.find("Bones") {
            groups.children().map_err(within)?;
            for group in groups.iter() {
                let Some(bone) = skeleton.find(&group.name) else {
                    warn!(
                        "Segment '{}' of '{}' is bound to undeclared bone '{}'",
                        node.name, drawable, group.name
                    );
                    diagnostics.push(MissingReference::new(
                        MissingKind::Bone(group.name.clone()),
                        context(&node.name, drawable),
                    ));
                    bound = false;
                    continue;
                };
                let within_group = |e: NodeError| e.within(&groups.name).within(&node.name);
                let mut reader = group.reader().map_err(within_group)?;
                let mut weights = Vec::new();
                while reader.remaining() > 0 {
                    let vertex = reader.u32().map_err(within_group)?;
                    let weight = reader.f32().map_err(within_group)?;
                    weights.push((vertex, weight));
                }
                bindings.push(BoneBinding { bone, weights });
            }
        }

        Ok(Self {
            name: node.name.clone(),
            material,
            mesh: Arc::new(SegmentMesh { positions, indices }),
            bindings,
            bound,
            visible: true,
        })
    }
}

/// A skeleton plus mesh segments bound to it by weight.
#[derive(Debug, Clone)]
pub struct DeformableModel {
    pub name: String,
    skeleton: Skeleton,
    segments: Vec<Segment>,
    libraries: Arc<FileLibraries>,
    diagnostics: Vec<MissingReference>,
    clock: f64,
}

impl DeformableModel {
    pub fn from_node(
        name: &str,
        tree: &Node,
        resolver: &dyn ResourceResolver,
    ) -> Result<Self, NodeError> {
        let libraries = build_libraries(tree, resolver)?;
        let within = |e: NodeError| e.within(&tree.name);
        let mut diagnostics = Vec::new();

        let skeleton_node = tree.require("Skeleton").map_err(within)?;
        skeleton_node.children().map_err(within)?;
        let skeleton = Skeleton::parse(skeleton_node, name, &mut diagnostics)
            .map_err(|e| e.within(&skeleton_node.name).within(&tree.name))?;

        let mut segments = Vec::new();
        if let Some(list) = tree.find("Segments") {
            list.children().map_err(within)?;
            for node in list.iter() {
                let segment = Segment::parse(node, &skeleton, name, &mut diagnostics)
                    .map_err(|e| e.within(&list.name).within(&tree.name))?;
                segments.push(segment);
            }
        }

        debug!(
            "Loaded deformable '{}' with {} bones, {} segments ({} unbound)",
            name,
            skeleton.bones.len(),
            segments.len(),
            segments.iter().filter(|segment| !segment.bound).count()
        );

        Ok(Self {
            name: name.to_string(),
            skeleton,
            segments,
            libraries: Arc::new(libraries),
            diagnostics,
            clock: 0.0,
        })
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| name_eq(&segment.name, name))
    }
}

impl DrawableAsset for DeformableModel {
    fn draw(&self, transform: Mat4, params: &DrawParameters<'_>, out: &mut DrawList) {
        let resolver = LayeredResolver::new(&self.libraries, params.resolver);
        let bones: Arc<[Mat4]> = self
            .skeleton
            .world_transforms()
            .into_iter()
            .map(|bone| transform * bone)
            .collect();

        for segment in self.segments.iter().filter(|segment| segment.visible) {
            let material = match &segment.material {
                Some(material) => MaterialBinding::resolve(&resolver, model_crc(material)),
                None => MaterialBinding::Default,
            };
            out.push(DrawCall {
                world: transform,
                mesh: MeshSource::Skinned {
                    mesh: Arc::clone(&segment.mesh),
                    bones: segment.bound.then(|| Arc::clone(&bones)),
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
        for segment in &self.segments {
            if let Some(material) = &segment.material {
                walk.material(model_crc(material), &context(&segment.name, &self.name));
            }
        }
        for diagnostic in &self.diagnostics {
            walk.recorded(diagnostic);
        }
    }

    fn on_reset(&mut self) {
        self.clock = 0.0;
        for segment in &mut self.segments {
            segment.visible = true;
        }
    }

    fn hierarchy(&self) -> HierarchyNode {
        let mut skeleton = HierarchyNode::new("Skeleton", "Skeleton");
        skeleton.children = self
            .skeleton
            .roots
            .iter()
            .map(|&root| self.skeleton.bone_hierarchy(root))
            .collect();

        let mut root = HierarchyNode::new(self.name.clone(), "Deformable");
        root.children.push(skeleton);
        root.children.extend(self.segments.iter().map(|segment| {
            let label = if segment.bound { "Segment" } else { "Unbound segment" };
            let mut node = HierarchyNode::new(segment.name.clone(), label);
            node.visible = segment.visible;
            node
        }));
        root
    }

    fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        match self
            .segments
            .iter_mut()
            .find(|segment| name_eq(&segment.name, name))
        {
            Some(segment) => {
                segment.visible = visible;
                true
            }
            None => false,
        }
    }

    fn is_visible(&self, name: &str) -> Option<bool> {
        self.segment(name).map(|segment| segment.visible)
    }

    fn diagnostics(&self) -> &[MissingReference] {
        &self.diagnostics
    }
}
