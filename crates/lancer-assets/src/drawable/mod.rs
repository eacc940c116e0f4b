//! Drawable variants
//!
//! A loaded file becomes exactly one of four drawables. All of them share the
//! [`DrawableAsset`] capability set, which is the only surface the renderer
//! and editors use.

mod compound;
mod deformable;
mod model;
mod sphere;

use std::collections::HashSet;
use std::sync::Arc;

use lancer_core::{Color, Mat4};
use lancer_utf::{Node, NodeError};

use crate::diagnostics::MissingReference;
use crate::dispatch::DrawableKind;
use crate::library::{Material, VMeshData};
use crate::resolver::ResourceResolver;

pub use compound::{CompoundModel, Constraint, ConstraintKind, Part};
pub use deformable::{Bone, BoneBinding, DeformableModel, Segment, SegmentMesh, Skeleton};
pub use model::{MeshGroup, ModelFile, ModelLevel, VMeshRef};
pub use sphere::SphereFile;

/// Per-frame inputs to [`DrawableAsset::draw`].
#[derive(Clone, Copy)]
pub struct DrawParameters<'a> {
    /// Libraries consulted for materials at draw time.
    pub resolver: &'a dyn ResourceResolver,
    /// Color multiplied into every draw call.
    pub tint: Color,
    /// Distance from the camera, used to pick a level of detail.
    pub camera_distance: f32,
}

impl<'a> DrawParameters<'a> {
    pub fn new(resolver: &'a dyn ResourceResolver) -> Self {
        Self {
            resolver,
            tint: Color::WHITE,
            camera_distance: 0.0,
        }
    }

    /// Same parameters, resolving through `resolver` instead.
    pub fn with_resolver<'b>(&self, resolver: &'b dyn ResourceResolver) -> DrawParameters<'b> {
        DrawParameters {
            resolver,
            tint: self.tint,
            camera_distance: self.camera_distance,
        }
    }
}

/// Material to bind for a draw call.
#[derive(Debug, Clone)]
pub enum MaterialBinding {
    Resolved(Arc<Material>),
    /// The referenced material could not be found; draw with the placeholder.
    Placeholder(u32),
    /// No material was referenced at all.
    Default,
}

impl MaterialBinding {
    pub(crate) fn resolve(resolver: &dyn ResourceResolver, id: u32) -> Self {
        match resolver.find_material(id) {
            Some(material) => MaterialBinding::Resolved(material),
            None => MaterialBinding::Placeholder(id),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, MaterialBinding::Placeholder(_))
    }

    /// Tint for a draw call using this binding. Unresolved materials are
    /// flagged with [`Color::PLACEHOLDER`].
    pub fn tint(&self, base: Color) -> Color {
        match self {
            MaterialBinding::Placeholder(_) => Color::PLACEHOLDER,
            _ => base,
        }
    }
}

/// Geometry referenced by a draw call.
#[derive(Debug, Clone)]
pub enum MeshSource {
    VMesh {
        data: Arc<VMeshData>,
        base_vertex: u32,
        start_index: u32,
        index_count: u32,
    },
    /// One face of a cube-mapped sphere primitive.
    SphereFace { radius: f32, face: u32 },
    /// A deformable segment. `bones` holds world-space bone matrices when the
    /// segment is bound; unbound segments render rigidly.
    Skinned {
        mesh: Arc<SegmentMesh>,
        bones: Option<Arc<[Mat4]>>,
    },
}

/// One unit of work handed to the renderer.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub world: Mat4,
    pub mesh: MeshSource,
    pub material: MaterialBinding,
    pub tint: Color,
    /// Drawable clock, used to select frame-animation frames.
    pub time: f64,
}

/// Draw calls collected during a frame.
#[derive(Debug, Default, Clone)]
pub struct DrawList {
    pub calls: Vec<DrawCall>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, call: DrawCall) {
        self.calls.push(call);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

/// Entry in an editor tree view of a drawable.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub name: String,
    pub label: &'static str,
    pub visible: bool,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn new(name: impl Into<String>, label: &'static str) -> Self {
        Self {
            name: name.into(),
            label,
            visible: true,
            children: Vec::new(),
        }
    }

    /// Depth-first search by name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<&HierarchyNode> {
        if lancer_utf::name_eq(&self.name, name) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Number of entries in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::count).sum::<usize>()
    }
}

/// Find an entry that is its own ancestor.
///
/// `parents[i]` is the parent of entry `i`. When some chain never reaches a
/// root, returns the lowest-indexed entry of the first loop found.
pub(crate) fn first_cycle(parents: &[Option<usize>]) -> Option<usize> {
    for start in 0..parents.len() {
        let mut current = start;
        let mut steps = 0;
        while let Some(parent) = parents[current] {
            current = parent;
            steps += 1;
            // A chain longer than the table has entered its loop.
            if steps == parents.len() {
                return Some(lowest_in_loop(parents, current));
            }
        }
    }
    None
}

fn lowest_in_loop(parents: &[Option<usize>], entry: usize) -> usize {
    let mut lowest = entry;
    let mut current = entry;
    while let Some(parent) = parents[current] {
        if parent == entry {
            break;
        }
        lowest = lowest.min(parent);
        current = parent;
    }
    lowest
}

/// Capabilities shared by every drawable.
pub trait DrawableAsset {
    /// Append draw calls for this drawable placed at `transform`.
    fn draw(&self, transform: Mat4, params: &DrawParameters<'_>, out: &mut DrawList);

    /// Advance the drawable's clock by `elapsed` seconds.
    fn update(&mut self, elapsed: f64);

    /// Append every unresolvable reference to `missing`.
    ///
    /// Identifiers already present in `material_refs` / `texture_refs` are
    /// skipped; newly checked ones are added. Other references are recorded
    /// in `reported` per referencing site, so repeated walks with the same
    /// sets report each reference once.
    fn detect_resources(
        &self,
        resolver: &dyn ResourceResolver,
        missing: &mut Vec<MissingReference>,
        material_refs: &mut HashSet<u32>,
        texture_refs: &mut HashSet<String>,
        reported: &mut HashSet<MissingReference>,
    );

    /// Reset hotkey: rewind the clock and show every part again.
    fn on_reset(&mut self);

    /// Internal structure for tree-view display.
    fn hierarchy(&self) -> HierarchyNode;

    /// Show or hide a named part. Returns false if no part has that name.
    fn set_visible(&mut self, _name: &str, _visible: bool) -> bool {
        false
    }

    /// Visibility of a named part, if the drawable has one by that name.
    fn is_visible(&self, _name: &str) -> Option<bool> {
        None
    }

    /// Diagnostics recorded while the drawable was constructed.
    fn diagnostics(&self) -> &[MissingReference] {
        &[]
    }
}

/// A loaded drawable of one of the four supported kinds.
#[derive(Debug, Clone)]
pub enum Drawable {
    Sphere(SphereFile),
    Model(ModelFile),
    Compound(CompoundModel),
    Deformable(DeformableModel),
}

impl Drawable {
    /// Construct the variant for `kind` from `tree`.
    pub fn build(
        kind: DrawableKind,
        name: &str,
        tree: &Node,
        resolver: &dyn ResourceResolver,
    ) -> Result<Self, NodeError> {
        Ok(match kind {
            DrawableKind::Sphere => Drawable::Sphere(SphereFile::from_node(name, tree, resolver)?),
            DrawableKind::SingleLevel => Drawable::Model(ModelFile::from_node(name, tree, resolver)?),
            DrawableKind::Compound => {
                Drawable::Compound(CompoundModel::from_node(name, tree, resolver)?)
            }
            DrawableKind::Deformable => {
                Drawable::Deformable(DeformableModel::from_node(name, tree, resolver)?)
            }
        })
    }

    pub fn kind(&self) -> DrawableKind {
        match self {
            Drawable::Sphere(_) => DrawableKind::Sphere,
            Drawable::Model(_) => DrawableKind::SingleLevel,
            Drawable::Compound(_) => DrawableKind::Compound,
            Drawable::Deformable(_) => DrawableKind::Deformable,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Drawable::Sphere(d) => &d.name,
            Drawable::Model(d) => &d.name,
            Drawable::Compound(d) => &d.name,
            Drawable::Deformable(d) => &d.name,
        }
    }

    fn asset(&self) -> &dyn DrawableAsset {
        match self {
            Drawable::Sphere(d) => d,
            Drawable::Model(d) => d,
            Drawable::Compound(d) => d,
            Drawable::Deformable(d) => d,
        }
    }

    fn asset_mut(&mut self) -> &mut dyn DrawableAsset {
        match self {
            Drawable::Sphere(d) => d,
            Drawable::Model(d) => d,
            Drawable::Compound(d) => d,
            Drawable::Deformable(d) => d,
        }
    }
}

impl DrawableAsset for Drawable {
    fn draw(&self, transform: Mat4, params: &DrawParameters<'_>, out: &mut DrawList) {
        self.asset().draw(transform, params, out)
    }

    fn update(&mut self, elapsed: f64) {
        self.asset_mut().update(elapsed)
    }

    fn detect_resources(
        &self,
        resolver: &dyn ResourceResolver,
        missing: &mut Vec<MissingReference>,
        material_refs: &mut HashSet<u32>,
        texture_refs: &mut HashSet<String>,
        reported: &mut HashSet<MissingReference>,
    ) {
        self.asset()
            .detect_resources(resolver, missing, material_refs, texture_refs, reported)
    }

    fn on_reset(&mut self) {
        self.asset_mut().on_reset()
    }

    fn hierarchy(&self) -> HierarchyNode {
        self.asset().hierarchy()
    }

    fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        self.asset_mut().set_visible(name, visible)
    }

    fn is_visible(&self, name: &str) -> Option<bool> {
        self.asset().is_visible(name)
    }

    fn diagnostics(&self) -> &[MissingReference] {
        self.asset().diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_has_no_cycle() {
        assert_eq!(first_cycle(&[None, Some(0), Some(1), Some(0)]), None);
        assert_eq!(first_cycle(&[]), None);
    }

    #[test]
    fn detects_self_parent() {
        assert_eq!(first_cycle(&[None, Some(1)]), Some(1));
    }

    #[test]
    fn detects_longer_loop() {
        assert_eq!(first_cycle(&[Some(2), Some(0), Some(1), None]), Some(0));
    }

    #[test]
    fn entry_leading_into_a_loop_is_not_blamed() {
        // 0 -> 1 -> 2 -> 1
        assert_eq!(first_cycle(&[Some(1), Some(2), Some(1)]), Some(1));
        // 0 -> 3 -> 2 -> 3
        assert_eq!(first_cycle(&[Some(3), None, Some(3), Some(2)]), Some(2));
        assert_eq!(first_cycle(&[None, Some(2), Some(1)]), Some(1));
    }

    #[test]
    fn hierarchy_find_and_count() {
        let mut root = HierarchyNode::new("ship", "Compound");
        let mut body = HierarchyNode::new("Root", "Part");
        body.children.push(HierarchyNode::new("Wing", "Part"));
        root.children.push(body);
        assert_eq!(root.count(), 3);
        assert_eq!(root.find("wing").map(|n| n.label), Some("Part"));
        assert!(root.find("tail").is_none());
    }
}
