use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lancer_core::{Mat4, Transform, Vec3};
use lancer_utf::{name_eq, normalize, LeafReader, Node, NodeError};
use tracing::{debug, warn};

use super::{first_cycle, DrawList, DrawParameters, Drawable, DrawableAsset, HierarchyNode};
use crate::diagnostics::{context, MissingKind, MissingReference, ResourceWalk};
use crate::dispatch::classify_node;
use crate::library::{build_libraries, FileLibraries};
use crate::resolver::{LayeredResolver, ResourceResolver};

const NAME_LEN: usize = 64;

/// Joint type of a constraint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Fixed,
    Revolute,
    Prismatic,
    Spheric,
    Loose,
}

impl ConstraintKind {
    fn from_leaf_name(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "fix" => Some(ConstraintKind::Fixed),
            "rev" => Some(ConstraintKind::Revolute),
            "pris" => Some(ConstraintKind::Prismatic),
            "sphere" => Some(ConstraintKind::Spheric),
            "loose" => Some(ConstraintKind::Loose),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConstraintKind::Fixed => "Fix",
            ConstraintKind::Revolute => "Rev",
            ConstraintKind::Prismatic => "Pris",
            ConstraintKind::Spheric => "Sphere",
            ConstraintKind::Loose => "Loose",
        }
    }
}

/// Attachment of a child part to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub parent: String,
    pub child: String,
    pub origin: Vec3,
    pub offset: Vec3,
    /// Row-major rotation.
    pub rotation: [f32; 9],
    pub axis: Vec3,
    /// Motion limits: one pair for Rev/Pris, three for Sphere.
    pub limits: Vec<(f32, f32)>,
}

impl Constraint {
    fn parse(kind: ConstraintKind, reader: &mut LeafReader<'_>) -> Result<Self, NodeError> {
        let parent = reader.fixed_string(NAME_LEN)?;
        let child = reader.fixed_string(NAME_LEN)?;
        let origin = Vec3::from(reader.vec3()?);
        let offset = match kind {
            ConstraintKind::Revolute | ConstraintKind::Prismatic | ConstraintKind::Spheric => {
                Vec3::from(reader.vec3()?)
            }
            ConstraintKind::Fixed | ConstraintKind::Loose => Vec3::ZERO,
        };
        let rotation = reader.f32s::<9>()?;
        let (axis, limits) = match kind {
            ConstraintKind::Revolute | ConstraintKind::Prismatic => {
                let axis = Vec3::from(reader.vec3()?);
                let min = reader.f32()?;
                let max = reader.f32()?;
                (axis, vec![(min, max)])
            }
            ConstraintKind::Spheric => {
                let [min1, max1, min2, max2, min3, max3] = reader.f32s::<6>()?;
                (Vec3::ZERO, vec![(min1, max1), (min2, max2), (min3, max3)])
            }
            ConstraintKind::Fixed | ConstraintKind::Loose => (Vec3::ZERO, Vec::new()),
        };

        Ok(Self {
            kind,
            parent,
            child,
            origin,
            offset,
            rotation,
            axis,
            limits,
        })
    }

    /// Child placement relative to the parent, at rest.
    pub fn local_transform(&self) -> Mat4 {
        Transform::from_origin_rows(self.origin + self.offset, self.rotation).matrix()
    }
}

fn parse_constraints(cons: &Node) -> Result<Vec<Constraint>, NodeError> {
    let mut constraints = Vec::new();
    for leaf in cons.children()? {
        let Some(kind) = ConstraintKind::from_leaf_name(&leaf.name) else {
            debug!("Ignoring unknown constraint list '{}'", leaf.name);
            continue;
        };
        let mut reader = leaf.reader().map_err(|e| e.within(&cons.name))?;
        while reader.remaining() > 0 {
            let constraint = Constraint::parse(kind, &mut reader)
                .map_err(|e| e.within(&cons.name))?;
            constraints.push(constraint);
        }
    }
    Ok(constraints)
}

/// One sub-model of a compound.
#[derive(Debug, Clone)]
pub struct Part {
    pub object_name: String,
    pub file_name: String,
    pub index: u32,
    pub model: Box<Drawable>,
    pub parent: Option<usize>,
    pub constraint: Option<Constraint>,
    pub children: Vec<usize>,
    pub visible: bool,
}

/// A model assembled from parts joined by constraints.
#[derive(Debug, Clone)]
pub struct CompoundModel {
    pub name: String,
    parts: Vec<Part>,
    roots: Vec<usize>,
    libraries: Arc<FileLibraries>,
    diagnostics: Vec<MissingReference>,
    clock: f64,
}

impl CompoundModel {
    pub fn from_node(
        name: &str,
        tree: &Node,
        resolver: &dyn ResourceResolver,
    ) -> Result<Self, NodeError> {
        let libraries = build_libraries(tree, resolver)?;
        let layered = LayeredResolver::new(&libraries, resolver);
        let within = |e: NodeError| e.within(&tree.name);

        let cmpnd = tree.require("Cmpnd").map_err(within)?;
        cmpnd.children().map_err(within)?;
        let within_cmpnd = |e: NodeError| e.within(&cmpnd.name).within(&tree.name);

        let mut diagnostics = Vec::new();
        let mut parts = Vec::new();
        let mut constraints = Vec::new();

        for entry in cmpnd.iter() {
            let lower = normalize(&entry.name);
            if lower == "cons" {
                constraints.extend(parse_constraints(entry).map_err(within_cmpnd)?);
                continue;
            }
            if lower != "root" && !lower.starts_with("part_") {
                debug!("Ignoring Cmpnd entry '{}' in '{}'", entry.name, name);
                continue;
            }

            entry.children().map_err(within_cmpnd)?;
            let within_entry = |e: NodeError| within_cmpnd(e.within(&entry.name));
            let object_name = entry
                .require("Object name")
                .map_err(within_cmpnd)?
                .read_string()
                .map_err(within_entry)?;
            let file_name = entry
                .require("File name")
                .map_err(within_cmpnd)?
                .read_string()
                .map_err(within_entry)?;
            let index = match entry.find("Index") {
                Some(node) => node.read_u32().map_err(within_entry)?,
                None => parts.len() as u32,
            };

            let Some(file_node) = tree.find(&file_name) else {
                warn!(
                    "Part '{}' of '{}' names missing file node '{}'",
                    object_name, name, file_name
                );
                diagnostics.push(MissingReference::new(
                    MissingKind::PartFile(file_name),
                    context(&object_name, name),
                ));
                continue;
            };
            file_node.children().map_err(within)?;
            let kind = classify_node(file_node)
                .ok_or_else(|| NodeError::MissingChild {
                    path: file_node.name.clone(),
                    child: "VMeshPart".to_string(),
                })
                .map_err(within)?;
            let model = Drawable::build(kind, &file_name, file_node, &layered).map_err(within)?;

            parts.push(Part {
                object_name,
                file_name,
                index,
                model: Box::new(model),
                parent: None,
                constraint: None,
                children: Vec::new(),
                visible: true,
            });
        }

        let mut lookup: HashMap<String, usize> = HashMap::new();
        for (i, part) in parts.iter().enumerate() {
            lookup.entry(normalize(&part.object_name)).or_insert(i);
        }

        for constraint in constraints {
            let Some(&child) = lookup.get(&normalize(&constraint.child)) else {
                warn!(
                    "{} constraint in '{}' attaches undeclared part '{}'",
                    constraint.kind.label(),
                    name,
                    constraint.child
                );
                diagnostics.push(MissingReference::new(
                    MissingKind::Constraint(constraint.child.clone()),
                    context("Cons", name),
                ));
                continue;
            };
            if parts[child].constraint.is_some() {
                warn!(
                    "Part '{}' in '{}' is already attached, ignoring second constraint",
                    parts[child].object_name, name
                );
                continue;
            }
            match lookup.get(&normalize(&constraint.parent)) {
                Some(&parent) => parts[child].parent = Some(parent),
                None => {
                    warn!(
                        "Part '{}' in '{}' is attached to undeclared part '{}', treating as root",
                        constraint.child, name, constraint.parent
                    );
                    diagnostics.push(MissingReference::new(
                        MissingKind::Constraint(constraint.parent.clone()),
                        context(&parts[child].object_name, name),
                    ));
                }
            }
            parts[child].constraint = Some(constraint);
        }

        let parents: Vec<Option<usize>> = parts.iter().map(|part| part.parent).collect();
        if let Some(index) = first_cycle(&parents) {
            return Err(within_cmpnd(NodeError::ParentCycle(format!(
                "Cons/{}",
                parts[index].object_name
            ))));
        }

        let mut roots = Vec::new();
        for i in 0..parts.len() {
            match parts[i].parent {
                Some(parent) => parts[parent].children.push(i),
                None => roots.push(i),
            }
        }

        debug!(
            "Loaded compound '{}' with {} parts, {} roots, {} diagnostics",
            name,
            parts.len(),
            roots.len(),
            diagnostics.len()
        );

        Ok(Self {
            name: name.to_string(),
            parts,
            roots,
            libraries: Arc::new(libraries),
            diagnostics,
            clock: 0.0,
        })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Indices of parts without a parent.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Find a part by object name (case-insensitive).
    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts
            .iter()
            .find(|part| name_eq(&part.object_name, name))
    }

    /// Rest-pose transform of a part relative to the model origin.
    pub fn part_transform(&self, name: &str) -> Option<Mat4> {
        let mut index = self.parts.iter().position(|part| name_eq(&part.object_name, name))?;
        let mut transform = Mat4::IDENTITY;
        loop {
            let part = &self.parts[index];
            if let Some(constraint) = &part.constraint {
                transform = constraint.local_transform() * transform;
            }
            match part.parent {
                Some(parent) => index = parent,
                None => return Some(transform),
            }
        }
    }

    fn draw_part(&self, index: usize, parent: Mat4, params: &DrawParameters<'_>, out: &mut DrawList) {
        let part = &self.parts[index];
        let world = match &part.constraint {
            Some(constraint) => parent * constraint.local_transform(),
            None => parent,
        };
        if part.visible {
            part.model.draw(world, params, out);
        }
        for &child in &part.children {
            self.draw_part(child, world, params, out);
        }
    }

    fn part_hierarchy(&self, index: usize) -> HierarchyNode {
        let part = &self.parts[index];
        let label = part
            .constraint
            .as_ref()
            .map_or("Root", |constraint| constraint.kind.label());
        let mut node = HierarchyNode::new(part.object_name.clone(), label);
        node.visible = part.visible;
        node.children = part
            .children
            .iter()
            .map(|&child| self.part_hierarchy(child))
            .collect();
        node
    }
}

impl DrawableAsset for CompoundModel {
    fn draw(&self, transform: Mat4, params: &DrawParameters<'_>, out: &mut DrawList) {
        let resolver = LayeredResolver::new(&self.libraries, params.resolver);
        let params = params.with_resolver(&resolver);
        for &root in &self.roots {
            self.draw_part(root, transform, &params, out);
        }
    }

    fn update(&mut self, elapsed: f64) {
        self.clock += elapsed;
        for part in &mut self.parts {
            part.model.update(elapsed);
        }
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
        for part in &self.parts {
            part.model
                .detect_resources(&resolver, missing, material_refs, texture_refs, reported);
        }
        let mut walk = ResourceWalk {
            resolver: &resolver,
            missing,
            material_refs,
            texture_refs,
            reported,
        };
        for diagnostic in &self.diagnostics {
            walk.recorded(diagnostic);
        }
    }

    fn on_reset(&mut self) {
        self.clock = 0.0;
        for part in &mut self.parts {
            part.visible = true;
            part.model.on_reset();
        }
    }

    fn hierarchy(&self) -> HierarchyNode {
        let mut root = HierarchyNode::new(self.name.clone(), "Compound");
        root.children = self
            .roots
            .iter()
            .map(|&index| self.part_hierarchy(index))
            .collect();
        root
    }

    fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        match self
            .parts
            .iter_mut()
            .find(|part| name_eq(&part.object_name, name))
        {
            Some(part) => {
                part.visible = visible;
                true
            }
            None => false,
        }
    }

    fn is_visible(&self, name: &str) -> Option<bool> {
        self.part(name).map(|part| part.visible)
    }

    fn diagnostics(&self) -> &[MissingReference] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::MeshSource;
    use crate::fixtures;
    use crate::resolver::EmptyResolver;

    fn ship(cons: Vec<u8>) -> Node {
        Node::interior(
            "\\",
            vec![
                fixtures::vmesh_library("ship.vms", &["hull"]),
                Node::interior("body.3db", vec![fixtures::vmesh_part("ship.vms", 1)]),
                Node::interior("wing.3db", vec![fixtures::vmesh_part("ship.vms", 1)]),
                Node::interior(
                    "Cmpnd",
                    vec![
                        fixtures::part_entry("Root", "Root", "body.3db", 0),
                        fixtures::part_entry("Part_wing", "wing", "wing.3db", 1),
                        Node::interior("Cons", vec![Node::leaf("Fix", cons)]),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn parts_form_a_tree() {
        let tree = ship(fixtures::fix_record("Root", "wing", [2.0, 0.0, 0.0]));
        let model = CompoundModel::from_node("ship.cmp", &tree, &EmptyResolver).unwrap();
        assert_eq!(model.parts().len(), 2);
        assert_eq!(model.roots(), &[0]);
        assert_eq!(model.part("WING").unwrap().parent, Some(0));
        assert!(model.diagnostics().is_empty());

        let wing = model.part_transform("wing").unwrap();
        assert!(wing.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn draw_places_children_by_constraint() {
        let tree = ship(fixtures::fix_record("Root", "wing", [2.0, 0.0, 0.0]));
        let model = CompoundModel::from_node("ship.cmp", &tree, &EmptyResolver).unwrap();
        let mut list = DrawList::new();
        model.draw(Mat4::IDENTITY, &DrawParameters::new(&EmptyResolver), &mut list);
        assert_eq!(list.len(), 2);
        assert!(matches!(list.calls[0].mesh, MeshSource::VMesh { .. }));
        let origin = list.calls[1].world.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn undeclared_parent_attaches_as_root() {
        let tree = ship(fixtures::fix_record("Ghost", "wing", [0.0; 3]));
        let model = CompoundModel::from_node("ship.cmp", &tree, &EmptyResolver).unwrap();
        assert_eq!(model.roots(), &[0, 1]);
        assert_eq!(model.diagnostics().len(), 1);
        assert_eq!(
            model.diagnostics()[0].kind,
            MissingKind::Constraint("Ghost".into())
        );
    }

    #[test]
    fn undeclared_child_is_ignored() {
        let tree = ship(fixtures::fix_record("Root", "tail", [0.0; 3]));
        let model = CompoundModel::from_node("ship.cmp", &tree, &EmptyResolver).unwrap();
        assert_eq!(model.roots(), &[0, 1]);
        assert_eq!(model.diagnostics()[0].kind, MissingKind::Constraint("tail".into()));
    }

    #[test]
    fn constraint_cycle_is_malformed() {
        let mut cons = fixtures::fix_record("Root", "wing", [0.0; 3]);
        cons.extend(fixtures::fix_record("wing", "Root", [0.0; 3]));
        let err = CompoundModel::from_node("ship.cmp", &ship(cons), &EmptyResolver).unwrap_err();
        assert!(matches!(err, NodeError::ParentCycle(_)));
        assert!(err.path().starts_with("\\/Cmpnd/Cons/"));
    }

    #[test]
    fn second_constraint_for_a_child_is_ignored() {
        let mut cons = fixtures::fix_record("Root", "wing", [1.0, 0.0, 0.0]);
        cons.extend(fixtures::fix_record("Root", "wing", [5.0, 0.0, 0.0]));
        let model = CompoundModel::from_node("ship.cmp", &ship(cons), &EmptyResolver).unwrap();
        let wing = model.part("wing").unwrap();
        assert_eq!(wing.constraint.as_ref().unwrap().origin, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn revolute_record_layout() {
        let data = fixtures::rev_record("Root", "turret", [0.0, 1.0, 0.0], -1.5, 1.5);
        assert_eq!(data.len(), 208);
        let leaf = Node::leaf("Rev", data);
        let mut reader = leaf.reader().unwrap();
        let rev = Constraint::parse(ConstraintKind::Revolute, &mut reader).unwrap();
        assert_eq!(reader.remaining(), 0);
        assert_eq!(rev.parent, "Root");
        assert_eq!(rev.child, "turret");
        assert_eq!(rev.axis, Vec3::Y);
        assert_eq!(rev.limits, vec![(-1.5, 1.5)]);
    }

    #[test]
    fn truncated_constraint_is_malformed() {
        let mut cons = fixtures::fix_record("Root", "wing", [0.0; 3]);
        cons.truncate(100);
        let err = CompoundModel::from_node("ship.cmp", &ship(cons), &EmptyResolver).unwrap_err();
        assert!(matches!(err, NodeError::Truncated { .. }));
        assert_eq!(err.path(), "\\/Cmpnd/Cons/Fix");
    }

    #[test]
    fn missing_part_file_is_a_diagnostic() {
        let tree = Node::interior(
            "\\",
            vec![Node::interior(
                "Cmpnd",
                vec![fixtures::part_entry("Root", "Root", "gone.3db", 0)],
            )],
        );
        let model = CompoundModel::from_node("ship.cmp", &tree, &EmptyResolver).unwrap();
        assert!(model.parts().is_empty());
        assert_eq!(
            model.diagnostics()[0].kind,
            MissingKind::PartFile("gone.3db".into())
        );
    }

    #[test]
    fn visibility_only_affects_drawing() {
        let tree = ship(fixtures::fix_record("Root", "wing", [2.0, 0.0, 0.0]));
        let mut model = CompoundModel::from_node("ship.cmp", &tree, &EmptyResolver).unwrap();
        assert!(model.set_visible("wing", false));

        let mut list = DrawList::new();
        model.draw(Mat4::IDENTITY, &DrawParameters::new(&EmptyResolver), &mut list);
        assert_eq!(list.len(), 1);
        assert_eq!(model.parts().len(), 2);

        let hierarchy = model.hierarchy();
        assert_eq!(hierarchy.find("wing").map(|n| n.visible), Some(false));
        assert_eq!(hierarchy.find("wing").map(|n| n.label), Some("Fix"));

        model.on_reset();
        assert_eq!(model.is_visible("wing"), Some(true));
    }

    #[test]
    fn detect_includes_part_materials_and_recorded_diagnostics() {
        let tree = ship(fixtures::fix_record("Ghost", "wing", [0.0; 3]));
        let model = CompoundModel::from_node("ship.cmp", &tree, &EmptyResolver).unwrap();
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
        // "hull" is shared by both parts and reported once, plus the orphan constraint.
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].context, "Level0 in body.3db");

        let mut again = Vec::new();
        model.detect_resources(
            &EmptyResolver,
            &mut again,
            &mut material_refs,
            &mut texture_refs,
            &mut reported,
        );
        assert!(again.is_empty());
    }
}
