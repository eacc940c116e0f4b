//! Missing-resource diagnostics
//!
//! Resource absence never fails a load. Drawables record what they could not
//! bind and report it, together with anything their resolver cannot find,
//! when asked through `detect_resources`.

use std::collections::HashSet;
use std::fmt;

use lancer_utf::normalize;

use crate::resolver::ResourceResolver;

/// What kind of reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MissingKind {
    Material(u32),
    Texture(String),
    Mesh(u32),
    Bone(String),
    Constraint(String),
    PartFile(String),
}

/// An unresolved reference and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MissingReference {
    pub kind: MissingKind,
    pub description: String,
    pub context: String,
}

impl MissingReference {
    pub fn new(kind: MissingKind, context: impl Into<String>) -> Self {
        let description = match &kind {
            MissingKind::Material(id) => format!("Material 0x{id:08X}"),
            MissingKind::Texture(name) => format!("Texture {name}"),
            MissingKind::Mesh(id) => format!("VMesh 0x{id:08X}"),
            MissingKind::Bone(name) => format!("Bone {name}"),
            MissingKind::Constraint(name) => format!("Constraint part {name}"),
            MissingKind::PartFile(name) => format!("Part file {name}"),
        };
        Self {
            kind,
            description,
            context: context.into(),
        }
    }
}

impl fmt::Display for MissingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (referenced by {})", self.description, self.context)
    }
}

/// Context string for a reference: the owning node plus its drawable.
pub(crate) fn context(node: &str, drawable: &str) -> String {
    format!("{node} in {drawable}")
}

/// Walks resource references on behalf of a drawable, skipping anything the
/// caller already knows about.
///
/// Materials and textures are keyed by identifier alone. Every other
/// reference is keyed by kind and context, so each referencing site is
/// reported once per `reported` set.
pub(crate) struct ResourceWalk<'a> {
    pub resolver: &'a dyn ResourceResolver,
    pub missing: &'a mut Vec<MissingReference>,
    pub material_refs: &'a mut HashSet<u32>,
    pub texture_refs: &'a mut HashSet<String>,
    pub reported: &'a mut HashSet<MissingReference>,
}

impl ResourceWalk<'_> {
    /// Check a material and, when it resolves, the textures it samples.
    pub fn material(&mut self, id: u32, context: &str) {
        if !self.material_refs.insert(id) {
            return;
        }
        match self.resolver.find_material(id) {
            Some(material) => {
                for texture in material.textures() {
                    self.texture(texture, context);
                }
            }
            None => self
                .missing
                .push(MissingReference::new(MissingKind::Material(id), context)),
        }
    }

    pub fn texture(&mut self, name: &str, context: &str) {
        if !self.texture_refs.insert(normalize(name)) {
            return;
        }
        if !self.resolver.texture_exists(name) {
            self.missing.push(MissingReference::new(
                MissingKind::Texture(name.to_string()),
                context,
            ));
        }
    }

    pub fn mesh(&mut self, id: u32, context: &str) {
        if self.resolver.find_mesh(id).is_some() {
            return;
        }
        self.report(MissingReference::new(MissingKind::Mesh(id), context));
    }

    /// Report a diagnostic recorded at construction time.
    pub fn recorded(&mut self, diagnostic: &MissingReference) {
        self.report(diagnostic.clone());
    }

    fn report(&mut self, diagnostic: MissingReference) {
        if self.reported.insert(diagnostic.clone()) {
            self.missing.push(diagnostic);
        }
    }
}
