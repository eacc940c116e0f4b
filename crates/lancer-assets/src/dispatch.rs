//! Format dispatch
//!
//! Decides which drawable a node tree describes by looking at the names of
//! its top-level children, then builds it.

use std::fmt;
use std::path::Path;

use lancer_utf::{normalize, Node};
use tracing::{debug, info};

use crate::drawable::Drawable;
use crate::error::AssetError;
use crate::resolver::ResourceResolver;

/// The four drawable formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawableKind {
    Sphere,
    SingleLevel,
    Compound,
    Deformable,
}

impl fmt::Display for DrawableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DrawableKind::Sphere => "sphere",
            DrawableKind::SingleLevel => "single-level model",
            DrawableKind::Compound => "compound model",
            DrawableKind::Deformable => "deformable model",
        };
        f.write_str(name)
    }
}

/// Classify a tree by its top-level children.
///
/// Children are scanned in order. `Sphere`, `VMeshPart` and `Skeleton`
/// decide the format as soon as they are seen. `Cmpnd` and `MultiLevel` only
/// count once the scan is over, with `Cmpnd` taking precedence.
pub fn classify_node(tree: &Node) -> Option<DrawableKind> {
    let mut compound = false;
    let mut multilevel = false;

    for child in tree.iter() {
        match normalize(&child.name).as_str() {
            "sphere" => return Some(DrawableKind::Sphere),
            "vmeshpart" => return Some(DrawableKind::SingleLevel),
            "skeleton" => return Some(DrawableKind::Deformable),
            "cmpnd" => compound = true,
            "multilevel" => multilevel = true,
            _ => {}
        }
    }

    if compound {
        Some(DrawableKind::Compound)
    } else if multilevel {
        Some(DrawableKind::SingleLevel)
    } else {
        None
    }
}

/// Classify the tree read from `path`.
pub fn classify(path: &Path, tree: &Node) -> Result<DrawableKind, AssetError> {
    classify_node(tree).ok_or_else(|| AssetError::UnsupportedFormat(path.to_path_buf()))
}

/// Display name of the drawable loaded from `path`.
pub(crate) fn drawable_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Classify `tree` and build the matching drawable.
pub fn load_drawable(
    path: &Path,
    tree: &Node,
    resolver: &dyn ResourceResolver,
) -> Result<Drawable, AssetError> {
    let kind = classify(path, tree)?;
    debug!("Classified '{}' as {}", path.display(), kind);

    let drawable = Drawable::build(kind, &drawable_name(path), tree, resolver)
        .map_err(AssetError::malformed(path))?;
    info!("Loaded {} '{}'", kind, path.display());
    Ok(drawable)
}
