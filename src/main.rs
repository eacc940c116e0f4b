//! Lancer Inspect - headless inspection of UTF asset trees
//!
//! Loads the configured resource files, then classifies and builds every
//! drawable named on the command line, printing its hierarchy and any
//! missing references.

mod settings;
mod tree_source;

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use lancer_assets::{Drawable, DrawableAsset, HierarchyNode, ResourceManager};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use settings::InspectSettings;
use tree_source::JsonTreeSource;

fn print_hierarchy(node: &HierarchyNode, depth: usize) {
    let hidden = if node.visible { "" } else { " (hidden)" };
    println!("{:indent$}{} [{}]{}", "", node.name, node.label, hidden, indent = depth * 2);
    for child in &node.children {
        print_hierarchy(child, depth + 1);
    }
}

fn report(drawable: &Drawable, manager: &ResourceManager, settings: &InspectSettings) {
    println!("{}: {}", drawable.name(), drawable.kind());
    print_hierarchy(&drawable.hierarchy(), 1);

    let mut missing = Vec::new();
    if settings.report_missing {
        let mut material_refs = HashSet::new();
        let mut texture_refs = HashSet::new();
        let mut reported = HashSet::new();
        drawable.detect_resources(
            manager,
            &mut missing,
            &mut material_refs,
            &mut texture_refs,
            &mut reported,
        );
    } else {
        missing.extend(drawable.diagnostics().iter().cloned());
    }

    if missing.is_empty() {
        println!("  no missing references");
    }
    for reference in &missing {
        println!("  missing: {}", reference);
    }
}

fn main() -> Result<()> {
    let settings = InspectSettings::load();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.max_level())
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let mut drawables: Vec<PathBuf> = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--save-settings" {
            let path = settings.save().context("Failed to save settings")?;
            println!("Wrote {}", path.display());
        } else {
            drawables.push(PathBuf::from(arg));
        }
    }

    info!("Data root: {}", settings.data_root.display());
    let source = JsonTreeSource::new(&settings.data_root);
    let manager = ResourceManager::new();

    for path in &settings.resource_files {
        manager
            .load_resource_file_from(&source, path)
            .with_context(|| format!("Failed to load resource file {}", path.display()))?;
    }

    let mut failures = 0;
    for path in &drawables {
        match manager.load_drawable_from(&source, path) {
            Ok(drawable) => report(&drawable, &manager, &settings),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                println!("{}: failed to load: {:#}", path.display(), anyhow::Error::from(e));
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} drawables failed to load", failures, drawables.len());
    }
    Ok(())
}
