use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lancer_utf::{normalize, Node};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::dispatch;
use crate::drawable::Drawable;
use crate::error::AssetError;
use crate::library::{self, FileLibraries, FrameAnimation, Material, Texture, VMeshData};
use crate::resolver::ResourceResolver;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Identifies a resource file loaded into a [`ResourceManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryHandle(u64);

impl LibraryHandle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Produces node trees for paths. The binary UTF reader lives outside this
/// crate; anything that can hand back a [`Node`] plugs in here.
pub trait TreeSource {
    fn read_tree(&self, path: &Path) -> io::Result<Node>;
}

struct LoadedFile {
    handle: LibraryHandle,
    path: PathBuf,
    libraries: Arc<FileLibraries>,
}

/// Flattened view of every loaded library. The first file to bind an
/// identifier keeps it.
#[derive(Default)]
struct ResourceIndex {
    materials: HashMap<u32, Arc<Material>>,
    textures: HashMap<String, Arc<Texture>>,
    animations: HashMap<String, Arc<FrameAnimation>>,
    meshes: HashMap<u32, Arc<VMeshData>>,
}

impl ResourceIndex {
    fn add(&mut self, file: &LoadedFile) {
        let source = file.path.display();
        let libraries = &file.libraries;

        if let Some(materials) = &libraries.materials {
            for (id, material) in materials.iter() {
                if self.materials.contains_key(&id) {
                    debug!("Material 0x{:08X} from '{}' is shadowed", id, source);
                    continue;
                }
                self.materials.insert(id, Arc::clone(material));
            }
        }
        if let Some(textures) = &libraries.textures {
            for texture in textures.textures() {
                let key = normalize(&texture.name);
                if self.textures.contains_key(&key) {
                    debug!("Texture '{}' from '{}' is shadowed", texture.name, source);
                    continue;
                }
                self.textures.insert(key, Arc::clone(texture));
            }
            for animation in textures.animations() {
                let key = normalize(&animation.name);
                if self.animations.contains_key(&key) {
                    debug!("Frame animation '{}' from '{}' is shadowed", animation.name, source);
                    continue;
                }
                self.animations.insert(key, Arc::clone(animation));
            }
        }
        if let Some(vmesh) = &libraries.vmesh {
            for (crc, data) in vmesh.iter() {
                if self.meshes.contains_key(&crc) {
                    debug!("VMesh '{}' from '{}' is shadowed", data.name, source);
                    continue;
                }
                self.meshes.insert(crc, Arc::clone(data));
            }
        }
    }
}

/// Loaded files and the index flattened from them. Both change under one
/// lock so the index always reflects exactly the files in the list.
#[derive(Default)]
struct ManagerState {
    files: Vec<LoadedFile>,
    index: ResourceIndex,
}

impl ManagerState {
    fn handle_for(&self, path: &Path) -> Option<LibraryHandle> {
        self.files
            .iter()
            .find(|file| file.path == path)
            .map(|file| file.handle)
    }

    fn rebuild_index(&mut self) {
        let mut index = ResourceIndex::default();
        for file in &self.files {
            index.add(file);
        }
        self.index = index;
    }
}

/// Session-wide resolver over every loaded resource file.
///
/// Loads, unloads and lookups may run from any thread.
#[derive(Default)]
pub struct ResourceManager {
    state: RwLock<ManagerState>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the libraries of a resource file and make them resolvable.
    /// Loading the same path again returns the existing handle.
    pub fn load_resource_file(&self, path: &Path, tree: &Node) -> Result<LibraryHandle, AssetError> {
        if let Some(handle) = self.state.read().handle_for(path) {
            return Ok(handle);
        }

        // Built without the lock held: texture checks resolve through `self`.
        let libraries = library::load_resource_file(path, tree, self)?;

        let mut state = self.state.write();
        if let Some(handle) = state.handle_for(path) {
            debug!("Resource file '{}' was loaded concurrently", path.display());
            return Ok(handle);
        }
        let file = LoadedFile {
            handle: LibraryHandle::next(),
            path: path.to_path_buf(),
            libraries: Arc::new(libraries),
        };
        let handle = file.handle;
        state.index.add(&file);
        state.files.push(file);

        info!(
            "Loaded resource file '{}': {} materials, {} textures, {} meshes in session",
            path.display(),
            state.index.materials.len(),
            state.index.textures.len(),
            state.index.meshes.len()
        );
        Ok(handle)
    }

    /// Read a resource file through `source` and load it.
    pub fn load_resource_file_from(
        &self,
        source: &dyn TreeSource,
        path: &Path,
    ) -> Result<LibraryHandle, AssetError> {
        let tree = source
            .read_tree(path)
            .map_err(|e| AssetError::Io(path.to_path_buf(), e))?;
        self.load_resource_file(path, &tree)
    }

    /// Forget a resource file. Identifiers it shadowed become visible again.
    pub fn unload(&self, handle: LibraryHandle) -> bool {
        let mut state = self.state.write();
        let Some(position) = state.files.iter().position(|file| file.handle == handle) else {
            return false;
        };
        let removed = state.files.remove(position);
        state.rebuild_index();

        info!("Unloaded resource file '{}'", removed.path.display());
        true
    }

    /// Classify and build the drawable described by `tree`.
    pub fn load_drawable(&self, path: &Path, tree: &Node) -> Result<Drawable, AssetError> {
        dispatch::load_drawable(path, tree, self)
    }

    /// Read a drawable file through `source` and build it.
    pub fn load_drawable_from(
        &self,
        source: &dyn TreeSource,
        path: &Path,
    ) -> Result<Drawable, AssetError> {
        let tree = source
            .read_tree(path)
            .map_err(|e| AssetError::Io(path.to_path_buf(), e))?;
        self.load_drawable(path, &tree)
    }

    /// Paths of the loaded resource files, in load order.
    pub fn loaded_files(&self) -> Vec<PathBuf> {
        self.state.read().files.iter().map(|file| file.path.clone()).collect()
    }

    /// Libraries built from one loaded file.
    pub fn libraries(&self, handle: LibraryHandle) -> Option<Arc<FileLibraries>> {
        self.state
            .read()
            .files
            .iter()
            .find(|file| file.handle == handle)
            .map(|file| Arc::clone(&file.libraries))
    }

    pub fn material_count(&self) -> usize {
        self.state.read().index.materials.len()
    }

    pub fn texture_count(&self) -> usize {
        self.state.read().index.textures.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.state.read().index.meshes.len()
    }
}

impl ResourceResolver for ResourceManager {
    fn find_material(&self, id: u32) -> Option<Arc<Material>> {
        self.state.read().index.materials.get(&id).cloned()
    }

    fn find_texture(&self, name: &str) -> Option<Arc<Texture>> {
        self.state.read().index.textures.get(&normalize(name)).cloned()
    }

    fn try_get_frame_animation(&self, name: &str) -> Option<Arc<FrameAnimation>> {
        self.state.read().index.animations.get(&normalize(name)).cloned()
    }

    fn find_mesh(&self, id: u32) -> Option<Arc<VMeshData>> {
        self.state.read().index.meshes.get(&id).cloned()
    }
}
