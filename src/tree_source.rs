//! Node trees read from JSON dumps
//!
//! The inspector does not parse UTF containers itself. It reads trees that an
//! external converter dumped as JSON in the `Node` serde layout.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use lancer_assets::TreeSource;
use lancer_utf::Node;
use tracing::debug;

pub struct JsonTreeSource {
    root: PathBuf,
}

impl JsonTreeSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a relative path against the data root.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl TreeSource for JsonTreeSource {
    fn read_tree(&self, path: &Path) -> io::Result<Node> {
        let full_path = self.resolve(path);
        let reader = BufReader::new(File::open(&full_path)?);
        let tree: Node = serde_json::from_reader(reader)?;
        debug!("Read {} nodes from {:?}", tree.node_count(), full_path);
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lancer-inspect-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn reads_relative_to_root() {
        let dir = scratch_dir("relative");
        let tree = Node::interior("\\", vec![Node::f32_leaf("Radius", &[2.0])]);
        fs::write(dir.join("planet.json"), serde_json::to_string(&tree).unwrap()).unwrap();

        let source = JsonTreeSource::new(&dir);
        assert_eq!(source.read_tree(Path::new("planet.json")).unwrap(), tree);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bad_json_is_invalid_data() {
        let dir = scratch_dir("bad");
        fs::write(dir.join("broken.json"), "{ not json").unwrap();

        let source = JsonTreeSource::new(&dir);
        let err = source.read_tree(Path::new("broken.json")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(
            source.read_tree(Path::new("absent.json")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        fs::remove_dir_all(&dir).unwrap();
    }
}
