use std::path::{Path, PathBuf};

use lancer_utf::NodeError;

/// Errors that abort loading a single file.
///
/// A missing material, texture, mesh or bone is never an error: it is
/// downgraded to a placeholder and reported as a
/// [`MissingReference`](crate::MissingReference).
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("'{0}' is not a drawable file")]
    UnsupportedFormat(PathBuf),

    #[error("malformed node in '{file}': {source}")]
    MalformedNode {
        file: PathBuf,
        #[source]
        source: NodeError,
    },

    #[error("I/O error loading '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),
}

impl AssetError {
    /// Wrap a structural error with the file it was found in.
    pub(crate) fn malformed(file: &Path) -> impl FnOnce(NodeError) -> AssetError + '_ {
        move |source| AssetError::MalformedNode {
            file: file.to_path_buf(),
            source,
        }
    }
}
