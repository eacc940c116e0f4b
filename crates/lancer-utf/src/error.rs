/// Structural errors found while walking a node tree.
///
/// Every variant carries the path of the offending node, built up from the
/// node's own name outwards as the error propagates (see [`NodeError::within`]).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NodeError {
    #[error("node '{0}' should be a leaf but has children")]
    ExpectedLeaf(String),

    #[error("node '{0}' should have children but is a leaf")]
    ExpectedInterior(String),

    #[error("node '{path}' is missing required child '{child}'")]
    MissingChild { path: String, child: String },

    #[error("leaf '{path}' is truncated: needed {needed} bytes at offset {offset}, {len} available")]
    Truncated {
        path: String,
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("leaf '{0}' does not contain a valid string")]
    InvalidString(String),

    #[error("parent links form a cycle at '{0}'")]
    ParentCycle(String),
}

impl NodeError {
    /// Path of the offending node.
    pub fn path(&self) -> &str {
        match self {
            NodeError::ExpectedLeaf(path)
            | NodeError::ExpectedInterior(path)
            | NodeError::InvalidString(path)
            | NodeError::ParentCycle(path) => path,
            NodeError::MissingChild { path, .. } | NodeError::Truncated { path, .. } => path,
        }
    }

    /// Prefix the error's path with the name of an enclosing node.
    pub fn within(mut self, parent: &str) -> Self {
        let path = match &mut self {
            NodeError::ExpectedLeaf(path)
            | NodeError::ExpectedInterior(path)
            | NodeError::InvalidString(path)
            | NodeError::ParentCycle(path) => path,
            NodeError::MissingChild { path, .. } | NodeError::Truncated { path, .. } => path,
        };
        *path = format!("{parent}/{path}");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_prefixes_path() {
        let err = NodeError::ExpectedInterior("VMeshPart".into())
            .within("Level0")
            .within("MultiLevel");
        assert_eq!(err.path(), "MultiLevel/Level0/VMeshPart");
        assert!(err.to_string().contains("MultiLevel/Level0/VMeshPart"));
    }
}
