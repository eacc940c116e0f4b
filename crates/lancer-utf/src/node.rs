use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::leaf::LeafReader;
use crate::name::name_eq;

/// Contents of a node: raw bytes or ordered children, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePayload {
    Leaf(Vec<u8>),
    Interior(Vec<Node>),
}

/// A named node in a UTF container tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub payload: NodePayload,
}

impl Node {
    /// Create a leaf node holding `data`.
    pub fn leaf(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: NodePayload::Leaf(data.into()),
        }
    }

    /// Create an interior node holding `children` in order.
    pub fn interior(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            payload: NodePayload::Interior(children),
        }
    }

    /// Create a leaf holding a NUL-terminated string.
    pub fn string_leaf(name: impl Into<String>, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        Self::leaf(name, data)
    }

    /// Create a leaf holding little-endian f32 values.
    pub fn f32_leaf(name: impl Into<String>, values: &[f32]) -> Self {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::leaf(name, data)
    }

    /// Create a leaf holding a single little-endian u32.
    pub fn u32_leaf(name: impl Into<String>, value: u32) -> Self {
        Self::leaf(name, value.to_le_bytes().to_vec())
    }

    /// Check whether this node carries a byte payload.
    pub fn is_leaf(&self) -> bool {
        matches!(self.payload, NodePayload::Leaf(_))
    }

    /// Check whether this node carries children.
    pub fn is_interior(&self) -> bool {
        matches!(self.payload, NodePayload::Interior(_))
    }

    /// The children of an interior node.
    pub fn children(&self) -> Result<&[Node], NodeError> {
        match &self.payload {
            NodePayload::Interior(children) => Ok(children),
            NodePayload::Leaf(_) => Err(NodeError::ExpectedInterior(self.name.clone())),
        }
    }

    /// The payload of a leaf node.
    pub fn data(&self) -> Result<&[u8], NodeError> {
        match &self.payload {
            NodePayload::Leaf(data) => Ok(data),
            NodePayload::Interior(_) => Err(NodeError::ExpectedLeaf(self.name.clone())),
        }
    }

    /// Iterate over children, yielding nothing for a leaf.
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        match &self.payload {
            NodePayload::Interior(children) => children.iter(),
            NodePayload::Leaf(_) => (&[] as &[Node]).iter(),
        }
    }

    /// Find the first child with the given name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.iter().find(|child| name_eq(&child.name, name))
    }

    /// Find a required child, failing with `MissingChild`.
    pub fn require(&self, name: &str) -> Result<&Node, NodeError> {
        self.find(name).ok_or_else(|| NodeError::MissingChild {
            path: self.name.clone(),
            child: name.to_string(),
        })
    }

    /// Start decoding this node's payload.
    pub fn reader(&self) -> Result<LeafReader<'_>, NodeError> {
        Ok(LeafReader::new(&self.name, self.data()?))
    }

    /// Decode the payload as a NUL-terminated string.
    pub fn read_string(&self) -> Result<String, NodeError> {
        self.reader()?.string()
    }

    /// Decode the payload as a single u32.
    pub fn read_u32(&self) -> Result<u32, NodeError> {
        self.reader()?.u32()
    }

    /// Decode the payload as a single f32.
    pub fn read_f32(&self) -> Result<f32, NodeError> {
        self.reader()?.f32()
    }

    /// Decode the whole payload as a sequence of f32 values. A payload that
    /// is not a whole number of values is `Truncated`.
    pub fn read_f32s(&self) -> Result<Vec<f32>, NodeError> {
        let mut reader = self.reader()?;
        let mut values = Vec::with_capacity(reader.remaining() / 4);
        while reader.remaining() > 0 {
            values.push(reader.f32()?);
        }
        Ok(values)
    }

    /// Decode the whole payload as a sequence of u16 values.
    pub fn read_u16s(&self) -> Result<Vec<u16>, NodeError> {
        let mut reader = self.reader()?;
        let mut values = Vec::with_capacity(reader.remaining() / 2);
        while reader.remaining() > 0 {
            values.push(reader.u16()?);
        }
        Ok(values)
    }

    /// Read an optional string child; an absent child yields `None`.
    pub fn string_child(&self, name: &str) -> Result<Option<String>, NodeError> {
        self.find(name)
            .map(|child| child.read_string().map_err(|e| e.within(&self.name)))
            .transpose()
    }

    /// Total number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.iter().map(Node::node_count).sum::<usize>()
    }
}
