//! Lancer UTF - Generic node tree for UTF containers
//!
//! A UTF container decodes into a tree of named nodes. Each node is either a
//! leaf holding an opaque byte payload or an interior node holding ordered
//! children. This crate provides that tree, the case-insensitive name
//! comparison every consumer uses, and little-endian leaf decoding.
//!
//! Reading the container bytes themselves is left to an external reader.

mod error;
mod leaf;
pub mod name;
mod node;

pub use error::NodeError;
pub use leaf::LeafReader;
pub use name::{name_eq, normalize};
pub use node::{Node, NodePayload};
