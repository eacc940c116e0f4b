use std::collections::HashMap;
use std::sync::Arc;

use lancer_core::{model_crc, Color};
use lancer_utf::{normalize, LeafReader, Node, NodeError};
use tracing::{debug, warn};

const FVF_POSITION: u16 = 0x002;
const FVF_NORMAL: u16 = 0x010;
const FVF_DIFFUSE: u16 = 0x040;
const FVF_TEX_MASK: u16 = 0xF00;

/// Decoded vertex, laid out for direct upload to a vertex buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0, 1.0, 0.0],
            color: [1.0; 4],
            uv0: [0.0; 2],
            uv1: [0.0; 2],
        }
    }
}

/// Per-mesh header inside a VMeshData block. Each mesh draws with one
/// material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshHeader {
    pub material_crc: u32,
    pub start_vertex: u16,
    pub end_vertex: u16,
    /// Number of indices this mesh consumes.
    pub index_count: u16,
}

/// Shared vertex and index buffers referenced by model parts.
#[derive(Debug, Clone, PartialEq)]
pub struct VMeshData {
    pub name: String,
    pub mesh_type: u32,
    pub surface_type: u32,
    pub fvf: u16,
    pub meshes: Vec<MeshHeader>,
    pub indices: Vec<u16>,
    pub vertices: Vec<Vertex>,
}

impl VMeshData {
    /// Decode a `VMeshData` leaf.
    pub fn parse(name: &str, node: &Node) -> Result<Self, NodeError> {
        let mut reader = node.reader()?;
        let mesh_type = reader.u32()?;
        let surface_type = reader.u32()?;
        let mesh_count = reader.u16()?;
        let index_count = reader.u16()?;
        let fvf = reader.u16()?;
        let vertex_count = reader.u16()?;

        let meshes = (0..mesh_count)
            .map(|_| -> Result<MeshHeader, NodeError> {
                let header = MeshHeader {
                    material_crc: reader.u32()?,
                    start_vertex: reader.u16()?,
                    end_vertex: reader.u16()?,
                    index_count: reader.u16()?,
                };
                reader.skip(2)?;
                Ok(header)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let indices = (0..index_count)
            .map(|_| reader.u16())
            .collect::<Result<Vec<_>, _>>()?;

        let vertices = (0..vertex_count)
            .map(|_| read_vertex(&mut reader, fvf))
            .collect::<Result<Vec<_>, _>>()?;

        if reader.remaining() > 0 {
            debug!("VMeshData '{}' has {} trailing bytes", name, reader.remaining());
        }

        Ok(Self {
            name: name.to_string(),
            mesh_type,
            surface_type,
            fvf,
            meshes,
            indices,
            vertices,
        })
    }

    /// Vertex buffer contents as raw bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

fn read_vertex(reader: &mut LeafReader<'_>, fvf: u16) -> Result<Vertex, NodeError> {
    let mut vertex = Vertex::default();
    if fvf & FVF_POSITION != 0 {
        vertex.position = reader.vec3()?;
    }
    if fvf & FVF_NORMAL != 0 {
        vertex.normal = reader.vec3()?;
    }
    if fvf & FVF_DIFFUSE != 0 {
        vertex.color = Color::from_argb(reader.u32()?).to_array();
    }
    let uv_sets = (fvf & FVF_TEX_MASK) >> 8;
    for set in 0..uv_sets {
        let uv = reader.vec2()?;
        match set {
            0 => vertex.uv0 = uv,
            1 => vertex.uv1 = uv,
            _ => {}
        }
    }
    Ok(vertex)
}

/// Vertex meshes from one source file, keyed by lowercased entry name and
/// by CRC.
#[derive(Debug, Default, Clone)]
pub struct VMeshLibrary {
    meshes: HashMap<String, Arc<VMeshData>>,
    by_crc: HashMap<u32, String>,
}

impl VMeshLibrary {
    /// Decode every entry of a `VMeshLibrary` node.
    pub fn build(node: &Node) -> Result<Self, NodeError> {
        let mut library = Self::default();
        for entry in node.children()? {
            let within = |e: NodeError| e.within(&entry.name).within(&node.name);
            entry.children().map_err(|e| e.within(&node.name))?;
            let data_node = entry.require("VMeshData").map_err(|e| e.within(&node.name))?;
            let data = VMeshData::parse(&entry.name, data_node).map_err(within)?;
            library.insert(data);
        }
        Ok(library)
    }

    /// Bind a mesh under its name. A name that is already bound keeps its
    /// first mesh.
    pub fn insert(&mut self, data: VMeshData) -> bool {
        let key = normalize(&data.name);
        let crc = model_crc(&data.name);
        if self.meshes.contains_key(&key) {
            warn!("Duplicate vertex mesh '{}', keeping the first", data.name);
            return false;
        }
        debug!(
            "Added vertex mesh '{}' ({} meshes, {} vertices, {} indices)",
            data.name,
            data.meshes.len(),
            data.vertices.len(),
            data.indices.len()
        );
        self.by_crc.entry(crc).or_insert_with(|| key.clone());
        self.meshes.insert(key, Arc::new(data));
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<VMeshData>> {
        self.meshes.get(&normalize(name)).cloned()
    }

    pub fn get_by_crc(&self, crc: u32) -> Option<Arc<VMeshData>> {
        self.by_crc.get(&crc).and_then(|name| self.meshes.get(name)).cloned()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Meshes as reachable by CRC. When two names share a CRC only the
    /// first inserted is yielded, the same one `get_by_crc` returns.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Arc<VMeshData>)> {
        self.by_crc
            .iter()
            .filter_map(|(crc, key)| self.meshes.get(key).map(|data| (*crc, data)))
    }
}
