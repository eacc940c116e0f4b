//! Node trees and payloads shared by the unit tests.

use lancer_core::model_crc;
use lancer_utf::Node;

const FVF: u16 = 0x112;

/// A VMeshData payload with one triangle per material.
pub fn vmesh_data(materials: &[&str]) -> Vec<u8> {
    let count = materials.len() as u16;
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&4u32.to_le_bytes());
    data.extend_from_slice(&count.to_le_bytes());
    data.extend_from_slice(&(count * 3).to_le_bytes());
    data.extend_from_slice(&FVF.to_le_bytes());
    data.extend_from_slice(&(count * 3).to_le_bytes());

    for (i, material) in materials.iter().enumerate() {
        let start = i as u16 * 3;
        data.extend_from_slice(&model_crc(material).to_le_bytes());
        data.extend_from_slice(&start.to_le_bytes());
        data.extend_from_slice(&(start + 2).to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
    }
    for _ in materials {
        for index in [0u16, 1, 2] {
            data.extend_from_slice(&index.to_le_bytes());
        }
    }
    for _ in materials {
        for position in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            let normal = [0.0f32, 0.0, 1.0];
            let uv = [position[0], position[1]];
            for v in position.iter().chain(&normal).chain(&uv) {
                data.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    data
}

/// A 60-byte VMeshRef covering every mesh of a [`vmesh_data`] block.
pub fn vmesh_ref(library_entry: &str, mesh_count: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&60u32.to_le_bytes());
    data.extend_from_slice(&model_crc(library_entry).to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&(mesh_count * 3).to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&(mesh_count * 3).to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&mesh_count.to_le_bytes());
    for v in [1.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.75] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    data
}

pub fn vmesh_library(entry: &str, materials: &[&str]) -> Node {
    Node::interior(
        "VMeshLibrary",
        vec![Node::interior(
            entry,
            vec![Node::leaf("VMeshData", vmesh_data(materials))],
        )],
    )
}

pub fn material_entry(name: &str, diffuse: [f32; 3], texture: Option<&str>) -> Node {
    let mut children = vec![
        Node::string_leaf("Type", "DcDt"),
        Node::f32_leaf("Dc", &diffuse),
    ];
    if let Some(texture) = texture {
        children.push(Node::string_leaf("Dt_name", texture));
    }
    Node::interior(name, children)
}

pub fn material_library(entries: &[Node]) -> Node {
    Node::interior("Material library", entries.to_vec())
}

pub fn texture_library(names: &[&str]) -> Node {
    Node::interior(
        "Texture library",
        names
            .iter()
            .map(|name| Node::interior(*name, vec![Node::leaf("MIPS", vec![0u8; 8])]))
            .collect(),
    )
}

/// The geometry nodes of a single-level model drawing `vms`.
pub fn vmesh_part(vms: &str, mesh_count: u16) -> Node {
    Node::interior(
        "VMeshPart",
        vec![Node::leaf("VMeshRef", vmesh_ref(vms, mesh_count))],
    )
}

/// A complete single-level model file with its own mesh library and one
/// mesh per material.
pub fn model_file(vms: &str, materials: &[&str]) -> Node {
    Node::interior(
        "\\",
        vec![
            vmesh_library(vms, materials),
            vmesh_part(vms, materials.len() as u16),
        ],
    )
}

fn fixed_name(name: &str) -> Vec<u8> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.resize(64, 0);
    bytes
}

/// A 176-byte Fix constraint record with identity rotation.
pub fn fix_record(parent: &str, child: &str, origin: [f32; 3]) -> Vec<u8> {
    let mut data = fixed_name(parent);
    data.extend(fixed_name(child));
    for v in origin {
        data.extend_from_slice(&v.to_le_bytes());
    }
    for v in [1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    data
}

/// A 208-byte Rev constraint record with identity rotation.
pub fn rev_record(parent: &str, child: &str, origin: [f32; 3], min: f32, max: f32) -> Vec<u8> {
    let mut data = fixed_name(parent);
    data.extend(fixed_name(child));
    for v in origin {
        data.extend_from_slice(&v.to_le_bytes());
    }
    for v in [0.0f32; 3] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    for v in [1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    for v in [0.0f32, 1.0, 0.0, min, max] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    data
}

/// A `Root`/`Part_*` entry of a Cmpnd node.
pub fn part_entry(entry: &str, object: &str, file: &str, index: u32) -> Node {
    Node::interior(
        entry,
        vec![
            Node::string_leaf("Object name", object),
            Node::string_leaf("File name", file),
            Node::u32_leaf("Index", index),
        ],
    )
}

/// A bone entry of a Skeleton node.
pub fn bone(name: &str, parent: Option<&str>, position: [f32; 3]) -> Node {
    let mut children = vec![Node::f32_leaf("Position", &position)];
    if let Some(parent) = parent {
        children.push(Node::string_leaf("Parent", parent));
    }
    Node::interior(name, children)
}

/// A mesh segment with one triangle bound to the given bones.
pub fn segment(name: &str, material: Option<&str>, bones: &[&str]) -> Node {
    let mut children = vec![
        Node::f32_leaf("Positions", &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        Node::leaf(
            "Indices",
            [0u16, 1, 2]
                .iter()
                .flat_map(|i| i.to_le_bytes())
                .collect::<Vec<u8>>(),
        ),
    ];
    if let Some(material) = material {
        children.push(Node::string_leaf("Material", material));
    }
    if !bones.is_empty() {
        let groups = bones
            .iter()
            .map(|bone| {
                let mut weights = Vec::new();
                for vertex in 0u32..3 {
                    weights.extend_from_slice(&vertex.to_le_bytes());
                    weights.extend_from_slice(&1.0f32.to_le_bytes());
                }
                Node::leaf(*bone, weights)
            })
            .collect();
        children.push(Node::interior("Bones", groups));
    }
    Node::interior(name, children)
}
