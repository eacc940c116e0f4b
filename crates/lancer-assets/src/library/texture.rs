use std::collections::HashMap;
use std::sync::Arc;

use lancer_utf::{normalize, Node, NodeError};
use tracing::{debug, warn};

/// Raw texture payload as stored in the library.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureData {
    /// A single DDS blob carrying its own mip chain.
    Dds(Vec<u8>),
    /// One image per mip level, level 0 first.
    Mips(Vec<Vec<u8>>),
}

impl TextureData {
    pub fn mip_count(&self) -> usize {
        match self {
            TextureData::Dds(_) => 1,
            TextureData::Mips(levels) => levels.len(),
        }
    }

    pub fn byte_len(&self) -> usize {
        match self {
            TextureData::Dds(data) => data.len(),
            TextureData::Mips(levels) => levels.iter().map(Vec::len).sum(),
        }
    }
}

/// A texture library entry. Pixel data is kept encoded; decoding is left to
/// the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub data: TextureData,
}

/// One frame of an animated texture: which texture to sample and where.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRect {
    pub texture_index: u32,
    /// u0, v0, u1, v1
    pub uv: [f32; 4],
}

/// An animated frame sequence stored alongside textures.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnimation {
    pub name: String,
    pub texture_count: u32,
    pub frame_count: u32,
    pub fps: f32,
    pub frames: Vec<FrameRect>,
}

impl FrameAnimation {
    /// Index of the frame shown `time` seconds after the sequence started.
    /// The sequence loops.
    pub fn frame_at(&self, time: f64) -> usize {
        let frames = self.frames.len().min(self.frame_count as usize);
        if frames == 0 || self.fps <= 0.0 || time <= 0.0 {
            return 0;
        }
        (time * self.fps as f64).floor() as usize % frames
    }

    fn from_node(node: &Node) -> Result<Self, NodeError> {
        let within = |e: NodeError| e.within(&node.name);
        let texture_count = match node.find("Texture count") {
            Some(child) => child.read_u32().map_err(within)?,
            None => 1,
        };
        let fps = match node.find("FPS") {
            Some(child) => child.read_f32().map_err(within)?,
            None => 0.0,
        };

        let rects = node.require("Frame rects")?;
        let mut reader = rects.reader().map_err(within)?;
        let mut frames = Vec::with_capacity(reader.remaining() / 20);
        while reader.remaining() > 0 {
            frames.push(FrameRect {
                texture_index: reader.u32().map_err(within)?,
                uv: reader.f32s::<4>().map_err(within)?,
            });
        }

        let frame_count = match node.find("Frame count") {
            Some(child) => child.read_u32().map_err(within)?,
            None => frames.len() as u32,
        };

        Ok(Self {
            name: node.name.clone(),
            texture_count,
            frame_count,
            fps,
            frames,
        })
    }
}

/// Textures and frame animations from one source file, keyed by lowercased
/// name.
#[derive(Debug, Default, Clone)]
pub struct TextureLibrary {
    textures: HashMap<String, Arc<Texture>>,
    animations: HashMap<String, Arc<FrameAnimation>>,
}

impl TextureLibrary {
    /// Decode every entry of a `Texture library` node.
    pub fn build(node: &Node) -> Result<Self, NodeError> {
        let mut library = Self::default();
        for entry in node.children()? {
            let within = |e: NodeError| e.within(&entry.name).within(&node.name);
            entry.children().map_err(|e| e.within(&node.name))?;

            if entry.find("Frame rects").is_some() {
                let animation = FrameAnimation::from_node(entry).map_err(|e| e.within(&node.name))?;
                library.insert_animation(animation);
                continue;
            }

            let data = if let Some(mips) = entry.find("MIPS") {
                TextureData::Dds(mips.data().map_err(within)?.to_vec())
            } else {
                let mut levels = Vec::new();
                for child in entry.iter() {
                    if let Some(level) = mip_level(&child.name) {
                        levels.push((level, child.data().map_err(within)?.to_vec()));
                    }
                }
                if levels.is_empty() {
                    warn!("Texture '{}' has no image data, skipping", entry.name);
                    continue;
                }
                levels.sort_by_key(|(level, _)| *level);
                TextureData::Mips(levels.into_iter().map(|(_, data)| data).collect())
            };

            library.insert(Texture {
                name: entry.name.clone(),
                data,
            });
        }
        Ok(library)
    }

    /// Bind a texture under its name. A name that is already bound keeps its
    /// first texture.
    pub fn insert(&mut self, texture: Texture) -> bool {
        let key = normalize(&texture.name);
        if self.textures.contains_key(&key) {
            warn!("Duplicate texture '{}', keeping the first", texture.name);
            return false;
        }
        debug!(
            "Added texture '{}' ({} mips, {} bytes)",
            texture.name,
            texture.data.mip_count(),
            texture.data.byte_len()
        );
        self.textures.insert(key, Arc::new(texture));
        true
    }

    pub fn insert_animation(&mut self, animation: FrameAnimation) -> bool {
        let key = normalize(&animation.name);
        if self.animations.contains_key(&key) {
            warn!("Duplicate frame animation '{}', keeping the first", animation.name);
            return false;
        }
        debug!(
            "Added frame animation '{}' ({} frames)",
            animation.name,
            animation.frames.len()
        );
        self.animations.insert(key, Arc::new(animation));
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<Texture>> {
        self.textures.get(&normalize(name)).cloned()
    }

    pub fn animation(&self, name: &str) -> Option<Arc<FrameAnimation>> {
        self.animations.get(&normalize(name)).cloned()
    }

    /// Number of textures, not counting frame animations.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty() && self.animations.is_empty()
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    pub fn textures(&self) -> impl Iterator<Item = &Arc<Texture>> {
        self.textures.values()
    }

    pub fn animations(&self) -> impl Iterator<Item = &Arc<FrameAnimation>> {
        self.animations.values()
    }
}

/// Parse `MIP<n>` child names.
fn mip_level(name: &str) -> Option<u32> {
    let lower = normalize(name);
    let digits = lower.strip_prefix("mip")?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
