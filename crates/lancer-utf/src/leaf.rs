use crate::error::NodeError;

/// Sequential little-endian reader over a leaf payload.
pub struct LeafReader<'a> {
    name: &'a str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> LeafReader<'a> {
    pub fn new(name: &'a str, data: &'a [u8]) -> Self {
        Self { name, data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current offset into the payload.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], NodeError> {
        if self.remaining() < needed {
            return Err(NodeError::Truncated {
                path: self.name.to_string(),
                offset: self.pos,
                needed,
                len: self.data.len(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], NodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, count: usize) -> Result<(), NodeError> {
        self.take(count).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, NodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, NodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, NodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32, NodeError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn vec2(&mut self) -> Result<[f32; 2], NodeError> {
        Ok([self.f32()?, self.f32()?])
    }

    pub fn vec3(&mut self) -> Result<[f32; 3], NodeError> {
        Ok([self.f32()?, self.f32()?, self.f32()?])
    }

    /// Read `N` consecutive f32 values.
    pub fn f32s<const N: usize>(&mut self) -> Result<[f32; N], NodeError> {
        let mut out = [0.0; N];
        for value in &mut out {
            *value = self.f32()?;
        }
        Ok(out)
    }

    /// Read the rest of the payload as a NUL-terminated string.
    pub fn string(&mut self) -> Result<String, NodeError> {
        let rest = self.take(self.remaining())?;
        self.decode_string(rest)
    }

    /// Read a NUL-padded string occupying exactly `len` bytes.
    pub fn fixed_string(&mut self, len: usize) -> Result<String, NodeError> {
        let bytes = self.take(len)?;
        self.decode_string(bytes)
    }

    fn decode_string(&self, bytes: &[u8]) -> Result<String, NodeError> {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        std::str::from_utf8(&bytes[..end])
            .map(str::to_string)
            .map_err(|_| NodeError::InvalidString(self.name.to_string()))
    }
}
