//! Model CRC
//!
//! Materials and vertex meshes are referenced by a CRC-32 of their lowercased
//! name rather than by the name itself.

const POLYNOMIAL: u32 = 0xEDB8_8320;

const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the identifier of a material or mesh from its name.
///
/// The name is lowercased (ASCII) before hashing, so `"Hull"` and `"hull"`
/// map to the same identifier.
pub fn model_crc(name: &str) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for byte in name.bytes() {
        let byte = byte.to_ascii_lowercase();
        crc = (crc >> 8) ^ TABLE[((crc ^ byte as u32) & 0xFF) as usize];
    }
    !crc
}
