//! Readers for code-signing blobs.
//!
//! Signature blobs are always big-endian, whatever the byte order of the
//! Mach-O header that points at them. Use these helpers, never
//! [`MachRead`](crate::formats::macho::utils::MachRead), inside a SuperBlob.

/// Read a big-endian `u32` from a signature blob.
pub fn read_blob_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Read a single byte field from a signature blob.
pub fn read_blob_u8(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}
