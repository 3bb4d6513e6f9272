//! Utility functions for Mach-O parsing

use crate::formats::macho::types::Endian;

/// Bounds-checked reads of Mach-O header fields in the container's byte order.
///
/// Every read returns `None` instead of panicking when the field would
/// extend past the end of the buffer.
pub trait MachRead {
    fn read_mach_u32(&self, offset: usize, endian: Endian) -> Option<u32>;
    fn read_mach_u64(&self, offset: usize, endian: Endian) -> Option<u64>;
}

impl MachRead for [u8] {
    fn read_mach_u32(&self, offset: usize, endian: Endian) -> Option<u32> {
        let bytes: [u8; 4] = self.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        Some(match endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    fn read_mach_u64(&self, offset: usize, endian: Endian) -> Option<u64> {
        let bytes: [u8; 8] = self.get(offset..offset.checked_add(8)?)?.try_into().ok()?;
        Some(match endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        })
    }
}

/// Read a null-terminated string starting at `offset`.
///
/// The scan stops at the first NUL or the end of `data`. An out-of-range
/// offset or an empty string yields `None`.
pub fn read_cstring(data: &[u8], offset: usize) -> Option<String> {
    let slice = data.get(offset..)?;
    let end = memchr::memchr(0, slice).unwrap_or(slice.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&slice[..end]).into_owned())
}

/// Decode a fixed-width name field such as `segname[16]`.
pub fn fixed_name(bytes: &[u8]) -> String {
    let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
        .trim_end_matches(|c: char| c.is_control())
        .to_string()
}
