//! Embedded code-signature reader
//!
//! Parses the SuperBlob referenced by `LC_CODE_SIGNATURE` and decodes the
//! CodeDirectory, entitlements and requirements blobs it indexes. This is a
//! structural reader only: hashes and the CMS signature are never verified.
//!
//! Sub-blobs are dispatched on their own magic rather than on the index
//! slot type. Any field whose bytes are out of range is left empty.

pub mod types;
pub mod utils;

use tracing::{debug, trace};

use crate::formats::macho::BinaryInfo;
use crate::formats::macho::utils::read_cstring;
use crate::property_list;
pub use types::*;
use utils::{read_blob_u32, read_blob_u8};

/// Analyze the signature occupying `size` bytes at `offset` in `data`.
///
/// Returns `None` when the range is out of bounds, no larger than a blob
/// header, or does not start with an embedded-signature SuperBlob.
pub fn analyze_signature(data: &[u8], offset: usize, size: usize) -> Option<SignatureInfo> {
    let end = offset.checked_add(size)?;
    if end > data.len() || size <= BLOB_HEADER_SIZE {
        return None;
    }
    let region = &data[offset..end];

    let magic = read_blob_u32(region, 0)?;
    if magic != CSMAGIC_EMBEDDED_SIGNATURE {
        debug!(magic = %format!("{:#010x}", magic), "not an embedded signature SuperBlob");
        return None;
    }

    let mut info = SignatureInfo::new(size);
    let Some(count) = read_blob_u32(region, 8) else {
        return Some(info);
    };
    if count as usize > MAX_SUPERBLOB_ENTRIES {
        debug!(count, cap = MAX_SUPERBLOB_ENTRIES, "SuperBlob index count capped");
    }

    for index in 0..(count as usize).min(MAX_SUPERBLOB_ENTRIES) {
        let entry = SUPERBLOB_HEADER_SIZE + index * BLOB_INDEX_SIZE;
        // The slot type at `entry` is not used for dispatch.
        let Some(blob_offset) = read_blob_u32(region, entry + 4) else {
            trace!(index, "SuperBlob index truncated");
            break;
        };
        info.blob_count += 1;
        decode_blob(region, blob_offset as usize, &mut info);
    }

    Some(info)
}

/// Analyze the signature located by a parsed binary's `LC_CODE_SIGNATURE`.
pub fn analyze_embedded(data: &[u8], binary: &BinaryInfo) -> Option<SignatureInfo> {
    let location = binary.code_signature?;
    analyze_signature(data, location.offset as usize, location.size as usize)
}

fn decode_blob(region: &[u8], start: usize, info: &mut SignatureInfo) {
    let (Some(magic), Some(length)) = (
        read_blob_u32(region, start),
        read_blob_u32(region, start.saturating_add(4)),
    ) else {
        trace!(start, "blob header out of range");
        return;
    };

    // Clamp the blob to the signature region; strings never escape it.
    let declared_end = start.saturating_add(length as usize);
    let blob = &region[start..declared_end.min(region.len())];

    match magic {
        CSMAGIC_CODEDIRECTORY => {
            if info.code_directory_version.is_none() {
                decode_code_directory(blob, info);
            }
        }
        CSMAGIC_EMBEDDED_ENTITLEMENTS => {
            if (length as usize) < BLOB_HEADER_SIZE || declared_end > region.len() {
                debug!(start, length, "entitlements blob out of range");
                return;
            }
            info.entitlements = property_list::decode_dictionary(&blob[BLOB_HEADER_SIZE..]);
        }
        CSMAGIC_REQUIREMENTS => {
            info.requirements = Some("Present (binary format)".to_string());
        }
        CSMAGIC_BLOBWRAPPER => info.has_cms_signature = true,
        _ => {}
    }
}

fn decode_code_directory(cd: &[u8], info: &mut SignatureInfo) {
    if cd.len() < CODEDIRECTORY_MIN_SIZE {
        debug!(len = cd.len(), "CodeDirectory too short");
        return;
    }

    // magic, length, version, flags, hashOffset, identOffset, nSpecialSlots,
    // nCodeSlots, codeLimit, hashSize, hashType, platform, pageSize, spare2,
    // scatterOffset, teamOffset
    let Some(version) = read_blob_u32(cd, 8) else {
        return;
    };
    info.code_directory_version = Some(format!("{:#x}", version));

    if let Some(flags) = read_blob_u32(cd, 12) {
        info.flags = CodeDirectoryFlags::from_bits_truncate(flags);
    }
    if let Some(hash_type) = read_blob_u8(cd, 37) {
        info.hash_type = Some(hash_type_name(hash_type));
    }
    if let Some(page_shift) = read_blob_u8(cd, 39) {
        info.page_size = 1u32.checked_shl(page_shift as u32);
    }

    if version >= CS_SUPPORTSTEAMID && cd.len() >= CODEDIRECTORY_TEAM_SIZE {
        if let Some(team_offset) = read_blob_u32(cd, 48).filter(|&o| o != 0) {
            info.team_id = read_cstring(cd, team_offset as usize);
        }
    }

    if let Some(ident_offset) = read_blob_u32(cd, 20).filter(|&o| o != 0) {
        info.signing_identity = read_cstring(cd, ident_offset as usize);
    }
}
