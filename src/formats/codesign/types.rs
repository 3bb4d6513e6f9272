//! Code-signature blob constants and result types

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::property_list::PlistDictionary;

pub const CSMAGIC_REQUIREMENTS: u32 = 0xfade0c01;
pub const CSMAGIC_CODEDIRECTORY: u32 = 0xfade0c02;
pub const CSMAGIC_EMBEDDED_SIGNATURE: u32 = 0xfade0cc0;
pub const CSMAGIC_EMBEDDED_ENTITLEMENTS: u32 = 0xfade7171;
pub const CSMAGIC_BLOBWRAPPER: u32 = 0xfade0b01;

/// magic, length, count
pub const SUPERBLOB_HEADER_SIZE: usize = 12;
/// type, offset
pub const BLOB_INDEX_SIZE: usize = 8;
/// magic, length
pub const BLOB_HEADER_SIZE: usize = 8;
/// Bytes of CodeDirectory needed for the fixed fields through `spare2`.
pub const CODEDIRECTORY_MIN_SIZE: usize = 44;
/// Bytes of CodeDirectory needed to reach `teamOffset`.
pub const CODEDIRECTORY_TEAM_SIZE: usize = 52;
/// First CodeDirectory version carrying `teamOffset`.
pub const CS_SUPPORTSTEAMID: u32 = 0x20200;

/// Upper bound on SuperBlob index entries read.
pub const MAX_SUPERBLOB_ENTRIES: usize = 20;

bitflags! {
    /// CodeDirectory `flags` word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CodeDirectoryFlags: u32 {
        const HOST = 0x1;
        const ADHOC = 0x2;
        const FORCE_HARD = 0x4;
        const FORCE_KILL = 0x8;
        const FORCE_EXPIRATION = 0x10;
        const RESTRICT = 0x20;
        const ENFORCEMENT = 0x40;
        const LIBRARY_VALIDATION = 0x80;
        const ENTITLEMENTS_VALIDATED = 0x100;
        const NVRAM_UNRESTRICTED = 0x200;
        const RUNTIME = 0x400;
        const LINKER_SIGNED = 0x800;
    }
}

const FLAG_NAMES: [(CodeDirectoryFlags, &str); 12] = [
    (CodeDirectoryFlags::HOST, "Host"),
    (CodeDirectoryFlags::ADHOC, "Adhoc"),
    (CodeDirectoryFlags::FORCE_HARD, "ForceHard"),
    (CodeDirectoryFlags::FORCE_KILL, "ForceKill"),
    (CodeDirectoryFlags::FORCE_EXPIRATION, "ForceExpiration"),
    (CodeDirectoryFlags::RESTRICT, "Restrict"),
    (CodeDirectoryFlags::ENFORCEMENT, "Enforcement"),
    (CodeDirectoryFlags::LIBRARY_VALIDATION, "LibraryValidation"),
    (CodeDirectoryFlags::ENTITLEMENTS_VALIDATED, "EntitlementsValidated"),
    (CodeDirectoryFlags::NVRAM_UNRESTRICTED, "NVRAMUnrestricted"),
    (CodeDirectoryFlags::RUNTIME, "Runtime"),
    (CodeDirectoryFlags::LINKER_SIGNED, "LinkerSigned"),
];

impl CodeDirectoryFlags {
    /// Names of the set flags in ascending bit order.
    pub fn names(&self) -> Vec<&'static str> {
        FLAG_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// Map a CodeDirectory `hashType` byte.
pub fn hash_type_name(hash_type: u8) -> String {
    match hash_type {
        1 => "SHA-1".to_string(),
        2 => "SHA-256".to_string(),
        3 => "SHA-256 Truncated".to_string(),
        4 => "SHA-384".to_string(),
        5 => "SHA-512".to_string(),
        other => format!("Unknown ({})", other),
    }
}

/// Structured description of an embedded code signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureInfo {
    pub has_signature: bool,
    pub signature_size: usize,
    pub team_id: Option<String>,
    pub signing_identity: Option<String>,
    pub entitlements: Option<PlistDictionary>,
    pub code_directory_version: Option<String>,
    pub hash_type: Option<String>,
    pub page_size: Option<u32>,
    pub flags: CodeDirectoryFlags,
    pub requirements: Option<String>,
    /// Index entries actually read from the SuperBlob.
    pub blob_count: usize,
    /// A CMS blob wrapper is present (not decoded).
    pub has_cms_signature: bool,
}

impl SignatureInfo {
    pub(crate) fn new(signature_size: usize) -> Self {
        Self {
            has_signature: true,
            signature_size,
            team_id: None,
            signing_identity: None,
            entitlements: None,
            code_directory_version: None,
            hash_type: None,
            page_size: None,
            flags: CodeDirectoryFlags::empty(),
            requirements: None,
            blob_count: 0,
            has_cms_signature: false,
        }
    }

    pub fn flag_names(&self) -> Vec<&'static str> {
        self.flags.names()
    }

    /// Ad-hoc signatures carry no certificate chain.
    pub fn is_adhoc(&self) -> bool {
        self.flags.contains(CodeDirectoryFlags::ADHOC)
    }

    pub fn has_hardened_runtime(&self) -> bool {
        self.flags.contains(CodeDirectoryFlags::RUNTIME)
    }
}
