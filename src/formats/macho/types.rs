//! Core Mach-O types and constants

use serde::{Deserialize, Serialize};

/// 32-bit Mach-O, big-endian fields
pub const MH_MAGIC: u32 = 0xfeedface;
/// 32-bit Mach-O, little-endian fields
pub const MH_CIGAM: u32 = 0xcefaedfe;
/// 64-bit Mach-O, big-endian fields
pub const MH_MAGIC_64: u32 = 0xfeedfacf;
/// 64-bit Mach-O, little-endian fields
pub const MH_CIGAM_64: u32 = 0xcffaedfe;
/// Fat header, big-endian fields
pub const FAT_MAGIC: u32 = 0xcafebabe;
/// Fat header, little-endian fields
pub const FAT_CIGAM: u32 = 0xbebafeca;

pub const MACH_HEADER_SIZE: usize = 28;
pub const MACH_HEADER_64_SIZE: usize = 32;
pub const FAT_HEADER_SIZE: usize = 8;
pub const FAT_ARCH_SIZE: usize = 20;

/// Upper bound on fat slice headers read from a universal binary.
pub const MAX_FAT_ARCHES: usize = 10;
/// Upper bound on load commands walked in a thin binary.
pub const MAX_LOAD_COMMANDS: usize = 1000;

pub const LC_REQ_DYLD: u32 = 0x8000_0000;
pub const LC_SEGMENT: u32 = 0x1;
pub const LC_LOAD_DYLIB: u32 = 0xc;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_UUID: u32 = 0x1b;
pub const LC_CODE_SIGNATURE: u32 = 0x1d;
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | LC_REQ_DYLD;
pub const LC_RPATH: u32 = 0x1c | LC_REQ_DYLD;
pub const LC_REEXPORT_DYLIB: u32 = 0x1f | LC_REQ_DYLD;
pub const LC_ENCRYPTION_INFO: u32 = 0x21;
pub const LC_LOAD_UPWARD_DYLIB: u32 = 0x23 | LC_REQ_DYLD;
pub const LC_VERSION_MIN_MACOSX: u32 = 0x24;
pub const LC_VERSION_MIN_IPHONEOS: u32 = 0x25;
pub const LC_ENCRYPTION_INFO_64: u32 = 0x2c;
pub const LC_VERSION_MIN_TVOS: u32 = 0x2f;
pub const LC_VERSION_MIN_WATCHOS: u32 = 0x30;
pub const LC_BUILD_VERSION: u32 = 0x32;

pub const CPU_ARCH_ABI64: u32 = 0x0100_0000;
pub const CPU_TYPE_X86: u32 = 7;
pub const CPU_TYPE_X86_64: u32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;
pub const CPU_TYPE_ARM: u32 = 12;
pub const CPU_TYPE_ARM64: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;

/// Byte order of the multi-byte fields in a Mach-O or fat header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
}

/// Container classification derived from the magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachOKind {
    Fat,
    MachO32,
    MachO64,
    Unrecognized,
}

impl MachOKind {
    /// Classify a magic read as big-endian bytes.
    pub fn from_magic(magic: u32) -> (Self, Endian) {
        match magic {
            MH_MAGIC => (MachOKind::MachO32, Endian::Big),
            MH_CIGAM => (MachOKind::MachO32, Endian::Little),
            MH_MAGIC_64 => (MachOKind::MachO64, Endian::Big),
            MH_CIGAM_64 => (MachOKind::MachO64, Endian::Little),
            FAT_MAGIC => (MachOKind::Fat, Endian::Big),
            FAT_CIGAM => (MachOKind::Fat, Endian::Little),
            _ => (MachOKind::Unrecognized, Endian::Big),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, MachOKind::Unrecognized)
    }
}

/// A section inside a 64-bit segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub name: String,
    pub segment: String,
    pub address: u64,
    pub size: u64,
    pub offset: u32,
}

/// One `LC_SEGMENT_64` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub name: String,
    pub vm_address: u64,
    pub vm_size: u64,
    pub file_offset: u64,
    pub file_size: u64,
    pub sections: Vec<SectionInfo>,
}

/// One slice header of a universal binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatSlice {
    pub architecture: String,
    pub cpu_type: u32,
    pub offset: u32,
    pub size: u32,
}

/// File range of the embedded signature, from `LC_CODE_SIGNATURE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSignatureLocation {
    pub offset: u32,
    pub size: u32,
}

/// Structured description of a Mach-O binary.
///
/// Fields that could not be read safely stay empty; the value is always
/// a consistent subset of what a complete file would produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryInfo {
    pub format: MachOKind,
    pub architectures: Vec<String>,
    pub is_universal: bool,
    pub is_64_bit: bool,
    pub file_type: Option<String>,
    pub linked_libraries: Vec<String>,
    pub rpaths: Vec<String>,
    pub has_code_signature: bool,
    pub code_signature: Option<CodeSignatureLocation>,
    pub is_encrypted: bool,
    pub encryption_info: Option<String>,
    pub segments: Vec<SegmentInfo>,
    pub platform: Option<String>,
    pub min_os_version: Option<String>,
    pub sdk_version: Option<String>,
    pub build_version: Option<String>,
    pub uuid: Option<String>,
    pub fat_slices: Vec<FatSlice>,
}

impl BinaryInfo {
    pub(crate) fn empty(format: MachOKind) -> Self {
        Self {
            format,
            architectures: Vec::new(),
            is_universal: false,
            is_64_bit: false,
            file_type: None,
            linked_libraries: Vec::new(),
            rpaths: Vec::new(),
            has_code_signature: false,
            code_signature: None,
            is_encrypted: false,
            encryption_info: None,
            segments: Vec::new(),
            platform: None,
            min_os_version: None,
            sdk_version: None,
            build_version: None,
            uuid: None,
            fat_slices: Vec::new(),
        }
    }

    /// Whether the magic matched any known Mach-O or fat container.
    pub fn is_macho(&self) -> bool {
        self.format.is_recognized()
    }

    /// Look up a segment by name.
    pub fn segment(&self, name: &str) -> Option<&SegmentInfo> {
        self.segments.iter().find(|s| s.name == name)
    }
}

/// Map a CPU type to its conventional architecture name.
pub fn cpu_type_name(cpu_type: u32) -> String {
    match cpu_type {
        CPU_TYPE_ARM => "arm".to_string(),
        CPU_TYPE_ARM64 => "arm64".to_string(),
        CPU_TYPE_X86 => "i386".to_string(),
        CPU_TYPE_X86_64 => "x86_64".to_string(),
        other => format!("unknown ({})", other),
    }
}

pub fn is_64_bit_cpu(cpu_type: u32) -> bool {
    matches!(cpu_type, CPU_TYPE_ARM64 | CPU_TYPE_X86_64)
}

/// Map an `MH_*` file type to a readable name.
pub fn file_type_name(file_type: u32) -> String {
    match file_type {
        0x1 => "Object".to_string(),
        0x2 => "Executable".to_string(),
        0x4 => "Core".to_string(),
        0x6 => "Dynamic Library".to_string(),
        0x7 => "Dynamic Linker".to_string(),
        0x8 => "Bundle".to_string(),
        0xa => "Debug Symbols".to_string(),
        0xb => "Kernel Extension".to_string(),
        other => format!("Unknown ({:#x})", other),
    }
}

/// Map a `PLATFORM_*` value from `LC_BUILD_VERSION`.
pub fn platform_name(platform: u32) -> String {
    match platform {
        1 => "macOS".to_string(),
        2 => "iOS".to_string(),
        3 => "tvOS".to_string(),
        4 => "watchOS".to_string(),
        5 => "bridgeOS".to_string(),
        6 => "Mac Catalyst".to_string(),
        7 => "iOS Simulator".to_string(),
        8 => "tvOS Simulator".to_string(),
        9 => "watchOS Simulator".to_string(),
        10 => "DriverKit".to_string(),
        11 => "visionOS".to_string(),
        12 => "visionOS Simulator".to_string(),
        other => format!("Unknown ({})", other),
    }
}

/// Decode a packed `xxxx.yy.zz` version (major in the high 16 bits).
pub fn decode_version(packed: u32) -> String {
    let major = packed >> 16;
    let minor = (packed >> 8) & 0xff;
    let patch = packed & 0xff;
    format!("{}.{}.{}", major, minor, patch)
}
