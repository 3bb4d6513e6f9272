//! Mach-O structural reader
//!
//! Classifies raw bytes as a fat/universal container, a 32-bit image or a
//! 64-bit image and extracts a [`BinaryInfo`] without executing or linking
//! anything. Input is treated as hostile: every read is bounds-checked and
//! unreadable fields are left empty instead of failing the whole parse.
//!
//! Universal binaries are read shallowly: the slice table is reported but
//! the Mach-O header inside each slice is not followed.

mod commands;
pub mod types;
pub mod utils;

use tracing::debug;

pub use types::*;
use utils::MachRead;

/// Analyze a Mach-O or universal binary.
///
/// Returns `None` only when fewer than 4 bytes are supplied. Unrecognized
/// magic yields an empty [`BinaryInfo`] with `format == Unrecognized`.
pub fn analyze(data: &[u8]) -> Option<BinaryInfo> {
    let magic = u32::from_be_bytes(data.get(0..4)?.try_into().ok()?);
    let (kind, endian) = MachOKind::from_magic(magic);

    let mut info = BinaryInfo::empty(kind);
    match kind {
        MachOKind::Fat => parse_fat(data, endian, &mut info),
        MachOKind::MachO64 => parse_thin(data, endian, kind, MACH_HEADER_64_SIZE, &mut info),
        MachOKind::MachO32 => parse_thin(data, endian, kind, MACH_HEADER_SIZE, &mut info),
        MachOKind::Unrecognized => {
            debug!(magic = %format!("{:#010x}", magic), "not a Mach-O binary");
        }
    }
    Some(info)
}

/// Quick check of the magic number only.
pub fn is_macho(data: &[u8]) -> bool {
    data.get(0..4)
        .and_then(|b| b.try_into().ok())
        .map(|b: [u8; 4]| MachOKind::from_magic(u32::from_be_bytes(b)).0.is_recognized())
        .unwrap_or(false)
}

fn parse_fat(data: &[u8], endian: Endian, info: &mut BinaryInfo) {
    info.is_universal = true;

    let Some(nfat_arch) = data.read_mach_u32(4, endian) else {
        return;
    };
    if nfat_arch as usize > MAX_FAT_ARCHES {
        debug!(nfat_arch, cap = MAX_FAT_ARCHES, "fat slice count capped");
    }

    for index in 0..(nfat_arch as usize).min(MAX_FAT_ARCHES) {
        let base = FAT_HEADER_SIZE + index * FAT_ARCH_SIZE;
        // cputype, cpusubtype, offset, size, align
        let (Some(cpu_type), Some(offset), Some(size)) = (
            data.read_mach_u32(base, endian),
            data.read_mach_u32(base + 8, endian),
            data.read_mach_u32(base + 12, endian),
        ) else {
            break;
        };

        let architecture = cpu_type_name(cpu_type);
        if is_64_bit_cpu(cpu_type) {
            info.is_64_bit = true;
        }
        info.architectures.push(architecture.clone());
        info.fat_slices.push(FatSlice {
            architecture,
            cpu_type,
            offset,
            size,
        });
    }
}

fn parse_thin(
    data: &[u8],
    endian: Endian,
    kind: MachOKind,
    header_size: usize,
    info: &mut BinaryInfo,
) {
    info.is_64_bit = kind == MachOKind::MachO64;

    // magic, cputype, cpusubtype, filetype, ncmds, sizeofcmds, flags[, reserved]
    if let Some(cpu_type) = data.read_mach_u32(4, endian) {
        info.architectures.push(cpu_type_name(cpu_type));
    }
    if let Some(file_type) = data.read_mach_u32(12, endian) {
        info.file_type = Some(file_type_name(file_type));
    }

    if data.len() < header_size {
        debug!(len = data.len(), header_size, "truncated Mach-O header");
        return;
    }
    let Some(ncmds) = data.read_mach_u32(16, endian) else {
        return;
    };

    commands::walk_load_commands(data, header_size, ncmds, endian, kind, info);
}
