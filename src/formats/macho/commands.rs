//! Load-command walking and decoding

use tracing::{debug, trace};

use crate::formats::macho::types::*;
use crate::formats::macho::utils::{fixed_name, read_cstring, MachRead};

const SEGMENT_64_HEADER_SIZE: usize = 72;
const SECTION_64_SIZE: usize = 80;

/// Walk the load-command table of a thin image and fold what it finds into `info`.
///
/// Only commands that lie entirely inside `data` are decoded. A command that
/// is shorter than its own 8-byte header or runs past the buffer ends the
/// walk, so a truncated file produces a prefix of the complete result.
pub(crate) fn walk_load_commands(
    data: &[u8],
    start: usize,
    ncmds: u32,
    endian: Endian,
    kind: MachOKind,
    info: &mut BinaryInfo,
) {
    let limit = (ncmds as usize).min(MAX_LOAD_COMMANDS);
    if ncmds as usize > MAX_LOAD_COMMANDS {
        debug!(ncmds, cap = MAX_LOAD_COMMANDS, "load command count capped");
    }

    let mut offset = start;
    for index in 0..limit {
        let (Some(cmd), Some(cmdsize)) = (
            data.read_mach_u32(offset, endian),
            data.read_mach_u32(offset.saturating_add(4), endian),
        ) else {
            trace!(index, offset, "load command header truncated");
            break;
        };

        let cmdsize = cmdsize as usize;
        if cmdsize < 8 {
            debug!(index, offset, cmdsize, "load command size does not advance");
            break;
        }
        let Some(end) = offset.checked_add(cmdsize).filter(|&end| end <= data.len()) else {
            trace!(index, offset, cmdsize, "load command runs past end of data");
            break;
        };

        decode_command(&data[offset..end], cmd, endian, kind, info);
        offset = end;
    }
}

fn decode_command(command: &[u8], cmd: u32, endian: Endian, kind: MachOKind, info: &mut BinaryInfo) {
    let is_64 = kind == MachOKind::MachO64;
    match cmd {
        LC_LOAD_DYLIB | LC_LOAD_WEAK_DYLIB | LC_REEXPORT_DYLIB | LC_LOAD_UPWARD_DYLIB => {
            if let Some(path) = path_at_offset_field(command, endian) {
                info.linked_libraries.push(path);
            }
        }
        LC_RPATH => {
            if let Some(path) = path_at_offset_field(command, endian) {
                info.rpaths.push(path);
            }
        }
        LC_CODE_SIGNATURE => {
            info.has_code_signature = true;
            if let (Some(offset), Some(size)) = (
                command.read_mach_u32(8, endian),
                command.read_mach_u32(12, endian),
            ) {
                info.code_signature = Some(CodeSignatureLocation { offset, size });
            }
        }
        LC_ENCRYPTION_INFO_64 if is_64 => decode_encryption(command, endian, info),
        LC_ENCRYPTION_INFO if !is_64 => decode_encryption(command, endian, info),
        LC_UUID => {
            if let Some(bytes) = command.get(8..24) {
                info.uuid = Some(format_uuid(bytes));
            }
        }
        LC_SEGMENT_64 if is_64 => {
            if let Some(segment) = decode_segment_64(command, endian) {
                info.segments.push(segment);
            }
        }
        LC_BUILD_VERSION if is_64 => decode_build_version(command, endian, info),
        LC_VERSION_MIN_MACOSX | LC_VERSION_MIN_IPHONEOS | LC_VERSION_MIN_TVOS
        | LC_VERSION_MIN_WATCHOS
            if is_64 =>
        {
            decode_version_min(command, cmd, endian, info)
        }
        _ => {}
    }
}

/// Dylib and rpath commands store a string offset relative to the command start.
fn path_at_offset_field(command: &[u8], endian: Endian) -> Option<String> {
    let name_offset = command.read_mach_u32(8, endian)? as usize;
    read_cstring(command, name_offset)
}

fn decode_encryption(command: &[u8], endian: Endian, info: &mut BinaryInfo) {
    // cryptoff, cryptsize, cryptid
    if let Some(cryptid) = command.read_mach_u32(16, endian) {
        if cryptid != 0 {
            info.is_encrypted = true;
            info.encryption_info = Some("Encrypted (FairPlay DRM)".to_string());
        }
    }
}

fn decode_segment_64(command: &[u8], endian: Endian) -> Option<SegmentInfo> {
    if command.len() < SEGMENT_64_HEADER_SIZE {
        return None;
    }
    let name = fixed_name(&command[8..24]);
    let vm_address = command.read_mach_u64(24, endian)?;
    let vm_size = command.read_mach_u64(32, endian)?;
    let file_offset = command.read_mach_u64(40, endian)?;
    let file_size = command.read_mach_u64(48, endian)?;
    let nsects = command.read_mach_u32(64, endian)? as usize;

    let mut sections = Vec::new();
    let mut offset = SEGMENT_64_HEADER_SIZE;
    while sections.len() < nsects && offset + SECTION_64_SIZE <= command.len() {
        let raw = &command[offset..offset + SECTION_64_SIZE];
        if let (Some(address), Some(size), Some(file_off)) = (
            raw.read_mach_u64(32, endian),
            raw.read_mach_u64(40, endian),
            raw.read_mach_u32(48, endian),
        ) {
            sections.push(SectionInfo {
                name: fixed_name(&raw[0..16]),
                segment: fixed_name(&raw[16..32]),
                address,
                size,
                offset: file_off,
            });
        }
        offset += SECTION_64_SIZE;
    }

    Some(SegmentInfo {
        name,
        vm_address,
        vm_size,
        file_offset,
        file_size,
        sections,
    })
}

fn decode_build_version(command: &[u8], endian: Endian, info: &mut BinaryInfo) {
    if let Some(platform) = command.read_mach_u32(8, endian) {
        info.platform = Some(platform_name(platform));
    }
    if let Some(minos) = command.read_mach_u32(12, endian) {
        info.min_os_version = Some(decode_version(minos));
    }
    if let Some(sdk) = command.read_mach_u32(16, endian) {
        info.sdk_version = Some(decode_version(sdk));
    }
    // build_tool_version entries (tool, version) follow at +24
    let ntools = command.read_mach_u32(20, endian).unwrap_or(0);
    if ntools > 0 {
        if let Some(version) = command.read_mach_u32(28, endian) {
            info.build_version = Some(decode_version(version));
        }
    }
}

fn decode_version_min(command: &[u8], cmd: u32, endian: Endian, info: &mut BinaryInfo) {
    // LC_BUILD_VERSION takes precedence when both are present.
    if info.min_os_version.is_some() {
        return;
    }
    if let Some(version) = command.read_mach_u32(8, endian) {
        info.min_os_version = Some(decode_version(version));
    }
    if let Some(sdk) = command.read_mach_u32(12, endian) {
        info.sdk_version = Some(decode_version(sdk));
    }
    if info.platform.is_none() {
        let platform = match cmd {
            LC_VERSION_MIN_MACOSX => "macOS",
            LC_VERSION_MIN_IPHONEOS => "iOS",
            LC_VERSION_MIN_TVOS => "tvOS",
            _ => "watchOS",
        };
        info.platform = Some(platform.to_string());
    }
}

fn format_uuid(bytes: &[u8]) -> String {
    let hex = hex::encode_upper(bytes);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
