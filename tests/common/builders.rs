//! Byte-level builders for Mach-O images, code signatures and IPA archives.

use std::io::Write;
use std::path::{Path, PathBuf};

use ipascope::formats::codesign::{
    CSMAGIC_BLOBWRAPPER, CSMAGIC_CODEDIRECTORY, CSMAGIC_EMBEDDED_ENTITLEMENTS,
    CSMAGIC_EMBEDDED_SIGNATURE, CSMAGIC_REQUIREMENTS,
};
use ipascope::formats::macho::{
    Endian, CPU_TYPE_ARM, CPU_TYPE_ARM64, FAT_MAGIC, LC_BUILD_VERSION, LC_CODE_SIGNATURE,
    LC_ENCRYPTION_INFO, LC_ENCRYPTION_INFO_64, LC_RPATH, LC_SEGMENT_64, LC_UUID,
    LC_VERSION_MIN_IPHONEOS, MH_MAGIC, MH_MAGIC_64,
};
use zip::write::SimpleFileOptions;

/// Pack `major.minor.patch` the way Mach-O version fields do.
pub fn pack_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 16) | (minor << 8) | patch
}

/// Builds a thin Mach-O image in either byte order.
///
/// Commands are stored in insertion order. Building the same builder with
/// `Endian::Little` and `Endian::Big` yields byte-swapped twins.
#[derive(Debug, Clone)]
pub struct MachOBuilder {
    is_64: bool,
    cpu_type: u32,
    file_type: u32,
    commands: Vec<Command>,
}

#[derive(Debug, Clone)]
enum Command {
    Dylib { cmd: u32, path: String },
    Rpath(String),
    Segment {
        name: String,
        vm_address: u64,
        vm_size: u64,
        file_offset: u64,
        file_size: u64,
        sections: Vec<(String, String)>,
    },
    BuildVersion { platform: u32, minos: u32, sdk: u32, tool_version: Option<u32> },
    VersionMin { cmd: u32, version: u32, sdk: u32 },
    Encryption { cryptid: u32 },
    Uuid([u8; 16]),
    CodeSignature { offset: u32, size: u32 },
    Raw { cmd: u32, payload: Vec<u8> },
}

impl Default for MachOBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MachOBuilder {
    pub fn new() -> Self {
        Self {
            is_64: true,
            cpu_type: CPU_TYPE_ARM64,
            file_type: 2,
            commands: Vec::new(),
        }
    }

    /// A 32-bit arm image: `MH_MAGIC`, 28-byte header, `LC_ENCRYPTION_INFO`.
    pub fn new_32() -> Self {
        Self {
            is_64: false,
            cpu_type: CPU_TYPE_ARM,
            ..Self::new()
        }
    }

    pub fn cpu_type(mut self, cpu_type: u32) -> Self {
        self.cpu_type = cpu_type;
        self
    }

    pub fn file_type(mut self, file_type: u32) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn dylib(mut self, cmd: u32, path: &str) -> Self {
        self.commands.push(Command::Dylib {
            cmd,
            path: path.to_string(),
        });
        self
    }

    pub fn rpath(mut self, path: &str) -> Self {
        self.commands.push(Command::Rpath(path.to_string()));
        self
    }

    pub fn segment(
        mut self,
        name: &str,
        vm_address: u64,
        vm_size: u64,
        file_offset: u64,
        file_size: u64,
        sections: &[&str],
    ) -> Self {
        self.commands.push(Command::Segment {
            name: name.to_string(),
            vm_address,
            vm_size,
            file_offset,
            file_size,
            sections: sections
                .iter()
                .map(|s| (s.to_string(), name.to_string()))
                .collect(),
        });
        self
    }

    pub fn build_version(mut self, platform: u32, minos: u32, sdk: u32, tool: Option<u32>) -> Self {
        self.commands.push(Command::BuildVersion {
            platform,
            minos,
            sdk,
            tool_version: tool,
        });
        self
    }

    pub fn version_min_iphoneos(mut self, version: u32, sdk: u32) -> Self {
        self.commands.push(Command::VersionMin {
            cmd: LC_VERSION_MIN_IPHONEOS,
            version,
            sdk,
        });
        self
    }

    pub fn encryption(mut self, cryptid: u32) -> Self {
        self.commands.push(Command::Encryption { cryptid });
        self
    }

    pub fn uuid(mut self, bytes: [u8; 16]) -> Self {
        self.commands.push(Command::Uuid(bytes));
        self
    }

    pub fn code_signature(mut self, offset: u32, size: u32) -> Self {
        self.commands.push(Command::CodeSignature { offset, size });
        self
    }

    /// An arbitrary command whose body after the 8-byte header is `payload`.
    pub fn raw(mut self, cmd: u32, payload: &[u8]) -> Self {
        self.commands.push(Command::Raw {
            cmd,
            payload: payload.to_vec(),
        });
        self
    }

    /// Header plus load commands, nothing after them.
    pub fn build(&self, endian: Endian) -> Vec<u8> {
        let w = Words(endian);
        let commands: Vec<Vec<u8>> = self
            .commands
            .iter()
            .map(|c| encode(c, w, self.is_64))
            .collect();
        let sizeofcmds: usize = commands.iter().map(Vec::len).sum();

        let mut out = Vec::new();
        out.extend_from_slice(&w.u32(if self.is_64 { MH_MAGIC_64 } else { MH_MAGIC }));
        out.extend_from_slice(&w.u32(self.cpu_type));
        out.extend_from_slice(&w.u32(0));
        out.extend_from_slice(&w.u32(self.file_type));
        out.extend_from_slice(&w.u32(commands.len() as u32));
        out.extend_from_slice(&w.u32(sizeofcmds as u32));
        out.extend_from_slice(&w.u32(0));
        if self.is_64 {
            out.extend_from_slice(&w.u32(0));
        }
        for command in commands {
            out.extend_from_slice(&command);
        }
        out
    }

    /// Append `LC_CODE_SIGNATURE` and place `signature` at a 16-byte aligned
    /// offset after the load commands.
    pub fn build_signed(&self, endian: Endian, signature: &[u8]) -> Vec<u8> {
        let unsigned_len = self.build(endian).len() + 16;
        let offset = unsigned_len.div_ceil(16) * 16;

        let signed = self
            .clone()
            .code_signature(offset as u32, signature.len() as u32);
        let mut out = signed.build(endian);
        out.resize(offset, 0);
        out.extend_from_slice(signature);
        out
    }
}

/// A fat header with one `fat_arch` per `(cputype, offset, size)`.
///
/// `Endian::Big` writes `FAT_MAGIC` as stored on disk; `Endian::Little`
/// yields the byte-swapped `FAT_CIGAM` form.
pub fn fat_header(endian: Endian, slices: &[(u32, u32, u32)]) -> Vec<u8> {
    let w = Words(endian);
    let mut out = Vec::new();
    out.extend_from_slice(&w.u32(FAT_MAGIC));
    out.extend_from_slice(&w.u32(slices.len() as u32));
    for &(cpu_type, offset, size) in slices {
        out.extend_from_slice(&w.u32(cpu_type));
        out.extend_from_slice(&w.u32(0));
        out.extend_from_slice(&w.u32(offset));
        out.extend_from_slice(&w.u32(size));
        out.extend_from_slice(&w.u32(14));
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct Words(Endian);

impl Words {
    fn u32(self, value: u32) -> [u8; 4] {
        match self.0 {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    fn u64(self, value: u64) -> [u8; 8] {
        match self.0 {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }
}

fn fixed16(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    let len = name.len().min(16);
    out[..len].copy_from_slice(&name.as_bytes()[..len]);
    out
}

fn with_header(cmd: u32, body: Vec<u8>, w: Words) -> Vec<u8> {
    let size = (8 + body.len()).div_ceil(8) * 8;
    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(&w.u32(cmd));
    out.extend_from_slice(&w.u32(size as u32));
    out.extend_from_slice(&body);
    out.resize(size, 0);
    out
}

fn encode(command: &Command, w: Words, is_64: bool) -> Vec<u8> {
    match command {
        Command::Dylib { cmd, path } => {
            // name offset, timestamp, current version, compat version
            let mut body = Vec::new();
            body.extend_from_slice(&w.u32(24));
            body.extend_from_slice(&w.u32(2));
            body.extend_from_slice(&w.u32(pack_version(1, 0, 0)));
            body.extend_from_slice(&w.u32(pack_version(1, 0, 0)));
            body.extend_from_slice(path.as_bytes());
            body.push(0);
            with_header(*cmd, body, w)
        }
        Command::Rpath(path) => {
            let mut body = Vec::new();
            body.extend_from_slice(&w.u32(12));
            body.extend_from_slice(path.as_bytes());
            body.push(0);
            with_header(LC_RPATH, body, w)
        }
        Command::Segment {
            name,
            vm_address,
            vm_size,
            file_offset,
            file_size,
            sections,
        } => {
            let mut body = Vec::new();
            body.extend_from_slice(&fixed16(name));
            body.extend_from_slice(&w.u64(*vm_address));
            body.extend_from_slice(&w.u64(*vm_size));
            body.extend_from_slice(&w.u64(*file_offset));
            body.extend_from_slice(&w.u64(*file_size));
            body.extend_from_slice(&w.u32(5));
            body.extend_from_slice(&w.u32(5));
            body.extend_from_slice(&w.u32(sections.len() as u32));
            body.extend_from_slice(&w.u32(0));
            for (index, (section, segment)) in sections.iter().enumerate() {
                let address = vm_address + (index as u64) * 0x100;
                body.extend_from_slice(&fixed16(section));
                body.extend_from_slice(&fixed16(segment));
                body.extend_from_slice(&w.u64(address));
                body.extend_from_slice(&w.u64(0x100));
                body.extend_from_slice(&w.u32((*file_offset as u32) + index as u32 * 0x100));
                body.extend_from_slice(&[0u8; 28]);
            }
            with_header(LC_SEGMENT_64, body, w)
        }
        Command::BuildVersion {
            platform,
            minos,
            sdk,
            tool_version,
        } => {
            let mut body = Vec::new();
            body.extend_from_slice(&w.u32(*platform));
            body.extend_from_slice(&w.u32(*minos));
            body.extend_from_slice(&w.u32(*sdk));
            match tool_version {
                Some(version) => {
                    body.extend_from_slice(&w.u32(1));
                    body.extend_from_slice(&w.u32(3));
                    body.extend_from_slice(&w.u32(*version));
                }
                None => body.extend_from_slice(&w.u32(0)),
            }
            with_header(LC_BUILD_VERSION, body, w)
        }
        Command::VersionMin { cmd, version, sdk } => {
            let mut body = Vec::new();
            body.extend_from_slice(&w.u32(*version));
            body.extend_from_slice(&w.u32(*sdk));
            with_header(*cmd, body, w)
        }
        Command::Encryption { cryptid } => {
            let mut body = Vec::new();
            body.extend_from_slice(&w.u32(0x4000));
            body.extend_from_slice(&w.u32(0x8000));
            body.extend_from_slice(&w.u32(*cryptid));
            if !is_64 {
                return with_header(LC_ENCRYPTION_INFO, body, w);
            }
            body.extend_from_slice(&w.u32(0));
            with_header(LC_ENCRYPTION_INFO_64, body, w)
        }
        Command::Uuid(bytes) => with_header(LC_UUID, bytes.to_vec(), w),
        Command::CodeSignature { offset, size } => {
            let mut body = Vec::new();
            body.extend_from_slice(&w.u32(*offset));
            body.extend_from_slice(&w.u32(*size));
            with_header(LC_CODE_SIGNATURE, body, w)
        }
        Command::Raw { cmd, payload } => with_header(*cmd, payload.clone(), w),
    }
}

/// Fields of a synthesized CodeDirectory.
#[derive(Debug, Clone)]
pub struct CodeDirectoryFixture {
    pub version: u32,
    pub flags: u32,
    pub identifier: String,
    pub team_id: Option<String>,
    pub hash_type: u8,
    pub page_shift: u8,
}

impl Default for CodeDirectoryFixture {
    fn default() -> Self {
        Self {
            version: 0x20400,
            flags: 0,
            identifier: "com.example.demo".to_string(),
            team_id: Some("ABCDE12345".to_string()),
            hash_type: 2,
            page_shift: 12,
        }
    }
}

/// CodeDirectory blob; all fields big-endian.
pub fn code_directory(fixture: &CodeDirectoryFixture) -> Vec<u8> {
    let header_len = 88usize;
    let ident_offset = header_len;
    let team_offset = ident_offset + fixture.identifier.len() + 1;

    let mut cd = vec![0u8; header_len];
    cd[0..4].copy_from_slice(&CSMAGIC_CODEDIRECTORY.to_be_bytes());
    cd[8..12].copy_from_slice(&fixture.version.to_be_bytes());
    cd[12..16].copy_from_slice(&fixture.flags.to_be_bytes());
    cd[20..24].copy_from_slice(&(ident_offset as u32).to_be_bytes());
    cd[36] = 32;
    cd[37] = fixture.hash_type;
    cd[39] = fixture.page_shift;
    if fixture.team_id.is_some() {
        cd[48..52].copy_from_slice(&(team_offset as u32).to_be_bytes());
    }
    cd.extend_from_slice(fixture.identifier.as_bytes());
    cd.push(0);
    if let Some(team) = &fixture.team_id {
        cd.extend_from_slice(team.as_bytes());
        cd.push(0);
    }
    set_length(&mut cd);
    cd
}

/// Entitlements blob wrapping an XML property list.
pub fn entitlements_blob(xml: &str) -> Vec<u8> {
    wrap_blob(CSMAGIC_EMBEDDED_ENTITLEMENTS, xml.as_bytes())
}

/// Requirements blob with an empty requirement set.
pub fn requirements_blob() -> Vec<u8> {
    wrap_blob(CSMAGIC_REQUIREMENTS, &0u32.to_be_bytes())
}

/// CMS wrapper blob with opaque content.
pub fn cms_blob() -> Vec<u8> {
    wrap_blob(CSMAGIC_BLOBWRAPPER, &[0x30, 0x80, 0x06, 0x09])
}

pub fn wrap_blob(magic: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&magic.to_be_bytes());
    out.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Embedded-signature SuperBlob indexing `blobs` in order.
pub fn superblob(blobs: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&CSMAGIC_EMBEDDED_SIGNATURE.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&(blobs.len() as u32).to_be_bytes());
    let mut offset = 12 + blobs.len() * 8;
    for (slot, blob) in blobs.iter().enumerate() {
        out.extend_from_slice(&(slot as u32).to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        offset += blob.len();
    }
    for blob in blobs {
        out.extend_from_slice(blob);
    }
    set_length(&mut out);
    out
}

fn set_length(blob: &mut [u8]) {
    let len = blob.len() as u32;
    blob[4..8].copy_from_slice(&len.to_be_bytes());
}

pub const ENTITLEMENTS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>application-identifier</key>
    <string>ABCDE12345.com.example.demo</string>
    <key>get-task-allow</key>
    <false/>
    <key>keychain-access-groups</key>
    <array>
        <string>ABCDE12345.*</string>
    </array>
</dict>
</plist>
"#;

/// Info.plist XML with the usual bundle keys.
pub fn info_plist(bundle_id: &str, executable: &str, version: Option<&str>) -> String {
    let version = version
        .map(|v| format!("    <key>CFBundleShortVersionString</key>\n    <string>{}</string>\n", v))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>{bundle_id}</string>
    <key>CFBundleExecutable</key>
    <string>{executable}</string>
    <key>CFBundleName</key>
    <string>Demo</string>
    <key>CFBundleVersion</key>
    <string>42</string>
{version}    <key>MinimumOSVersion</key>
    <string>14.0</string>
    <key>UIDeviceFamily</key>
    <array>
        <integer>1</integer>
        <integer>2</integer>
    </array>
</dict>
</plist>
"#
    )
}

/// A provisioning profile: the plist wrapped in opaque bytes standing in
/// for the PKCS#7 envelope.
pub fn mobileprovision(team_id: &str, expiration: &str) -> Vec<u8> {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Name</key>
    <string>Demo Ad Hoc</string>
    <key>TeamName</key>
    <string>Example Corp</string>
    <key>TeamIdentifier</key>
    <array>
        <string>{team_id}</string>
    </array>
    <key>AppIDName</key>
    <string>Demo</string>
    <key>UUID</key>
    <string>0F1E2D3C-4B5A-6978-8796-A5B4C3D2E1F0</string>
    <key>CreationDate</key>
    <date>2024-01-01T00:00:00Z</date>
    <key>ExpirationDate</key>
    <date>{expiration}</date>
    <key>ProvisionedDevices</key>
    <array>
        <string>00008101-000A1B2C3D4E5F60</string>
    </array>
    <key>Entitlements</key>
    <dict>
        <key>application-identifier</key>
        <string>{team_id}.com.example.demo</string>
    </dict>
</dict>
</plist>
"#
    );
    let mut out = vec![0x30, 0x82, 0x1f, 0x00, 0x06, 0x09];
    out.extend_from_slice(xml.as_bytes());
    out.extend_from_slice(&[0xa0, 0x82, 0x0d, 0x00]);
    out
}

/// Collects archive entries and writes them as a ZIP file.
#[derive(Debug, Default)]
pub struct IpaBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl IpaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.entries
            .push((name.to_string(), contents.as_ref().to_vec()));
        self
    }

    /// Write the archive to `dir/name` and return its path.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (entry, contents) in &self.entries {
            zip.start_file(entry.as_str(), options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
        path
    }
}
