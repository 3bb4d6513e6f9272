//! Consolidated inspection report.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::formats::codesign::SignatureInfo;
use crate::formats::macho::BinaryInfo;
use crate::ipa::bundle::{BundleInfo, FileInventory};
use crate::ipa::profile::ProvisioningProfile;

/// Capabilities this inspector deliberately does not have.
pub const LIMITATIONS: &[&str] = &[
    "Code signatures are parsed structurally; hashes and certificate chains are not verified",
    "The CMS signature blob is detected but not decoded",
    "Universal binaries list their slices; each slice's load commands are not parsed",
    "Segment and build-version tables are only read from 64-bit binaries",
    "No disassembly or symbol resolution is performed",
];

/// Main executable facts gathered outside the Mach-O parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutableInfo {
    pub name: String,
    pub size: u64,
    pub sha256: String,
}

/// Everything learned from one inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionReport {
    pub source: PathBuf,
    pub app_bundle: String,
    pub bundle: BundleInfo,
    pub executable: Option<ExecutableInfo>,
    pub binary: Option<BinaryInfo>,
    pub signature: Option<SignatureInfo>,
    pub provisioning: Option<ProvisioningProfile>,
    pub inventory: FileInventory,
    pub limitations: Vec<String>,
    pub warnings: Vec<String>,
}

impl InspectionReport {
    /// Team ID from the signature, falling back to the provisioning profile.
    pub fn team_id(&self) -> Option<&str> {
        self.signature
            .as_ref()
            .and_then(|s| s.team_id.as_deref())
            .or_else(|| self.provisioning.as_ref().and_then(|p| p.team_id()))
    }

    /// Entitlements from the signature, falling back to the provisioning profile.
    pub fn entitlements(&self) -> Option<&crate::property_list::PlistDictionary> {
        self.signature
            .as_ref()
            .and_then(|s| s.entitlements.as_ref())
            .or_else(|| self.provisioning.as_ref().and_then(|p| p.entitlements.as_ref()))
    }

    pub fn is_encrypted(&self) -> bool {
        self.binary.as_ref().is_some_and(|b| b.is_encrypted)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn default_limitations() -> Vec<String> {
    LIMITATIONS.iter().map(|s| s.to_string()).collect()
}
