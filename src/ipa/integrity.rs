//! Structural integrity checks for IPA files.
//!
//! Unlike [`inspect_ipa`](crate::ipa::inspect_ipa), problems in the bundle
//! never abort the check: each one is recorded as an error or a warning and
//! the remaining checks continue where they still make sense.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use serde::Serialize;
use tracing::{debug, info_span, warn};

use crate::config::InspectConfig;
use crate::error::Result;
use crate::formats::macho;
use crate::ipa::access::ScopedAccess;
use crate::ipa::bundle::{self, BundleInfo};
use crate::ipa::extract::{ArchiveExtractor, ZipExtractor};
use crate::ipa::profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueCategory {
    Structure,
    Metadata,
    Binary,
    Signing,
    Provisioning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityIssue {
    pub category: IssueCategory,
    pub message: String,
}

impl IntegrityIssue {
    fn new(category: IssueCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub app_bundle: Option<String>,
    pub errors: Vec<IntegrityIssue>,
    pub warnings: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, category: IssueCategory, message: impl Into<String>) {
        self.errors.push(IntegrityIssue::new(category, message));
    }

    fn warn(&mut self, category: IssueCategory, message: impl Into<String>) {
        self.warnings.push(IntegrityIssue::new(category, message));
    }
}

/// Check an `.ipa` file with the default ZIP extractor.
///
/// Only unreadable input and extraction failure are returned as errors.
pub fn check_integrity(path: &Path, config: &InspectConfig) -> Result<IntegrityReport> {
    check_integrity_with(path, config, &ZipExtractor::new(config.max_entry_bytes))
}

pub fn check_integrity_with(
    path: &Path,
    config: &InspectConfig,
    extractor: &dyn ArchiveExtractor,
) -> Result<IntegrityReport> {
    let span = info_span!("check_integrity", path = %path.display());
    let _guard = span.enter();

    let access = ScopedAccess::acquire(path)?;
    let workspace = tempfile::Builder::new().prefix("ipascope-").tempdir()?;
    let extraction = extractor.extract(access.path(), workspace.path(), &AtomicBool::new(false))?;

    let mut report = check_extracted(workspace.path(), config);
    for skipped in &extraction.skipped {
        report.warn(IssueCategory::Structure, skipped.to_string());
    }
    Ok(report)
}

/// Check an extracted archive tree rooted at `root`.
pub fn check_extracted(root: &Path, config: &InspectConfig) -> IntegrityReport {
    let mut report = IntegrityReport::default();

    if !root.join("Payload").is_dir() {
        report.error(IssueCategory::Structure, "Missing Payload folder");
        return report;
    }

    let bundles = match bundle::find_app_bundles(root) {
        Ok(bundles) if !bundles.is_empty() => bundles,
        _ => {
            report.error(IssueCategory::Structure, "No .app bundle found in Payload folder");
            return report;
        }
    };
    if bundles.len() > 1 {
        report.warn(
            IssueCategory::Structure,
            format!("Multiple .app bundles found ({}); checking the first", bundles.len()),
        );
    }
    let app = &bundles[0];
    report.app_bundle = app.file_name().map(|n| n.to_string_lossy().into_owned());

    let bundle_info = check_info_plist(app, &mut report);
    if let Some(info) = &bundle_info {
        check_executable(app, info, config, &mut report);
    }
    check_signing_files(app, config, &mut report);

    debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "integrity check finished"
    );
    report
}

fn check_info_plist(app: &Path, report: &mut IntegrityReport) -> Option<BundleInfo> {
    let dict = match bundle::read_info_plist(app) {
        Ok(Some(dict)) => dict,
        Ok(None) => {
            report.error(IssueCategory::Metadata, "Missing Info.plist");
            return None;
        }
        Err(e) => {
            report.error(IssueCategory::Metadata, format!("Invalid Info.plist: {}", e));
            return None;
        }
    };

    let info = BundleInfo::from_plist(&dict);
    if info.bundle_id.is_none() {
        report.error(IssueCategory::Metadata, "Missing CFBundleIdentifier");
    }
    if info.executable_name.is_none() {
        report.error(IssueCategory::Metadata, "Missing CFBundleExecutable");
    }
    if info.version.is_none() {
        report.warn(IssueCategory::Metadata, "Missing CFBundleShortVersionString");
    }
    Some(info)
}

fn check_executable(
    app: &Path,
    info: &BundleInfo,
    config: &InspectConfig,
    report: &mut IntegrityReport,
) {
    let Some(name) = &info.executable_name else {
        return;
    };
    let path = app.join(name);
    let size = match fs::metadata(&path) {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            report.error(IssueCategory::Binary, "Main executable not found");
            return;
        }
    };
    if size > config.max_executable_bytes {
        warn!(size, limit = config.max_executable_bytes, "executable over ceiling");
        report.warn(
            IssueCategory::Binary,
            format!(
                "Main executable too large to analyze ({} bytes, limit {} bytes)",
                size, config.max_executable_bytes
            ),
        );
        return;
    }

    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) => {
            report.error(
                IssueCategory::Binary,
                format!("Main executable could not be read: {}", e),
            );
            return;
        }
    };
    let Some(binary) = macho::analyze(&data).filter(|b| b.is_macho()) else {
        report.error(IssueCategory::Binary, "Main executable is not a Mach-O binary");
        return;
    };

    if binary.is_encrypted {
        report.warn(IssueCategory::Binary, "Binary is encrypted (FairPlay DRM)");
    }
    if !binary.has_code_signature && !binary.is_universal {
        report.warn(IssueCategory::Signing, "Main executable has no code signature");
    }
}

fn check_signing_files(app: &Path, config: &InspectConfig, report: &mut IntegrityReport) {
    if !app.join("_CodeSignature").join("CodeResources").is_file() {
        report.warn(IssueCategory::Signing, "Missing _CodeSignature/CodeResources");
    }

    let load = profile::load_profile(app, config.max_profile_bytes);
    if let Some(warning) = load.warning() {
        report.warn(IssueCategory::Provisioning, warning);
    }
}
