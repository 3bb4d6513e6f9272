//! IPA inspection workflow.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span, warn};

use crate::config::InspectConfig;
use crate::error::{IpaScopeError, Result};
use crate::formats::{codesign, macho};
use crate::ipa::access::ScopedAccess;
use crate::ipa::bundle::{self, BundleInfo};
use crate::ipa::extract::{ArchiveExtractor, Extraction, ZipExtractor};
use crate::ipa::profile;
use crate::ipa::report::{default_limitations, ExecutableInfo, InspectionReport};
use crate::timeout::{with_timeout, TimeoutConfig};

/// Inspect an `.ipa` file with the default ZIP extractor.
pub fn inspect_ipa(path: &Path, config: &InspectConfig) -> Result<InspectionReport> {
    inspect_ipa_with(path, config, &ZipExtractor::new(config.max_entry_bytes))
}

/// Inspect an `.ipa` file using the given extractor.
///
/// Input access is held for the whole call and the extraction directory is
/// removed when this returns, whichever way it returns.
pub fn inspect_ipa_with(
    path: &Path,
    config: &InspectConfig,
    extractor: &dyn ArchiveExtractor,
) -> Result<InspectionReport> {
    run_inspection(path, config, extractor, &AtomicBool::new(false))
}

/// Returns [`IpaScopeError::Cancelled`] once `cancel` is set.
fn checkpoint(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        debug!("inspection cancelled");
        return Err(IpaScopeError::Cancelled);
    }
    Ok(())
}

fn run_inspection(
    path: &Path,
    config: &InspectConfig,
    extractor: &dyn ArchiveExtractor,
    cancel: &AtomicBool,
) -> Result<InspectionReport> {
    let span = info_span!("inspect_ipa", path = %path.display());
    let _guard = span.enter();

    let access = ScopedAccess::acquire(path)?;
    let workspace = tempfile::Builder::new().prefix("ipascope-").tempdir()?;
    debug!(workspace = %workspace.path().display(), "extracting");

    let extraction = extractor.extract(access.path(), workspace.path(), cancel)?;
    checkpoint(cancel)?;
    let app = bundle::locate_app_bundle(workspace.path())?;

    let mut report = bundle_report(&app, config, cancel)
        .map_err(|err| explain_skipped_executable(err, &extraction))?;
    let mut warnings = extraction.warnings();
    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    report.source = path.to_path_buf();
    info!(
        bundle_id = report.bundle.bundle_id.as_deref().unwrap_or("-"),
        warnings = report.warnings.len(),
        "inspection complete"
    );
    Ok(report)
}

/// A missing executable that the extractor skipped gets the skip reason.
fn explain_skipped_executable(err: IpaScopeError, extraction: &Extraction) -> IpaScopeError {
    match err {
        IpaScopeError::NoExecutable(name) => match extraction.skipped_file(&name) {
            Some(skipped) => IpaScopeError::NoExecutable(format!("{} ({})", name, skipped)),
            None => IpaScopeError::NoExecutable(name),
        },
        other => other,
    }
}

/// Inspect an already-extracted `.app` bundle directory.
pub fn inspect_bundle(app: &Path, config: &InspectConfig) -> Result<InspectionReport> {
    bundle_report(app, config, &AtomicBool::new(false))
}

fn bundle_report(
    app: &Path,
    config: &InspectConfig,
    cancel: &AtomicBool,
) -> Result<InspectionReport> {
    let mut warnings = Vec::new();

    let bundle = match bundle::read_info_plist(app) {
        Ok(Some(dict)) => BundleInfo::from_plist(&dict),
        Ok(None) => {
            warnings.push("Info.plist not found".to_string());
            BundleInfo::default()
        }
        Err(e) => {
            warnings.push(format!("Info.plist could not be parsed: {}", e));
            BundleInfo::default()
        }
    };

    let inventory = bundle::inventory(app);
    checkpoint(cancel)?;

    let profile_load = profile::load_profile(app, config.max_profile_bytes);
    if let Some(warning) = profile_load.warning() {
        warnings.push(warning);
    }
    let provisioning = profile_load.into_profile();

    let executable_path = bundle::resolve_executable(app, &bundle).ok_or_else(|| {
        IpaScopeError::NoExecutable(
            bundle
                .executable_name
                .clone()
                .unwrap_or_else(|| app.display().to_string()),
        )
    })?;

    let mut report = InspectionReport {
        source: app.to_path_buf(),
        app_bundle: app
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        bundle,
        executable: None,
        binary: None,
        signature: None,
        provisioning,
        inventory,
        limitations: default_limitations(),
        warnings,
    };
    checkpoint(cancel)?;
    inspect_executable(&executable_path, config, &mut report)?;
    Ok(report)
}

fn inspect_executable(
    path: &Path,
    config: &InspectConfig,
    report: &mut InspectionReport,
) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let size = fs::metadata(path)?.len();
    if size > config.max_executable_bytes {
        warn!(size, limit = config.max_executable_bytes, "executable over ceiling");
        report.warnings.push(format!(
            "Main executable too large to analyze ({} bytes, limit {} bytes)",
            size, config.max_executable_bytes
        ));
        return Ok(());
    }

    let data = fs::read(path)?;
    report.executable = Some(ExecutableInfo {
        name,
        size,
        sha256: hex::encode(Sha256::digest(&data)),
    });

    let Some(binary) = macho::analyze(&data) else {
        report
            .warnings
            .push("Main executable is too small to be a Mach-O binary".to_string());
        return Ok(());
    };
    if !binary.is_macho() {
        report
            .warnings
            .push("Main executable is not a Mach-O binary".to_string());
    }

    if binary.has_code_signature {
        report.signature = codesign::analyze_embedded(&data, &binary);
        if report.signature.is_none() {
            report
                .warnings
                .push("Code signature could not be parsed".to_string());
        }
    } else if binary.is_universal {
        debug!("universal binary: signature lives inside slices, not analyzed");
    } else if binary.is_macho() {
        report
            .warnings
            .push("Main executable has no code signature".to_string());
    }

    report.binary = Some(binary);
    Ok(())
}

/// Sets the shared flag when the owning future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Inspect on a blocking worker, bounded by `config.timeout_seconds`.
///
/// The result is delivered exactly once. When the returned future is
/// dropped or times out, the worker stops at its next checkpoint and still
/// removes its temporary directory.
pub async fn inspect_ipa_async(path: PathBuf, config: InspectConfig) -> Result<InspectionReport> {
    let extractor = Arc::new(ZipExtractor::new(config.max_entry_bytes));
    inspect_ipa_async_with(path, config, extractor).await
}

/// [`inspect_ipa_async`] with a caller-supplied extractor.
pub async fn inspect_ipa_async_with(
    path: PathBuf,
    config: InspectConfig,
    extractor: Arc<dyn ArchiveExtractor>,
) -> Result<InspectionReport> {
    let cancel = Arc::new(AtomicBool::new(false));
    let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancel));

    let timeout = TimeoutConfig::new(config.timeout_seconds, "inspect_ipa");
    with_timeout(timeout, async move {
        tokio::task::spawn_blocking(move || {
            run_inspection(&path, &config, extractor.as_ref(), &cancel)
        })
        .await
        .map_err(|e| IpaScopeError::TaskFailed(e.to_string()))?
    })
    .await
}
