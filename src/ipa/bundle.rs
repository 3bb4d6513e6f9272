//! App bundle discovery, Info.plist fields and file inventory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{IpaScopeError, Result};
use crate::property_list::{self, PlistDictionary, PlistValue};

/// List `.app` directories directly under `Payload/`, sorted by name.
pub fn find_app_bundles(root: &Path) -> Result<Vec<PathBuf>> {
    let payload = root.join("Payload");
    if !payload.is_dir() {
        return Err(IpaScopeError::MissingPayload);
    }

    let entries = fs::read_dir(&payload).map_err(|e| {
        warn!(error = %e, "cannot enumerate Payload folder");
        IpaScopeError::NoAppBundle
    })?;
    let mut bundles: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && path.extension().is_some_and(|ext| ext == "app"))
        .collect();
    bundles.sort();
    Ok(bundles)
}

/// Locate the app bundle. The first match wins when several are present.
pub fn locate_app_bundle(root: &Path) -> Result<PathBuf> {
    let bundles = find_app_bundles(root)?;
    if bundles.len() > 1 {
        debug!(count = bundles.len(), "multiple app bundles, using the first");
    }
    bundles.into_iter().next().ok_or(IpaScopeError::NoAppBundle)
}

/// Read `Info.plist` from a bundle. A missing file is `Ok(None)`.
pub fn read_info_plist(app: &Path) -> Result<Option<PlistDictionary>> {
    let path = app.join("Info.plist");
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(&path)?;
    match property_list::decode(&bytes)? {
        PlistValue::Dictionary(dict) => Ok(Some(dict)),
        _ => Err(IpaScopeError::Plist(
            "Info.plist root is not a dictionary".to_string(),
        )),
    }
}

/// Fields of interest from `Info.plist`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundleInfo {
    pub bundle_id: Option<String>,
    pub version: Option<String>,
    pub build_number: Option<String>,
    pub display_name: Option<String>,
    pub minimum_os_version: Option<String>,
    pub executable_name: Option<String>,
    pub device_families: Vec<i64>,
}

impl BundleInfo {
    pub fn from_plist(dict: &PlistDictionary) -> Self {
        let string = |key: &str| dict.get(key).and_then(|v| v.as_str()).map(str::to_string);
        Self {
            bundle_id: string("CFBundleIdentifier"),
            version: string("CFBundleShortVersionString"),
            build_number: string("CFBundleVersion"),
            display_name: string("CFBundleDisplayName").or_else(|| string("CFBundleName")),
            minimum_os_version: string("MinimumOSVersion"),
            executable_name: string("CFBundleExecutable"),
            device_families: dict
                .get("UIDeviceFamily")
                .and_then(|v| v.as_array())
                .map(|items| items.iter().filter_map(|v| v.as_integer()).collect())
                .unwrap_or_default(),
        }
    }
}

/// Path of the main executable: `CFBundleExecutable`, else the bundle stem.
pub fn resolve_executable(app: &Path, bundle: &BundleInfo) -> Option<PathBuf> {
    let name = match &bundle.executable_name {
        Some(name) => name.clone(),
        None => app.file_stem()?.to_string_lossy().into_owned(),
    };
    let path = app.join(name);
    path.is_file().then_some(path)
}

/// Listing of the bundle's notable contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileInventory {
    /// `.dylib` files at the bundle root
    pub dylibs: Vec<String>,
    /// Entries of `Frameworks/`
    pub frameworks: Vec<String>,
    /// Entries of `PlugIns/`
    pub plugins: Vec<String>,
    pub has_code_resources: bool,
    pub has_provisioning_profile: bool,
    pub file_count: usize,
    pub total_size: u64,
}

fn list_names(dir: &Path, filter: impl Fn(&str) -> bool) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| filter(name))
        .collect();
    names.sort();
    names
}

/// Build the inventory of an app bundle.
pub fn inventory(app: &Path) -> FileInventory {
    let mut inventory = FileInventory {
        dylibs: list_names(app, |name| name.ends_with(".dylib")),
        frameworks: list_names(&app.join("Frameworks"), |_| true),
        plugins: list_names(&app.join("PlugIns"), |_| true),
        has_code_resources: app.join("_CodeSignature").join("CodeResources").is_file(),
        has_provisioning_profile: app.join("embedded.mobileprovision").is_file(),
        ..FileInventory::default()
    };

    for entry in WalkDir::new(app)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        inventory.file_count += 1;
        inventory.total_size += entry.metadata().map(|m| m.len()).unwrap_or(0);
    }
    inventory
}
