//! Embedded provisioning profile.
//!
//! `embedded.mobileprovision` is a CMS envelope around an XML plist. The CMS
//! layer is not parsed; the plist is located by its `<?xml` and `</plist>`
//! markers and decoded on its own.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use memchr::memmem;
use serde::Serialize;
use tracing::debug;

use crate::property_list::{self, PlistDictionary};

pub const PROFILE_FILE_NAME: &str = "embedded.mobileprovision";

const XML_START: &[u8] = b"<?xml";
const PLIST_END: &[u8] = b"</plist>";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisioningProfile {
    pub name: Option<String>,
    pub team_name: Option<String>,
    pub team_ids: Vec<String>,
    pub app_id_name: Option<String>,
    pub uuid: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub entitlements: Option<PlistDictionary>,
    pub provisioned_devices: Vec<String>,
    pub provisions_all_devices: bool,
}

impl ProvisioningProfile {
    pub fn team_id(&self) -> Option<&str> {
        self.team_ids.first().map(String::as_str)
    }

    fn from_plist(dict: &PlistDictionary, now: DateTime<Utc>) -> Self {
        let string = |key: &str| dict.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let date = |key: &str| dict.get(key).and_then(|v| v.as_date());
        let expiration_date = date("ExpirationDate");

        Self {
            name: string("Name"),
            team_name: string("TeamName"),
            team_ids: dict
                .get("TeamIdentifier")
                .map(|v| v.string_items())
                .unwrap_or_default(),
            app_id_name: string("AppIDName"),
            uuid: string("UUID"),
            creation_date: date("CreationDate"),
            expiration_date,
            is_expired: expiration_date.is_some_and(|exp| exp < now),
            entitlements: dict
                .get("Entitlements")
                .and_then(|v| v.as_dictionary())
                .cloned(),
            provisioned_devices: dict
                .get("ProvisionedDevices")
                .map(|v| v.string_items())
                .unwrap_or_default(),
            provisions_all_devices: dict
                .get("ProvisionsAllDevices")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }
    }
}

/// Slice out the XML plist embedded in a signed profile.
pub fn extract_plist_xml(data: &[u8]) -> Option<&[u8]> {
    let start = memmem::find(data, XML_START)?;
    let end = memmem::rfind(data, PLIST_END)? + PLIST_END.len();
    (start < end).then(|| &data[start..end])
}

/// Decode a provisioning profile, judging expiry against `now`.
pub fn parse_profile_at(data: &[u8], now: DateTime<Utc>) -> Option<ProvisioningProfile> {
    let xml = extract_plist_xml(data)?;
    let dict = property_list::decode_dictionary(xml)?;
    Some(ProvisioningProfile::from_plist(&dict, now))
}

pub fn parse_profile(data: &[u8]) -> Option<ProvisioningProfile> {
    parse_profile_at(data, Utc::now())
}

/// Outcome of looking for the bundle's provisioning profile.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLoad {
    Missing,
    TooLarge { size: u64, limit: u64 },
    Unreadable(String),
    Loaded(Box<ProvisioningProfile>),
}

impl ProfileLoad {
    /// Warning text for outcomes that should be surfaced to the user.
    pub fn warning(&self) -> Option<String> {
        match self {
            ProfileLoad::Missing => Some("No embedded provisioning profile".to_string()),
            ProfileLoad::TooLarge { size, limit } => Some(format!(
                "Provisioning profile too large ({} bytes, limit {} bytes); skipped",
                size, limit
            )),
            ProfileLoad::Unreadable(reason) => {
                Some(format!("Provisioning profile could not be read: {}", reason))
            }
            ProfileLoad::Loaded(profile) if profile.is_expired => {
                Some("Provisioning profile has expired".to_string())
            }
            ProfileLoad::Loaded(_) => None,
        }
    }

    pub fn into_profile(self) -> Option<ProvisioningProfile> {
        match self {
            ProfileLoad::Loaded(profile) => Some(*profile),
            _ => None,
        }
    }
}

/// Load `embedded.mobileprovision` from a bundle, refusing files over `max_bytes`.
pub fn load_profile(app: &Path, max_bytes: u64) -> ProfileLoad {
    let path = app.join(PROFILE_FILE_NAME);
    let size = match fs::metadata(&path) {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return ProfileLoad::Missing,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ProfileLoad::Missing,
        Err(e) => return ProfileLoad::Unreadable(e.to_string()),
    };
    if size > max_bytes {
        debug!(size, limit = max_bytes, "provisioning profile over ceiling");
        return ProfileLoad::TooLarge {
            size,
            limit: max_bytes,
        };
    }

    match fs::read(&path) {
        Ok(data) => match parse_profile(&data) {
            Some(profile) => ProfileLoad::Loaded(Box::new(profile)),
            None => ProfileLoad::Unreadable("no property list found".to_string()),
        },
        Err(e) => ProfileLoad::Unreadable(e.to_string()),
    }
}
