//! Typed property-list values.
//!
//! Info.plist, entitlements blobs and provisioning profiles are decoded into
//! [`PlistValue`], a closed set of variants, so consumers match on the shape
//! instead of probing an untyped value.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{IpaScopeError, Result};

const BINARY_MAGIC: &[u8] = b"bplist00";

/// String-keyed dictionary of property-list values.
pub type PlistDictionary = BTreeMap<String, PlistValue>;

/// A decoded property-list value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlistValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Date(DateTime<Utc>),
    Data(Vec<u8>),
    Array(Vec<PlistValue>),
    Dictionary(PlistDictionary),
}

impl PlistValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PlistValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PlistValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            PlistValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PlistValue]> {
        match self {
            PlistValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&PlistDictionary> {
        match self {
            PlistValue::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Strings of an array value, skipping non-string members.
    pub fn string_items(&self) -> Vec<String> {
        self.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<plist::Value> for PlistValue {
    fn from(value: plist::Value) -> Self {
        match value {
            plist::Value::String(s) => PlistValue::String(s),
            plist::Value::Boolean(b) => PlistValue::Boolean(b),
            // Unsigned values beyond i64 keep their magnitude as a real.
            plist::Value::Integer(i) => match (i.as_signed(), i.as_unsigned()) {
                (Some(v), _) => PlistValue::Integer(v),
                (None, Some(u)) => PlistValue::Real(u as f64),
                (None, None) => PlistValue::Integer(0),
            },
            plist::Value::Real(r) => PlistValue::Real(r),
            plist::Value::Date(d) => PlistValue::Date(DateTime::<Utc>::from(SystemTime::from(d))),
            plist::Value::Data(bytes) => PlistValue::Data(bytes),
            plist::Value::Array(items) => {
                PlistValue::Array(items.into_iter().map(PlistValue::from).collect())
            }
            plist::Value::Dictionary(dict) => PlistValue::Dictionary(
                dict.into_iter()
                    .map(|(k, v)| (k, PlistValue::from(v)))
                    .collect(),
            ),
            plist::Value::Uid(uid) => PlistValue::Integer(uid.get() as i64),
            #[allow(unreachable_patterns)]
            _ => PlistValue::Data(Vec::new()),
        }
    }
}

/// Decode an XML or binary property list.
///
/// Anything without the `bplist00` magic is read as XML; the OpenStep text
/// format is not accepted.
pub fn decode(bytes: &[u8]) -> Result<PlistValue> {
    let value = if bytes.starts_with(BINARY_MAGIC) {
        plist::Value::from_reader(Cursor::new(bytes))
    } else {
        plist::Value::from_reader_xml(Cursor::new(bytes))
    };
    value
        .map(PlistValue::from)
        .map_err(|e| IpaScopeError::Plist(e.to_string()))
}

/// Decode a property list whose root must be a dictionary.
pub fn decode_dictionary(bytes: &[u8]) -> Option<PlistDictionary> {
    match decode(bytes).ok()? {
        PlistValue::Dictionary(dict) => Some(dict),
        _ => None,
    }
}
