//! Static inspection of iOS app archives.
//!
//! [`formats::macho`] reads Mach-O headers and load commands,
//! [`formats::codesign`] reads embedded code-signature SuperBlobs, and
//! [`ipa`] ties them together with Info.plist and provisioning-profile
//! decoding into a single report. Nothing is executed, linked or verified
//! cryptographically; malformed input yields partial results, not panics.

/// Inspection configuration
pub mod config;
/// Error types
pub mod error;
/// Mach-O and code-signature readers
pub mod formats;
/// IPA inspection workflow and integrity checks
pub mod ipa;
/// Tracing subscriber setup
pub mod logging;
/// Typed property-list values
pub mod property_list;
/// Async timeout helpers
pub mod timeout;

pub use config::InspectConfig;
pub use error::{IpaScopeError, Result};
pub use formats::codesign::{analyze_signature, CodeDirectoryFlags, SignatureInfo};
pub use formats::macho::{analyze, BinaryInfo, SegmentInfo};
pub use ipa::{check_integrity, inspect_ipa, inspect_ipa_async, InspectionReport, IntegrityReport};
pub use property_list::PlistValue;
