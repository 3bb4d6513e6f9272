//! IPA inspection.
//!
//! Unpacks an `.ipa` into a temporary directory, finds the `.app` bundle,
//! reads `Info.plist` and the provisioning profile, runs the Mach-O and
//! code-signature readers over the main executable and merges everything
//! into one [`InspectionReport`].
//!
//! Unreadable input, a broken archive or a bundle without `Payload/`, an
//! app or an executable abort the inspection. Everything else degrades into
//! empty fields or entries in the report's warnings.

pub mod access;
pub mod bundle;
pub mod extract;
pub mod inspect;
pub mod integrity;
pub mod profile;
pub mod report;

pub use access::ScopedAccess;
pub use bundle::{BundleInfo, FileInventory};
pub use extract::{ArchiveExtractor, Extraction, SkipReason, SkippedEntry, ZipExtractor};
pub use inspect::{
    inspect_bundle, inspect_ipa, inspect_ipa_async, inspect_ipa_async_with, inspect_ipa_with,
};
pub use integrity::{
    check_extracted, check_integrity, check_integrity_with, IntegrityIssue, IntegrityReport,
    IssueCategory,
};
pub use profile::{ProfileLoad, ProvisioningProfile};
pub use report::{ExecutableInfo, InspectionReport, LIMITATIONS};
