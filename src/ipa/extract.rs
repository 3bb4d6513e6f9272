//! Archive extraction collaborator.

use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::config::DEFAULT_MAX_ENTRY_BYTES;
use crate::error::{IpaScopeError, Result};

const COPY_CHUNK: usize = 64 * 1024;

/// Populates a destination directory with the contents of an archive.
///
/// Implementations should poll `cancel` between entries and return
/// [`IpaScopeError::Cancelled`] once it is set.
pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive: &Path, destination: &Path, cancel: &AtomicBool)
        -> Result<Extraction>;
}

/// What an extraction wrote and what it left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Files written to the destination
    pub files: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl Extraction {
    /// Whether an entry whose path ends in `file_name` was skipped.
    pub fn skipped_file(&self, file_name: &str) -> Option<&SkippedEntry> {
        self.skipped
            .iter()
            .find(|s| s.name.rsplit('/').next() == Some(file_name))
    }

    /// One report line per skipped entry.
    pub fn warnings(&self) -> Vec<String> {
        self.skipped.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The entry name escapes the destination directory
    UnsafePath,
    /// Declared or actual size is over the per-entry limit
    TooLarge { limit: u64 },
}

/// An archive entry that was not written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            SkipReason::UnsafePath => {
                write!(f, "Archive entry skipped (unsafe path): {}", self.name)
            }
            SkipReason::TooLarge { limit } => write!(
                f,
                "Archive entry skipped (larger than {} bytes): {}",
                limit, self.name
            ),
        }
    }
}

/// Streaming ZIP extractor.
///
/// Entries are decompressed one at a time straight to disk, so archive size
/// is bounded by disk rather than memory. Entries whose names escape the
/// destination or whose size exceeds the cap are skipped and listed in the
/// returned [`Extraction`]; nothing partial is left behind.
#[derive(Debug, Clone)]
pub struct ZipExtractor {
    max_entry_bytes: u64,
}

impl ZipExtractor {
    pub fn new(max_entry_bytes: u64) -> Self {
        Self { max_entry_bytes }
    }
}

impl Default for ZipExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRY_BYTES)
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        cancel: &AtomicBool,
    ) -> Result<Extraction> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file)?;
        debug!(entries = zip.len(), "extracting archive");

        let mut outcome = Extraction::default();
        for index in 0..zip.len() {
            if cancel.load(Ordering::Relaxed) {
                debug!(index, "extraction cancelled");
                return Err(IpaScopeError::Cancelled);
            }
            let mut entry = zip.by_index(index)?;
            let name = entry.name().to_string();

            let Some(relative) = entry.enclosed_name() else {
                warn!(name = %name, "skipping entry with unsafe path");
                outcome.skipped.push(SkippedEntry {
                    name,
                    reason: SkipReason::UnsafePath,
                });
                continue;
            };
            let out_path = destination.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
                continue;
            }
            let too_large = SkippedEntry {
                name,
                reason: SkipReason::TooLarge {
                    limit: self.max_entry_bytes,
                },
            };
            if entry.size() > self.max_entry_bytes {
                warn!(
                    name = %too_large.name,
                    size = entry.size(),
                    cap = self.max_entry_bytes,
                    "skipping oversized entry"
                );
                outcome.skipped.push(too_large);
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            match copy_entry(&mut entry, &out_path, self.max_entry_bytes, cancel)? {
                Some(_) => outcome.files += 1,
                None => {
                    warn!(name = %too_large.name, "entry larger than its declared size");
                    outcome.skipped.push(too_large);
                }
            }
        }
        Ok(outcome)
    }
}

/// Copy `reader` to `dest` in chunks.
///
/// Returns `None` and removes `dest` if more than `limit` bytes arrive. A
/// set `cancel` flag also removes the partial file.
fn copy_entry(
    reader: &mut impl Read,
    dest: &Path,
    limit: u64,
    cancel: &AtomicBool,
) -> Result<Option<u64>> {
    let mut writer = File::create(dest)?;
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total: u64 = 0;

    loop {
        if cancel.load(Ordering::Relaxed) {
            drop(writer);
            let _ = fs::remove_file(dest);
            return Err(IpaScopeError::Cancelled);
        }
        let n = reader
            .read(&mut buf)
            .map_err(|e| IpaScopeError::Extraction(e.to_string()))?;
        if n == 0 {
            return Ok(Some(total));
        }
        total += n as u64;
        if total > limit {
            drop(writer);
            let _ = fs::remove_file(dest);
            return Ok(None);
        }
        writer.write_all(&buf[..n])?;
    }
}
