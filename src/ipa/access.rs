//! Scoped access to the user-supplied input file.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IpaScopeError, Result};

/// Guard proving the input file was readable when inspection started.
///
/// Acquired before any temporary state is created and released on drop, so
/// it brackets the whole inspection on success, failure and unwinding.
#[derive(Debug)]
pub struct ScopedAccess {
    path: PathBuf,
    size: u64,
}

impl ScopedAccess {
    /// Open `path` for reading and record its size.
    pub fn acquire(path: &Path) -> Result<Self> {
        let unreadable = |source: io::Error| IpaScopeError::UnreadableInput {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(unreadable)?;
        let metadata = file.metadata().map_err(unreadable)?;
        if !metadata.is_file() {
            return Err(unreadable(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        debug!(path = %path.display(), size = metadata.len(), "input access acquired");
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for ScopedAccess {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "input access released");
    }
}
