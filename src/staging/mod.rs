//! Local staging area for module archives.
//!
//! Archives are written to disk before they are hashed and pushed. Each
//! publish gets its own uniquely named file, and the [`StagedFile`] guard
//! removes it when dropped, whichever way the publish ends.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{RegistryError, Result};

/// Directory where archives are staged before upload.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create a staging area rooted at the given directory.
    ///
    /// The directory must already exist and be writable.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Staging area in the system temporary directory.
    pub fn system_temp() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Get the staging root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy an archive stream into a fresh staged file.
    pub fn stage(&self, data: &mut dyn Read) -> Result<StagedFile> {
        let mut file = tempfile::Builder::new()
            .prefix("module-")
            .suffix(".tgz")
            .tempfile_in(&self.root)
            .map_err(|e| {
                RegistryError::staging(format!(
                    "cannot create staging file in {}: {}",
                    self.root.display(),
                    e
                ))
            })?;

        let size = io::copy(data, &mut file)
            .and_then(|size| file.flush().map(|_| size))
            .map_err(|e| {
                RegistryError::staging(format!(
                    "cannot write archive to {}: {}",
                    file.path().display(),
                    e
                ))
            })?;

        tracing::debug!("Staged {} bytes at {}", size, file.path().display());

        Ok(StagedFile { file, size })
    }
}

/// A staged archive, deleted from disk when dropped.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    size: u64,
}

impl StagedFile {
    /// Path of the staged file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of bytes staged.
    pub fn size(&self) -> u64 {
        self.size
    }
}
