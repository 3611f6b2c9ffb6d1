// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Scratch directory lifecycle.
//!
//! Packages are unpacked into a __scratch directory__ that lives only for one
//! deployment. Every scratch directory gets a fresh unique name made of a
//! millisecond timestamp plus a random suffix, so concurrent deployments next
//! to the same archive never collide, and an existing directory is never
//! reused.
//!
//! Removal is guaranteed on every exit path. Explicit [`ScratchDir::release`]
//! reports removal failures as [`CleanupError`]. Any other exit path, e.g., an
//! early return through `?`, falls back to removal on drop.

use std::{
    io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tempfile::{Builder, TempDir};
use tracing::{debug, warn};

/// Name prefix of every scratch directory.
pub const SCRATCH_PREFIX: &str = "temp_extract_";

/// Uniquely named, self-removing scratch directory.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create new scratch directory inside parent directory.
    ///
    /// # Errors
    ///
    /// - Return [`ScratchError`] if directory cannot be created.
    pub fn acquire(parent: impl AsRef<Path>) -> Result<Self, ScratchError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let prefix = format!("{SCRATCH_PREFIX}{millis}_");

        let dir = Builder::new()
            .prefix(&prefix)
            .tempdir_in(parent.as_ref())
            .map_err(|source| ScratchError {
                source,
                parent: parent.as_ref().to_path_buf(),
            })?;
        debug!("acquired scratch directory {:?}", dir.path().display());

        Ok(Self { dir })
    }

    /// Path to scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Release scratch directory.
    ///
    /// Removes scratch directory with all of its content unless `retain` is
    /// set, in which case the directory is left on disk for the caller.
    ///
    /// # Errors
    ///
    /// - Return [`CleanupError`] if scratch directory cannot be removed.
    pub fn release(self, retain: bool) -> Result<Release, CleanupError> {
        if retain {
            return Ok(Release::Retained(self.dir.keep()));
        }

        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|source| CleanupError {
            source,
            path: path.clone(),
        })?;

        Ok(Release::Removed(path))
    }

    /// Remove scratch directory, logging instead of failing.
    pub(crate) fn discard(self) {
        if let Err(error) = self.release(false) {
            warn!("{error}");
        }
    }
}

/// Outcome of releasing a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// Scratch directory was removed.
    Removed(PathBuf),

    /// Scratch directory was kept on request.
    Retained(PathBuf),
}

/// Scratch directory cannot be created.
#[derive(Debug, thiserror::Error)]
#[error("failed to create scratch directory in {:?}", parent.display())]
pub struct ScratchError {
    #[source]
    source: io::Error,
    parent: PathBuf,
}

/// Scratch directory cannot be removed.
///
/// Recoverable: report it as a warning, never as a failed deployment.
#[derive(Debug, thiserror::Error)]
#[error("failed to remove scratch directory {:?}", path.display())]
pub struct CleanupError {
    #[source]
    source: io::Error,
    path: PathBuf,
}

impl CleanupError {
    /// Path of scratch directory left behind.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}
