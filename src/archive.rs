// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content package extraction.
//!
//! A __content package__ is a zip archive whose payload lives below one fixed
//! top-level directory called the __content root__ (`jcr_root` by default).
//! Anything else in the archive, e.g., package metadata under `META-INF`, is
//! unpacked along with it but never looked at.
//!
//! Extraction always happens inside a fresh [`ScratchDir`]. The archive is
//! unpacked on the blocking thread pool, after which the content root is
//! located. A package without a content root is useless, so its scratch
//! directory is removed right away before [`ArchiveError::ContentRootMissing`]
//! is returned.

pub mod entries;
pub mod scratch;

pub use entries::{ArchiveEntry, Entries, EntryError};
pub use scratch::{CleanupError, Release, ScratchDir, ScratchError};

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tokio::task;
use tracing::{debug, instrument};
use zip::{result::ZipError, ZipArchive};

/// Default name of content root directory.
pub const DEFAULT_CONTENT_ROOT: &str = "jcr_root";

/// Extract content packages into scratch directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractor {
    content_root: String,
    scratch_parent: Option<PathBuf>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            content_root: DEFAULT_CONTENT_ROOT.into(),
            scratch_parent: None,
        }
    }
}

impl Extractor {
    /// Construct new extractor using default content root.
    ///
    /// Scratch directories are placed next to the archive being extracted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use different content root directory name.
    pub fn with_content_root(mut self, name: impl Into<String>) -> Self {
        self.content_root = name.into();
        self
    }

    /// Place scratch directories inside given directory.
    pub fn with_scratch_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_parent = Some(dir.into());
        self
    }

    /// Name of content root directory.
    pub fn content_root(&self) -> &str {
        self.content_root.as_str()
    }

    /// Directory that scratch directories for target archive go into.
    pub fn scratch_parent(&self, archive_path: impl AsRef<Path>) -> PathBuf {
        match &self.scratch_parent {
            Some(dir) => dir.clone(),
            None => archive_path
                .as_ref()
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        }
    }

    /// Extract package and locate its content root.
    ///
    /// # Errors
    ///
    /// - Return [`ArchiveError::NotFound`] if archive does not exist.
    /// - Return [`ArchiveError::Scratch`] if scratch directory cannot be
    ///   created.
    /// - Return [`ArchiveError::Open`] or [`ArchiveError::Unpack`] if archive
    ///   cannot be read.
    /// - Return [`ArchiveError::ContentRootMissing`] if unpacked archive has no
    ///   content root. Scratch directory is already gone by then.
    #[instrument(skip(self, archive_path), level = "debug")]
    pub async fn extract(&self, archive_path: impl AsRef<Path>) -> Result<ExtractedPackage> {
        let archive_path = archive_path.as_ref().to_path_buf();
        if !archive_path.is_file() {
            return Err(ArchiveError::NotFound { archive_path });
        }

        let scratch = ScratchDir::acquire(self.scratch_parent(&archive_path))?;
        debug!(
            "unpack {:?} into {:?}",
            archive_path.display(),
            scratch.path().display()
        );

        let source = archive_path.clone();
        let target = scratch.path().to_path_buf();
        task::spawn_blocking(move || unpack(&source, &target)).await??;

        let content_root = scratch.path().join(&self.content_root);
        if !content_root.is_dir() {
            scratch.discard();
            return Err(ArchiveError::ContentRootMissing {
                content_root: self.content_root.clone(),
                archive_path,
            });
        }

        Ok(ExtractedPackage {
            scratch,
            content_root,
        })
    }
}

fn unpack(archive_path: &Path, target: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|source| ArchiveError::Open {
        source,
        archive_path: archive_path.to_path_buf(),
    })?;

    // INVARIANT: Entries that would escape the scratch directory are never
    //            written, the zip crate only extracts enclosed names.
    ZipArchive::new(BufReader::new(file))
        .and_then(|mut archive| archive.extract(target))
        .map_err(|source| ArchiveError::Unpack {
            source,
            archive_path: archive_path.to_path_buf(),
        })
}

/// Unpacked content package.
///
/// Owns the scratch directory holding the unpacked archive. Dropping it
/// removes the scratch directory.
#[derive(Debug)]
pub struct ExtractedPackage {
    scratch: ScratchDir,
    content_root: PathBuf,
}

impl ExtractedPackage {
    /// Absolute path to content root.
    pub fn content_root(&self) -> &Path {
        self.content_root.as_path()
    }

    /// Scratch directory holding the unpacked archive.
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Walk all entries below content root.
    ///
    /// Each call starts a new walk.
    pub fn entries(&self) -> Entries {
        Entries::new(&self.content_root)
    }

    /// Release scratch directory.
    ///
    /// # Errors
    ///
    /// - Return [`CleanupError`] if scratch directory cannot be removed.
    pub fn release(self, retain: bool) -> Result<Release, CleanupError> {
        self.scratch.release(retain)
    }
}

/// Package extraction error types.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Archive does not exist.
    #[error("archive {:?} does not exist", archive_path.display())]
    NotFound { archive_path: PathBuf },

    /// Scratch directory cannot be created.
    #[error(transparent)]
    Scratch(#[from] ScratchError),

    /// Archive cannot be opened.
    #[error("failed to open archive {:?}", archive_path.display())]
    Open {
        #[source]
        source: std::io::Error,
        archive_path: PathBuf,
    },

    /// Archive cannot be unpacked.
    #[error("failed to unpack archive {:?}", archive_path.display())]
    Unpack {
        #[source]
        source: ZipError,
        archive_path: PathBuf,
    },

    /// Unpacking task did not run to completion.
    #[error(transparent)]
    Join(#[from] task::JoinError),

    /// Unpacked archive lacks content root.
    #[error("archive {:?} has no {content_root:?} directory", archive_path.display())]
    ContentRootMissing {
        content_root: String,
        archive_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{fs, io::Write};
    use zip::{write::SimpleFileOptions, ZipWriter};

    fn write_package(path: &Path, files: &[(&str, &str)]) -> anyhow::Result<()> {
        let mut writer = ZipWriter::new(File::create(path)?);
        for (name, contents) in files {
            writer.start_file(*name, SimpleFileOptions::default())?;
            writer.write_all(contents.as_bytes())?;
        }
        writer.finish()?;

        Ok(())
    }

    fn scratch_dirs(parent: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(parent)? {
            let path = entry?.path();
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            if name.starts_with(scratch::SCRATCH_PREFIX) {
                dirs.push(path);
            }
        }

        Ok(dirs)
    }

    #[tokio::test]
    async fn extract_locates_content_root() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("package.zip");
        write_package(
            &archive,
            &[
                ("META-INF/vault/filter.xml", "<workspaceFilter/>"),
                ("jcr_root/apps/x/a.txt", "a"),
            ],
        )?;

        let package = Extractor::new().extract(&archive).await?;
        assert_eq!(package.content_root(), package.scratch_path().join("jcr_root"));
        assert_eq!(
            fs::read_to_string(package.content_root().join("apps/x/a.txt"))?,
            "a"
        );
        assert_eq!(package.scratch_path().parent(), Some(dir.path()));

        let scratch = package.scratch_path().to_path_buf();
        package.release(false)?;
        assert!(!scratch.exists());

        Ok(())
    }

    #[tokio::test]
    async fn extract_with_custom_content_root_and_scratch_parent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let scratch_parent = tempfile::tempdir()?;
        let archive = dir.path().join("package.zip");
        write_package(&archive, &[("payload/a.txt", "a")])?;

        let extractor = Extractor::new()
            .with_content_root("payload")
            .with_scratch_parent(scratch_parent.path());
        assert_eq!(extractor.content_root(), "payload");

        let package = extractor.extract(&archive).await?;
        assert_eq!(package.scratch_path().parent(), Some(scratch_parent.path()));
        assert_eq!(package.entries().count(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn extract_missing_archive() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = Extractor::new().extract(dir.path().join("nope.zip")).await;
        assert!(matches!(result, Err(ArchiveError::NotFound { .. })));
        assert!(scratch_dirs(dir.path())?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn extract_without_content_root_removes_scratch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("package.zip");
        write_package(&archive, &[("apps/x/a.txt", "a")])?;

        let result = Extractor::new().extract(&archive).await;
        assert!(matches!(result, Err(ArchiveError::ContentRootMissing { .. })));
        assert!(scratch_dirs(dir.path())?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn extract_corrupt_archive_removes_scratch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("package.zip");
        fs::write(&archive, "definitely not a zip archive")?;

        let result = Extractor::new().extract(&archive).await;
        assert!(matches!(result, Err(ArchiveError::Unpack { .. })));
        assert!(scratch_dirs(dir.path())?.is_empty());

        Ok(())
    }

    #[test]
    fn scratch_parent_defaults_to_archive_dir() {
        let extractor = Extractor::new();
        assert_eq!(
            extractor.scratch_parent("/tmp/builds/package.zip"),
            PathBuf::from("/tmp/builds")
        );
        assert_eq!(extractor.scratch_parent("package.zip"), PathBuf::from("."));
    }
}
