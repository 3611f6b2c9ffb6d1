// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Two-phase package synchronization.
//!
//! Deploys the content root of a package into a destination tree according to
//! a listing of filter specs.
//!
//! # Phases
//!
//! Synchronization runs strictly in sequence, awaiting every filesystem
//! operation before starting the next one:
//!
//! 1. __Delete phase__: every delete rule removes `destination/<rule path>`
//!    recursively if it exists.
//! 2. __Copy phase__: every entry below the content root that falls under a
//!    copy rule replaces `destination/<entry path>`. Existing destination
//!    content is removed first, so directories are replaced, never merged.
//!
//! Deletion always finishes before copying starts. Thus, a delete rule and a
//! copy rule can target overlapping trees to clear a subtree and repopulate it
//! in the same run.
//!
//! # Failure Model
//!
//! Only precondition failures are fatal: missing archive, missing destination,
//! malformed filter spec, or a package without content root. A failure to
//! delete or copy a single item is recorded in [`SyncResult::errors`] and the
//! phase moves on. Symbolic links inside a package are never followed nor
//! deployed, each one is recorded as a failed copy instead. Failing to remove
//! the scratch directory afterwards is only reported as a warning.
//!
//! # Idempotence
//!
//! Replace semantics make repeated runs converge. Running the same deployment
//! again against its own result leaves the destination unchanged and yields
//! the same counts. A delete rule whose target is already gone still counts as
//! applied.

pub mod report;

pub use report::{Level, RecordingReporter, Reporter, TracingReporter};

use crate::{
    archive::{ArchiveEntry, ArchiveError, ExtractedPackage, Extractor, Release},
    filter::{
        FilterAction, FilterError, FilterRule, FilterRules, FilterSpec, PathMatcher,
        SegmentMatcher,
    },
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, instrument};

/// Synchronize package content into destination trees.
#[derive(Debug, Default)]
pub struct SyncEngine<R = TracingReporter, M = SegmentMatcher>
where
    R: Reporter,
    M: PathMatcher,
{
    extractor: Extractor,
    matcher: M,
    reporter: R,
}

impl SyncEngine {
    /// Construct new sync engine with default extractor, segment-aware
    /// matching, and reporting through [`tracing`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R, M> SyncEngine<R, M>
where
    R: Reporter,
    M: PathMatcher,
{
    /// Construct new sync engine from its parts.
    pub fn with_parts(extractor: Extractor, matcher: M, reporter: R) -> Self {
        Self {
            extractor,
            matcher,
            reporter,
        }
    }

    /// Use different package extractor.
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Use different reporter.
    pub fn with_reporter<T>(self, reporter: T) -> SyncEngine<T, M>
    where
        T: Reporter,
    {
        SyncEngine {
            extractor: self.extractor,
            matcher: self.matcher,
            reporter,
        }
    }

    /// Package extractor in use.
    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Synchronize package content into destination tree.
    ///
    /// Scratch directory is removed afterwards unless `retain_extracted` is
    /// set, in which case its path is handed back through
    /// [`SyncResult::retained_dir`].
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::ArchiveNotFound`] if archive does not exist.
    /// - Return [`SyncError::MissingProjectPath`] if destination is not an
    ///   existing directory.
    /// - Return [`SyncError::Filter`] if any filter spec is malformed.
    /// - Return [`SyncError::Archive`] if package cannot be extracted, or has
    ///   no content root.
    #[instrument(skip_all, level = "debug")]
    pub async fn sync(
        &self,
        archive_path: impl AsRef<Path>,
        destination: impl AsRef<Path>,
        specs: &[FilterSpec],
        retain_extracted: bool,
    ) -> Result<SyncResult> {
        let archive_path = archive_path.as_ref();
        let destination = destination.as_ref();

        if !archive_path.is_file() {
            return Err(SyncError::ArchiveNotFound {
                archive_path: archive_path.to_path_buf(),
            });
        }

        if !destination.is_dir() {
            return Err(SyncError::MissingProjectPath {
                destination: destination.to_path_buf(),
            });
        }

        let rules = FilterRules::parse(specs)?;
        if rules.is_empty() {
            self.reporter.warn("no filter rules given, nothing will be deployed");
        }

        let package = self.extractor.extract(archive_path).await?;
        debug!(
            "content root of {:?} is at {:?}",
            archive_path.display(),
            package.content_root().display()
        );

        let mut result = SyncResult::default();
        self.delete_phase(destination, rules.delete_rules(), &mut result)
            .await;
        self.copy_phase(&package, destination, rules.copy_rules(), &mut result)
            .await;

        match package.release(retain_extracted) {
            Ok(Release::Removed(path)) => {
                self.reporter
                    .info(&format!("cleaned up scratch directory {:?}", path.display()));
            }
            Ok(Release::Retained(path)) => {
                self.reporter
                    .info(&format!("kept scratch directory {:?}", path.display()));
                result.retained_dir = Some(path);
            }
            Err(error) => {
                self.reporter
                    .warn(&format!("{error}: {}", source_message(&error)));
            }
        }

        self.reporter.info(&format!(
            "copied {} file(s) and applied {} delete rule(s) from {:?} into {:?}",
            result.copied_count,
            result.deleted_count,
            archive_path.display(),
            destination.display()
        ));

        Ok(result)
    }

    async fn delete_phase(
        &self,
        destination: &Path,
        rules: &[FilterRule],
        result: &mut SyncResult,
    ) {
        for rule in rules {
            let target = destination.join(rule.pattern());
            match remove_path(&target).await {
                Ok(true) => {
                    result.deleted_count += 1;
                    self.reporter
                        .info(&format!("deleted {:?}", target.display()));
                }
                Ok(false) => {
                    result.deleted_count += 1;
                    self.reporter
                        .info(&format!("nothing to delete at {:?}", target.display()));
                }
                Err(error) => {
                    self.record(result, ItemError::new(target, FilterAction::Delete, &error));
                }
            }
        }
    }

    async fn copy_phase(
        &self,
        package: &ExtractedPackage,
        destination: &Path,
        rules: &[FilterRule],
        result: &mut SyncResult,
    ) {
        if rules.is_empty() {
            return;
        }

        for entry in package.entries() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    let item = ItemError::new(package.content_root(), FilterAction::Copy, &error);
                    self.record(result, item);
                    continue;
                }
            };

            let Some(rule) = self.matcher.first_match(&entry.relative_path, rules) else {
                debug!("skip {:?}, no copy rule matches", entry.relative_path);
                continue;
            };

            let target = destination.join(&entry.relative_path);

            // INVARIANT: Links may point anywhere on the host, never deploy them.
            if entry.is_symlink {
                let item = ItemError::new(target, FilterAction::Copy, &SKIPPED_SYMLINK);
                self.record(result, item);
                continue;
            }

            match replace_entry(&entry, &target).await {
                Ok(()) if entry.is_dir => {
                    debug!("recreated {:?} by rule {rule}", target.display());
                }
                Ok(()) => {
                    result.copied_count += 1;
                    self.reporter.info(&format!(
                        "copied {:?} to {:?}",
                        entry.relative_path,
                        target.display()
                    ));
                }
                Err(error) => {
                    self.record(result, ItemError::new(target, FilterAction::Copy, &error));
                }
            }
        }
    }

    fn record(&self, result: &mut SyncResult, item: ItemError) {
        self.reporter.error(&item.to_string());
        result.errors.push(item);
    }
}

const SKIPPED_SYMLINK: &str = "symbolic links in packages are not deployed";

/// Remove file or directory tree, reporting whether anything was there.
async fn remove_path(path: &Path) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path).await?;
    } else {
        fs::remove_file(path).await?;
    }

    Ok(true)
}

/// Replace destination path with archive entry.
///
/// Directories are replaced by a fresh empty directory. Their content follows
/// as separate entries of the pre-order walk.
async fn replace_entry(entry: &ArchiveEntry, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }

    remove_path(target).await?;

    if entry.is_dir {
        fs::create_dir(target).await
    } else {
        fs::copy(&entry.source_path, target).await.map(|_| ())
    }
}

fn source_message(error: &dyn std::error::Error) -> String {
    error
        .source()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown cause".into())
}

/// Outcome of a synchronization.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncResult {
    /// Files written into destination tree.
    pub copied_count: usize,

    /// Delete rules applied, including those whose target was already gone.
    pub deleted_count: usize,

    /// Items that failed, in the order they failed.
    pub errors: Vec<ItemError>,

    /// Scratch directory left on disk on request.
    pub retained_dir: Option<PathBuf>,
}

impl SyncResult {
    /// Check if every item went through without error.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Failure of one delete or copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    /// Path that could not be processed.
    pub path: PathBuf,

    /// Action that was attempted.
    pub action: FilterAction,

    /// Description of what went wrong.
    pub message: String,
}

impl ItemError {
    fn new(path: impl Into<PathBuf>, action: FilterAction, error: &dyn Display) -> Self {
        Self {
            path: path.into(),
            action,
            message: error.to_string(),
        }
    }
}

impl Display for ItemError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "failed to {} {:?}: {}",
            self.action,
            self.path.display(),
            self.message
        )
    }
}

/// Fatal synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Archive does not exist.
    #[error("archive {:?} does not exist", archive_path.display())]
    ArchiveNotFound { archive_path: PathBuf },

    /// Destination tree does not exist.
    #[error("project path {:?} does not exist", destination.display())]
    MissingProjectPath { destination: PathBuf },

    /// Filter spec is malformed.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Package cannot be extracted.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
