// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Lazy walk over unpacked package content.

use ignore::{Walk, WalkBuilder};
use std::path::{Path, PathBuf};

/// File or directory found below a content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path relative to content root, always `/` separated.
    pub relative_path: String,

    /// Absolute path of entry inside scratch directory.
    pub source_path: PathBuf,

    /// Entry is a directory.
    pub is_dir: bool,

    /// Entry is a symbolic link. Links are never followed, so a link to a
    /// directory is not a directory entry.
    pub is_symlink: bool,
}

/// Depth-first, pre-order sequence of entries below a content root.
///
/// Directories are always yielded before their children, and siblings are
/// yielded in file name order. The content root itself is skipped. Nothing is
/// filtered out, hidden files and ignore files included.
pub struct Entries {
    root: PathBuf,
    walk: Walk,
}

impl Entries {
    /// Start new walk at content root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let walk = WalkBuilder::new(&root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|left, right| left.cmp(right))
            .build();

        Self { root, walk }
    }
}

impl Iterator for Entries {
    type Item = Result<ArchiveEntry, EntryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(error) => return Some(Err(error.into())),
            };

            // INVARIANT: Content root is not an entry of itself.
            if entry.depth() == 0 {
                continue;
            }

            let Some(relative_path) = relative_path(&self.root, entry.path()) else {
                return Some(Err(EntryError::OutsideRoot {
                    path: entry.path().to_path_buf(),
                }));
            };

            let kind = entry.file_type();
            return Some(Ok(ArchiveEntry {
                relative_path,
                is_dir: kind.is_some_and(|kind| kind.is_dir()),
                is_symlink: kind.is_some_and(|kind| kind.is_symlink()),
                source_path: entry.into_path(),
            }));
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>();

    Some(segments.join("/"))
}

/// Entry walk error types.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    /// Directory walk fails.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Walk produced entry outside of content root.
    #[error("entry {:?} is outside of content root", path.display())]
    OutsideRoot { path: PathBuf },
}
