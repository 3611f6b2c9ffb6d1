// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use jcrsync::archive::{scratch::SCRATCH_PREFIX, Entries};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use zip::{write::SimpleFileOptions, ZipWriter};

/// Snapshot of a directory tree: relative path to file content, `None` for
/// directories.
pub(crate) type TreeSnapshot = BTreeMap<String, Option<String>>;

pub(crate) struct PackageFixture {
    root: TempDir,
    archive: PathBuf,
    project: PathBuf,
}

impl PackageFixture {
    /// Build package archive and empty project directory.
    ///
    /// Names ending with `/` become directory entries, everything else becomes
    /// a file entry with given contents.
    pub(crate) fn new(entries: &[(&str, &str)]) -> Result<Self> {
        let root = tempfile::tempdir()?;
        let archive = root.path().join("package.zip");
        let project = root.path().join("project");
        fs::create_dir_all(&project)?;
        write_package(&archive, entries, &[])?;

        Ok(Self {
            root,
            archive,
            project,
        })
    }

    /// Rebuild package archive, adding symbolic link entries that point at
    /// given targets.
    pub(crate) fn repack(&self, entries: &[(&str, &str)], links: &[(&str, &Path)]) -> Result<()> {
        write_package(&self.archive, entries, links)
    }

    pub(crate) fn archive(&self) -> &Path {
        self.archive.as_path()
    }

    pub(crate) fn project(&self) -> &Path {
        self.project.as_path()
    }

    /// Add a second, independent project directory.
    pub(crate) fn new_project(&self, name: impl AsRef<Path>) -> Result<PathBuf> {
        let project = self.root.path().join(name);
        fs::create_dir_all(&project)?;

        Ok(project)
    }

    pub(crate) fn write_project_file(
        &self,
        path: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<()> {
        let path = self.project.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents.as_ref())?;

        Ok(())
    }

    pub(crate) fn project_tree(&self) -> Result<TreeSnapshot> {
        snapshot(&self.project)
    }

    /// Scratch directories currently left next to the archive.
    pub(crate) fn scratch_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(self.root.path())? {
            let path = entry?.path();
            let is_scratch = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(SCRATCH_PREFIX));
            if is_scratch {
                dirs.push(path);
            }
        }

        Ok(dirs)
    }
}

fn write_package(
    archive: &Path,
    entries: &[(&str, &str)],
    links: &[(&str, &Path)],
) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(archive)?);
    for (name, contents) in entries {
        // INVARIANT: Trailing slash means directory entry.
        if name.ends_with('/') {
            writer.add_directory(*name, SimpleFileOptions::default())?;
        } else {
            writer.start_file(*name, SimpleFileOptions::default())?;
            writer.write_all(contents.as_bytes())?;
        }
    }

    for (name, target) in links {
        let target = target.to_string_lossy().into_owned();
        writer.add_symlink(*name, target, SimpleFileOptions::default())?;
    }
    writer.finish()?;

    Ok(())
}

pub(crate) fn snapshot(root: impl AsRef<Path>) -> Result<TreeSnapshot> {
    let mut tree = TreeSnapshot::new();
    for entry in Entries::new(root.as_ref()) {
        let entry = entry?;
        let contents = if entry.is_dir {
            None
        } else {
            Some(fs::read_to_string(&entry.source_path)?)
        };
        tree.insert(entry.relative_path, contents);
    }

    Ok(tree)
}
