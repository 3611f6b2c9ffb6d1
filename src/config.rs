// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of deployment manifests to simplify the process of
//! serialization and deserialization. File I/O is left to the caller to figure
//! out.

use crate::{archive::DEFAULT_CONTENT_ROOT, filter::FilterSpec};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Deployment manifest layout.
///
/// A __deployment manifest__ describes one complete deployment: which package
/// to deploy, where to deploy it, and which parts of it to deploy.
///
/// # General Layout
///
/// Everything lives in the `[package]` table. The `filters` listing is either
/// an array of filter specs, where each element is filter spec text or an
/// inline table with a `path` and an `action`, or a single multi-line string
/// with one filter spec per line.
///
/// ```toml
/// [package]
/// archive = "$HOME/builds/site-content.zip"
/// destination = "~/work/site"
/// filters = [
///     "/apps/site",
///     "!etc/legacy",
///     { path = "/content/dam", action = "delete" },
/// ]
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DeployManifest {
    /// Package deployment settings.
    pub package: PackageSettings,
}

impl FromStr for DeployManifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut manifest: DeployManifest =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        manifest.package.archive = expand_path(&manifest.package.archive)?;
        manifest.package.destination = expand_path(&manifest.package.destination)?;

        Ok(manifest)
    }
}

impl Display for DeployManifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Package deployment settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PackageSettings {
    /// Path to package archive.
    pub archive: PathBuf,

    /// Path to destination tree, which must already exist.
    pub destination: PathBuf,

    /// Name of content root directory inside the package.
    pub content_root: Option<String>,

    /// Keep scratch directory after deployment.
    pub retain_extracted: Option<bool>,

    /// Filter specs selecting what to deploy.
    #[serde(default)]
    pub filters: FilterListing,
}

impl PackageSettings {
    /// Name of content root directory, falling back to the default.
    pub fn content_root(&self) -> &str {
        self.content_root.as_deref().unwrap_or(DEFAULT_CONTENT_ROOT)
    }

    /// Whether scratch directory should be kept.
    pub fn retain_extracted(&self) -> bool {
        self.retain_extracted.unwrap_or(false)
    }
}

/// Listing of filter specs.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FilterListing {
    /// Newline-delimited filter spec text.
    Lines(String),

    /// Array of filter specs.
    Specs(Vec<FilterSpec>),
}

impl FilterListing {
    /// Filter specs in listing order.
    pub fn specs(&self) -> Vec<FilterSpec> {
        match self {
            Self::Lines(text) => FilterSpec::from_lines(text),
            Self::Specs(specs) => specs.clone(),
        }
    }
}

impl Default for FilterListing {
    fn default() -> Self {
        Self::Specs(Vec::new())
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned();

    Ok(PathBuf::from(expanded))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
