// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use jcrsync::{
    DeployManifest, Extractor, FilterSpec, SyncEngine, SyncResult, DEFAULT_CONTENT_ROOT,
};

use anyhow::{Context, Result};
use clap::Parser;
use std::{fs::read_to_string, path::PathBuf, process::exit};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Deploy selected parts of a content package into a project tree.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  jcrsync [options] <archive> <destination> <filter>...\n  jcrsync [options] --manifest <file>",
    version
)]
struct Cli {
    /// Path to content package archive.
    #[arg(value_name = "archive", required_unless_present = "manifest")]
    pub archive: Option<PathBuf>,

    /// Path to existing destination tree.
    #[arg(value_name = "destination", required_unless_present = "manifest")]
    pub destination: Option<PathBuf>,

    /// Filter specs, e.g., "/apps/site", "!etc/legacy", or '<filter root="/apps/site"/>'.
    #[arg(value_name = "filter", required_unless_present = "manifest")]
    pub filters: Vec<String>,

    /// Read deployment from manifest file instead.
    #[arg(
        short,
        long,
        value_name = "file",
        conflicts_with_all = ["archive", "destination", "filters"]
    )]
    pub manifest: Option<PathBuf>,

    /// Keep scratch directory holding the unpacked package.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Name of content root directory inside the package.
    #[arg(long, value_name = "name")]
    pub content_root: Option<String>,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let deployment = Deployment::try_from(self)?;
        let engine = SyncEngine::new()
            .with_extractor(Extractor::new().with_content_root(deployment.content_root.as_str()));
        debug!(
            "deploy {:?} into {:?} from content root {:?}",
            deployment.archive.display(),
            deployment.destination.display(),
            engine.extractor().content_root()
        );
        let result = engine
            .sync(
                &deployment.archive,
                &deployment.destination,
                &deployment.specs,
                deployment.retain_extracted,
            )
            .await?;

        if let Some(dir) = &result.retained_dir {
            info!("unpacked package kept at {:?}", dir.display());
        }

        let (headline, failures) = summarize(&result);
        if failures.is_empty() {
            info!("{headline}");
        } else {
            warn!("{headline}");
            for failure in failures {
                warn!("{failure}");
            }
        }

        Ok(())
    }
}

/// Summary line of a deployment, plus one line per failed item.
fn summarize(result: &SyncResult) -> (String, Vec<String>) {
    let headline = if result.is_clean() {
        format!(
            "deployment done: {} copied, {} deleted",
            result.copied_count, result.deleted_count
        )
    } else {
        format!(
            "deployment done with {} failure(s): {} copied, {} deleted",
            result.errors.len(),
            result.copied_count,
            result.deleted_count
        )
    };
    let failures = result.errors.iter().map(ToString::to_string).collect();

    (headline, failures)
}

/// Fully resolved deployment request.
#[derive(Debug, Clone)]
struct Deployment {
    archive: PathBuf,
    destination: PathBuf,
    specs: Vec<FilterSpec>,
    content_root: String,
    retain_extracted: bool,
}

impl TryFrom<Cli> for Deployment {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self> {
        if let Some(path) = cli.manifest {
            let data = read_to_string(&path)
                .with_context(|| format!("failed to read manifest {:?}", path.display()))?;
            let manifest: DeployManifest = data
                .parse()
                .with_context(|| format!("failed to parse manifest {:?}", path.display()))?;
            let package = manifest.package;

            return Ok(Self {
                content_root: cli
                    .content_root
                    .unwrap_or_else(|| package.content_root().to_owned()),
                retain_extracted: cli.no_cleanup || package.retain_extracted(),
                specs: package.filters.specs(),
                archive: package.archive,
                destination: package.destination,
            });
        }

        Ok(Self {
            archive: cli.archive.context("missing archive path")?,
            destination: cli.destination.context("missing destination path")?,
            specs: cli.filters.iter().flat_map(FilterSpec::from_lines).collect(),
            content_root: cli.content_root.unwrap_or_else(|| DEFAULT_CONTENT_ROOT.into()),
            retain_extracted: cli.no_cleanup,
        })
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}
