// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Selective content package deployment.
//!
//! A __content package__ is a zip archive whose payload lives below a fixed
//! top-level directory, the __content root__. Jcrsync unpacks such a package
//! into a scratch directory, and then synchronizes a subset of its content root
//! into an existing destination tree, e.g., a project checkout.
//!
//! What gets deployed is decided by a listing of __filter specs__. Each spec
//! names a subtree and whether that subtree should be copied from the package
//! or deleted from the destination. Deployment always replaces, never merges,
//! so running the same deployment twice converges to the same tree.
//!
//! # See Also
//!
//! 1. [`filter`] for the filter spec grammar and matching rules.
//! 2. [`sync`] for the delete-then-copy algorithm.
//! 3. [`config`] for deployment manifests.

pub mod archive;
pub mod config;
pub mod filter;
pub mod sync;

pub use archive::{Extractor, DEFAULT_CONTENT_ROOT};
pub use config::DeployManifest;
pub use filter::{FilterAction, FilterRule, FilterRules, FilterSpec};
pub use sync::{ItemError, Reporter, SyncEngine, SyncError, SyncResult, TracingReporter};
