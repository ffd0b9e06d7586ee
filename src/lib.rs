// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version-control layer of repoview.
//!
//! Repoview presents working copies registered by the user. Underneath the
//! presentation sits this crate: it runs the Git executable as a subprocess,
//! parses its output into commits, branches, changed files, and diffs, works
//! out whether local history already reached the remote, and sequences
//! multi-step synchronization like stage, commit, then push.
//!
//! # Layers
//!
//! Data flows one direction. Output flows back up, parsed into richer
//! structures at each layer.
//!
//! 1. [`process`]: spawn Git with an argument vector, capture stdout.
//! 2. [`repo`]: one method per Git intent, parsed into [`repo::model`].
//! 3. [`sync::state`]: decide whether commits are synced with the remote.
//! 4. [`sync`]: sequence steps, report exactly where a failure happened.
//!
//! [`ssh`] rewrites remote URLs whose host needs a custom SSH port, and
//! [`store`] keeps the list of registered projects for the binary.
//!
//! # Threading
//!
//! Every operation is synchronous and blocks until Git exits. Nothing is
//! shared between calls, so operations are safe to call from any thread.
//! Serializing writes to the same working copy is up to the caller.

pub mod config;
pub mod path;
pub mod process;
pub mod repo;
pub mod ssh;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, Identity};
pub use process::{CancelToken, GitCommand, ProcessError, ProcessRunner, SystemRunner};
pub use repo::{
    diff::{DiffBlock, DiffLine},
    is_repository,
    model::{Branch, ChangeKind, ChangedFile, Commit, Project, RemoteUrl},
    RepoError, RepositoryClient,
};
pub use ssh::SshConfig;
pub use store::ProjectStore;
pub use sync::{
    state::{SyncPolicy, SyncState, SyncStateEvaluator},
    Phase, Step, StepFailure, SyncOrchestrator,
};
