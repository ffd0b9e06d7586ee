// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sync state of commits.
//!
//! A recorded commit is __synced__ if the remote-tracking branch of the current
//! branch can reach it. Everything reachable from `HEAD` but not from
//! `origin/<branch>` is unsynced.
//!
//! The working state is always synced. There is nothing to push for
//! uncommitted changes until they become a real commit.
//!
//! # Missing Remote-Tracking Branch
//!
//! When the remote-tracking branch does not exist, e.g., because no remote is
//! configured or the branch was never pushed, Git cannot answer the question.
//! The same goes for a detached `HEAD`, which has no branch to track at all.
//! What happens then is decided by [`SyncPolicy`].

use crate::{
    process::ProcessRunner,
    repo::{model::Commit, RepoError, RepositoryClient, Result},
};

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};
use tracing::{instrument, warn};

/// Name `git rev-parse --abbrev-ref HEAD` yields when no branch is checked out.
const DETACHED_HEAD: &str = "HEAD";

/// How to treat commits whose sync state cannot be determined.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPolicy {
    /// Treat local state as authoritative and report commits as synced.
    #[default]
    AssumeSynced,

    /// Report [`SyncState::Unknown`].
    ReportUnknown,
}

impl SyncPolicy {
    fn undetermined(self) -> SyncState {
        match self {
            Self::AssumeSynced => SyncState::Synced,
            Self::ReportUnknown => SyncState::Unknown,
        }
    }
}

/// Sync state of a single commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Synced,
    Unsynced,
    Unknown,
}

/// Decide whether commits already reached the remote.
#[derive(Debug)]
pub struct SyncStateEvaluator<'client, R>
where
    R: ProcessRunner,
{
    client: &'client RepositoryClient<R>,
    policy: SyncPolicy,
}

impl<'client, R> SyncStateEvaluator<'client, R>
where
    R: ProcessRunner,
{
    /// Construct new evaluator with default policy.
    pub fn new(client: &'client RepositoryClient<R>) -> Self {
        Self {
            client,
            policy: SyncPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Determine sync state of target commit.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError`] if the current branch cannot be determined.
    pub fn state(&self, commit: &Commit) -> Result<SyncState> {
        if commit.is_working_state() {
            return Ok(SyncState::Synced);
        }

        Ok(self
            .states(commit.repository(), std::slice::from_ref(commit))?
            .pop()
            .unwrap_or(SyncState::Synced))
    }

    /// Check if target commit is synced.
    ///
    /// [`SyncState::Unknown`] counts as not synced.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError`] if the current branch cannot be determined.
    pub fn is_synced(&self, commit: &Commit) -> Result<bool> {
        Ok(self.state(commit)? == SyncState::Synced)
    }

    /// Determine sync state of many commits of one repository at once.
    ///
    /// Runs the unsynced query only once for the whole batch.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError`] if the current branch cannot be determined.
    #[instrument(skip(self, path, commits), level = "debug")]
    pub fn states(&self, path: &Path, commits: &[Commit]) -> Result<Vec<SyncState>> {
        if commits.iter().all(Commit::is_working_state) {
            return Ok(vec![SyncState::Synced; commits.len()]);
        }

        let branch = self.client.current_branch(path)?;
        if branch == DETACHED_HEAD {
            warn!("detached HEAD in {:?} has no remote-tracking branch", path.display());
            return Ok(self.undetermined(commits));
        }

        let unsynced = match self.client.unsynced_commits(path, &branch) {
            Ok(unsynced) => unsynced,
            Err(RepoError::Process(err)) => {
                warn!("cannot compare {branch:?} against its remote-tracking branch: {err}");
                return Ok(self.undetermined(commits));
            }
            Err(err) => return Err(err),
        };

        let unsynced = unsynced
            .iter()
            .filter_map(Commit::hash)
            .collect::<HashSet<_>>();

        Ok(commits
            .iter()
            .map(|commit| match commit.hash() {
                Some(hash) if unsynced.contains(hash) => SyncState::Unsynced,
                _ => SyncState::Synced,
            })
            .collect())
    }

    fn undetermined(&self, commits: &[Commit]) -> Vec<SyncState> {
        let state = self.policy.undetermined();
        commits
            .iter()
            .map(|commit| {
                if commit.is_working_state() {
                    SyncState::Synced
                } else {
                    state
                }
            })
            .collect()
    }
}
