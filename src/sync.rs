// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Multi-step synchronization.
//!
//! The [`SyncOrchestrator`] sequences several [`RepositoryClient`] calls into
//! one operation. Each call is a __step__. The first step to fail aborts the
//! rest, and the failure is tagged with that step.
//!
//! # Partial Failure
//!
//! Knowing which step failed matters, because the working copy is left in a
//! different state each time. For commit-and-push:
//!
//! - Failed at [`Step::Stage`]: nothing was committed. Index may be partially
//!   staged.
//! - Failed at [`Step::Commit`]: nothing was committed. Changes are staged.
//! - Failed at [`Step::Push`]: the commit exists locally. Retrying the whole
//!   operation would try to commit again, so only the push should be retried.
//!
//! Nothing is retried here. Merge conflicts and rejected pushes surface as
//! Git's own message.
//!
//! # Phases
//!
//! Every invocation walks through [`Phase`] values starting at
//! [`Phase::Idle`], and ends up in [`Phase::Succeeded`] or [`Phase::Failed`].
//! No state survives between invocations. A progress hook can observe each
//! transition.

pub mod state;

use crate::{
    process::{ProcessRunner, SystemRunner},
    repo::{model::RemoteUrl, RepoError, RepositoryClient, DEFAULT_REMOTE},
};

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    path::Path,
};
use tracing::{debug, info, instrument, warn};

/// Single step of an orchestrated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Stage,
    Commit,
    Push,
    Pull,
    Fetch,
    Checkout,
    Merge,
}

impl Step {
    /// Phase entered when step starts.
    pub fn phase(self) -> Phase {
        match self {
            Self::Stage => Phase::Staging,
            Self::Commit => Phase::Committing,
            Self::Push => Phase::Pushing,
            Self::Pull => Phase::Pulling,
            Self::Fetch => Phase::Fetching,
            Self::Checkout => Phase::CheckingOut,
            Self::Merge => Phase::Merging,
        }
    }
}

impl Display for Step {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Stage => "stage",
            Self::Commit => "commit",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Fetch => "fetch",
            Self::Checkout => "checkout",
            Self::Merge => "merge",
        };
        fmt.write_str(name)
    }
}

/// Phase of an orchestrated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Staging,
    Committing,
    Pushing,
    Pulling,
    Fetching,
    CheckingOut,
    Merging,
    Succeeded,
    Failed(Step),
}

impl Display for Phase {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Idle => fmt.write_str("idle"),
            Self::Staging => fmt.write_str("staging changes"),
            Self::Committing => fmt.write_str("committing"),
            Self::Pushing => fmt.write_str("pushing"),
            Self::Pulling => fmt.write_str("pulling"),
            Self::Fetching => fmt.write_str("fetching"),
            Self::CheckingOut => fmt.write_str("checking out"),
            Self::Merging => fmt.write_str("merging"),
            Self::Succeeded => fmt.write_str("done"),
            Self::Failed(step) => write!(fmt, "failed at {step}"),
        }
    }
}

type ProgressHook = Box<dyn Fn(Phase) + Send + Sync>;

/// Sequence multi-step operations on a working copy.
pub struct SyncOrchestrator<R = SystemRunner>
where
    R: ProcessRunner,
{
    client: RepositoryClient<R>,
    progress: Option<ProgressHook>,
}

impl<R> SyncOrchestrator<R>
where
    R: ProcessRunner,
{
    /// Construct new orchestrator on top of target client.
    pub fn new(client: RepositoryClient<R>) -> Self {
        Self {
            client,
            progress: None,
        }
    }

    /// Observe every phase transition.
    pub fn with_progress(mut self, hook: impl Fn(Phase) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(hook));
        self
    }

    pub fn client(&self) -> &RepositoryClient<R> {
        &self.client
    }

    /// Stage all changes, commit them, then push.
    ///
    /// # Errors
    ///
    /// - Return [`StepFailure`] tagged with the first step that fails. Later
    ///   steps are never attempted.
    #[instrument(skip(self, path, message), level = "debug")]
    pub fn commit_and_push(&self, path: &Path, message: &str) -> Result<()> {
        self.report(Phase::Idle);
        self.step(Step::Stage, |client| client.stage_all(path))?;
        self.step(Step::Commit, |client| client.commit(path, message))?;
        self.preflight_push(path);
        self.step(Step::Push, |client| client.push(path))?;
        self.succeed(path)
    }

    /// Push current branch.
    ///
    /// # Errors
    ///
    /// - Return [`StepFailure`] tagged [`Step::Push`] with Git's message.
    #[instrument(skip(self, path), level = "debug")]
    pub fn push(&self, path: &Path) -> Result<()> {
        self.report(Phase::Idle);
        self.preflight_push(path);
        self.step(Step::Push, |client| client.push(path))?;
        self.succeed(path)
    }

    /// Pull current branch.
    ///
    /// # Errors
    ///
    /// - Return [`StepFailure`] tagged [`Step::Pull`] with Git's message, e.g.,
    ///   merge conflicts.
    #[instrument(skip(self, path), level = "debug")]
    pub fn pull(&self, path: &Path) -> Result<()> {
        self.report(Phase::Idle);
        self.step(Step::Pull, |client| client.pull(path))?;
        self.succeed(path)
    }

    /// Check out `into`, then merge `from` into it.
    ///
    /// # Errors
    ///
    /// - Return [`StepFailure`] tagged [`Step::Checkout`] if checkout fails.
    ///   Merge is never attempted then.
    /// - Return [`StepFailure`] tagged [`Step::Merge`] if merge fails, e.g.,
    ///   conflicts.
    #[instrument(skip(self, path, message), level = "debug")]
    pub fn merge(&self, from: &str, into: &str, path: &Path, message: &str) -> Result<()> {
        self.report(Phase::Idle);
        self.step(Step::Checkout, |client| client.checkout(path, into))?;
        self.step(Step::Merge, |client| client.merge(path, from, Some(message)))?;
        self.succeed(path)
    }

    /// Fetch default remote, then merge remote-tracking branch of current
    /// branch.
    ///
    /// # Errors
    ///
    /// - Return [`StepFailure`] tagged [`Step::Fetch`] if fetch fails.
    /// - Return [`StepFailure`] tagged [`Step::Merge`] if merge fails.
    #[instrument(skip(self, path), level = "debug")]
    pub fn fetch_and_merge(&self, path: &Path) -> Result<()> {
        self.report(Phase::Idle);
        self.step(Step::Fetch, |client| client.fetch(path))?;
        self.step(Step::Merge, |client| {
            let branch = client.current_branch(path)?;
            client.merge(path, &format!("{DEFAULT_REMOTE}/{branch}"), None)
        })?;
        self.succeed(path)
    }

    fn step<T>(
        &self,
        step: Step,
        op: impl FnOnce(&RepositoryClient<R>) -> Result<T, RepoError>,
    ) -> Result<T> {
        self.report(step.phase());
        op(&self.client).map_err(|source| {
            warn!("{step} step failed: {}", source.message());
            self.report(Phase::Failed(step));
            StepFailure { step, source }
        })
    }

    fn succeed(&self, path: &Path) -> Result<()> {
        info!("synchronized {:?}", path.display());
        self.report(Phase::Succeeded);
        Ok(())
    }

    fn report(&self, phase: Phase) {
        debug!("enter phase {phase:?}");
        if let Some(hook) = &self.progress {
            hook(phase);
        }
    }

    // Pushing over HTTP(S) without credential helper cannot prompt, because
    // terminal prompts are disabled. Warn before Git fails on it.
    fn preflight_push(&self, path: &Path) {
        let Ok(RemoteUrl::Configured(url)) = self.client.remote_url(path) else {
            return;
        };

        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return;
        }

        if let Ok(false) = self.client.credential_helper_configured(path) {
            warn!("no credential helper configured for {url}, push may fail to authenticate");
        }
    }
}

impl<R> Debug for SyncOrchestrator<R>
where
    R: ProcessRunner + Debug,
{
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("SyncOrchestrator")
            .field("client", &self.client)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Orchestrated operation failed at a specific step.
#[derive(Debug, thiserror::Error)]
#[error("{step} step failed: {source}")]
pub struct StepFailure {
    /// Step that failed.
    pub step: Step,

    /// Underlying failure.
    #[source]
    pub source: RepoError,
}

impl StepFailure {
    /// Check if the commit of a commit-and-push already landed.
    ///
    /// Only a failed push leaves a new commit behind. Callers must not retry
    /// the commit in that case.
    pub fn committed(&self) -> bool {
        self.step == Step::Push
    }

    /// Raw message of the underlying tool.
    pub fn message(&self) -> String {
        self.source.message()
    }
}

/// Friendly result alias :3
pub type Result<T, E = StepFailure> = std::result::Result<T, E>;
