// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository client.
//!
//! The [`RepositoryClient`] translates version-control intents into Git
//! invocations, and parses their output into the entities of [`model`].
//!
//! # Stateless Queries
//!
//! The client holds no handle on any repository. Every query runs Git again
//! and rebuilds its entities from scratch, so two calls in a row always see
//! the working copy as it is right now. Caching, if wanted, belongs in a layer
//! above this one.
//!
//! # Output Contract
//!
//! The exact arguments handed to Git here are what the parsers in [`model`]
//! rely on. In particular:
//!
//! - Log lines are rendered with [`LOG_FORMAT`](model::LOG_FORMAT), i.e.,
//!   `<hash>|<subject>`.
//! - Working state changes come from `git status --porcelain`.
//! - Files of a recorded commit come from `git show --name-only`.
//! - Branches come from plain `git branch`.

pub mod diff;
pub mod model;

use crate::{
    config::Identity,
    process::{GitCommand, ProcessError, ProcessRunner, SystemRunner},
    repo::{
        diff::DiffBlock,
        model::{
            Branch, ChangeKind, ChangedFile, Commit, CommitKind, Divergence, RemoteUrl, LOG_FORMAT,
        },
    },
    ssh::SshConfig,
};

use std::{
    fs::read_dir,
    path::{absolute, Path, PathBuf},
};
use tracing::{debug, instrument};

/// Name of the remote every remote operation targets.
pub const DEFAULT_REMOTE: &str = "origin";

/// Name of Git's control metadata entry inside a working copy.
pub const METADATA_DIR: &str = ".git";

/// Check if target directory is a Git working copy.
///
/// Looks for the control metadata entry in a listing of the directory. Never
/// fails. Any I/O error means "not a repository".
pub fn is_repository(path: impl AsRef<Path>) -> bool {
    match read_dir(path.as_ref()) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_name() == METADATA_DIR),
        Err(err) => {
            debug!("cannot list {:?}: {err}", path.as_ref().display());
            false
        }
    }
}

/// Client for Git working copies.
#[derive(Debug, Default, Clone)]
pub struct RepositoryClient<R = SystemRunner>
where
    R: ProcessRunner,
{
    runner: R,
    identity: Option<Identity>,
    ssh: Option<SshConfig>,
}

impl<R> RepositoryClient<R>
where
    R: ProcessRunner,
{
    /// Construct new client on top of target runner.
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            identity: None,
            ssh: None,
        }
    }

    /// Record commits and merges with target identity.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Resolve remote hosts through SSH client configuration.
    pub fn with_ssh_config(mut self, ssh: SshConfig) -> Self {
        self.ssh = Some(ssh);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Check if target directory is a Git working copy.
    ///
    /// See [`is_repository`].
    pub fn is_repository(&self, path: impl AsRef<Path>) -> bool {
        is_repository(path)
    }

    /// List commits of current branch, newest first.
    ///
    /// Yields one commit per log line in the order Git prints them.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., no commits yet.
    #[instrument(skip(self, path), level = "debug")]
    pub fn log(&self, path: &Path) -> Result<Vec<Commit>> {
        let output = self.git(
            path,
            GitCommand::new("log").arg(format!("--pretty=format:{LOG_FORMAT}")),
        )?;

        Ok(parse_log(path, &output))
    }

    /// List files touched by target commit.
    ///
    /// For the working state these are the uncommitted changes, otherwise the
    /// files recorded in the commit itself.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if commit's repository is not a
    ///   working copy.
    /// - Return [`RepoError::Process`] if Git fails.
    pub fn changed_files(&self, commit: &Commit) -> Result<Vec<ChangedFile>> {
        match commit.kind() {
            CommitKind::WorkingState => self.working_changes(commit.repository()),
            CommitKind::Recorded { hash, .. } => self.commit_files(commit.repository(), hash),
        }
    }

    /// List uncommitted changes of working copy, untracked files included.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails.
    #[instrument(skip(self, path), level = "debug")]
    pub fn working_changes(&self, path: &Path) -> Result<Vec<ChangedFile>> {
        let output = self.git(
            path,
            GitCommand::new("status").args(["--porcelain", "--untracked-files=all"]),
        )?;

        Ok(output
            .lines()
            .filter_map(|line| ChangedFile::from_status_line(path, line))
            .collect())
    }

    /// List files recorded in target commit, one per line of `git show`.
    ///
    /// Name-only output carries no status, so every file is classified as
    /// modified. Use [`RepositoryClient::commit_changes`] to tell additions and
    /// deletions apart.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., unknown hash.
    #[instrument(skip(self, path), level = "debug")]
    pub fn commit_files(&self, path: &Path, hash: &str) -> Result<Vec<ChangedFile>> {
        let output = self.git(
            path,
            GitCommand::new("show").args(["--name-only", "--pretty=format:", hash]),
        )?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| ChangedFile::new(path, model::unquote(line), ChangeKind::Modified))
            .collect())
    }

    /// List files recorded in target commit with their status.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., unknown hash.
    #[instrument(skip(self, path), level = "debug")]
    pub fn commit_changes(&self, path: &Path, hash: &str) -> Result<Vec<ChangedFile>> {
        let output = self.git(
            path,
            GitCommand::new("show").args(["--name-status", "--pretty=format:", hash]),
        )?;

        Ok(output
            .lines()
            .filter_map(|line| ChangedFile::from_name_status_line(path, line))
            .collect())
    }

    /// List local branches in the order Git prints them.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails.
    #[instrument(skip(self, path), level = "debug")]
    pub fn branches(&self, path: &Path) -> Result<Vec<Branch>> {
        let output = self.git(path, GitCommand::new("branch"))?;
        Ok(output.lines().filter_map(Branch::from_listing_line).collect())
    }

    /// Name of currently checked out branch.
    ///
    /// Yields `HEAD` when detached.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., no commits yet.
    pub fn current_branch(&self, path: &Path) -> Result<String> {
        let output = self.git(
            path,
            GitCommand::new("rev-parse").args(["--abbrev-ref", "HEAD"]),
        )?;

        Ok(output.trim().to_string())
    }

    /// Check out target branch.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git refuses, e.g., local changes
    ///   would be overwritten.
    pub fn switch_branch(&self, path: &Path, branch: &Branch) -> Result<()> {
        self.checkout(path, branch.name())
    }

    /// Check out target branch by name.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git refuses.
    #[instrument(skip(self, path), level = "debug")]
    pub fn checkout(&self, path: &Path, branch: &str) -> Result<()> {
        self.git(path, GitCommand::new("checkout").arg(branch))?;
        Ok(())
    }

    /// Diff one file against the parent of target commit.
    ///
    /// For the working state this is the diff of uncommitted changes against
    /// `HEAD`.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if commit's repository is not a
    ///   working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., commit has no parent.
    #[instrument(skip(self, file, commit), level = "debug")]
    pub fn diff(&self, file: &Path, commit: &Commit) -> Result<DiffBlock> {
        let command = match commit.kind() {
            CommitKind::WorkingState => GitCommand::new("diff").arg("HEAD"),
            CommitKind::Recorded { hash, .. } => {
                GitCommand::new("diff").args([format!("{hash}^"), hash.clone()])
            }
        };
        let output = self.git(commit.repository(), command.arg("--").arg(file))?;

        Ok(DiffBlock::new(file, output))
    }

    /// Stage every change of the working copy, untracked files included.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., index is locked.
    #[instrument(skip(self, path), level = "debug")]
    pub fn stage_all(&self, path: &Path) -> Result<()> {
        self.git(path, GitCommand::new("add").arg("--all"))?;
        Ok(())
    }

    /// Commit staged changes with target message.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., nothing to commit.
    #[instrument(skip(self, path, message), level = "debug")]
    pub fn commit(&self, path: &Path, message: &str) -> Result<String> {
        let command = self.identify(GitCommand::new("commit").args(["-m", message]));
        self.git(path, command)
    }

    /// Push current branch to default remote, and track it.
    ///
    /// Success and failure are all that is reported. Telling a rejected push
    /// apart from other failures is left to the caller, who gets Git's own
    /// message.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails.
    #[instrument(skip(self, path), level = "debug")]
    pub fn push(&self, path: &Path) -> Result<String> {
        let command = GitCommand::new("push").args(["--set-upstream", DEFAULT_REMOTE, "HEAD"]);
        let command = self.rewrite_remote(path, command)?;
        self.git(path, command)
    }

    /// Pull from upstream of current branch by merging.
    ///
    /// No conflict resolution is attempted. Conflicts surface as Git's own
    /// failure message.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails.
    #[instrument(skip(self, path), level = "debug")]
    pub fn pull(&self, path: &Path) -> Result<String> {
        let command = self.identify(GitCommand::new("pull").args(["--no-rebase", "--no-edit"]));
        let command = self.rewrite_remote(path, command)?;
        self.git(path, command)
    }

    /// Fetch default remote.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails.
    #[instrument(skip(self, path), level = "debug")]
    pub fn fetch(&self, path: &Path) -> Result<String> {
        let command = GitCommand::new("fetch").arg(DEFAULT_REMOTE);
        let command = self.rewrite_remote(path, command)?;
        self.git(path, command)
    }

    /// Merge target revision into current branch.
    ///
    /// Without message, Git's default merge message is used.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., merge conflicts.
    #[instrument(skip(self, path, message), level = "debug")]
    pub fn merge(&self, path: &Path, from: &str, message: Option<&str>) -> Result<String> {
        let mut command = GitCommand::new("merge").arg("--no-edit");
        if let Some(message) = message {
            command = command.args(["-m", message]);
        }
        let command = self.identify(command.arg(from));
        self.git(path, command)
    }

    /// Look up URL of default remote.
    ///
    /// A missing remote is not an error. It yields [`RemoteUrl::NotConfigured`]
    /// carrying Git's message instead.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    #[instrument(skip(self, path), level = "debug")]
    pub fn remote_url(&self, path: &Path) -> Result<RemoteUrl> {
        match self.git(path, GitCommand::new("remote").args(["get-url", DEFAULT_REMOTE])) {
            Ok(output) => Ok(RemoteUrl::Configured(output.trim().to_string())),
            Err(RepoError::Process(err)) => {
                debug!("no remote for {:?}: {err}", path.display());
                Ok(RemoteUrl::NotConfigured(err.message()))
            }
            Err(err) => Err(err),
        }
    }

    /// URL of default remote after SSH host resolution.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    pub fn remote_endpoint(&self, path: &Path) -> Result<Option<String>> {
        let endpoint = self.remote_url(path)?.url().map(|url| match &self.ssh {
            Some(ssh) => ssh.rewrite_remote_url(url).into_owned(),
            None => url.to_string(),
        });

        Ok(endpoint)
    }

    /// Check if a credential helper is configured.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails for any reason other than
    ///   the key being unset.
    pub fn credential_helper_configured(&self, path: &Path) -> Result<bool> {
        match self.git(
            path,
            GitCommand::new("config").args(["--get", "credential.helper"]),
        ) {
            Ok(output) => Ok(!output.trim().is_empty()),
            // INVARIANT: git-config exits with 1 when the key is unset.
            Err(RepoError::Process(err)) if err.exit_code() == Some(1) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// List commits reachable from `HEAD` but not from remote-tracking branch.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., remote-tracking
    ///   branch does not exist.
    #[instrument(skip(self, path), level = "debug")]
    pub fn unsynced_commits(&self, path: &Path, branch: &str) -> Result<Vec<Commit>> {
        let output = self.git(
            path,
            GitCommand::new("log").args([
                format!("--pretty=format:{LOG_FORMAT}"),
                format!("{DEFAULT_REMOTE}/{branch}..HEAD"),
            ]),
        )?;

        Ok(parse_log(path, &output))
    }

    /// Count commits ahead of and behind remote-tracking branch.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotARepository`] if `path` is not a working copy.
    /// - Return [`RepoError::Process`] if Git fails, e.g., remote-tracking
    ///   branch does not exist.
    #[instrument(skip(self, path), level = "debug")]
    pub fn divergence(&self, path: &Path, branch: &str) -> Result<Divergence> {
        let output = self.git(
            path,
            GitCommand::new("rev-list").args([
                "--left-right".to_string(),
                "--count".to_string(),
                format!("HEAD...{DEFAULT_REMOTE}/{branch}"),
            ]),
        )?;

        Ok(Divergence::from_counts(&output).unwrap_or_default())
    }

    /// Clone remote into target directory.
    ///
    /// Remote URL goes through SSH host resolution first. A relative `dest` is
    /// resolved against the current directory, and its parent must exist.
    /// Yields the absolute path of the new working copy.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::ResolvePath`] if `dest` cannot be made absolute.
    /// - Return [`RepoError::Process`] if Git fails.
    #[instrument(skip(self, dest), level = "debug")]
    pub fn clone_into(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        let url = match &self.ssh {
            Some(ssh) => ssh.rewrite_remote_url(url).into_owned(),
            None => url.to_string(),
        };

        // INVARIANT: Git resolves a relative destination against its own
        // working directory, so only ever hand it an absolute one.
        let dest = absolute(dest).map_err(|source| RepoError::ResolvePath {
            source,
            path: dest.to_path_buf(),
        })?;
        let parent = dest.parent().unwrap_or(dest.as_path()).to_path_buf();

        self.runner
            .run(&GitCommand::new("clone").arg(url).arg(&dest), &parent)?;

        Ok(dest)
    }

    fn git(&self, path: &Path, command: GitCommand) -> Result<String> {
        if !is_repository(path) {
            return Err(RepoError::NotARepository {
                path: path.to_path_buf(),
            });
        }

        Ok(self.runner.run(&command, path)?)
    }

    fn identify(&self, command: GitCommand) -> GitCommand {
        match &self.identity {
            Some(identity) => command
                .config("user.name", identity.name.as_str())
                .config("user.email", identity.email.as_str()),
            None => command,
        }
    }

    // Rewriting through insteadOf keeps the remote name, so remote-tracking
    // branches still get updated.
    fn rewrite_remote(&self, path: &Path, command: GitCommand) -> Result<GitCommand> {
        let Some(ssh) = &self.ssh else {
            return Ok(command);
        };

        let RemoteUrl::Configured(url) = self.remote_url(path)? else {
            return Ok(command);
        };

        let rewritten = ssh.rewrite_remote_url(&url);
        if rewritten == url.as_str() {
            return Ok(command);
        }

        Ok(command.config(format!("url.{rewritten}.insteadOf"), url.as_str()))
    }
}

fn parse_log(path: &Path, output: &str) -> Vec<Commit> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Commit::from_log_line(path, line))
        .collect()
}

/// Repository client error types.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Operation requires a working copy, but path lacks control metadata.
    #[error("{:?} is not a git repository", path.display())]
    NotARepository { path: PathBuf },

    /// Path cannot be made absolute.
    #[error("failed to resolve {:?}", path.display())]
    ResolvePath {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Git invocation fails.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl RepoError {
    /// Most actionable text available for display.
    pub fn message(&self) -> String {
        match self {
            Self::Process(err) => err.message(),
            other => other.to_string(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = RepoError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_repository, ScriptedRunner};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::env::current_dir;

    fn client(
        runner: ScriptedRunner,
    ) -> anyhow::Result<(RepositoryClient<ScriptedRunner>, PathBuf)> {
        let path = current_dir()?;
        fake_repository(&path)?;
        Ok((RepositoryClient::new(runner), path))
    }

    #[sealed_test]
    fn log_yields_one_commit_per_line_in_order() -> anyhow::Result<()> {
        let output = indoc! {"
            9fceb02d0ae598e95dc970b74767f19372d61af8|feat: add thing | with pipe
            e83c5163316f89bfbde7d9ab23ca2e25604af290|fix: broken thing
            0123456789abcdef0123456789abcdef01234567|chore: initial commit"};
        let (client, path) = client(ScriptedRunner::new().ok(&["log"], output))?;

        let result = client.log(&path)?;
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|commit| commit.hash().is_some_and(|hash| !hash.is_empty())));
        assert_eq!(result[0].subject(), Some("feat: add thing | with pipe"));
        assert_eq!(result[2].hash(), Some("0123456789abcdef0123456789abcdef01234567"));

        Ok(())
    }

    #[sealed_test]
    fn working_state_changes_come_from_status() -> anyhow::Result<()> {
        let output = "A  src/new.rs\n M src/lib.rs\n?? \"odd name.txt\"\n";
        let (client, path) = client(ScriptedRunner::new().ok(&["status"], output))?;

        let result = client.changed_files(&Commit::working_state(&path))?;
        let expect = vec![
            ChangedFile::new(&path, "src/new.rs", ChangeKind::Added),
            ChangedFile::new(&path, "src/lib.rs", ChangeKind::Modified),
            ChangedFile::new(&path, "odd name.txt", ChangeKind::Modified),
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn recorded_commit_files_come_from_show() -> anyhow::Result<()> {
        let (client, path) = client(ScriptedRunner::new().ok(&["show"], "\nsrc/a.rs\nsrc/b.rs\n"))?;

        let result = client.changed_files(&Commit::recorded(&path, "abc", "subject"))?;
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].path(), Path::new("src/b.rs"));

        let calls = client.runner().calls();
        assert_eq!(
            calls[0].arguments(),
            GitCommand::new("show")
                .args(["--name-only", "--pretty=format:", "abc"])
                .arguments()
        );

        Ok(())
    }

    #[sealed_test]
    fn branches_strip_current_marker() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new().ok(&["branch"], "  main\n* feature/x\n");
        let (client, path) = client(runner)?;

        let result = client.branches(&path)?;
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].name(), "feature/x");
        assert!(result[1].is_current());

        client.switch_branch(&path, &result[1])?;
        let calls = client.runner().calls();
        assert_eq!(
            calls[1].arguments(),
            GitCommand::new("checkout").arg("feature/x").arguments()
        );

        Ok(())
    }

    #[sealed_test]
    fn missing_remote_is_displayable() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new().fail(&["remote"], "error: No such remote 'origin'");
        let (client, path) = client(runner)?;

        let result = client.remote_url(&path)?;
        assert_eq!(
            result,
            RemoteUrl::NotConfigured("error: No such remote 'origin'".into())
        );
        assert_eq!(client.remote_endpoint(&path)?, None);

        Ok(())
    }

    #[sealed_test]
    fn credential_helper_lookup() -> anyhow::Result<()> {
        let (client, path) = client(ScriptedRunner::new().ok(&["config"], "store\n"))?;
        assert!(client.credential_helper_configured(&path)?);

        let (client, path) = self::client(ScriptedRunner::new().fail(&["config"], ""))?;
        assert!(!client.credential_helper_configured(&path)?);

        Ok(())
    }

    #[sealed_test]
    fn push_rewrites_remote_with_custom_ssh_port() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new().ok(&["remote", "get-url"], "git@example:org/repo.git\n");
        let (client, path) = client(runner)?;
        let client = client.with_ssh_config(SshConfig::from(
            "Host example\n  HostName 203.0.113.5\n  Port 2222\n",
        ));

        client.push(&path)?;
        let calls = client.runner().calls();
        let push = calls.last().unwrap();
        assert_eq!(push.subcommand().unwrap(), "push");
        assert_eq!(
            push.overrides(),
            &[(
                "url.ssh://git@203.0.113.5:2222/org/repo.git.insteadOf".to_string(),
                "git@example:org/repo.git".to_string()
            )]
        );

        Ok(())
    }

    #[sealed_test]
    fn commit_carries_identity_and_raw_message() -> anyhow::Result<()> {
        let (client, path) = client(ScriptedRunner::new())?;
        let client = client.with_identity(Identity {
            name: "John Doe".into(),
            email: "john@doe.com".into(),
        });

        client.commit(&path, "feat: \"quoted\" $(whoami)")?;
        let calls = client.runner().calls();
        assert_eq!(calls[0].overrides().len(), 2);
        assert_eq!(
            calls[0].arguments(),
            GitCommand::new("commit")
                .args(["-m", "feat: \"quoted\" $(whoami)"])
                .arguments()
        );

        Ok(())
    }

    #[sealed_test]
    fn operations_refuse_non_repository() -> anyhow::Result<()> {
        let path = current_dir()?;
        let client = RepositoryClient::new(ScriptedRunner::new());

        assert!(!client.is_repository(&path));
        assert!(matches!(
            client.log(&path),
            Err(RepoError::NotARepository { .. })
        ));
        assert_eq!(client.runner().calls().len(), 0);

        Ok(())
    }

    #[sealed_test]
    fn repository_detection_is_stable() -> anyhow::Result<()> {
        let path = current_dir()?;
        assert_eq!(is_repository(&path), is_repository(&path));

        fake_repository(&path)?;
        assert!(is_repository(&path));
        assert!(is_repository(&path));
        assert!(!is_repository(path.join("does-not-exist")));

        Ok(())
    }

    #[sealed_test]
    fn divergence_counts_against_tracking_branch() -> anyhow::Result<()> {
        let (client, path) = client(ScriptedRunner::new().ok(&["rev-list"], "3\t1\n"))?;
        let result = client.divergence(&path, "main")?;
        assert_eq!(result, Divergence { ahead: 3, behind: 1 });

        Ok(())
    }

    #[sealed_test]
    fn clone_resolves_relative_destination() -> anyhow::Result<()> {
        let root = current_dir()?;
        std::fs::create_dir(root.join("sub"))?;
        let client = RepositoryClient::new(ScriptedRunner::new());

        let result = client.clone_into("git@example:org/repo.git", Path::new("sub/clone"))?;
        assert_eq!(result, root.join("sub").join("clone"));

        let calls = client.runner().calls();
        let expect = GitCommand::new("clone")
            .arg("git@example:org/repo.git")
            .arg(root.join("sub").join("clone"));
        assert_eq!(calls[0].arguments(), expect.arguments());

        Ok(())
    }
}
