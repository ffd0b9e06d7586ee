// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use repoview::{
    config::Config,
    path::{default_config_path, default_ssh_config_path, default_store_path},
    process::{CancelToken, SystemRunner},
    repo::{
        model::{Commit, Divergence, Project},
        RepositoryClient,
    },
    ssh::SshConfig,
    store::ProjectStore,
    sync::{state::SyncState, state::SyncStateEvaluator, Phase, SyncOrchestrator},
};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Text;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{absolute, PathBuf},
    process::exit,
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "repoview [options] <repoview-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Use configuration file other than the default one.
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let session = Session::open(Config::load(config_path)?)?;

        match self.command {
            Command::Add(opts) => run_add(opts),
            Command::Remove(opts) => run_remove(opts),
            Command::List => run_list(session).await,
            Command::Status(opts) => run_status(session, opts),
            Command::Log(opts) => run_log(session, opts),
            Command::Branches(opts) => run_branches(session, opts),
            Command::Switch(opts) => run_switch(session, opts),
            Command::Diff(opts) => run_diff(session, opts),
            Command::Commit(opts) => run_commit(session, opts),
            Command::Push(opts) => run_push(session, opts),
            Command::Pull(opts) => run_pull(session, opts),
            Command::Update(opts) => run_update(session, opts),
            Command::Merge(opts) => run_merge(session, opts),
            Command::Remote(opts) => run_remote(session, opts),
            Command::Clone(opts) => run_clone(session, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Register working copies as projects.
    #[command(override_usage = "repoview add [options] <path>...")]
    Add(PathsOptions),

    /// Forget registered projects.
    #[command(override_usage = "repoview remove [options] <path>...")]
    Remove(PathsOptions),

    /// Summarize every registered project.
    #[command(override_usage = "repoview list [options]")]
    List,

    /// Show uncommitted changes of working copy.
    #[command(override_usage = "repoview status [options]")]
    Status(TargetOptions),

    /// Show commits of current branch with their sync state.
    #[command(override_usage = "repoview log [options]")]
    Log(LogOptions),

    /// Show local branches.
    #[command(override_usage = "repoview branches [options]")]
    Branches(TargetOptions),

    /// Check out another local branch.
    #[command(override_usage = "repoview switch [options] <branch>")]
    Switch(SwitchOptions),

    /// Show diff of a single file.
    #[command(override_usage = "repoview diff [options] <file>")]
    Diff(DiffOptions),

    /// Stage and commit every change, optionally push afterwards.
    #[command(override_usage = "repoview commit [options]")]
    Commit(CommitOptions),

    /// Push current branch to its remote.
    #[command(override_usage = "repoview push [options]")]
    Push(TargetOptions),

    /// Pull current branch from its remote.
    #[command(override_usage = "repoview pull [options]")]
    Pull(TargetOptions),

    /// Fetch remote and merge remote-tracking branch of current branch.
    #[command(override_usage = "repoview update [options]")]
    Update(TargetOptions),

    /// Merge one branch into another.
    #[command(override_usage = "repoview merge [options] <from> <into>")]
    Merge(MergeOptions),

    /// Show remote URL of working copy.
    #[command(override_usage = "repoview remote [options]")]
    Remote(TargetOptions),

    /// Clone remote and register it as project.
    #[command(override_usage = "repoview clone [options] <url> <dest>")]
    Clone(CloneOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PathsOptions {
    /// Paths to working copies.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Args, Clone, Debug)]
struct TargetOptions {
    /// Path to working copy.
    #[arg(short, long, default_value = ".", value_name = "path")]
    pub path: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LogOptions {
    #[command(flatten)]
    pub target: TargetOptions,

    /// Show at most this many commits.
    #[arg(short = 'n', long, value_name = "count")]
    pub limit: Option<usize>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SwitchOptions {
    #[command(flatten)]
    pub target: TargetOptions,

    /// Name of branch to check out.
    #[arg(required = true, value_name = "branch")]
    pub branch: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DiffOptions {
    #[command(flatten)]
    pub target: TargetOptions,

    /// File to diff, relative to working copy.
    #[arg(required = true, value_name = "file")]
    pub file: PathBuf,

    /// Diff file as recorded in commit instead of working state.
    #[arg(short, long, value_name = "hash")]
    pub commit: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CommitOptions {
    #[command(flatten)]
    pub target: TargetOptions,

    /// Commit message. Prompted for when omitted.
    #[arg(short, long, value_name = "message")]
    pub message: Option<String>,

    /// Push after committing.
    #[arg(long)]
    pub push: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MergeOptions {
    #[command(flatten)]
    pub target: TargetOptions,

    /// Branch to merge.
    #[arg(required = true, value_name = "from")]
    pub from: String,

    /// Branch to merge into.
    #[arg(required = true, value_name = "into")]
    pub into: String,

    /// Merge commit message.
    #[arg(short, long, value_name = "message")]
    pub message: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CloneOptions {
    /// URL of remote to clone from.
    #[arg(required = true, value_name = "url")]
    pub url: String,

    /// Directory to clone into.
    #[arg(required = true, value_name = "dest")]
    pub dest: PathBuf,

    /// Do not register clone as project.
    #[arg(long)]
    pub no_register: bool,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
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

/// Everything commands need to talk to Git.
struct Session {
    config: Config,
    client: RepositoryClient,
}

impl Session {
    fn open(config: Config) -> Result<Self> {
        let cancel = CancelToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping git");
                interrupt.cancel();
            }
        });

        let mut runner = SystemRunner::new(&config.settings.git).with_cancel(cancel);
        if let Some(timeout) = config.timeout() {
            runner = runner.with_timeout(timeout);
        }

        let ssh_path = match &config.settings.ssh_config {
            Some(path) => path.clone(),
            None => default_ssh_config_path()?,
        };
        let mut client = RepositoryClient::new(runner).with_ssh_config(SshConfig::load(ssh_path)?);
        if let Some(identity) = config.identity.clone() {
            client = client.with_identity(identity);
        }

        Ok(Self { config, client })
    }

    fn evaluator(&self) -> SyncStateEvaluator<'_, SystemRunner> {
        SyncStateEvaluator::new(&self.client).with_policy(self.config.settings.sync_policy)
    }

    fn orchestrate(self, bar: &ProgressBar) -> SyncOrchestrator {
        let bar = bar.clone();
        SyncOrchestrator::new(self.client).with_progress(move |phase| match phase {
            Phase::Idle | Phase::Succeeded | Phase::Failed(_) => {}
            phase => bar.set_message(phase.to_string()),
        })
    }
}

fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let style = ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")?;
    let bar = ProgressBar::new_spinner().with_style(style);
    bar.set_prefix(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

fn working_copy(target: &TargetOptions) -> Result<PathBuf> {
    Ok(absolute(&target.path)?)
}

fn run_add(opts: PathsOptions) -> Result<()> {
    let mut store = ProjectStore::open(default_store_path()?)?;
    for path in opts.paths {
        if !repoview::is_repository(&path) {
            warn!("{:?} is not a git repository yet", path.display());
        }

        if !store.add(&path)? {
            info!("{:?} is already registered", path.display());
        }
    }

    store.save()?;
    Ok(())
}

fn run_remove(opts: PathsOptions) -> Result<()> {
    let mut store = ProjectStore::open(default_store_path()?)?;
    for path in opts.paths {
        if !store.remove(&path) {
            warn!("{:?} is not registered", path.display());
        }
    }

    store.save()?;
    Ok(())
}

/// One line of the project listing.
struct Summary {
    project: Project,
    repository: bool,
    branch: Option<String>,
    changes: usize,
    divergence: Option<Divergence>,
}

impl Summary {
    fn inspect(client: &RepositoryClient, project: Project) -> Self {
        if !client.is_repository(&project.path) {
            return Self {
                project,
                repository: false,
                branch: None,
                changes: 0,
                divergence: None,
            };
        }

        let path = project.path.as_path();
        let branch = client.current_branch(path).ok();
        let changes = client
            .working_changes(path)
            .map(|changes| changes.len())
            .unwrap_or_default();
        let divergence = branch
            .as_deref()
            .and_then(|branch| client.divergence(path, branch).ok());

        Self {
            project,
            repository: true,
            branch,
            changes,
            divergence,
        }
    }
}

impl Display for Summary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{:<24} ", self.project.title)?;
        if !self.repository {
            return write!(fmt, "(not a git repository) {}", self.project.path.display());
        }

        write!(fmt, "{:<20}", self.branch.as_deref().unwrap_or("(no commits)"))?;
        match self.divergence {
            Some(Divergence { ahead, behind }) => write!(fmt, " +{ahead} -{behind}")?,
            None => fmt.write_str(" (no upstream)")?,
        }
        if self.changes > 0 {
            write!(fmt, " {} uncommitted", self.changes)?;
        }

        Ok(())
    }
}

async fn run_list(session: Session) -> Result<()> {
    let store = ProjectStore::open(default_store_path()?)?;
    let client = Arc::new(session.client);

    let tasks = store.projects().iter().cloned().map(|project| {
        let client = Arc::clone(&client);
        tokio::task::spawn_blocking(move || Summary::inspect(&client, project))
    });

    for summary in join_all(tasks).await {
        println!("{}", summary?);
    }

    Ok(())
}

fn run_status(session: Session, opts: TargetOptions) -> Result<()> {
    let path = working_copy(&opts)?;
    let changes = session.client.working_changes(&path)?;
    if changes.is_empty() {
        println!("nothing to commit, working state clean");
    }

    for change in changes {
        println!("{:>9}  {}", change.kind().to_string(), change.path().display());
    }

    Ok(())
}

fn run_log(session: Session, opts: LogOptions) -> Result<()> {
    let path = working_copy(&opts.target)?;
    let mut commits = Vec::new();
    if !session.client.working_changes(&path)?.is_empty() {
        commits.push(Commit::working_state(&path));
    }
    commits.extend(session.client.log(&path)?);
    if let Some(limit) = opts.limit {
        commits.truncate(limit);
    }

    let states = session.evaluator().states(&path, &commits)?;
    for (commit, state) in commits.iter().zip(states) {
        let marker = match state {
            SyncState::Synced => ' ',
            SyncState::Unsynced => '*',
            SyncState::Unknown => '?',
        };
        println!("{marker} {commit}");
    }

    Ok(())
}

fn run_branches(session: Session, opts: TargetOptions) -> Result<()> {
    let path = working_copy(&opts)?;
    for branch in session.client.branches(&path)? {
        let marker = if branch.is_current() { '*' } else { ' ' };
        println!("{marker} {branch}");
    }

    Ok(())
}

fn run_switch(session: Session, opts: SwitchOptions) -> Result<()> {
    let path = working_copy(&opts.target)?;
    let Some(branch) = session
        .client
        .branches(&path)?
        .into_iter()
        .find(|branch| branch.name() == opts.branch)
    else {
        bail!("no local branch named {:?}", opts.branch);
    };

    session.client.switch_branch(&path, &branch)?;
    info!("switched to {branch}");
    Ok(())
}

fn run_diff(session: Session, opts: DiffOptions) -> Result<()> {
    let path = working_copy(&opts.target)?;
    let commit = match opts.commit {
        Some(hash) => Commit::recorded(&path, hash, ""),
        None => Commit::working_state(&path),
    };

    let block = session.client.diff(&opts.file, &commit)?;
    if block.is_empty() {
        info!("no changes to {:?}", opts.file.display());
        return Ok(());
    }

    for line in block.into_lines() {
        println!("{line}");
    }

    Ok(())
}

fn run_commit(session: Session, opts: CommitOptions) -> Result<()> {
    let path = working_copy(&opts.target)?;
    let message = match opts.message {
        Some(message) => message,
        None => Text::new("commit message:").prompt()?,
    };
    if message.trim().is_empty() {
        bail!("refusing to commit with empty message");
    }

    if !opts.push {
        session.client.stage_all(&path)?;
        session.client.commit(&path, &message)?;
        info!("committed {:?}", message);
        return Ok(());
    }

    let bar = spinner("commit")?;
    let result = session.orchestrate(&bar).commit_and_push(&path, &message);
    bar.finish_and_clear();
    if let Err(failure) = &result {
        if failure.committed() {
            warn!("commit landed locally, retry with `repoview push` only");
        }
    }

    Ok(result?)
}

fn run_push(session: Session, opts: TargetOptions) -> Result<()> {
    let path = working_copy(&opts)?;
    let bar = spinner("push")?;
    let result = session.orchestrate(&bar).push(&path);
    bar.finish_and_clear();
    Ok(result?)
}

fn run_pull(session: Session, opts: TargetOptions) -> Result<()> {
    let path = working_copy(&opts)?;
    let bar = spinner("pull")?;
    let result = session.orchestrate(&bar).pull(&path);
    bar.finish_and_clear();
    Ok(result?)
}

fn run_update(session: Session, opts: TargetOptions) -> Result<()> {
    let path = working_copy(&opts)?;
    let bar = spinner("update")?;
    let result = session.orchestrate(&bar).fetch_and_merge(&path);
    bar.finish_and_clear();
    Ok(result?)
}

fn run_merge(session: Session, opts: MergeOptions) -> Result<()> {
    let path = working_copy(&opts.target)?;
    let message = match opts.message {
        Some(message) => message,
        None => format!("Merge branch '{}' into {}", opts.from, opts.into),
    };

    let bar = spinner("merge")?;
    let result = session
        .orchestrate(&bar)
        .merge(&opts.from, &opts.into, &path, &message);
    bar.finish_and_clear();
    Ok(result?)
}

fn run_remote(session: Session, opts: TargetOptions) -> Result<()> {
    let path = working_copy(&opts)?;
    let remote = session.client.remote_url(&path)?;
    println!("{remote}");

    if let (Some(url), Some(endpoint)) = (remote.url(), session.client.remote_endpoint(&path)?) {
        if url != endpoint {
            println!("  via {endpoint}");
        }
    }

    Ok(())
}

fn run_clone(session: Session, opts: CloneOptions) -> Result<()> {
    let bar = spinner("clone")?;
    bar.set_message(opts.url.clone());
    let result = session.client.clone_into(&opts.url, &opts.dest);
    bar.finish_and_clear();
    let dest = result?;

    if !opts.no_register {
        let mut store = ProjectStore::open(default_store_path()?)?;
        store.add(&dest)?;
        store.save()?;
    }

    info!("cloned {} into {:?}", opts.url, dest.display());
    Ok(())
}
