// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Domain entities parsed from Git output.
//!
//! Everything here is an immutable snapshot. Entities are rebuilt from fresh
//! Git output on every query, and never patched in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

/// Separator between hash and subject in log lines.
///
/// Never occurs in a hexadecimal object name, so splitting on its first
/// occurrence always yields the full hash.
pub const LOG_SEPARATOR: char = '|';

/// Format string handed to `git log --pretty=format:`.
pub const LOG_FORMAT: &str = "%H|%s";

/// Registered working copy.
///
/// The path may or may not currently be a Git working copy. That is
/// re-evaluated on demand through
/// [`is_repository`](crate::repo::is_repository), never stored here.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Project {
    /// Absolute path of the working copy.
    pub path: PathBuf,

    /// Display title.
    pub title: String,

    /// When the project was registered.
    pub added: DateTime<Utc>,
}

impl Project {
    /// Construct new project registered right now.
    ///
    /// Title is the last component of the path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = title_of(&path);
        Self {
            path,
            title,
            added: Utc::now(),
        }
    }
}

fn title_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Commit of a repository.
///
/// Either the working state of the repository, i.e., uncommitted changes, or
/// a concrete commit recorded in history. Two commits are equal if they belong
/// to the same repository and have the same hash. All working states of one
/// repository are equal.
#[derive(Debug, Clone)]
pub struct Commit {
    repository: PathBuf,
    kind: CommitKind,
}

/// Working state or recorded commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitKind {
    /// Uncommitted changes of the working copy.
    WorkingState,

    /// Commit recorded in history.
    Recorded { hash: String, subject: String },
}

impl Commit {
    /// Construct working state of target repository.
    pub fn working_state(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            kind: CommitKind::WorkingState,
        }
    }

    /// Construct recorded commit.
    pub fn recorded(
        repository: impl Into<PathBuf>,
        hash: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            kind: CommitKind::Recorded {
                hash: hash.into(),
                subject: subject.into(),
            },
        }
    }

    /// Parse one line of log output rendered with [`LOG_FORMAT`].
    ///
    /// A line without separator still yields a commit, using the whole line as
    /// the hash and an empty subject, so the number of commits always matches
    /// the number of log lines.
    pub fn from_log_line(repository: impl Into<PathBuf>, line: &str) -> Self {
        match line.split_once(LOG_SEPARATOR) {
            Some((hash, subject)) => Self::recorded(repository, hash.trim(), subject),
            None => Self::recorded(repository, line.trim(), ""),
        }
    }

    /// Repository the commit belongs to.
    pub fn repository(&self) -> &Path {
        self.repository.as_path()
    }

    pub fn kind(&self) -> &CommitKind {
        &self.kind
    }

    /// Object name of recorded commit.
    pub fn hash(&self) -> Option<&str> {
        match &self.kind {
            CommitKind::WorkingState => None,
            CommitKind::Recorded { hash, .. } => Some(hash),
        }
    }

    /// Subject line of recorded commit.
    pub fn subject(&self) -> Option<&str> {
        match &self.kind {
            CommitKind::WorkingState => None,
            CommitKind::Recorded { subject, .. } => Some(subject),
        }
    }

    pub fn is_working_state(&self) -> bool {
        matches!(self.kind, CommitKind::WorkingState)
    }

    /// Abbreviated hash for display.
    pub fn short_hash(&self) -> Option<&str> {
        self.hash().map(|hash| hash.get(..7).unwrap_or(hash))
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.repository == other.repository && self.hash() == other.hash()
    }
}

impl Eq for Commit {}

impl Hash for Commit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repository.hash(state);
        Commit::hash(self).hash(state);
    }
}

impl Display for Commit {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            CommitKind::WorkingState => fmt.write_str("(working state)"),
            CommitKind::Recorded { subject, .. } => write!(
                fmt,
                "{} {subject}",
                self.short_hash().unwrap_or_default()
            ),
        }
    }
}

/// Local branch.
///
/// Two branches are equal if their names match.
#[derive(Debug, Clone, Eq)]
pub struct Branch {
    name: String,
    current: bool,
}

impl Branch {
    pub fn new(name: impl Into<String>, current: bool) -> Self {
        Self {
            name: name.into(),
            current,
        }
    }

    /// Parse one line of `git branch` output.
    ///
    /// The checked out branch is prefixed with `*`, which is stripped, and so
    /// is the `+` marking a branch checked out in another worktree. Blank
    /// lines and detached `HEAD` entries like `* (HEAD detached at abc1234)`
    /// yield nothing, because they do not name a branch.
    pub fn from_listing_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let (current, name) = if let Some(rest) = line.strip_prefix('*') {
            (true, rest.trim())
        } else if let Some(rest) = line.strip_prefix('+') {
            (false, rest.trim())
        } else {
            (false, line)
        };

        if name.is_empty() || name.starts_with('(') {
            return None;
        }

        Some(Self::new(name, current))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if branch is currently checked out.
    pub fn is_current(&self) -> bool {
        self.current
    }
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Hash for Branch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Display for Branch {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.name)
    }
}

/// Classification of a changed file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    #[default]
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Classify leading status character of a status line.
    ///
    /// Anything that is not `A` or `M` counts as modified.
    pub fn from_status_code(code: char) -> Self {
        match code {
            'A' => Self::Added,
            _ => Self::Modified,
        }
    }

    /// Classify status letter of `--name-status` output.
    ///
    /// Unlike [`ChangeKind::from_status_code`], deletions are recognized.
    pub fn from_name_status(code: char) -> Self {
        match code {
            'A' => Self::Added,
            'D' => Self::Deleted,
            _ => Self::Modified,
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        };
        fmt.write_str(label)
    }
}

/// File touched by a commit or by the working state.
///
/// Identity is the repository path plus the relative file path, so the same
/// file name in two repositories never collides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangedFile {
    repository: PathBuf,
    path: PathBuf,
    kind: ChangeKind,
}

impl ChangedFile {
    pub fn new(repository: impl Into<PathBuf>, path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            repository: repository.into(),
            path: path.into(),
            kind,
        }
    }

    /// Parse one line of `git status --porcelain` output.
    ///
    /// Line is trimmed, the leading status character classifies the change,
    /// and quoting around the path is stripped. For renames the new path is
    /// kept.
    pub fn from_status_line(repository: impl Into<PathBuf>, line: &str) -> Option<Self> {
        let line = line.trim();
        let code = line.chars().next()?;
        let (_, path) = line.split_once(char::is_whitespace)?;
        let path = path.trim();
        let path = path.rsplit_once(" -> ").map_or(path, |(_, new)| new);
        let path = unquote(path);
        if path.is_empty() {
            return None;
        }

        Some(Self::new(repository, path, ChangeKind::from_status_code(code)))
    }

    /// Parse one line of `--name-status` output, e.g., `D\tsrc/old.rs`.
    pub fn from_name_status_line(repository: impl Into<PathBuf>, line: &str) -> Option<Self> {
        let line = line.trim();
        let code = line.chars().next()?;
        let path = line
            .split('\t')
            .filter(|field| !field.is_empty())
            .last()
            .filter(|_| line.contains('\t'))?;
        let path = unquote(path.trim());
        if path.is_empty() {
            return None;
        }

        Some(Self::new(repository, path, ChangeKind::from_name_status(code)))
    }

    /// Repository the file belongs to.
    pub fn repository(&self) -> &Path {
        self.repository.as_path()
    }

    /// Path relative to repository root.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }
}

/// Strip C-style quoting Git applies to unusual paths.
pub(crate) fn unquote(path: &str) -> String {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return path.to_string();
    };

    // INVARIANT: Octal escapes encode raw bytes of one UTF-8 sequence, so
    // decode bytes only after every escape is resolved.
    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.bytes().peekable();
    while let Some(byte) = rest.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }

        match rest.next() {
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b'f') => bytes.push(0x0c),
            Some(b'n') => bytes.push(b'\n'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'v') => bytes.push(0x0b),
            Some(digit @ b'0'..=b'7') => {
                let mut value = digit - b'0';
                for _ in 0..2 {
                    match rest.peek().copied() {
                        Some(next @ b'0'..=b'7') => {
                            value = value.wrapping_mul(8).wrapping_add(next - b'0');
                            rest.next();
                        }
                        _ => break,
                    }
                }
                bytes.push(value);
            }
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Ahead/behind counts of local branch against its remote-tracking branch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    /// Commits on local branch missing from remote-tracking branch.
    pub ahead: usize,

    /// Commits on remote-tracking branch missing from local branch.
    pub behind: usize,
}

impl Divergence {
    /// Parse `git rev-list --left-right --count` output, e.g., `2\t1`.
    pub fn from_counts(output: &str) -> Option<Self> {
        let mut counts = output.split_whitespace().map(str::parse::<usize>);
        let ahead = counts.next()?.ok()?;
        let behind = counts.next()?.ok()?;
        Some(Self { ahead, behind })
    }

    pub fn is_diverged(&self) -> bool {
        self.ahead > 0 && self.behind > 0
    }
}

/// Result of a remote URL lookup.
///
/// A freshly initialized repository usually has no remote, so a missing remote
/// is a displayable value rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteUrl {
    /// URL of the default remote.
    Configured(String),

    /// No default remote. Holds Git's own message.
    NotConfigured(String),
}

impl RemoteUrl {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Configured(url) => Some(url),
            Self::NotConfigured(_) => None,
        }
    }
}

impl Display for RemoteUrl {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Configured(url) => fmt.write_str(url),
            Self::NotConfigured(message) => fmt.write_str(message),
        }
    }
}
