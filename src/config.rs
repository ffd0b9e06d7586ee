// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the files repoview reads to simplify serialization
//! and deserialization. There are two of them:
//!
//! - The __configuration file__ holds settings that shape how Git gets
//!   invoked, plus an optional default identity for commits.
//! - The __project registry__ lists every working copy the user registered.
//!
//! Both are TOML. All paths go through shell expansion when parsed, so `~` and
//! environment variables can be used freely.

use crate::{repo::model::Project, sync::state::SyncPolicy};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Configuration file layout.
///
/// # General Layout
///
/// ```toml
/// [settings]
/// git = "git"
/// timeout_secs = 120
/// ssh_config = "~/.ssh/config"
/// sync_policy = "assume-synced"
///
/// [identity]
/// name = "John Doe"
/// email = "john@doe.com"
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Settings for Git invocation.
    #[serde(default)]
    pub settings: Settings,

    /// Default identity to commit with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

impl Config {
    /// Load configuration file.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(content) => content.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.as_ref().to_path_buf(),
            }),
        }
    }

    /// Deadline for each Git invocation, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.settings.timeout_secs.map(Duration::from_secs)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on path fields.
        config.settings.git = expand(&config.settings.git)?;
        if let Some(path) = config.settings.ssh_config.take() {
            config.settings.ssh_config = Some(expand(&path)?);
        }

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Settings for Git invocation.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Git executable to spawn.
    pub git: PathBuf,

    /// Seconds to wait on a single Git invocation before killing it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// SSH client configuration to resolve host aliases with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_config: Option<PathBuf>,

    /// How to treat a branch without remote-tracking branch.
    pub sync_policy: SyncPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            git: PathBuf::from("git"),
            timeout_secs: None,
            ssh_config: None,
            sync_policy: SyncPolicy::default(),
        }
    }
}

/// Name and email to record commits with.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Project registry layout.
///
/// # General Layout
///
/// ```toml
/// [[project]]
/// path = "/home/blah/code/dotfiles"
/// title = "dotfiles"
/// added = "2025-06-01T12:00:00Z"
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Registry {
    /// Registered projects in insertion order.
    #[serde(rename = "project", default)]
    pub projects: Vec<Project>,
}

impl FromStr for Registry {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        // INVARIANT: Project paths are written by the store as absolute paths,
        // so they are read back verbatim without shell expansion.
        toml::de::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl Display for Registry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

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
