// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! SSH client configuration lookup.
//!
//! Remotes are usually written in the short scp-like form `user@host:path`.
//! That form cannot carry a port. When the user's SSH client configuration
//! sends `host` to a non-default port, the remote URL must be rewritten into
//! the explicit `ssh://user@hostname:port/path` form before handing it over.
//!
//! # Configuration Grammar
//!
//! Only the subset needed for the rewrite is understood:
//!
//! - `Host <pattern>...` starts a new block. Block boundaries are positional,
//!   a block simply runs until the next `Host` or `Match` line.
//! - `HostName` and `Port` populate the current block.
//! - Keywords are case-insensitive. Keyword and value are separated by
//!   whitespace or `=`.
//! - Blank lines and `#` comments are skipped. So is anything else that does
//!   not parse, e.g., a port that is not a number.
//!
//! A pattern matches a host if it is the host itself or the literal `*`. The
//! first matching block in file order wins.

use std::{
    borrow::Cow,
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Port SSH uses when none is configured.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Parsed SSH client configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SshConfig {
    blocks: Vec<HostBlock>,
}

impl SshConfig {
    /// Load SSH client configuration file.
    ///
    /// A missing file is treated as an empty configuration.
    ///
    /// # Errors
    ///
    /// - Return [`SshConfigError::Read`] if file exists but cannot be read.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(content) => Ok(Self::from(content.as_str())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no ssh config at {:?}", path.as_ref().display());
                Ok(Self::default())
            }
            Err(err) => Err(SshConfigError::Read {
                source: err,
                path: path.as_ref().to_path_buf(),
            }),
        }
    }

    /// All host blocks in file order.
    pub fn blocks(&self) -> &[HostBlock] {
        &self.blocks
    }

    /// Find first block whose pattern matches target host.
    pub fn resolve(&self, host: &str) -> Option<&HostBlock> {
        self.blocks.iter().find(|block| block.matches(host))
    }

    /// Rewrite scp-like remote URL if its host needs a non-default port.
    ///
    /// Returns URL unchanged if it is not scp-like, no block matches, the
    /// matching block has no port, or the port is 22.
    pub fn rewrite_remote_url<'url>(&self, url: &'url str) -> Cow<'url, str> {
        let Some(remote) = ScpLikeUrl::parse(url) else {
            return Cow::Borrowed(url);
        };

        let Some(block) = self.resolve(remote.host) else {
            return Cow::Borrowed(url);
        };

        match block.port {
            Some(port) if port != DEFAULT_SSH_PORT => {
                let host = block.hostname.as_deref().unwrap_or(remote.host);
                let path = remote.path.trim_start_matches('/');
                let rewritten = match remote.user {
                    Some(user) => format!("ssh://{user}@{host}:{port}/{path}"),
                    None => format!("ssh://{host}:{port}/{path}"),
                };
                debug!("rewrite remote {url:?} to {rewritten:?}");
                Cow::Owned(rewritten)
            }
            _ => Cow::Borrowed(url),
        }
    }
}

impl From<&str> for SshConfig {
    fn from(content: &str) -> Self {
        let mut blocks: Vec<HostBlock> = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (keyword, value) = split_keyword(line);
            match keyword.to_ascii_lowercase().as_str() {
                "host" => blocks.push(HostBlock::new(value.split_whitespace())),
                // INVARIANT: Match blocks are not understood, so they never match.
                "match" => blocks.push(HostBlock::default()),
                "hostname" => {
                    if let Some(block) = blocks.last_mut() {
                        block.hostname.get_or_insert_with(|| value.to_string());
                    }
                }
                "port" => {
                    if let (Some(block), Ok(port)) = (blocks.last_mut(), value.parse::<u16>()) {
                        block.port.get_or_insert(port);
                    }
                }
                _ => continue,
            }
        }

        Self { blocks }
    }
}

fn split_keyword(line: &str) -> (&str, &str) {
    match line.find(|c: char| c.is_whitespace() || c == '=') {
        Some(index) => {
            let (keyword, rest) = line.split_at(index);
            let value = rest
                .trim_start()
                .strip_prefix('=')
                .unwrap_or(rest.trim_start())
                .trim()
                .trim_matches('"');
            (keyword, value)
        }
        None => (line, ""),
    }
}

/// One `Host` block of SSH client configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostBlock {
    patterns: Vec<String>,
    hostname: Option<String>,
    port: Option<u16>,
}

impl HostBlock {
    fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            hostname: None,
            port: None,
        }
    }

    /// Check if block applies to target host.
    pub fn matches(&self, host: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern == "*" || pattern == host)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

/// Remote URL in scp-like `[user@]host:path` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScpLikeUrl<'url> {
    user: Option<&'url str>,
    host: &'url str,
    path: &'url str,
}

impl<'url> ScpLikeUrl<'url> {
    fn parse(url: &'url str) -> Option<Self> {
        if url.contains("://") {
            return None;
        }

        let (authority, path) = url.split_once(':')?;

        // INVARIANT: A slash before the first colon means a local path.
        if authority.contains('/') || path.is_empty() {
            return None;
        }

        let (user, host) = match authority.rsplit_once('@') {
            Some((user, host)) => (Some(user), host),
            None => (None, authority),
        };

        if host.is_empty() || user.is_some_and(str::is_empty) {
            return None;
        }

        Some(Self { user, host, path })
    }
}

/// SSH configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum SshConfigError {
    /// SSH configuration file exists but cannot be read.
    #[error("failed to read ssh config at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SshConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    const CONFIG: &str = indoc! {r#"
        # personal box
        Host example
          HostName 203.0.113.5
          Port 2222

        Host plain
          HostName 198.51.100.7
          Port 22

        Host noport
          HostName 198.51.100.8
    "#};

    #[test_case(
        "git@example:org/repo.git",
        "ssh://git@203.0.113.5:2222/org/repo.git";
        "custom port is rewritten"
    )]
    #[test_case("git@plain:org/repo.git", "git@plain:org/repo.git"; "default port is unchanged")]
    #[test_case("git@noport:org/repo.git", "git@noport:org/repo.git"; "missing port is unchanged")]
    #[test_case(
        "git@elsewhere:org/repo.git",
        "git@elsewhere:org/repo.git";
        "unmatched host is unchanged"
    )]
    #[test_case(
        "https://example/org/repo.git",
        "https://example/org/repo.git";
        "scheme url is unchanged"
    )]
    #[test_case("example:org/repo.git", "ssh://203.0.113.5:2222/org/repo.git"; "url without user")]
    #[test_case(
        "git@example:/srv/repo.git",
        "ssh://git@203.0.113.5:2222/srv/repo.git";
        "absolute remote path"
    )]
    #[test_case("./local:path", "./local:path"; "local path is unchanged")]
    #[test]
    fn rewrite_remote_url(url: &str, expect: &str) {
        let config = SshConfig::from(CONFIG);
        assert_eq!(config.rewrite_remote_url(url), expect);
    }

    #[test]
    fn host_keyword_does_not_match_hostname() {
        let config = SshConfig::from(indoc! {r#"
            HostName stray.example
            Port 2200
            HOST example
            hostname=203.0.113.5
            PORT = 2222
        "#});

        assert_eq!(config.blocks().len(), 1);
        let block = config.resolve("example").unwrap();
        assert_eq!(block.hostname(), Some("203.0.113.5"));
        assert_eq!(block.port(), Some(2222));
    }

    #[test]
    fn first_matching_block_wins() {
        let config = SshConfig::from(indoc! {r#"
            Host *
              Port 2200

            Host example
              HostName 203.0.113.5
              Port 2222
        "#});

        let result = config.rewrite_remote_url("git@example:org/repo.git");
        assert_eq!(result, "ssh://git@example:2200/org/repo.git");
    }

    #[test]
    fn several_patterns_on_one_host_line() {
        let config = SshConfig::from("Host alpha beta\n  Port 2022\n");
        assert!(config.resolve("beta").is_some());
        assert!(config.resolve("gamma").is_none());
    }

    #[test]
    fn unparseable_lines_are_skipped() {
        let config = SshConfig::from(indoc! {r#"
            Host example
              Port not-a-number
              IdentityFile ~/.ssh/id_ed25519
            Match host example
              Port 2222
        "#});

        assert_eq!(config.resolve("example").unwrap().port(), None);
        assert_eq!(
            config.rewrite_remote_url("git@example:org/repo.git"),
            "git@example:org/repo.git"
        );
    }

    #[test]
    fn missing_file_is_empty_config() -> anyhow::Result<()> {
        let config = SshConfig::load("/this/path/should/not/exist/ssh_config")?;
        assert_eq!(config, SshConfig::default());
        Ok(())
    }
}
