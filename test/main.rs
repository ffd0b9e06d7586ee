// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use git2::{Oid, Repository, RepositoryInitOptions};
use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};

pub(crate) struct RepoFixture {
    repo: Repository,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>, kind: RepoKind) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(kind.is_bare());
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self { repo })
    }

    /// Working copy of normal repository, git directory of bare one.
    pub(crate) fn path(&self) -> PathBuf {
        self.repo
            .workdir()
            .unwrap_or_else(|| self.repo.path())
            .to_path_buf()
    }

    /// Write file into working copy without staging it.
    pub(crate) fn write(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<()> {
        let path = self.path().join(filename.as_ref());
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(path, contents.as_ref())?;

        Ok(())
    }

    /// Write file into working copy and stage it.
    pub(crate) fn stage(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<()> {
        self.write(filename.as_ref(), contents)?;

        let mut index = self.repo.index()?;
        index.add_path(filename.as_ref())?;
        index.write()?;

        Ok(())
    }

    /// Write, stage, and commit file on top of `HEAD`.
    pub(crate) fn commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
        message: impl AsRef<str>,
    ) -> Result<Oid> {
        self.stage(filename, contents)?;

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repo.head().ok().and_then(|head| head.target()) {
            parents.push(self.repo.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message.as_ref(),
            &tree,
            &parents,
        )?;

        Ok(oid)
    }

    /// Create local branch at `HEAD` without checking it out.
    pub(crate) fn branch(&self, name: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo.branch(name, &head, false)?;

        Ok(())
    }

    /// Point remote-tracking branch `origin/<branch>` at target commit.
    pub(crate) fn track(&self, branch: &str, oid: Oid) -> Result<()> {
        self.repo.reference(
            &format!("refs/remotes/origin/{branch}"),
            oid,
            true,
            "pretend push",
        )?;

        Ok(())
    }

    pub(crate) fn add_remote(&self, url: impl AsRef<str>) -> Result<()> {
        self.repo.remote("origin", url.as_ref())?;
        Ok(())
    }

    /// Target commit of local branch, if any.
    pub(crate) fn branch_target(&self, name: &str) -> Option<Oid> {
        self.repo
            .find_reference(&format!("refs/heads/{name}"))
            .ok()
            .and_then(|reference| reference.target())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) enum RepoKind {
    #[default]
    Normal,

    Bare,
}

impl RepoKind {
    pub(crate) fn is_bare(&self) -> bool {
        match self {
            Self::Bare => true,
            Self::Normal => false,
        }
    }
}
