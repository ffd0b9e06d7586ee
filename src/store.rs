// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project registry management.
//!
//! Repoview keeps every working copy the user registered in one place called
//! the __project registry__. It is a plain TOML file, by default at
//! `$XDG_DATA_HOME/repoview/projects.toml`, listing each project with its
//! absolute path, display title, and registration time.
//!
//! The registry only records paths. Whether a path is still a working copy is
//! re-evaluated every time it is asked, never stored here.

use crate::{
    config::{ConfigError, Registry},
    repo::model::Project,
};

use std::{
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{absolute, Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// File-backed project registry.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    store_path: PathBuf,
    registry: Registry,
}

impl ProjectStore {
    /// Open project registry at target path.
    ///
    /// A missing registry file is treated as empty. Nothing is written until
    /// [`ProjectStore::save`] is called.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ReadStore`] if registry exists but cannot be
    ///   read.
    /// - Return [`StoreError::Config`] if registry is not valid.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store_path = path.into();
        let registry = match read_to_string(&store_path) {
            Ok(content) => content.parse()?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no project registry at {:?} yet", store_path.display());
                Registry::default()
            }
            Err(err) => {
                return Err(StoreError::ReadStore {
                    source: err,
                    store_path,
                })
            }
        };

        Ok(Self {
            store_path,
            registry,
        })
    }

    /// All registered projects in registration order.
    pub fn projects(&self) -> &[Project] {
        &self.registry.projects
    }

    /// Find project registered under target path.
    pub fn find(&self, path: impl AsRef<Path>) -> Option<&Project> {
        let path = absolute(path.as_ref()).ok()?;
        self.registry
            .projects
            .iter()
            .find(|project| project.path == path)
    }

    /// Register directory as project.
    ///
    /// Returns `false` if directory was already registered.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ResolvePath`] if path cannot be made absolute.
    /// - Return [`StoreError::NotADirectory`] if path is not a directory.
    pub fn add(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = absolute(path.as_ref()).map_err(|err| StoreError::ResolvePath {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        if !path.is_dir() {
            return Err(StoreError::NotADirectory { path });
        }

        if self.registry.projects.iter().any(|project| project.path == path) {
            return Ok(false);
        }

        info!("register project {:?}", path.display());
        self.registry.projects.push(Project::new(path));
        Ok(true)
    }

    /// Forget project registered under target path.
    ///
    /// Returns `false` if no such project was registered. The directory itself
    /// is never touched.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        let Ok(path) = absolute(path.as_ref()) else {
            return false;
        };

        let before = self.registry.projects.len();
        self.registry.projects.retain(|project| project.path != path);
        before != self.registry.projects.len()
    }

    /// Write registry back to its file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::WriteStore`] if registry cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.store_path.parent() {
            mkdirp::mkdirp(parent).map_err(|err| StoreError::WriteStore {
                source: err,
                store_path: self.store_path.clone(),
            })?;
        }

        write(&self.store_path, self.registry.to_string()).map_err(|err| {
            StoreError::WriteStore {
                source: err,
                store_path: self.store_path.clone(),
            }
        })
    }
}

/// All possible error types for project registry interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Registry file cannot be read.
    #[error("failed to read project registry at {:?}", store_path.display())]
    ReadStore {
        #[source]
        source: std::io::Error,
        store_path: PathBuf,
    },

    /// Registry file cannot be written.
    #[error("failed to write project registry at {:?}", store_path.display())]
    WriteStore {
        #[source]
        source: std::io::Error,
        store_path: PathBuf,
    },

    /// Path to register cannot be made absolute.
    #[error("failed to resolve {:?}", path.display())]
    ResolvePath {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Path to register is not a directory.
    #[error("{:?} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Registry file layout is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{env::current_dir, fs::create_dir};

    #[sealed_test]
    fn add_remove_and_reload() -> anyhow::Result<()> {
        let root = current_dir()?;
        create_dir(root.join("alpha"))?;
        create_dir(root.join("beta"))?;
        let store_path = root.join("data").join("projects.toml");

        let mut store = ProjectStore::open(&store_path)?;
        assert!(store.projects().is_empty());
        assert!(store.add(root.join("alpha"))?);
        assert!(store.add("beta")?);
        assert!(!store.add(root.join("alpha"))?);
        store.save()?;

        let mut store = ProjectStore::open(&store_path)?;
        let titles = store
            .projects()
            .iter()
            .map(|project| project.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["alpha", "beta"]);
        assert_eq!(store.find("beta").map(|project| project.path.clone()), Some(root.join("beta")));

        assert!(store.remove(root.join("alpha")));
        assert!(!store.remove(root.join("alpha")));
        assert_eq!(store.projects().len(), 1);

        Ok(())
    }

    #[sealed_test]
    fn dollar_sign_in_path_survives_reload() -> anyhow::Result<()> {
        let root = current_dir()?;
        let project = root.join("price$NOT_SET_VAR");
        create_dir(&project)?;
        let store_path = root.join("projects.toml");

        let mut store = ProjectStore::open(&store_path)?;
        assert!(store.add(&project)?);
        store.save()?;

        let store = ProjectStore::open(&store_path)?;
        assert_eq!(store.projects().len(), 1);
        assert_eq!(store.projects()[0].path, project);
        assert_eq!(store.projects()[0].title, "price$NOT_SET_VAR");

        Ok(())
    }

    #[sealed_test]
    fn refuse_non_directory() -> anyhow::Result<()> {
        let root = current_dir()?;
        let mut store = ProjectStore::open(root.join("projects.toml"))?;
        let result = store.add(root.join("missing"));
        assert!(matches!(result, Err(StoreError::NotADirectory { .. })));

        Ok(())
    }
}
