// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Scripted process runner for unit tests.

use crate::process::{GitCommand, ProcessError, ProcessRunner, Result};

use std::{fs::create_dir_all, path::Path, sync::Mutex};

enum Reply {
    Stdout(String),
    Stderr(String),
}

/// Runner that answers from a script instead of spawning Git.
///
/// Each rule matches on the leading arguments of a command, ignoring `-c`
/// overrides. First matching rule wins. Commands without a matching rule
/// succeed with empty output. Every command is recorded.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    rules: Vec<(Vec<String>, Reply)>,
    calls: Mutex<Vec<GitCommand>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer matching commands with stdout.
    pub(crate) fn ok(mut self, prefix: &[&str], stdout: &str) -> Self {
        self.rules.push((to_strings(prefix), Reply::Stdout(stdout.into())));
        self
    }

    /// Fail matching commands with stderr.
    pub(crate) fn fail(mut self, prefix: &[&str], stderr: &str) -> Self {
        self.rules.push((to_strings(prefix), Reply::Stderr(stderr.into())));
        self
    }

    pub(crate) fn calls(&self) -> Vec<GitCommand> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Count recorded invocations of target subcommand.
    pub(crate) fn count(&self, subcommand: &str) -> usize {
        self.calls()
            .iter()
            .filter(|command| command.subcommand().is_some_and(|name| name == subcommand))
            .count()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, command: &GitCommand, _cwd: &Path) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }

        let args = command
            .arguments()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        let reply = self
            .rules
            .iter()
            .find(|(prefix, _)| args.starts_with(prefix))
            .map(|(_, reply)| reply);

        match reply {
            Some(Reply::Stdout(stdout)) => Ok(stdout.clone()),
            Some(Reply::Stderr(stderr)) => Err(ProcessError::exit(command, Some(1), stderr)),
            None => Ok(String::new()),
        }
    }
}

fn to_strings(prefix: &[&str]) -> Vec<String> {
    prefix.iter().map(ToString::to_string).collect()
}

/// Create fake working copy, i.e., a directory with a `.git` entry.
pub(crate) fn fake_repository(root: &Path) -> std::io::Result<()> {
    create_dir_all(root.join(".git"))
}
