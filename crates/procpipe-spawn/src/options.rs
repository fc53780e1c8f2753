// SPDX-License-Identifier: MIT OR Apache-2.0
//! Immutable spawn configuration: working directory and environment.

use std::env;
use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::SpawnError;

/// Immutable spawn configuration.
///
/// Holds the working directory the child starts in and an ordered
/// environment table. Duplicate names may coexist in the table; they are
/// resolved only when the table is applied, where the later entry wins.
///
/// Mutators consume the value and hand back a new one, short-circuiting
/// to the received value unchanged when the edit would be a no-op. Values
/// are cheap to clone and safe to share across concurrent invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOptions {
    working_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl SpawnOptions {
    /// Snapshot the calling process's working directory and full
    /// environment table at this moment.
    ///
    /// The snapshot is plain data from here on: later changes to the
    /// parent's environment do not leak into it.
    pub fn capture() -> std::io::Result<Self> {
        Ok(Self {
            working_dir: env::current_dir()?,
            env: env::vars().collect(),
        })
    }

    /// Working directory the child will start in.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// The ordered environment table, duplicates included.
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Replace the working directory. Identity when `dir` equals the
    /// current value.
    pub fn with_working_dir(self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if dir == self.working_dir {
            return self;
        }
        Self {
            working_dir: dir,
            ..self
        }
    }

    /// Replace the entire environment table. Identity when both the old
    /// and the new table are empty.
    pub fn with_env_list(self, vars: Vec<(String, String)>) -> Self {
        if vars.is_empty() && self.env.is_empty() {
            return self;
        }
        Self { env: vars, ..self }
    }

    /// Append `(name, value)` without touching existing entries for
    /// `name`; duplicates coexist until resolved.
    ///
    /// Fails when `name` is empty.
    pub fn add_env(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, SpawnError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SpawnError::InvalidArgument(
                "environment variable name is empty".into(),
            ));
        }
        self.env.push((name, value.into()));
        Ok(self)
    }

    /// Replace every entry named `name` with a single `(name, value)`
    /// when `value` is present; remove them all when it is absent.
    pub fn set_env(
        self,
        name: impl Into<String>,
        value: Option<&str>,
    ) -> Result<Self, SpawnError> {
        let name = name.into();
        let cleared = self.unset_env(&name);
        match value {
            Some(value) => cleared.add_env(name, value),
            None => Ok(cleared),
        }
    }

    /// Remove all entries named `name`. Name comparison is ASCII
    /// case-insensitive on Windows and exact elsewhere. Identity when
    /// nothing matches.
    pub fn unset_env(mut self, name: &str) -> Self {
        if !self.env.iter().any(|(n, _)| env_name_eq(n, name)) {
            return self;
        }
        self.env.retain(|(n, _)| !env_name_eq(n, name));
        self
    }

    /// Remove every entry. Identity when the table is already empty.
    pub fn clear_env(self) -> Self {
        if self.env.is_empty() {
            return self;
        }
        Self {
            env: Vec::new(),
            ..self
        }
    }

    /// Apply this configuration to `cmd`: set the working directory and
    /// replace the command's environment with the table, in order, so a
    /// later duplicate name overrides an earlier one. The child sees
    /// exactly this table — nothing is merged in from the parent.
    pub fn apply_to(&self, cmd: &mut Command) {
        cmd.current_dir(&self.working_dir);
        cmd.env_clear();
        for (name, value) in &self.env {
            cmd.env(name, value);
        }
    }
}

fn env_name_eq(a: &str, b: &str) -> bool {
    if cfg!(windows) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}
