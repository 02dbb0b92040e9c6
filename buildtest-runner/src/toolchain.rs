// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The toolchain environment passed to spawned processes.

use crate::errors::SetupError;
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::BTreeMap, ffi::OsString};

/// The environment variable that names the toolchain root.
pub const GOROOT_ENV: &str = "GOROOT";

/// The search path environment variable the toolchain root is prepended to.
pub const PATH_ENV: &str = "PATH";

/// Environment variables derived from the toolchain root.
///
/// The toolchain root is prepended to `PATH` and exported as `GOROOT`. These are applied to each
/// spawned process individually; buildtest never changes its own environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolchainEnv {
    goroot: Utf8PathBuf,
    vars: BTreeMap<String, String>,
}

impl ToolchainEnv {
    /// Creates the environment for `goroot`, based on this process's `PATH`.
    pub fn new(goroot: impl Into<Utf8PathBuf>) -> Result<Self, SetupError> {
        Self::with_base_path(goroot, std::env::var_os(PATH_ENV))
    }

    /// Creates the environment for `goroot`, prepending it to `base_path`.
    pub fn with_base_path(
        goroot: impl Into<Utf8PathBuf>,
        base_path: Option<OsString>,
    ) -> Result<Self, SetupError> {
        let goroot = goroot.into();

        let mut search_path = vec![goroot.clone().into_std_path_buf()];
        if let Some(base_path) = &base_path {
            search_path.extend(std::env::split_paths(base_path));
        }
        let path = std::env::join_paths(search_path).map_err(|error| SetupError::JoinPaths {
            goroot: goroot.clone(),
            error,
        })?;
        let path = path
            .into_string()
            .map_err(|_| SetupError::NonUtf8EnvVar { name: PATH_ENV })?;

        let mut vars = BTreeMap::new();
        vars.insert(PATH_ENV.to_owned(), path);
        vars.insert(GOROOT_ENV.to_owned(), goroot.to_string());

        Ok(Self { goroot, vars })
    }

    /// Returns the toolchain root.
    pub fn goroot(&self) -> &Utf8Path {
        &self.goroot
    }

    /// Returns the path to a program in the toolchain's `bin` directory.
    pub fn tool(&self, name: &str) -> Utf8PathBuf {
        self.goroot.join("bin").join(name)
    }

    /// Returns the variables to set on spawned processes.
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Iterates over the variables as `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.vars
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}
