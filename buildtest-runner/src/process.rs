// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spawning external processes.
//!
//! Everything buildtest runs (the toolchain stages and the subject under test) goes through the
//! [`ProcessRunner`] trait, so the build and test logic can be exercised without spawning real
//! processes.

use crate::errors::SetupError;
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::BTreeMap, io};
use tracing::debug;

/// What to do with a child's standard output and error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stdio {
    /// Buffer both streams to completion and return them.
    Capture,

    /// Pass both streams through to this process's stdout and stderr.
    Inherit,
}

/// A command to run: program, arguments, working directory and extra environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    /// The program to run.
    pub program: Utf8PathBuf,

    /// Arguments, in order.
    pub args: Vec<String>,

    /// The working directory. If `None`, the current directory is used.
    pub cwd: Option<Utf8PathBuf>,

    /// Environment variables set on top of the inherited environment.
    pub env: BTreeMap<String, String>,

    /// How standard output and error are handled.
    pub stdio: Stdio,
}

impl CommandSpec {
    /// Creates a new command for `program`, capturing its output.
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            stdio: Stdio::Capture,
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn cwd(mut self, cwd: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Adds environment variables.
    pub fn envs(
        mut self,
        env: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets how output is handled.
    pub fn stdio(mut self, stdio: Stdio) -> Self {
        self.stdio = stdio;
        self
    }

    /// Returns the program and its arguments joined into a shell-quoted string.
    pub fn display_command(&self) -> String {
        shell_words::join(self.all_args())
    }

    fn all_args(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }
}

/// The result of running a process to completion.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessOutput {
    /// The exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,

    /// Captured standard output. Empty if output was inherited.
    pub stdout: Vec<u8>,

    /// Captured standard error. Empty if output was inherited.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Returns true if the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands synchronously.
pub trait ProcessRunner {
    /// Runs `command` and blocks until it exits and its output streams are drained.
    ///
    /// Returns an error only if the process could not be started or waited on. A process that
    /// starts and exits unsuccessfully is an `Ok` result with a non-zero exit code.
    fn run(&self, command: &CommandSpec) -> io::Result<ProcessOutput>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for &T {
    fn run(&self, command: &CommandSpec) -> io::Result<ProcessOutput> {
        (**self).run(command)
    }
}

/// A [`ProcessRunner`] that spawns real processes with `duct`.
#[derive(Copy, Clone, Debug, Default)]
pub struct DuctProcessRunner;

impl ProcessRunner for DuctProcessRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<ProcessOutput> {
        debug!(
            command = %command.display_command(),
            cwd = ?command.cwd,
            "spawning process"
        );

        // Call as_str rather than as_std_path so that bare program names are looked up in PATH.
        let mut expression = duct::cmd(command.program.as_str(), &command.args).unchecked();
        if let Some(cwd) = &command.cwd {
            expression = expression.dir(cwd.as_std_path());
        }
        for (name, value) in &command.env {
            expression = expression.env(name, value);
        }
        if command.stdio == Stdio::Capture {
            expression = expression.stdout_capture().stderr_capture();
        }

        let output = expression.run()?;
        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Makes `path` absolute relative to the current directory, without requiring it to exist.
pub(crate) fn absolute_utf8(path: &Utf8Path) -> io::Result<Utf8PathBuf> {
    let absolute = std::path::absolute(path)?;
    Utf8PathBuf::from_path_buf(absolute).map_err(|absolute| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path {} is not valid UTF-8", absolute.display()),
        )
    })
}

/// Like [`absolute_utf8`], reporting failures as a [`SetupError`].
pub(crate) fn absolute_path(path: &Utf8Path) -> Result<Utf8PathBuf, SetupError> {
    absolute_utf8(path).map_err(|error| SetupError::AbsolutePath {
        path: path.to_owned(),
        error,
    })
}
