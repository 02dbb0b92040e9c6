// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building the subject from source.

use crate::{
    errors::BuildError,
    process::{CommandSpec, ProcessRunner, Stdio},
    toolchain::ToolchainEnv,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use tracing::debug;

/// The compiler, relative to the toolchain's `bin` directory.
pub const COMPILER: &str = "6g";

/// The linker, relative to the toolchain's `bin` directory.
pub const LINKER: &str = "6l";

/// Produces the subject executable from a source file.
pub trait Builder {
    /// Builds `source` into `out_dir` and returns the path to the executable.
    ///
    /// `out_dir` already exists when this is called.
    fn build(&self, source: &Utf8Path, out_dir: &Utf8Path) -> Result<Utf8PathBuf, BuildError>;
}

/// A stage of the build.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BuildStage {
    /// Compiling the source file into an object file.
    Compile,

    /// Linking the object file into an executable.
    Link,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStage::Compile => write!(f, "compile"),
            BuildStage::Link => write!(f, "link"),
        }
    }
}

/// Builds the subject with the toolchain's compiler and linker.
///
/// For a source file `<name>.go`, this runs:
///
/// ```text
/// <goroot>/bin/6g -o <out-dir>/<name>.6 <source>
/// <goroot>/bin/6l -o <out-dir>/<name> <out-dir>/<name>.6
/// ```
///
/// The linker only runs if the compiler succeeds. Toolchain output is passed through to the
/// terminal.
#[derive(Debug)]
pub struct ToolchainBuilder<'a, R> {
    env: &'a ToolchainEnv,
    process_runner: R,
}

impl<'a, R: ProcessRunner> ToolchainBuilder<'a, R> {
    /// Creates a new builder using the toolchain described by `env`.
    pub fn new(env: &'a ToolchainEnv, process_runner: R) -> Self {
        Self {
            env,
            process_runner,
        }
    }

    fn run_stage(&self, stage: BuildStage, command: CommandSpec) -> Result<(), BuildError> {
        debug!(%stage, command = %command.display_command(), "running build stage");
        let output = self
            .process_runner
            .run(&command)
            .map_err(|error| BuildError::ExecFailed {
                stage,
                command: command.display_command(),
                error,
            })?;
        if !output.success() {
            return Err(BuildError::Failed {
                stage,
                command: command.display_command(),
                exit_code: output.exit_code,
            });
        }
        Ok(())
    }

    fn command(&self, tool: &str) -> CommandSpec {
        CommandSpec::new(self.env.tool(tool))
            .envs(self.env.iter())
            .stdio(Stdio::Inherit)
    }
}

impl<R: ProcessRunner> Builder for ToolchainBuilder<'_, R> {
    fn build(&self, source: &Utf8Path, out_dir: &Utf8Path) -> Result<Utf8PathBuf, BuildError> {
        let stem = source.file_stem().unwrap_or("a.out");
        let object = out_dir.join(format!("{stem}.6"));
        let executable = out_dir.join(stem);

        self.run_stage(
            BuildStage::Compile,
            self.command(COMPILER)
                .args(["-o", object.as_str(), source.as_str()]),
        )?;
        self.run_stage(
            BuildStage::Link,
            self.command(LINKER)
                .args(["-o", executable.as_str(), object.as_str()]),
        )?;

        Ok(executable)
    }
}
