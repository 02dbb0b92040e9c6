// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running the subject for individual test cases.

use crate::{
    errors::{CaseLaunchError, SetupError},
    manifest::{TestCase, case_build_dir},
    process::{CommandSpec, ProcessRunner, Stdio, absolute_path},
    toolchain::ToolchainEnv,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    fmt,
    time::{Duration, Instant},
};
use tracing::debug;

/// The outcome of running the subject, or the outcome a test case expects.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Outcome {
    /// The subject exited with code 0.
    Pass,

    /// The subject exited with a non-zero code or was terminated by a signal.
    Fail,
}

impl Outcome {
    /// Derives an outcome from an exit code. `None` means the process was terminated by a signal.
    pub fn from_exit_code(exit_code: Option<i32>) -> Self {
        match exit_code {
            Some(0) => Outcome::Pass,
            _ => Outcome::Fail,
        }
    }

    /// Returns true if this is [`Outcome::Pass`].
    pub fn is_pass(self) -> bool {
        self == Outcome::Pass
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Pass => f.pad("pass"),
            Outcome::Fail => f.pad("fail"),
        }
    }
}

/// The result of running one test case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaseResult {
    /// The test case that was run.
    pub case: TestCase,

    /// The observed outcome.
    pub actual: Outcome,

    /// The raw exit code, or `None` if the subject was terminated by a signal.
    pub exit_code: Option<i32>,

    /// Captured standard output.
    pub stdout: Vec<u8>,

    /// Captured standard error.
    pub stderr: Vec<u8>,

    /// How long the subject took to run.
    pub time_taken: Duration,
}

impl CaseResult {
    /// Returns true if the observed outcome is the expected one.
    pub fn matched(&self) -> bool {
        self.case.expected == self.actual
    }
}

/// Runs the subject once per test case.
///
/// Every case shares the same working directory (the test source directory) and gets its own
/// build directory, passed to the subject as `--build-dir=<build-dir>/tests/<name>`. The runner
/// does not create or clean that directory: the subject owns it.
#[derive(Debug)]
pub struct CaseRunner<'a, R> {
    subject: Utf8PathBuf,
    test_dir: Utf8PathBuf,
    build_dir: Utf8PathBuf,
    env: &'a ToolchainEnv,
    process_runner: R,
}

impl<'a, R: ProcessRunner> CaseRunner<'a, R> {
    /// Creates a new case runner.
    ///
    /// `subject`, `test_dir` and `build_dir` are made absolute relative to the current directory,
    /// so that the subject sees an absolute build directory regardless of its working directory.
    pub fn new(
        subject: impl AsRef<Utf8Path>,
        test_dir: impl AsRef<Utf8Path>,
        build_dir: impl AsRef<Utf8Path>,
        env: &'a ToolchainEnv,
        process_runner: R,
    ) -> Result<Self, SetupError> {
        Ok(Self {
            subject: absolute_path(subject.as_ref())?,
            test_dir: absolute_path(test_dir.as_ref())?,
            build_dir: absolute_path(build_dir.as_ref())?,
            env,
            process_runner,
        })
    }

    /// Returns the command line that [`run_case`](Self::run_case) would execute.
    pub fn command_for(&self, case: &TestCase) -> CommandSpec {
        let case_dir = case_build_dir(&self.build_dir, &case.name);
        CommandSpec::new(self.subject.clone())
            .arg(format!("--build-dir={case_dir}"))
            .args(case.arguments.iter().map(String::as_str))
            .cwd(self.test_dir.clone())
            .envs(self.env.iter())
            .stdio(Stdio::Capture)
    }

    /// Runs the subject for `case` and blocks until it exits.
    ///
    /// A subject that starts and exits unsuccessfully is a normal result with
    /// [`Outcome::Fail`]. An error is returned only if the subject could not be started.
    pub fn run_case(&self, case: &TestCase) -> Result<CaseResult, CaseLaunchError> {
        let command = self.command_for(case);
        debug!(case = %case.name, command = %command.display_command(), "running test case");

        let start_time = Instant::now();
        let output = self
            .process_runner
            .run(&command)
            .map_err(|error| CaseLaunchError {
                case_name: case.name.clone(),
                subject: self.subject.clone(),
                error,
            })?;
        let time_taken = start_time.elapsed();

        Ok(CaseResult {
            case: case.clone(),
            actual: Outcome::from_exit_code(output.exit_code),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            time_taken,
        })
    }
}
