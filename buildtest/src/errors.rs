// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use buildtest_runner::{errors::*, exit_codes::BuildtestExitCode};
use camino::FromPathBufError;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that buildtest expects and reports with a dedicated exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("home directory not found")]
    HomeDirNotFound,
    #[error("home directory is not valid UTF-8")]
    HomeDirInvalidUtf8 {
        #[source]
        err: FromPathBufError,
    },
    #[error("setup error")]
    SetupError {
        #[from]
        err: SetupError,
    },
    #[error("build failed")]
    BuildFailed {
        #[from]
        err: BuildError,
    },
    #[error("manifest read error")]
    ManifestReadError {
        #[from]
        err: ManifestReadError,
    },
    #[error("subject launch failed")]
    SubjectLaunchFailed {
        #[from]
        err: CaseLaunchError,
    },
    #[error("error writing test report")]
    WriteReportError {
        #[from]
        err: WriteReportError,
    },
    #[error("error writing JUnit report")]
    JunitError {
        #[from]
        err: JunitError,
    },
    #[error("test run failed")]
    TestRunFailed,
}

impl From<OrchestratorError> for ExpectedError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Setup(err) => err.into(),
            OrchestratorError::Build(err) => err.into(),
            OrchestratorError::Manifest(err) => err.into(),
            OrchestratorError::Launch(err) => err.into(),
            OrchestratorError::WriteReport(err) => err.into(),
            OrchestratorError::Junit(err) => err.into(),
        }
    }
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::HomeDirNotFound | Self::HomeDirInvalidUtf8 { .. } | Self::SetupError { .. } => {
                BuildtestExitCode::SETUP_ERROR
            }
            Self::BuildFailed { .. } => BuildtestExitCode::BUILD_FAILED,
            Self::ManifestReadError { .. } => BuildtestExitCode::MANIFEST_PARSE_FAILED,
            Self::SubjectLaunchFailed { .. } => BuildtestExitCode::SUBJECT_LAUNCH_FAILED,
            Self::WriteReportError { .. } | Self::JunitError { .. } => {
                BuildtestExitCode::WRITE_OUTPUT_ERROR
            }
            Self::TestRunFailed => BuildtestExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::HomeDirNotFound => {
                error!(
                    "home directory not found: specify the toolchain root with `{}`",
                    "--goroot".style(styles.bold)
                );
                None
            }
            Self::HomeDirInvalidUtf8 { err } => {
                error!(
                    "home directory `{}` is not valid UTF-8",
                    err.as_path().display().style(styles.bold)
                );
                None
            }
            Self::SetupError { err } => {
                error!("{err}");
                err.source()
            }
            Self::BuildFailed { err } => match err {
                BuildError::ExecFailed {
                    stage,
                    command,
                    error,
                } => {
                    error!(
                        "failed to execute {stage} command `{}`",
                        command.style(styles.bold)
                    );
                    Some(error as &dyn Error)
                }
                BuildError::Failed {
                    stage,
                    command,
                    exit_code,
                } => {
                    let status = match exit_code {
                        Some(code) => format!("exit code {code}"),
                        None => "a signal".to_owned(),
                    };
                    error!(
                        "{stage} command `{}` failed with {}",
                        command.style(styles.bold),
                        status.style(styles.bold)
                    );
                    None
                }
            },
            Self::ManifestReadError { err } => match err {
                ManifestReadError::Read { path, error } => {
                    error!("failed to read manifest at `{}`", path.style(styles.bold));
                    Some(error as &dyn Error)
                }
                ManifestReadError::Parse { path, error } => {
                    // Parse errors are printed out using miette.
                    let report = miette::Report::new(error.clone());
                    error!(target: NO_HEADING_TARGET, "{report:?}");
                    error!("failed to parse manifest at `{}`", path.style(styles.bold));
                    None
                }
            },
            Self::SubjectLaunchFailed { err } => {
                error!(
                    "failed to launch `{}` for test case `{}`",
                    err.subject.style(styles.bold),
                    err.case_name.style(styles.bold)
                );
                Some(&err.error as &dyn Error)
            }
            Self::WriteReportError { err } => {
                error!("{err}");
                err.source()
            }
            Self::JunitError { err } => {
                error!("{err}");
                err.source()
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
