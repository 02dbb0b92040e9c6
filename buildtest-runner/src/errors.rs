// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by buildtest.

use crate::builder::BuildStage;
use camino::Utf8PathBuf;
use miette::{Diagnostic, SourceSpan};
use std::{env::JoinPathsError, fmt, io};
use thiserror::Error;

/// An error that occurred while parsing a single line of a test manifest.
#[derive(Clone, Debug, Error, Diagnostic, PartialEq, Eq)]
#[error("malformed manifest line {line_number}: {kind}")]
#[non_exhaustive]
pub struct ManifestParseError {
    /// The 1-based line number.
    pub line_number: usize,

    /// The full text of the line.
    #[source_code]
    pub line: String,

    /// The part of the line the error refers to.
    #[label("{}", kind)]
    pub span: SourceSpan,

    /// What went wrong.
    pub kind: ManifestParseErrorKind,
}

impl ManifestParseError {
    pub(crate) fn new(
        line_number: usize,
        line: impl Into<String>,
        span: impl Into<SourceSpan>,
        kind: ManifestParseErrorKind,
    ) -> Self {
        Self {
            line_number,
            line: line.into(),
            span: span.into(),
            kind,
        }
    }
}

/// The reason a manifest line failed to parse.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ManifestParseErrorKind {
    /// The line has no `:` separating the name from the arguments.
    MissingSeparator,

    /// Nothing (not even a sign marker) precedes the `:`.
    EmptyNameField,

    /// The sign marker is not followed by a name.
    EmptyName,

    /// The name cannot be used as a directory component.
    InvalidName,

    /// The name was already used by an earlier line.
    DuplicateName {
        /// The line that first used this name.
        first_line: usize,
    },
}

impl fmt::Display for ManifestParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "missing `:` between name and arguments"),
            Self::EmptyNameField => write!(f, "missing sign and name before `:`"),
            Self::EmptyName => write!(f, "missing test name after the sign marker"),
            Self::InvalidName => write!(f, "test name must be a single path component"),
            Self::DuplicateName { first_line } => {
                write!(f, "test name already used on line {first_line}")
            }
        }
    }
}

/// An error that occurred while reading a manifest file.
#[derive(Debug, Error)]
pub enum ManifestReadError {
    /// The manifest file could not be read.
    #[error("failed to read manifest at `{path}`")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A line in the manifest is malformed.
    #[error("failed to parse manifest at `{path}`")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The first malformed line.
        #[source]
        error: ManifestParseError,
    },
}

/// An error that occurred while building the subject.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A toolchain program could not be started.
    #[error("failed to execute {stage} command `{command}`")]
    ExecFailed {
        /// The stage that failed.
        stage: BuildStage,

        /// The command line, shell-quoted.
        command: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A toolchain program exited unsuccessfully.
    #[error("{stage} command `{command}` failed{}", fmt_exit_code(*.exit_code))]
    Failed {
        /// The stage that failed.
        stage: BuildStage,

        /// The command line, shell-quoted.
        command: String,

        /// The exit code, or `None` if the program was terminated by a signal.
        exit_code: Option<i32>,
    },
}

impl BuildError {
    /// Returns the stage that failed.
    pub fn stage(&self) -> BuildStage {
        match self {
            Self::ExecFailed { stage, .. } | Self::Failed { stage, .. } => *stage,
        }
    }
}

fn fmt_exit_code(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!(" with exit code {code}"),
        None => " (terminated by signal)".to_owned(),
    }
}

/// An error that occurred while launching the subject for a test case.
///
/// This is distinct from a test case failing: the subject never ran.
#[derive(Debug, Error)]
#[error("failed to launch `{subject}` for test case `{case_name}`")]
pub struct CaseLaunchError {
    /// The name of the test case.
    pub case_name: String,

    /// The subject that could not be launched.
    pub subject: Utf8PathBuf,

    /// The underlying error.
    #[source]
    pub error: io::Error,
}

/// An error that occurred while preparing directories and paths for a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SetupError {
    /// The build directory could not be created.
    #[error("failed to create build directory `{path}`")]
    CreateBuildDir {
        /// The build directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A path could not be made absolute.
    #[error("failed to resolve absolute path for `{path}`")]
    AbsolutePath {
        /// The relative path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// An environment variable passed to child processes is not valid UTF-8.
    #[error("environment variable `{name}` is not valid UTF-8")]
    NonUtf8EnvVar {
        /// The name of the variable.
        name: &'static str,
    },

    /// The toolchain root could not be added to `PATH`.
    #[error("failed to add `{goroot}` to PATH")]
    JoinPaths {
        /// The toolchain root.
        goroot: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: JoinPathsError,
    },
}

/// An error that occurred while writing the report.
#[derive(Debug, Error)]
#[error("failed to write test report")]
pub struct WriteReportError {
    #[from]
    error: io::Error,
}

/// An error that occurred while writing a JUnit report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JunitError {
    /// The JUnit file or its parent directory could not be created.
    #[error("failed to create JUnit file `{path}`")]
    Fs {
        /// The path that could not be created.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The report could not be serialized.
    #[error("failed to serialize JUnit report to `{path}`")]
    Serialize {
        /// The JUnit path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// A fatal error that aborted a build-and-test run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Directories or paths could not be set up.
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// The subject failed to build.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The manifest could not be read or parsed.
    #[error(transparent)]
    Manifest(#[from] ManifestReadError),

    /// The subject could not be launched for a test case.
    #[error(transparent)]
    Launch(#[from] CaseLaunchError),

    /// The report could not be written.
    #[error(transparent)]
    WriteReport(#[from] WriteReportError),

    /// The JUnit report could not be written.
    #[error(transparent)]
    Junit(#[from] JunitError),
}
