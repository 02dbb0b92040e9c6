// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts},
};
use buildtest_runner::{
    exit_codes::BuildtestExitCode,
    orchestrator::{Orchestrator, RunConfig},
    process::DuctProcessRunner,
    reporter::SuiteReporter,
    toolchain::ToolchainEnv,
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::io::Write;
use tracing::{debug, warn};

/// The command that runs the test suite after building.
const TEST_COMMAND: &str = "test";

/// Builds a program with the toolchain, then checks it against a manifest of test cases.
///
/// The source file is compiled and linked into the build directory. If the `test` command is
/// given, the program is then run once per manifest line and each exit status is compared with
/// the line's expectation.
#[derive(Debug, Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct BuildtestApp {
    /// Toolchain root [default: ~/src/go]
    #[arg(long, value_name = "PATH", env = "BUILDTEST_GOROOT")]
    goroot: Option<Utf8PathBuf>,

    /// Directory build outputs are written to [default: <source-dir>/bin]
    #[arg(long, value_name = "PATH", env = "BUILDTEST_BUILD_DIR")]
    build_dir: Option<Utf8PathBuf>,

    /// Project directory holding the source file and the tests directory
    #[arg(long, value_name = "PATH", default_value = ".")]
    source_dir: Utf8PathBuf,

    /// Source file to build, relative to the source directory
    #[arg(long, value_name = "FILE", default_value = "gorun.go")]
    source: Utf8PathBuf,

    /// Test manifest [default: <source-dir>/tests/tests]
    #[arg(long, value_name = "PATH")]
    manifest: Option<Utf8PathBuf>,

    /// Write a JUnit XML report to this path after testing
    #[arg(long, value_name = "PATH")]
    junit: Option<Utf8PathBuf>,

    #[clap(flatten)]
    output: OutputOpts,

    /// Commands to run after building (`test` runs the test suite)
    #[arg(value_name = "COMMAND")]
    commands: Vec<String>,
}

impl BuildtestApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, writing suite output to `writer`.
    pub fn exec(self, output: OutputContext, writer: impl Write) -> Result<i32> {
        let config = self.run_config();
        let goroot = match self.goroot {
            Some(goroot) => goroot,
            None => default_goroot()?,
        };
        let env = ToolchainEnv::new(goroot)?;
        debug!(goroot = %env.goroot(), ?config, "resolved configuration");

        let mut reporter = SuiteReporter::new(writer);
        if output.color.should_colorize(supports_color::Stream::Stdout) {
            reporter.colorize();
        }

        let verdict = Orchestrator::new(&config, &env, DuctProcessRunner).run(&mut reporter)?;
        if verdict.is_success() {
            Ok(BuildtestExitCode::OK)
        } else {
            Err(ExpectedError::TestRunFailed)
        }
    }

    fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::for_source_dir(&self.source_dir);
        config.source = self.source_dir.join(&self.source);
        if let Some(build_dir) = &self.build_dir {
            config.build_dir.clone_from(build_dir);
        }
        if let Some(manifest) = &self.manifest {
            config.manifest.clone_from(manifest);
        }
        config.junit_path.clone_from(&self.junit);
        config.run_tests = wants_tests(&self.commands);
        config
    }
}

/// Returns true if `test` is among the commands. Other commands are ignored.
fn wants_tests(commands: &[String]) -> bool {
    let mut run_tests = false;
    for command in commands {
        if command == TEST_COMMAND {
            run_tests = true;
        } else {
            warn!("ignoring unknown command `{command}`");
        }
    }
    run_tests
}

fn default_goroot() -> Result<Utf8PathBuf> {
    let home = home::home_dir().ok_or(ExpectedError::HomeDirNotFound)?;
    let home =
        Utf8PathBuf::try_from(home).map_err(|err| ExpectedError::HomeDirInvalidUtf8 { err })?;
    Ok(goroot_under(&home))
}

fn goroot_under(home: &Utf8Path) -> Utf8PathBuf {
    home.join("src").join("go")
}
