// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequencing the build and the test suite.

use crate::{
    builder::{Builder, ToolchainBuilder},
    errors::{OrchestratorError, SetupError},
    junit::write_junit,
    manifest::Manifest,
    process::{ProcessRunner, absolute_path},
    reporter::{Report, SuiteReporter},
    runner::CaseRunner,
    toolchain::ToolchainEnv,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{fmt, io::Write};
use tracing::{debug, info};

/// Configuration for a single build-and-test run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunConfig {
    /// The source file to build.
    pub source: Utf8PathBuf,

    /// The directory build outputs are written to. Created if it doesn't exist.
    pub build_dir: Utf8PathBuf,

    /// The directory the subject runs in for every test case.
    pub test_dir: Utf8PathBuf,

    /// The test manifest.
    pub manifest: Utf8PathBuf,

    /// Whether to run the test suite after building.
    pub run_tests: bool,

    /// If set, a JUnit report is written here after the suite runs.
    pub junit_path: Option<Utf8PathBuf>,
}

impl RunConfig {
    /// Returns a configuration for the standard project layout under `source_dir`:
    ///
    /// * the source file is `<source-dir>/gorun.go`
    /// * build outputs go to `<source-dir>/bin`
    /// * test cases run in `<source-dir>/tests`, as declared by `<source-dir>/tests/tests`
    pub fn for_source_dir(source_dir: &Utf8Path) -> Self {
        let test_dir = source_dir.join("tests");
        Self {
            source: source_dir.join("gorun.go"),
            build_dir: source_dir.join("bin"),
            manifest: test_dir.join("tests"),
            test_dir,
            run_tests: false,
            junit_path: None,
        }
    }
}

/// A phase of a run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Compiling and linking the subject.
    Building,

    /// Running the test suite against the subject.
    Testing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Phase::Building => f.pad("building"),
            Phase::Testing => f.pad("testing"),
        }
    }
}

/// The result of a run that wasn't aborted by a fatal error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// The subject was built and testing was not requested.
    BuildOnly {
        /// The built subject.
        subject: Utf8PathBuf,
    },

    /// The subject was built and the test suite ran.
    Tested {
        /// The built subject.
        subject: Utf8PathBuf,

        /// The results of the suite.
        report: Report,
    },
}

impl Verdict {
    /// Returns true if the run succeeded: the build succeeded and every case (if any ran)
    /// matched its expectation.
    pub fn is_success(&self) -> bool {
        match self {
            Verdict::BuildOnly { .. } => true,
            Verdict::Tested { report, .. } => report.is_success(),
        }
    }

    /// Returns the report, if the test suite ran.
    pub fn report(&self) -> Option<&Report> {
        match self {
            Verdict::BuildOnly { .. } => None,
            Verdict::Tested { report, .. } => Some(report),
        }
    }
}

/// Builds the subject, then runs the test suite against it if requested.
#[derive(Debug)]
pub struct Orchestrator<'a, B, R> {
    config: &'a RunConfig,
    env: &'a ToolchainEnv,
    builder: B,
    process_runner: R,
}

impl<'a, R: ProcessRunner + Copy> Orchestrator<'a, ToolchainBuilder<'a, R>, R> {
    /// Creates an orchestrator that builds with the toolchain in `env`.
    ///
    /// Every process (toolchain stages and the subject) is spawned through `process_runner` with
    /// the variables in `env` set.
    pub fn new(config: &'a RunConfig, env: &'a ToolchainEnv, process_runner: R) -> Self {
        let builder = ToolchainBuilder::new(env, process_runner);
        Self::with_builder(config, env, builder, process_runner)
    }
}

impl<'a, B: Builder, R: ProcessRunner> Orchestrator<'a, B, R> {
    /// Creates an orchestrator that builds the subject with `builder`.
    ///
    /// The subject is spawned through `process_runner` with the variables in `env` set.
    pub fn with_builder(
        config: &'a RunConfig,
        env: &'a ToolchainEnv,
        builder: B,
        process_runner: R,
    ) -> Self {
        Self {
            config,
            env,
            builder,
            process_runner,
        }
    }

    /// Runs the build, and the test suite if requested, writing suite output to `reporter`.
    ///
    /// Case mismatches are reported in the returned [`Verdict`]. Anything that stops the run
    /// from completing (a failed build, a malformed manifest, a subject that cannot be launched)
    /// is an error, and no test case runs after it.
    ///
    /// Per-case lines are written as each case finishes. If the subject cannot be launched for a
    /// case, the lines for the cases before it have already been written, but no diagnostics or
    /// summary follow.
    pub fn run<W: Write>(
        &self,
        reporter: &mut SuiteReporter<W>,
    ) -> Result<Verdict, OrchestratorError> {
        let build_dir = absolute_path(&self.config.build_dir)?;
        let source = absolute_path(&self.config.source)?;
        std::fs::create_dir_all(&build_dir).map_err(|error| SetupError::CreateBuildDir {
            path: build_dir.clone(),
            error,
        })?;

        self.enter(Phase::Building, &source);
        let subject = self.builder.build(&source, &build_dir)?;
        debug!(%subject, "build succeeded");

        if !self.config.run_tests {
            return Ok(Verdict::BuildOnly { subject });
        }

        self.enter(Phase::Testing, &self.config.manifest);
        let manifest = Manifest::from_path(&self.config.manifest)?;
        debug!(
            manifest = %self.config.manifest,
            case_count = manifest.len(),
            "read test manifest"
        );

        let case_runner = CaseRunner::new(
            &subject,
            &self.config.test_dir,
            &build_dir,
            self.env,
            &self.process_runner,
        )?;
        let mut report = Report::new();
        for case in manifest.iter() {
            let result = case_runner.run_case(case)?;
            reporter.report_case(&result)?;
            report.push(result);
        }
        reporter.report_finished(&report)?;

        if let Some(junit_path) = &self.config.junit_path {
            let suite_name = subject.file_name().unwrap_or("tests");
            write_junit(&report, suite_name, junit_path)?;
            debug!(%junit_path, "wrote JUnit report");
        }

        Ok(Verdict::Tested { subject, report })
    }

    fn enter(&self, phase: Phase, input: &Utf8Path) {
        info!("{phase} {input}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::{BuildError, ManifestReadError},
        process::test_helpers::{MockProcessRunner, MockResponse},
        runner::Outcome,
    };
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::io;

    struct Fixture {
        _dir: Utf8TempDir,
        config: RunConfig,
        env: ToolchainEnv,
    }

    impl Fixture {
        fn new(manifest: &str) -> Self {
            let dir = camino_tempfile::tempdir().expect("tempdir created");
            let mut config = RunConfig::for_source_dir(dir.path());
            config.run_tests = true;
            std::fs::create_dir_all(&config.test_dir).expect("test dir created");
            std::fs::write(&config.manifest, manifest).expect("manifest written");
            Self {
                _dir: dir,
                config,
                env: ToolchainEnv::with_base_path("/opt/go", None).expect("paths join"),
            }
        }

        fn run(&self, runner: &MockProcessRunner) -> (Result<Verdict, OrchestratorError>, String) {
            let mut reporter = SuiteReporter::new(Vec::new());
            let result = Orchestrator::new(&self.config, &self.env, runner).run(&mut reporter);
            let output = String::from_utf8(reporter.into_inner()).expect("output is UTF-8");
            (result, output)
        }
    }

    fn build_ok() -> [MockResponse; 2] {
        [MockResponse::exit(0), MockResponse::exit(0)]
    }

    #[test]
    fn for_source_dir_layout() {
        let config = RunConfig::for_source_dir(Utf8Path::new("/work"));
        assert_eq!(config.source, Utf8PathBuf::from("/work/gorun.go"));
        assert_eq!(config.build_dir, Utf8PathBuf::from("/work/bin"));
        assert_eq!(config.test_dir, Utf8PathBuf::from("/work/tests"));
        assert_eq!(config.manifest, Utf8PathBuf::from("/work/tests/tests"));
        assert!(!config.run_tests);
    }

    #[test]
    fn build_only() {
        let mut fixture = Fixture::new("+never-run : x\n");
        fixture.config.run_tests = false;
        let runner = MockProcessRunner::new(build_ok());

        let (verdict, output) = fixture.run(&runner);
        let verdict = verdict.expect("run succeeds");
        assert!(verdict.is_success());
        assert_eq!(verdict.report(), None);
        assert_eq!(output, "");
        assert_eq!(runner.commands().len(), 2, "only the toolchain ran");
        assert!(fixture.config.build_dir.is_dir(), "build dir was created");
    }

    #[test]
    fn build_failure_skips_tests() {
        let fixture = Fixture::new("+ok :\n");
        let runner = MockProcessRunner::new([MockResponse::exit(1)]);

        let (verdict, output) = fixture.run(&runner);
        assert!(
            matches!(verdict, Err(OrchestratorError::Build(_))),
            "unexpected verdict: {verdict:?}"
        );
        assert_eq!(output, "");
        assert_eq!(runner.commands().len(), 1, "neither linker nor subject ran");
    }

    #[test]
    fn runs_cases_in_order() {
        let fixture = Fixture::new(indoc! {"
            +ok :
            -bad : --x
            +broken : a b
        "});
        let runner = MockProcessRunner::new(build_ok().into_iter().chain([
            MockResponse::exit(0),
            MockResponse::exit(1),
            MockResponse::exit_with_output(1, "", "broken stderr\n"),
        ]));

        let (verdict, output) = fixture.run(&runner);
        let verdict = verdict.expect("run completes");
        assert!(!verdict.is_success());

        let report = verdict.report().expect("tests ran");
        assert_eq!(
            report
                .results()
                .iter()
                .map(|result| (result.case.name.as_str(), result.actual))
                .collect::<Vec<_>>(),
            vec![
                ("ok", Outcome::Pass),
                ("bad", Outcome::Fail),
                ("broken", Outcome::Fail),
            ]
        );
        assert_eq!(
            report
                .failures()
                .map(|result| result.case.name.as_str())
                .collect::<Vec<_>>(),
            vec!["broken"]
        );

        let commands = runner.commands();
        assert_eq!(commands.len(), 5);
        let subject = fixture.config.build_dir.join("gorun");
        let case_commands = &commands[2..];
        for command in case_commands {
            assert_eq!(command.program, subject);
            assert_eq!(
                command.cwd.as_deref(),
                Some(fixture.config.test_dir.as_path())
            );
        }
        assert_eq!(
            case_commands[2].args,
            vec![
                format!("--build-dir={}/tests/broken", fixture.config.build_dir),
                "a".to_owned(),
                "b".to_owned(),
            ]
        );

        assert!(
            output.contains("--- STDERR: broken ---\nbroken stderr\n"),
            "{output}"
        );
        assert!(!output.contains("--- STDOUT: broken ---"), "{output}");
    }

    #[test]
    fn empty_manifest_succeeds() {
        let fixture = Fixture::new("");
        let runner = MockProcessRunner::new(build_ok());

        let (verdict, _) = fixture.run(&runner);
        let verdict = verdict.expect("run completes");
        assert!(verdict.is_success());
        assert_eq!(verdict.report().map(Report::results), Some(&[][..]));
    }

    #[test]
    fn malformed_manifest_runs_nothing() {
        let fixture = Fixture::new("+ok : x\nno separator here\n");
        let runner = MockProcessRunner::new(build_ok());

        let (verdict, output) = fixture.run(&runner);
        assert!(
            matches!(
                verdict,
                Err(OrchestratorError::Manifest(ManifestReadError::Parse { .. }))
            ),
            "unexpected verdict: {verdict:?}"
        );
        assert_eq!(output, "");
        assert_eq!(runner.commands().len(), 2, "no case ran");
    }

    #[test]
    fn missing_manifest() {
        let fixture = Fixture::new("");
        std::fs::remove_file(&fixture.config.manifest).expect("manifest removed");
        let runner = MockProcessRunner::new(build_ok());

        let (verdict, _) = fixture.run(&runner);
        assert!(
            matches!(
                verdict,
                Err(OrchestratorError::Manifest(ManifestReadError::Read { .. }))
            ),
            "unexpected verdict: {verdict:?}"
        );
    }

    #[test]
    fn launch_failure_aborts() {
        let fixture = Fixture::new("+first : a\n+second : b\n");
        let runner = MockProcessRunner::new(
            build_ok()
                .into_iter()
                .chain([MockResponse::LaunchError(io::ErrorKind::NotFound)]),
        );

        let (verdict, _) = fixture.run(&runner);
        match verdict {
            Err(OrchestratorError::Launch(error)) => assert_eq!(error.case_name, "first"),
            other => panic!("unexpected verdict: {other:?}"),
        }
        assert_eq!(runner.commands().len(), 3, "second case never ran");
    }

    #[test]
    fn writes_junit() {
        let mut fixture = Fixture::new("+ok :\n");
        let junit_path = fixture.config.build_dir.join("junit.xml");
        fixture.config.junit_path = Some(junit_path.clone());
        let runner = MockProcessRunner::new(build_ok().into_iter().chain([MockResponse::exit(0)]));

        let (verdict, _) = fixture.run(&runner);
        assert!(verdict.expect("run completes").is_success());
        let contents = std::fs::read_to_string(&junit_path).expect("junit written");
        assert!(contents.contains(r#"name="gorun""#), "{contents}");
    }

    #[test]
    fn repeated_runs_are_identical() {
        let fixture = Fixture::new("+ok :\n-bad : --x\n");
        let responses = || {
            build_ok()
                .into_iter()
                .chain([MockResponse::exit(0), MockResponse::exit(0)])
        };

        let first_runner = MockProcessRunner::new(responses());
        let (first, first_output) = fixture.run(&first_runner);
        let second_runner = MockProcessRunner::new(responses());
        let (second, second_output) = fixture.run(&second_runner);

        let strip_times = |verdict: Verdict| match verdict {
            Verdict::Tested { report, .. } => report
                .results()
                .iter()
                .map(|result| (result.case.clone(), result.actual, result.exit_code))
                .collect::<Vec<_>>(),
            Verdict::BuildOnly { .. } => panic!("tests should have run"),
        };
        assert_eq!(
            strip_times(first.expect("first run completes")),
            strip_times(second.expect("second run completes"))
        );
        assert_eq!(first_runner.commands(), second_runner.commands());
        // Summary lines include timings, so only compare per-case lines.
        let case_lines = |output: &str| {
            output
                .lines()
                .filter(|line| line.contains(" | "))
                .map(str::to_owned)
                .collect::<Vec<_>>()
        };
        assert_eq!(case_lines(&first_output), case_lines(&second_output));
    }

    #[test]
    fn build_dir_under_a_file_is_a_setup_error() {
        let mut fixture = Fixture::new("+ok :\n");
        let blocker = fixture.config.test_dir.join("not-a-dir");
        std::fs::write(&blocker, "").expect("file written");
        fixture.config.build_dir = blocker.join("bin");
        let runner = MockProcessRunner::new([]);

        let (verdict, output) = fixture.run(&runner);
        match verdict {
            Err(OrchestratorError::Setup(SetupError::CreateBuildDir { path, .. })) => {
                assert_eq!(path, fixture.config.build_dir);
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
        assert_eq!(output, "");
        assert!(runner.commands().is_empty(), "nothing was built");
    }

    /// Hands back an already-built subject without spawning anything.
    #[derive(Debug)]
    struct Prebuilt(Utf8PathBuf);

    impl Builder for Prebuilt {
        fn build(
            &self,
            _source: &Utf8Path,
            _out_dir: &Utf8Path,
        ) -> Result<Utf8PathBuf, BuildError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn runs_cases_against_injected_builder() {
        let fixture = Fixture::new("+ok : a\n");
        let subject = Utf8PathBuf::from("/prebuilt/gorun");
        let runner = MockProcessRunner::new([MockResponse::exit(0)]);

        let mut reporter = SuiteReporter::new(Vec::new());
        let verdict = Orchestrator::with_builder(
            &fixture.config,
            &fixture.env,
            Prebuilt(subject.clone()),
            &runner,
        )
        .run(&mut reporter)
        .expect("run completes");
        assert!(verdict.is_success());

        let commands = runner.commands();
        assert_eq!(commands.len(), 1, "only the subject ran");
        assert_eq!(commands[0].program, subject);
        assert_eq!(commands[0].args[1], "a");
    }
}
