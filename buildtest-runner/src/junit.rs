// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exporting a [`Report`] as JUnit XML.

use crate::{errors::JunitError, reporter::Report, runner::CaseResult};
use camino::Utf8Path;
use quick_junit::{NonSuccessKind, TestCase, TestCaseStatus, TestSuite};
use std::fs::File;

/// The name of the top-level JUnit report.
pub const REPORT_NAME: &str = "buildtest";

/// Converts `report` into a JUnit report with a single test suite named `suite_name`.
///
/// Matched cases are successes, including cases expected to fail that did fail. Mismatched cases
/// are failures carrying the subject's captured output.
pub fn to_junit_report(report: &Report, suite_name: &str) -> quick_junit::Report {
    let mut test_suite = TestSuite::new(suite_name);
    for result in report.results() {
        test_suite.add_test_case(to_test_case(result, suite_name));
    }

    let mut junit_report = quick_junit::Report::new(REPORT_NAME);
    junit_report
        .set_time(report.stats().time_taken)
        .add_test_suite(test_suite);
    junit_report
}

/// Writes `report` as JUnit XML to `path`, creating parent directories as needed.
pub fn write_junit(report: &Report, suite_name: &str, path: &Utf8Path) -> Result<(), JunitError> {
    if let Some(junit_dir) = path.parent().filter(|dir| !dir.as_str().is_empty()) {
        std::fs::create_dir_all(junit_dir).map_err(|error| JunitError::Fs {
            path: junit_dir.to_owned(),
            error,
        })?;
    }

    let f = File::create(path).map_err(|error| JunitError::Fs {
        path: path.to_owned(),
        error,
    })?;
    to_junit_report(report, suite_name)
        .serialize(f)
        .map_err(|error| JunitError::Serialize {
            path: path.to_owned(),
            error,
        })
}

fn to_test_case(result: &CaseResult, suite_name: &str) -> TestCase {
    let status = if result.matched() {
        TestCaseStatus::success()
    } else {
        let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
        let exit = match result.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_owned(),
        };
        status
            .set_message(format!(
                "expected {}, actual {} ({exit})",
                result.case.expected, result.actual
            ))
            .set_type("outcome mismatch");
        status
    };

    let mut test_case = TestCase::new(result.case.name.as_str(), status);
    test_case
        .set_classname(suite_name)
        .set_time(result.time_taken);
    if !result.matched() {
        test_case
            .set_system_out(String::from_utf8_lossy(&result.stdout).into_owned())
            .set_system_err(String::from_utf8_lossy(&result.stderr).into_owned());
    }
    test_case
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{manifest::TestCase as ManifestCase, runner::Outcome};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn result(name: &str, expected: Outcome, exit_code: i32) -> CaseResult {
        CaseResult {
            case: ManifestCase {
                name: name.to_owned(),
                arguments: Vec::new(),
                expected,
                line_number: 1,
            },
            actual: Outcome::from_exit_code(Some(exit_code)),
            exit_code: Some(exit_code),
            stdout: b"subject stdout".to_vec(),
            stderr: b"subject stderr".to_vec(),
            time_taken: Duration::from_millis(5),
        }
    }

    fn sample_report() -> Report {
        let mut report = Report::new();
        report.push(result("ok", Outcome::Pass, 0));
        report.push(result("expected-failure", Outcome::Fail, 1));
        report.push(result("broken", Outcome::Pass, 3));
        report
    }

    #[test]
    fn converts_report() {
        let junit = to_junit_report(&sample_report(), "tests");
        let xml = junit.to_string().expect("report serializes");
        assert!(xml.contains(r#"tests="3""#), "{xml}");
        assert!(xml.contains(r#"failures="1""#), "{xml}");
        assert!(xml.contains(r#"name="expected-failure""#), "{xml}");
        assert!(xml.contains(r#"classname="tests""#), "{xml}");
        assert!(
            xml.contains("expected pass, actual fail (exit code 3)"),
            "{xml}"
        );
        assert!(xml.contains("subject stdout"), "{xml}");
        // Output is only attached to mismatched cases.
        assert_eq!(xml.matches("subject stdout").count(), 1, "{xml}");
    }

    #[test]
    fn writes_file() {
        let dir = camino_tempfile::tempdir().expect("tempdir created");
        let path = dir.path().join("nested/dir/junit.xml");
        write_junit(&sample_report(), "tests", &path).expect("junit written");

        let contents = std::fs::read_to_string(&path).expect("junit file exists");
        assert!(contents.starts_with("<?xml"), "{contents}");
        assert!(
            contents.contains(r#"<testsuites name="buildtest""#),
            "{contents}"
        );
    }
}
