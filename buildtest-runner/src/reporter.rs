// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciling case results against expectations and reporting them.
//!
//! Output happens in two phases. While cases run, [`SuiteReporter::report_case`] prints exactly
//! one line per case. Once every case has finished, [`SuiteReporter::report_finished`] prints the
//! captured output of mismatched cases, followed by a summary.

use crate::{errors::WriteReportError, runner::CaseResult};
use owo_colors::{OwoColorize, Style};
use std::{io::Write, time::Duration};

/// The width the case name is padded to in per-case lines.
pub const NAME_WIDTH: usize = 30;

/// The results of a suite run, in manifest order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Report {
    results: Vec<CaseResult>,
}

impl Report {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the result of the next case.
    pub fn push(&mut self, result: CaseResult) {
        self.results.push(result);
    }

    /// Returns every result, in manifest order.
    pub fn results(&self) -> &[CaseResult] {
        &self.results
    }

    /// Iterates over the results whose outcome did not match the expectation, in manifest order.
    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> + '_ {
        self.results.iter().filter(|result| !result.matched())
    }

    /// Returns true if every case matched its expectation. An empty report is a success.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(CaseResult::matched)
    }

    /// Returns counts for this report.
    pub fn stats(&self) -> ReportStats {
        let matched = self
            .results
            .iter()
            .filter(|result| result.matched())
            .count();
        ReportStats {
            total: self.results.len(),
            matched,
            mismatched: self.results.len() - matched,
            time_taken: self.results.iter().map(|result| result.time_taken).sum(),
        }
    }
}

/// Counts for a [`Report`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ReportStats {
    /// The number of cases run.
    pub total: usize,

    /// The number of cases whose outcome matched the expectation.
    pub matched: usize,

    /// The number of cases whose outcome did not match the expectation.
    pub mismatched: usize,

    /// The time spent running the subject, summed across cases.
    pub time_taken: Duration,
}

impl ReportStats {
    /// Returns true if no case mismatched.
    pub fn is_success(&self) -> bool {
        self.mismatched == 0
    }
}

/// Writes per-case lines, mismatch diagnostics and the summary to a writer.
#[derive(Debug)]
pub struct SuiteReporter<W> {
    writer: W,
    styles: Styles,
}

impl<W: Write> SuiteReporter<W> {
    /// Creates a new reporter writing uncolored output to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            styles: Styles::default(),
        }
    }

    /// Colorizes output.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Writes the line for a single finished case.
    pub fn report_case(&mut self, result: &CaseResult) -> Result<(), WriteReportError> {
        write!(
            self.writer,
            "{:<width$} | ",
            result.case.name,
            width = NAME_WIDTH
        )?;
        if result.matched() {
            writeln!(self.writer, "{}", "ok".style(self.styles.pass))?;
        } else {
            writeln!(
                self.writer,
                "{} (expected {}, actual {})",
                "MISMATCH".style(self.styles.fail),
                result.case.expected,
                result.actual,
            )?;
        }
        Ok(())
    }

    /// Writes diagnostics for every mismatched case, then the summary.
    pub fn report_finished(&mut self, report: &Report) -> Result<(), WriteReportError> {
        for result in report.failures() {
            self.write_diagnostics(result)?;
        }
        self.write_summary(&report.stats())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_diagnostics(&mut self, result: &CaseResult) -> Result<(), WriteReportError> {
        let name = &result.case.name;
        writeln!(self.writer)?;
        write!(self.writer, "{:>12} ", "MISMATCH".style(self.styles.fail))?;
        write!(
            self.writer,
            "{} (expected {}, ",
            name.style(self.styles.name),
            result.case.expected
        )?;
        match result.exit_code {
            Some(code) => writeln!(self.writer, "exited with code {code})")?,
            None => writeln!(self.writer, "terminated by signal)")?,
        }

        if !result.stdout.is_empty() {
            let header = format!("--- STDOUT: {name} ---");
            writeln!(self.writer, "{}", header.style(self.styles.fail))?;
            self.write_output(&result.stdout)?;
        }
        if !result.stderr.is_empty() {
            let header = format!("--- STDERR: {name} ---");
            writeln!(self.writer, "{}", header.style(self.styles.fail))?;
            self.write_output(&result.stderr)?;
        }
        Ok(())
    }

    fn write_output(&mut self, output: &[u8]) -> Result<(), WriteReportError> {
        self.writer.write_all(output)?;
        if !output.ends_with(b"\n") {
            writeln!(self.writer)?;
        }
        Ok(())
    }

    fn write_summary(&mut self, stats: &ReportStats) -> Result<(), WriteReportError> {
        let summary_style = if stats.is_success() {
            self.styles.pass
        } else {
            self.styles.fail
        };
        writeln!(self.writer)?;
        write!(self.writer, "{:>12} ", "Summary".style(summary_style))?;
        write!(self.writer, "[{:>8.3}s] ", stats.time_taken.as_secs_f64())?;
        write!(
            self.writer,
            "{} {} run: ",
            stats.total.style(self.styles.count),
            plural_cases(stats.total),
        )?;
        write!(
            self.writer,
            "{} {}",
            stats.matched.style(self.styles.count),
            "matched".style(self.styles.pass)
        )?;
        if stats.mismatched > 0 {
            write!(
                self.writer,
                ", {} {}",
                stats.mismatched.style(self.styles.count),
                "mismatched".style(self.styles.fail)
            )?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

fn plural_cases(count: usize) -> &'static str {
    if count == 1 { "case" } else { "cases" }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    name: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.name = Style::new().blue().bold();
    }
}
