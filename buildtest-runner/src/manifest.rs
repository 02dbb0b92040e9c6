// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading test manifests.
//!
//! A manifest declares one test case per line:
//!
//! ```text
//! <sign><name> : <space-separated arguments>
//! ```
//!
//! A `+` sign means the subject is expected to exit successfully; any other sign means it is
//! expected to fail. Blank lines are ignored.

use crate::{
    errors::{ManifestParseError, ManifestParseErrorKind, ManifestReadError},
    runner::Outcome,
};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use miette::SourceSpan;
use std::{
    collections::{HashMap, hash_map::Entry},
    iter::Enumerate,
    str::Lines,
};

/// The sign marker for a test case that is expected to pass.
pub const PASS_MARKER: char = '+';

/// A single test case declared in a manifest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestCase {
    /// The name of the test case. Also used to name the case's build directory.
    pub name: String,

    /// Arguments passed to the subject, in order.
    pub arguments: Vec<String>,

    /// The outcome the subject is expected to have.
    pub expected: Outcome,

    /// The 1-based line in the manifest this case was declared on.
    pub line_number: usize,
}

/// A parsed test manifest, in declaration order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Manifest {
    cases: Vec<TestCase>,
}

impl Manifest {
    /// Reads and parses the manifest at the given path.
    ///
    /// Fails on the first malformed line: a corrupt manifest is never partially run.
    pub fn from_path(path: impl AsRef<Utf8Path>) -> Result<Self, ManifestReadError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|error| ManifestReadError::Read {
            path: path.to_owned(),
            error,
        })?;
        Self::parse(&contents).map_err(|error| ManifestReadError::Parse {
            path: path.to_owned(),
            error,
        })
    }

    /// Parses a manifest from a string, failing on the first malformed line.
    pub fn parse(input: &str) -> Result<Self, ManifestParseError> {
        let cases = Self::lines(input).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { cases })
    }

    /// Returns a lazy iterator over the test cases in `input`, in line order.
    ///
    /// The iterator yields an error for each malformed line and keeps going, so callers that
    /// want fail-fast behavior should stop at the first error.
    pub fn lines(input: &str) -> ManifestLines<'_> {
        ManifestLines {
            lines: input.lines().enumerate(),
            seen: HashMap::new(),
        }
    }

    /// Returns the number of test cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true if the manifest declares no test cases.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Iterates over the test cases in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TestCase> + '_ {
        self.cases.iter()
    }
}

/// Iterator over the test cases of a manifest, returned by [`Manifest::lines`].
#[derive(Clone, Debug)]
pub struct ManifestLines<'a> {
    lines: Enumerate<Lines<'a>>,
    // Maps names to the line they were first declared on.
    seen: HashMap<String, usize>,
}

impl Iterator for ManifestLines<'_> {
    type Item = Result<TestCase, ManifestParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (idx, line) = self.lines.next()?;
            if line.trim().is_empty() {
                continue;
            }

            let line_number = idx + 1;
            let (case, name_span) = match parse_line(line_number, line) {
                Ok(parsed) => parsed,
                Err(error) => return Some(Err(error)),
            };

            return match self.seen.entry(case.name.clone()) {
                Entry::Occupied(entry) => Some(Err(ManifestParseError::new(
                    line_number,
                    line,
                    name_span,
                    ManifestParseErrorKind::DuplicateName {
                        first_line: *entry.get(),
                    },
                ))),
                Entry::Vacant(entry) => {
                    entry.insert(line_number);
                    Some(Ok(case))
                }
            };
        }
    }
}

fn parse_line(
    line_number: usize,
    line: &str,
) -> Result<(TestCase, SourceSpan), ManifestParseError> {
    let error = |span: SourceSpan, kind| ManifestParseError::new(line_number, line, span, kind);

    let Some((name_field, args_field)) = line.split_once(':') else {
        return Err(error(
            (0, line.len()).into(),
            ManifestParseErrorKind::MissingSeparator,
        ));
    };
    let separator_offset = name_field.len();

    let name_start = name_field.len() - name_field.trim_start().len();
    let mut chars = name_field.trim().chars();
    let Some(marker) = chars.next() else {
        return Err(error(
            (separator_offset, 1).into(),
            ManifestParseErrorKind::EmptyNameField,
        ));
    };

    let rest = chars.as_str();
    let name = rest.trim();
    let name_offset = name_start + marker.len_utf8() + (rest.len() - rest.trim_start().len());
    if name.is_empty() {
        return Err(error(
            (name_start, marker.len_utf8()).into(),
            ManifestParseErrorKind::EmptyName,
        ));
    }
    let name_span: SourceSpan = (name_offset, name.len()).into();
    if !is_valid_name(name) {
        return Err(error(name_span, ManifestParseErrorKind::InvalidName));
    }

    let args_field = args_field.trim();
    // An empty argument field means no arguments, not a single empty argument.
    let arguments = if args_field.is_empty() {
        Vec::new()
    } else {
        args_field.split(' ').map(str::to_owned).collect()
    };

    let expected = if marker == PASS_MARKER {
        Outcome::Pass
    } else {
        Outcome::Fail
    };

    Ok((
        TestCase {
            name: name.to_owned(),
            arguments,
            expected,
            line_number,
        },
        name_span,
    ))
}

/// The name becomes a directory under `<build-dir>/tests`, so it must be exactly one normal
/// path component.
fn is_valid_name(name: &str) -> bool {
    let mut components = Utf8Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Utf8Component::Normal(component)), None) if component == name
    )
}

/// Returns the per-case build directory for `name` under `build_dir`.
pub fn case_build_dir(build_dir: &Utf8Path, name: &str) -> Utf8PathBuf {
    build_dir.join("tests").join(name)
}
