// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Documented exit codes for the `buildtest` binary.

/// Documented exit codes for `buildtest` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum BuildtestExitCode {}

impl BuildtestExitCode {
    /// No errors occurred and buildtest exited normally.
    pub const OK: i32 = 0;

    /// One or more test cases did not have their expected outcome.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Compiling or linking the subject produced an error.
    pub const BUILD_FAILED: i32 = 101;

    /// The test manifest could not be read, or a line in it was malformed.
    pub const MANIFEST_PARSE_FAILED: i32 = 104;

    /// The subject could not be launched for a test case.
    pub const SUBJECT_LAUNCH_FAILED: i32 = 105;

    /// Writing data to stdout, stderr or a report file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a buildtest invocation.
    pub const SETUP_ERROR: i32 = 96;
}
