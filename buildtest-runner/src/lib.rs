// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [buildtest](https://crates.io/crates/buildtest): building a single
//! executable with a two-stage toolchain, then running a manifest of test cases against it.
//!
//! The flow of a run is:
//!
//! 1. [`orchestrator::Orchestrator`] creates the build directory and builds the subject with a
//!    [`builder::Builder`].
//! 2. If testing was requested, the [`manifest::Manifest`] is read in full.
//! 3. Each case is run in manifest order by [`runner::CaseRunner`], and its result is printed and
//!    recorded by the [`reporter`].

pub mod builder;
pub mod errors;
pub mod exit_codes;
pub mod junit;
pub mod manifest;
pub mod orchestrator;
pub mod process;
pub mod reporter;
pub mod runner;
pub mod toolchain;
