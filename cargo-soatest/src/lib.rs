// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runs Parasoft SOAtest functional tests from Cargo.
//!
//! `cargo soatest run` imports projects into an Eclipse workspace and runs a SOAtest test
//! configuration through `soatestcli`. Settings are read from `.config/soatest.toml` in the
//! project directory and can be overridden on the command line. `cargo soatest show-command`
//! prints the `soatestcli` command lines a run would execute.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
