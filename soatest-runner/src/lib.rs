// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [cargo soatest](https://crates.io/crates/cargo-soatest). For a
//! higher-level overview, see that documentation.
//!
//! A run builds `soatestcli` command lines from a [`SoatestConfig`](config::SoatestConfig),
//! executes them in a workspace that is cleaned up afterwards, and translates the resulting XML
//! report into a failsafe summary. The entry point is [`SoatestRunner`](runner::SoatestRunner).

pub mod command;
pub mod config;
pub mod errors;
mod helpers;
pub mod import;
pub mod report;
pub mod runner;
pub mod signal;
pub mod workspace;
