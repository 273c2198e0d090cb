// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Machine-readable metadata shared by `cargo soatest` and the tools that drive it.
//!
//! Currently this is limited to the documented process exit codes.

mod exit_codes;

pub use exit_codes::*;
