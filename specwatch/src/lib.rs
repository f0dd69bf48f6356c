// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run end-to-end spec files and follow their status live in the terminal.
//!
//! This crate contains the `specwatch` command-line interface. The engine that turns runner
//! output into test status and an error log lives in
//! [`specwatch-runner`](https://docs.rs/specwatch-runner).

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod reporter;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
