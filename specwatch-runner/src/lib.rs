// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for specwatch.
//!
//! The heart of this crate is the streaming reconciliation engine in [`session`]: it takes raw,
//! arbitrarily chunked output from an end-to-end test runner and derives per-test status, an
//! error feed and a transcript from it. The remaining modules are thin adapters for the outside
//! world: spec discovery, process spawning and editor launching.

pub mod classify;
pub mod config;
pub mod discovery;
pub mod editor;
pub mod errors;
pub mod events;
pub mod line_buffer;
pub mod location;
pub mod normalize;
pub mod process;
pub mod reconcile;
pub mod session;
pub mod signal;
pub mod title;
