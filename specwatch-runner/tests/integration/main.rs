// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod discovery;
mod fixtures;
mod replay;
