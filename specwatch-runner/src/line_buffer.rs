// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reassembly of complete lines from arbitrarily chunked output.
//!
//! Output from a child process arrives in chunks whose boundaries have nothing to do with line
//! boundaries, and for raw pipe reads, nothing to do with UTF-8 character boundaries either.
//! [`ChunkDecoder`] deals with the latter and [`LineBuffer`] with the former. [`LinePrefixer`]
//! marks the lines of one stream before it is merged into another.

use std::str;

/// Accumulates text chunks and splits them into complete lines.
///
/// The trailing fragment after the last newline is held back until a later chunk completes it.
/// It is never flushed on its own: output that doesn't end in a newline is dropped when the
/// buffer is discarded.
#[derive(Clone, Debug, Default)]
pub struct LineBuffer {
    carry: String,
}

impl LineBuffer {
    /// Creates a new, empty line buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the lines it completed, without their newlines.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        if !chunk.contains('\n') {
            self.carry.push_str(chunk);
            return Vec::new();
        }

        self.carry.push_str(chunk);
        // The chunk contains a newline, so the carry does too.
        let last_newline = self.carry.rfind('\n').unwrap_or_default();
        let rest = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, rest);

        // `complete` ends with the newline; dropping it avoids a spurious empty last segment.
        complete[..last_newline]
            .split('\n')
            .map(str::to_owned)
            .collect()
    }

    /// Returns the incomplete trailing fragment held back so far.
    pub fn carry(&self) -> &str {
        &self.carry
    }
}

/// Decodes byte chunks read from a pipe into text.
///
/// A multi-byte UTF-8 sequence split across two reads is held back and completed by the next
/// chunk. Invalid sequences are replaced with U+FFFD, as with [`String::from_utf8_lossy`].
#[derive(Clone, Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    /// Creates a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `bytes` (prefixed by any held-back bytes) as possible.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(error) => {
                    let (valid, after) = rest.split_at(error.valid_up_to());
                    // `valid_up_to` guarantees this prefix is valid UTF-8.
                    out.push_str(str::from_utf8(valid).unwrap_or_default());
                    match error.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // An incomplete sequence at the end: wait for more bytes.
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flushes any held-back bytes. They can never form a valid character anymore, so each
    /// incomplete sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}

/// Inserts a fixed prefix at the start of every line of a chunked stream.
///
/// Used to mark runner stderr when it is merged into the stdout stream. An empty prefix leaves
/// chunks untouched.
#[derive(Clone, Debug)]
pub struct LinePrefixer {
    prefix: String,
    at_line_start: bool,
}

impl LinePrefixer {
    /// Creates a new prefixer. The first chunk starts a new line.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            at_line_start: true,
        }
    }

    /// Returns `chunk` with the prefix inserted at each line start it contains.
    pub fn apply(&mut self, chunk: String) -> String {
        if self.prefix.is_empty() || chunk.is_empty() {
            return chunk;
        }

        let mut out = String::with_capacity(chunk.len() + self.prefix.len());
        for piece in chunk.split_inclusive('\n') {
            if self.at_line_start {
                out.push_str(&self.prefix);
            }
            out.push_str(piece);
            self.at_line_start = piece.ends_with('\n');
        }
        out
    }
}
