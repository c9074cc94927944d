//! Source locations attached to diagnostics.
//!
//! Templates reach the engine through a document walker, so a location is
//! always relative to the document the walker read. The walker knows the
//! byte offset of each note it turns into a statement; [`offset_to_location`]
//! derives the row and column from it.

use serde::{Deserialize, Serialize};

/// A location in source text (0-indexed)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Location {
    /// Byte offset from start of source
    pub offset: usize,
    /// Row number (0-indexed)
    pub row: usize,
    /// Column number (0-indexed, in characters not bytes)
    pub column: usize,
}

/// A range in source text from start to end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Start location (inclusive)
    pub start: Location,
    /// End location (exclusive)
    pub end: Location,
}

/// Where a diagnostic points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Name of the document (file name or a placeholder like `<template>`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The covered range.
    pub range: Range,
}

impl SourceInfo {
    /// Build source info from byte offsets, resolving rows and columns against `source`.
    ///
    /// Offsets past the end of `source` are clamped to its length.
    pub fn from_offsets(source: &str, start: usize, end: usize) -> Self {
        let start = start.min(source.len());
        let end = end.clamp(start, source.len());
        Self {
            name: None,
            range: Range {
                start: offset_to_location(source, start).unwrap_or_default(),
                end: offset_to_location(source, end).unwrap_or_default(),
            },
        }
    }

    /// Attach a document name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn start_offset(&self) -> usize {
        self.range.start.offset
    }

    pub fn end_offset(&self) -> usize {
        self.range.end.offset
    }

    /// Human readable `name:row:column` (1-indexed row and column).
    pub fn describe(&self) -> String {
        let name = self.name.as_deref().unwrap_or("<template>");
        format!(
            "{}:{}:{}",
            name,
            self.range.start.row + 1,
            self.range.start.column + 1
        )
    }
}

/// The text a [`SourceInfo`] refers to, needed to render source excerpts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Convert a byte offset to a Location with line and column info
///
/// Returns None if the offset is out of bounds.
pub fn offset_to_location(source: &str, offset: usize) -> Option<Location> {
    if offset > source.len() {
        return None;
    }

    let mut row = 0;
    let mut column = 0;
    let mut current_offset = 0;

    for ch in source.chars() {
        if current_offset >= offset {
            break;
        }

        if ch == '\n' {
            row += 1;
            column = 0;
        } else {
            column += 1;
        }

        current_offset += ch.len_utf8();
    }

    Some(Location {
        offset,
        row,
        column,
    })
}
