/*
 * locator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Finding an action's target element inside its buffer.
//!
//! A buffer created for a statement starts with the open tag of the
//! element the statement targets. With the minus operator only the content
//! of that element's deepest removable descendant is kept: for a section,
//! the section's own content; for a table, the content of its single cell.

use crate::buffer::{Buffer, ElementMark};
use crate::element::ElementKind;
use crate::error::StructuralConstraintError;
use std::ops::Range;

pub struct ElementLocator<'b> {
    buffer: &'b Buffer,
}

impl<'b> ElementLocator<'b> {
    pub fn new(buffer: &'b Buffer) -> Self {
        Self { buffer }
    }

    /// The element opened at the very start of the buffer.
    pub fn target(&self) -> Option<&'b ElementMark> {
        self.buffer
            .elements()
            .next()
            .filter(|(offset, _)| *offset == 0)
            .map(|(_, mark)| mark)
    }

    fn closed_target(&self) -> Result<(&'b ElementMark, usize), StructuralConstraintError> {
        let target = self.target().ok_or(StructuralConstraintError::NoTarget)?;
        let close = target
            .close
            .ok_or(StructuralConstraintError::Unclosed { kind: target.kind })?;
        Ok((target, close.offset))
    }

    /// The part of the buffer kept when the target is removed.
    pub fn content_range(&self) -> Result<Range<usize>, StructuralConstraintError> {
        let (target, close) = self.closed_target()?;
        let deepest = target
            .kind
            .deepest_removable()
            .ok_or(StructuralConstraintError::NotRemovable { kind: target.kind })?;
        if deepest == target.kind {
            return Ok(target.open_len..close);
        }

        // Descendants inside a nested element of the target's kind belong
        // to that element, not to the target.
        let nested: Vec<Range<usize>> = self
            .descendants(close)
            .filter(|(_, mark)| mark.kind == target.kind)
            .map(|(offset, mark)| offset..mark.end().unwrap_or(close))
            .collect();
        let candidates: Vec<(usize, &ElementMark)> = self
            .descendants(close)
            .filter(|(offset, mark)| {
                mark.kind == deepest && !nested.iter().any(|range| range.contains(offset))
            })
            .collect();

        match candidates.as_slice() {
            [(offset, mark)] => {
                let inner_close = mark
                    .close
                    .ok_or(StructuralConstraintError::Unclosed { kind: deepest })?;
                Ok(offset + mark.open_len..inner_close.offset)
            }
            found => Err(StructuralConstraintError::NotSingle {
                kind: target.kind,
                deepest,
                found: found.len(),
            }),
        }
    }

    /// The target's open and close tags, for `from+`.
    pub fn wrapper(&self) -> Result<(Range<usize>, Range<usize>), StructuralConstraintError> {
        let (target, close) = self.closed_target()?;
        Ok((0..target.open_len, close..self.buffer.len()))
    }

    /// Where a reproduced statement note goes: just inside the first
    /// paragraph or title, or just inside the target when there is none.
    pub fn note_anchor(&self) -> usize {
        self.buffer
            .elements()
            .find(|(_, mark)| matches!(mark.kind, ElementKind::Paragraph | ElementKind::Title))
            .or_else(|| self.buffer.elements().next())
            .map_or(0, |(offset, mark)| offset + mark.open_len)
    }

    fn descendants(&self, close: usize) -> impl Iterator<Item = (usize, &'b ElementMark)> {
        self.buffer
            .elements()
            .skip(1)
            .filter(move |(offset, _)| *offset < close)
    }
}
