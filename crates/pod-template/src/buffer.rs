/*
 * buffer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Buffers: the compiled form of a document.
//!
//! A buffer holds the document's markup as one string, plus entries keyed by
//! byte offset into that string:
//!
//! - expression fields, evaluated when rendering
//! - attribute groups, which write a cell's value type from the cell's
//!   first field
//! - child buffers, usually carrying an action
//!
//! Every entry occupies a one-character placeholder in the content, which
//! rendering skips. Element marks record where each structural element
//! opens and closes, so actions can locate their target and tables can be
//! balanced.
//!
//! Directives split buffers: the part of the document a statement applies
//! to is cut out of its buffer into a new one that carries the action, and
//! is put back as a child once the target element is closed.

use crate::action::Action;
use crate::dialect::Dialect;
use crate::element::ElementKind;
use crate::error::PodResult;
use crate::eval_context::EvalContext;
use crate::expression::Expression;
use crate::locator::ElementLocator;
use crate::sink::Sink;
use std::collections::BTreeMap;
use std::ops::Range;

/// Content occupied by an entry.
pub const PLACEHOLDER: char = ' ';

/// Identifies an element across buffers. Ids increase in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseMark {
    pub offset: usize,
    pub len: usize,
}

/// Where a structural element sits in a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMark {
    pub id: ElementId,
    pub kind: ElementKind,
    /// Length of the open tag, including any attribute group placeholder.
    pub open_len: usize,
    /// `None` while the element is open, or when its close tag ended up in
    /// another buffer.
    pub close: Option<CloseMark>,
    /// Declared column count, for tables.
    pub columns: Option<usize>,
}

impl ElementMark {
    /// Offset just past the close tag.
    pub fn end(&self) -> Option<usize> {
        self.close.map(|c| c.offset + c.len)
    }
}

/// Writes the value-type attributes of a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeGroup {
    pub element: ElementId,
    /// Distance from the group to the field it takes its value from.
    pub tied: Option<usize>,
}

#[derive(Debug)]
pub enum Entry {
    Expression(Expression),
    Attributes(AttributeGroup),
    Child(Buffer),
}

/// How [`Buffer::evaluate_with`] renders a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluateOptions {
    /// Render child buffers. When false their content is skipped.
    pub include_sub_elements: bool,
    /// Render only what is kept when the target element is removed.
    pub strip_outer_element: bool,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            include_sub_elements: true,
            strip_outer_element: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Buffer {
    content: String,
    entries: BTreeMap<usize, Entry>,
    elements: BTreeMap<(usize, ElementId), ElementMark>,
    action: Option<Action>,
}

enum Stop<'b> {
    Close(ElementKind),
    Open(&'b ElementMark),
    Entry(&'b Entry),
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The raw content, with a placeholder for each entry.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub fn set_action(&mut self, action: Action) {
        self.action = Some(action);
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, &Entry)> {
        self.entries.iter().map(|(offset, entry)| (*offset, entry))
    }

    pub fn entry_at(&self, offset: usize) -> Option<&Entry> {
        self.entries.get(&offset)
    }

    /// Element marks in document order.
    pub fn elements(&self) -> impl Iterator<Item = (usize, &ElementMark)> {
        self.elements.iter().map(|((offset, _), mark)| (*offset, mark))
    }

    pub fn mark(&self, id: ElementId) -> Option<(usize, &ElementMark)> {
        self.elements().find(|(_, mark)| mark.id == id)
    }

    pub fn mark_mut(&mut self, id: ElementId) -> Option<&mut ElementMark> {
        self.elements.values_mut().find(|mark| mark.id == id)
    }

    /// Append literal markup.
    pub fn write(&mut self, text: &str) {
        self.content.push_str(text);
    }

    fn push_entry(&mut self, entry: Entry) -> usize {
        let offset = self.len();
        self.entries.insert(offset, entry);
        self.content.push(PLACEHOLDER);
        offset
    }

    /// Append a field, returning its offset.
    pub fn add_expression(&mut self, expression: Expression) -> usize {
        self.push_entry(Entry::Expression(expression))
    }

    pub fn add_attribute_group(&mut self, element: ElementId) -> usize {
        self.push_entry(Entry::Attributes(AttributeGroup {
            element,
            tied: None,
        }))
    }

    /// Append a child buffer, returning its offset.
    pub fn attach_child(&mut self, child: Buffer) -> usize {
        self.push_entry(Entry::Child(child))
    }

    /// Record an element opening with `markup` as its open tag.
    pub fn open_element(&mut self, id: ElementId, kind: ElementKind, markup: &str) -> usize {
        let offset = self.len();
        self.write(markup);
        self.insert_mark(offset, id, kind, markup.len());
        offset
    }

    /// Record an element whose open tag has an attribute group between
    /// `head` and `tail`.
    pub fn open_element_with_attributes(
        &mut self,
        id: ElementId,
        kind: ElementKind,
        head: &str,
        tail: &str,
    ) -> usize {
        let offset = self.len();
        self.write(head);
        self.add_attribute_group(id);
        self.write(tail);
        self.insert_mark(offset, id, kind, self.len() - offset);
        offset
    }

    fn insert_mark(&mut self, offset: usize, id: ElementId, kind: ElementKind, open_len: usize) {
        self.elements.insert(
            (offset, id),
            ElementMark {
                id,
                kind,
                open_len,
                close: None,
                columns: None,
            },
        );
    }

    /// Append `markup` as the close tag of element `id`. Returns false, and
    /// writes nothing, when the element is not in this buffer.
    pub fn close_element(&mut self, id: ElementId, markup: &str) -> bool {
        let offset = self.len();
        let Some(mark) = self.mark_mut(id) else {
            return false;
        };
        mark.close = Some(CloseMark {
            offset,
            len: markup.len(),
        });
        self.write(markup);
        true
    }

    /// Tie the untied attribute group of `element` to the field at
    /// `expression_offset`. Returns whether a group was tied.
    pub fn tie_attributes(&mut self, element: ElementId, expression_offset: usize) -> bool {
        for (offset, entry) in self.entries.range_mut(..expression_offset) {
            if let Entry::Attributes(group) = entry {
                if group.element == element && group.tied.is_none() {
                    group.tied = Some(expression_offset - offset);
                    return true;
                }
            }
        }
        false
    }

    /// Split this buffer at byte `index`.
    ///
    /// With `keep_first_part`, the returned buffer holds `[0, index)` and
    /// this buffer keeps the rest. Otherwise this buffer keeps `[0, index)`
    /// and the returned buffer holds the rest. Offsets in the part that no
    /// longer starts at 0 are rebased. Elements whose close tag falls in the
    /// other part lose their close mark, and attribute groups lose a tie
    /// that crosses the cut. The action stays with this buffer.
    ///
    /// # Panics
    ///
    /// Panics if `index` is greater than the buffer length or is not on a
    /// character boundary.
    pub fn cut(&mut self, index: usize, keep_first_part: bool) -> Buffer {
        assert!(
            self.content.is_char_boundary(index),
            "cut index {index} is not a character boundary of a buffer of length {}",
            self.len()
        );

        let tail_content = self.content.split_off(index);
        let tail_entries = self
            .entries
            .split_off(&index)
            .into_iter()
            .map(|(offset, entry)| (offset - index, entry))
            .collect();
        let tail_elements = self
            .elements
            .split_off(&(index, ElementId(0)))
            .into_iter()
            .map(|((offset, id), mut mark)| {
                if let Some(close) = &mut mark.close {
                    close.offset -= index;
                }
                ((offset - index, id), mark)
            })
            .collect();

        for mark in self.elements.values_mut() {
            if mark.close.is_some_and(|c| c.offset >= index) {
                mark.close = None;
            }
        }
        for (offset, entry) in self.entries.iter_mut() {
            if let Entry::Attributes(group) = entry {
                if group.tied.is_some_and(|delta| offset + delta >= index) {
                    group.tied = None;
                }
            }
        }

        let tail = Buffer {
            content: tail_content,
            entries: tail_entries,
            elements: tail_elements,
            action: None,
        };
        if keep_first_part {
            let mut head = std::mem::replace(self, tail);
            self.action = head.action.take();
            head
        } else {
            tail
        }
    }

    /// Append all of this buffer's content, entries and marks to `parent`,
    /// rebased to the parent's end. Returns the action, which is dropped
    /// from the content.
    pub fn transfer_all_content(self, parent: &mut Buffer) -> Option<Action> {
        let shift = parent.len();
        parent.content.push_str(&self.content);
        parent.entries.extend(
            self.entries
                .into_iter()
                .map(|(offset, entry)| (offset + shift, entry)),
        );
        parent
            .elements
            .extend(self.elements.into_iter().map(|((offset, id), mut mark)| {
                if let Some(close) = &mut mark.close {
                    close.offset += shift;
                }
                ((offset + shift, id), mark)
            }));
        self.action
    }

    /// Drop peeked field values, in this buffer and its children.
    pub fn reset_memos(&self) {
        for entry in self.entries.values() {
            match entry {
                Entry::Expression(expression) => expression.reset(),
                Entry::Child(child) => child.reset_memos(),
                Entry::Attributes(_) => {}
            }
        }
    }

    /// Render this buffer, through its action when it has one.
    pub fn evaluate(&self, sink: &mut dyn Sink, env: &mut EvalContext<'_>) -> PodResult<()> {
        match &self.action {
            Some(action) => action.execute(self, sink, env),
            None => self.evaluate_with(sink, env, EvaluateOptions::default()),
        }
    }

    /// Render this buffer's content, ignoring its action.
    pub fn evaluate_with(
        &self,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
        options: EvaluateOptions,
    ) -> PodResult<()> {
        let range = if options.strip_outer_element {
            match ElementLocator::new(self).content_range() {
                Ok(range) => range,
                Err(error) => return env.recover(sink, error.into(), None),
            }
        } else {
            0..self.len()
        };
        self.evaluate_range(range, sink, env, options.include_sub_elements)
    }

    /// Render the content in `range`.
    pub fn evaluate_range(
        &self,
        range: Range<usize>,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
        include_sub_elements: bool,
    ) -> PodResult<()> {
        let mut pos = range.start;
        for (offset, stop) in self.stops(&range) {
            if offset > pos {
                sink.write_str(&self.content[pos..offset])?;
                pos = offset;
            }
            match stop {
                Stop::Open(mark) => env.tables.on_open(mark.kind, mark.columns),
                Stop::Close(kind) => env.tables.on_close(kind),
                Stop::Entry(entry) => {
                    self.evaluate_entry(offset, entry, sink, env, include_sub_elements)?;
                    pos = offset + PLACEHOLDER.len_utf8();
                }
            }
        }
        if pos < range.end {
            sink.write_str(&self.content[pos..range.end])?;
        }
        Ok(())
    }

    /// Entries and element boundaries within `range`, in rendering order.
    fn stops(&self, range: &Range<usize>) -> Vec<(usize, Stop<'_>)> {
        let mut stops: Vec<(usize, u8, Stop<'_>)> = Vec::new();
        for ((offset, _), mark) in self.elements.range((range.start, ElementId(0))..) {
            if *offset >= range.end {
                break;
            }
            stops.push((*offset, 1, Stop::Open(mark)));
        }
        for mark in self.elements.values() {
            if let Some(close) = mark.close {
                if range.contains(&close.offset) {
                    stops.push((close.offset, 0, Stop::Close(mark.kind)));
                }
            }
        }
        for (offset, entry) in self.entries.range(range.clone()) {
            stops.push((*offset, 2, Stop::Entry(entry)));
        }
        stops.sort_by_key(|(offset, rank, _)| (*offset, *rank));
        stops
            .into_iter()
            .map(|(offset, _, stop)| (offset, stop))
            .collect()
    }

    fn evaluate_entry(
        &self,
        offset: usize,
        entry: &Entry,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
        include_sub_elements: bool,
    ) -> PodResult<()> {
        match entry {
            Entry::Expression(expression) => match expression.evaluate(env) {
                Ok(output) => {
                    let text = if output.escape {
                        env.markup().escape(&output.text)
                    } else {
                        output.text
                    };
                    sink.write_str(&text)?;
                }
                Err(error) => env.recover(sink, error, expression.location())?,
            },
            Entry::Attributes(group) => {
                let tied = group
                    .tied
                    .and_then(|delta| self.entries.get(&(offset + delta)));
                if let Some(Entry::Expression(expression)) = tied {
                    match expression.peek(env) {
                        Ok(value) => {
                            sink.write_str(&env.markup().value_type_attributes(&value))?;
                        }
                        Err(error) if error.is_fatal() => return Err(error),
                        // Reported when the field itself is rendered.
                        Err(_) => {}
                    }
                }
            }
            Entry::Child(child) => {
                if include_sub_elements {
                    child.evaluate(sink, env)?;
                }
            }
        }
        Ok(())
    }

    /// Write this buffer back as template markup: fields as fields and
    /// statements as notes, so the output can be rendered again.
    pub fn reproduce(&self, sink: &mut dyn Sink, dialect: &dyn Dialect) -> PodResult<()> {
        match &self.action {
            Some(action) => {
                let anchor = ElementLocator::new(self).note_anchor();
                self.reproduce_range(0..anchor, sink, dialect)?;
                sink.write_str(&dialect.statement_note(action.statement()))?;
                self.reproduce_range(anchor..self.len(), sink, dialect)
            }
            None => self.reproduce_range(0..self.len(), sink, dialect),
        }
    }

    fn reproduce_range(
        &self,
        range: Range<usize>,
        sink: &mut dyn Sink,
        dialect: &dyn Dialect,
    ) -> PodResult<()> {
        let mut pos = range.start;
        for (offset, entry) in self.entries.range(range.clone()) {
            sink.write_str(&self.content[pos..*offset])?;
            match entry {
                Entry::Expression(expression) => {
                    sink.write_str(&dialect.expression_field(expression.source()))?;
                }
                Entry::Child(child) => child.reproduce(sink, dialect)?,
                Entry::Attributes(_) => {}
            }
            pos = offset + PLACEHOLDER.len_utf8();
        }
        sink.write_str(&self.content[pos..range.end])?;
        Ok(())
    }

    /// Number of buffers carrying an action, this one included.
    pub fn count_actions(&self) -> usize {
        let own = usize::from(self.action.is_some());
        own + self
            .entries
            .values()
            .map(|entry| match entry {
                Entry::Child(child) => child.count_actions(),
                _ => 0,
            })
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// `<p>A</p><t><c>{x}</c></t>`, with field `x`.
    fn sample() -> Buffer {
        let mut b = Buffer::new();
        b.open_element(ElementId(1), ElementKind::Paragraph, "<p>");
        b.write("A");
        b.close_element(ElementId(1), "</p>");
        b.open_element(ElementId(2), ElementKind::Table, "<t>");
        b.open_element_with_attributes(ElementId(3), ElementKind::Cell, "<c", ">");
        let field = b.add_expression(Expression::parse("x"));
        assert!(b.tie_attributes(ElementId(3), field));
        b.close_element(ElementId(3), "</c>");
        b.close_element(ElementId(2), "</t>");
        b
    }

    #[test]
    fn test_content_has_placeholders() {
        assert_eq!(sample().content(), "<p>A</p><t><c > </c></t>");
    }

    #[test]
    fn test_marks_record_open_and_close() {
        let b = sample();
        let (offset, cell) = b.mark(ElementId(3)).unwrap();
        assert_eq!(offset, 11);
        assert_eq!(cell.open_len, 4);
        assert_eq!(cell.close, Some(CloseMark { offset: 16, len: 4 }));
    }

    #[test]
    fn test_cut_tail() {
        let mut b = sample();
        let tail = b.cut(8, false);
        assert_eq!(b.content(), "<p>A</p>");
        assert_eq!(tail.content(), "<t><c > </c></t>");
        assert_eq!(tail.mark(ElementId(2)).unwrap().0, 0);
        assert_eq!(
            tail.mark(ElementId(3)).unwrap().1.close,
            Some(CloseMark { offset: 8, len: 4 })
        );
        assert!(matches!(tail.entry_at(7), Some(Entry::Expression(_))));
        assert!(b.entries().next().is_none());
    }

    #[test]
    fn test_cut_keep_first_part() {
        let mut b = sample();
        let head = b.cut(8, true);
        assert_eq!(head.content(), "<p>A</p>");
        assert_eq!(b.content(), "<t><c > </c></t>");
    }

    #[test]
    fn test_cut_through_an_element_drops_its_close() {
        let mut b = sample();
        let tail = b.cut(16, false);
        assert_eq!(b.mark(ElementId(3)).unwrap().1.close, None);
        assert_eq!(b.mark(ElementId(2)).unwrap().1.close, None);
        assert_eq!(tail.content(), "</c></t>");
        assert!(tail.elements().next().is_none());
    }

    #[test]
    fn test_cut_between_group_and_field_unties() {
        let mut b = sample();
        let _tail = b.cut(15, false);
        let group = b.entries().find_map(|(_, e)| match e {
            Entry::Attributes(g) => Some(g.clone()),
            _ => None,
        });
        assert_eq!(group.unwrap().tied, None);
    }

    #[test]
    fn test_transfer_all_content_rebases() {
        let mut parent = Buffer::new();
        parent.write("<root>");
        let child = sample();
        assert!(child.transfer_all_content(&mut parent).is_none());
        assert_eq!(parent.content(), "<root><p>A</p><t><c > </c></t>");
        assert_eq!(parent.mark(ElementId(3)).unwrap().0, 17);
        assert!(matches!(parent.entry_at(21), Some(Entry::Expression(_))));
        assert_eq!(
            parent.mark(ElementId(2)).unwrap().1.close,
            Some(CloseMark { offset: 26, len: 4 })
        );
    }

    #[test]
    fn test_tie_attributes_only_once() {
        let mut b = Buffer::new();
        b.open_element_with_attributes(ElementId(1), ElementKind::Cell, "<c", ">");
        let first = b.add_expression(Expression::parse("a"));
        let second = b.add_expression(Expression::parse("b"));
        assert!(b.tie_attributes(ElementId(1), first));
        assert!(!b.tie_attributes(ElementId(1), second));
    }

    #[test]
    fn test_close_unknown_element() {
        let mut b = Buffer::new();
        assert!(!b.close_element(ElementId(9), "</p>"));
        assert!(b.is_empty());
    }
}
