/*
 * builder.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Building a [`Template`] from document events.
//!
//! A document reader walks the source document and reports what it finds:
//! markup to copy through, structural elements opening and closing, fields
//! and notes. The builder turns those events into buffers.
//!
//! When a note holds a statement, the builder finds the innermost open
//! element of the kind the statement targets and cuts the buffer holding
//! that element at its open tag. The tail becomes a new buffer carrying the
//! statement's action, and everything that follows is written into it until
//! the target element closes. It is then attached to its parent as a child.

use crate::buffer::{Buffer, ElementId};
use crate::dialect::DialectKind;
use crate::element::{ElementKind, describe_kinds};
use crate::error::{ParsingError, PodError, PodResult};
use crate::eval_context::DiagnosticCollector;
use crate::evaluator::{DefaultEvaluator, ExpressionEvaluator};
use crate::expression::Expression;
use crate::statement::{ParserSession, parse_statement};
use crate::template::Template;
use pod_error_reporting::SourceInfo;
use serde::{Deserialize, Serialize};

/// Options controlling how a template is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Fail on the first malformed statement instead of writing an error
    /// note into the template.
    pub strict: bool,
    pub dialect: DialectKind,
    /// Check expression syntax while building.
    pub validate_expressions: bool,
    /// Meta-condition given to every field.
    pub field_meta_condition: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            strict: false,
            dialect: DialectKind::default(),
            validate_expressions: true,
            field_meta_condition: None,
        }
    }
}

impl BuildOptions {
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    /// Render every field only when `condition` holds, reproducing it
    /// otherwise.
    pub fn with_field_meta_condition(mut self, condition: impl Into<String>) -> Self {
        self.field_meta_condition = Some(condition.into());
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenElement {
    id: ElementId,
    kind: ElementKind,
}

/// A buffer cut out for a statement, waiting for its target to close.
#[derive(Debug)]
struct Frame {
    buffer: Buffer,
    target: ElementId,
}

pub struct TemplateBuilder {
    options: BuildOptions,
    root: Buffer,
    frames: Vec<Frame>,
    open: Vec<OpenElement>,
    session: ParserSession,
    checker: Option<Box<dyn ExpressionEvaluator>>,
    diagnostics: DiagnosticCollector,
    next_id: u32,
}

impl TemplateBuilder {
    pub fn new(options: BuildOptions) -> Self {
        let checker: Option<Box<dyn ExpressionEvaluator>> = if options.validate_expressions {
            Some(Box::new(DefaultEvaluator::new()))
        } else {
            None
        };
        Self {
            options,
            root: Buffer::new(),
            frames: Vec::new(),
            open: Vec::new(),
            session: ParserSession::new(),
            checker,
            diagnostics: DiagnosticCollector::new(),
            next_id: 0,
        }
    }

    /// Validate expressions with `checker` instead of the built-in
    /// language.
    pub fn with_checker(mut self, checker: impl ExpressionEvaluator + 'static) -> Self {
        self.checker = Some(Box::new(checker));
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Kinds of the elements currently open, outermost first.
    pub fn open_kinds(&self) -> Vec<ElementKind> {
        self.open.iter().map(|e| e.kind).collect()
    }

    fn current(&mut self) -> &mut Buffer {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.buffer,
            None => &mut self.root,
        }
    }

    /// Buffer `index` of the stack: 0 is the root.
    fn buffer(&self, index: usize) -> &Buffer {
        match index {
            0 => &self.root,
            n => &self.frames[n - 1].buffer,
        }
    }

    fn buffer_mut(&mut self, index: usize) -> &mut Buffer {
        match index {
            0 => &mut self.root,
            n => &mut self.frames[n - 1].buffer,
        }
    }

    /// The stack index of the buffer holding element `id`'s open tag.
    fn holder_of(&self, id: ElementId) -> Option<usize> {
        (0..=self.frames.len())
            .rev()
            .find(|&index| self.buffer(index).mark(id).is_some())
    }

    /// Copy markup through.
    pub fn write(&mut self, markup: &str) {
        self.current().write(markup);
    }

    fn allocate_id(&mut self) -> ElementId {
        self.next_id += 1;
        ElementId(self.next_id)
    }

    fn push_open(&mut self, id: ElementId, kind: ElementKind) {
        if let Some(parent) = self.open.last() {
            if !parent.kind.allows_child(kind) {
                tracing::debug!(parent = %parent.kind, child = %kind, "Unexpected element nesting");
            }
        }
        self.open.push(OpenElement { id, kind });
    }

    /// A structural element opens with `markup`.
    pub fn start_element(&mut self, kind: ElementKind, markup: &str) -> ElementId {
        let id = self.allocate_id();
        self.current().open_element(id, kind, markup);
        self.push_open(id, kind);
        id
    }

    /// A cell opens. Its value type attributes go between `head` and
    /// `tail`, once the cell's first field is known.
    pub fn start_cell_with_value_type(&mut self, head: &str, tail: &str) -> ElementId {
        let id = self.allocate_id();
        self.current()
            .open_element_with_attributes(id, ElementKind::Cell, head, tail);
        self.push_open(id, ElementKind::Cell);
        id
    }

    /// The innermost open element closes with `markup`.
    pub fn end_element(&mut self, markup: &str) -> PodResult<()> {
        let Some(element) = self.open.pop() else {
            return Err(PodError::Build {
                message: format!("`{markup}` closes an element that was never opened"),
            });
        };
        if !self.current().close_element(element.id, markup) {
            return Err(PodError::Build {
                message: format!("`{}` closed outside the part it was opened in", element.kind),
            });
        }
        while self
            .frames
            .last()
            .is_some_and(|frame| frame.target == element.id)
        {
            let Some(frame) = self.frames.pop() else {
                break;
            };
            tracing::trace!(target_kind = %element.kind, "Statement part complete");
            self.current().attach_child(frame.buffer);
        }
        Ok(())
    }

    /// The innermost open table declares `count` more columns.
    pub fn declare_columns(&mut self, count: usize) {
        let Some(table) = self
            .open
            .iter()
            .rev()
            .find(|e| e.kind == ElementKind::Table)
            .map(|e| e.id)
        else {
            tracing::debug!(count, "Column declaration outside a table");
            return;
        };
        if let Some(index) = self.holder_of(table) {
            if let Some(mark) = self.buffer_mut(index).mark_mut(table) {
                mark.columns = Some(mark.columns.unwrap_or(0) + count);
            }
        }
    }

    /// A field with expression `source`.
    pub fn add_expression(&mut self, source: &str, location: Option<SourceInfo>) -> PodResult<()> {
        let mut expression = Expression::parse(source).with_location(location.clone());
        if let Some(condition) = &self.options.field_meta_condition {
            expression = expression.with_meta_condition(condition.clone());
        }
        let invalid = self.checker.as_ref().and_then(|checker| {
            expression.parts().find_map(|part| {
                checker
                    .check(part)
                    .err()
                    .map(|message| (part.to_string(), message))
            })
        });
        if let Some((expression, message)) = invalid {
            return self.report(ParsingError::Expression { expression, message }.into(), location);
        }

        let cell = self
            .open
            .iter()
            .rev()
            .find(|e| e.kind == ElementKind::Cell)
            .map(|e| e.id);
        let buffer = self.current();
        let offset = buffer.add_expression(expression);
        if let Some(cell) = cell {
            buffer.tie_attributes(cell, offset);
        }
        Ok(())
    }

    /// A note holding statement `text`.
    pub fn add_statement(&mut self, text: &str, location: Option<SourceInfo>) -> PodResult<()> {
        let plan = match parse_statement(text, self.checker.as_deref()) {
            Ok(plan) => plan,
            Err(error) => return self.report(error.into(), location),
        };
        let Some(target) = self
            .open
            .iter()
            .rev()
            .find(|e| e.kind == plan.target)
            .map(|e| e.id)
        else {
            let error = ParsingError::TargetNotFound {
                kind: plan.target,
                present: self.open_kinds(),
            };
            return self.report(error.into(), location);
        };
        let Some(index) = self.holder_of(target) else {
            return Err(PodError::Build {
                message: format!("open `{}` is missing from every part", plan.target),
            });
        };
        let action = match self.session.resolve(plan, location.clone()) {
            Ok(action) => action,
            Err(error) => return self.report(error.into(), location),
        };
        tracing::debug!(
            action = action.kind.keyword(),
            target = %action.target,
            open = %describe_kinds(&self.open_kinds()),
            "Statement attached"
        );

        let buffer = self.buffer_mut(index);
        let Some((offset, _)) = buffer.mark(target) else {
            return Err(PodError::Build {
                message: format!("open `{}` is missing from its part", action.target),
            });
        };
        let mut part = buffer.cut(offset, false);
        part.set_action(action);
        self.frames.insert(
            index,
            Frame {
                buffer: part,
                target,
            },
        );
        Ok(())
    }

    /// Handle a build error: fail in strict mode, otherwise leave an error
    /// note where the statement or field was.
    fn report(&mut self, error: PodError, location: Option<SourceInfo>) -> PodResult<()> {
        if self.options.strict {
            return Err(error);
        }
        let diagnostic = error.to_diagnostic(location.as_ref());
        tracing::warn!(code = error.code(), error = %error, "Build error replaced by a note");
        let note = self.options.dialect.dialect().error_note(&diagnostic);
        self.current().write(&note);
        self.diagnostics.add(diagnostic);
        Ok(())
    }

    /// Finish the template.
    ///
    /// Elements still open are an error in strict mode. Otherwise their
    /// pending statements are dropped, keeping the content.
    pub fn finish(mut self) -> PodResult<Template> {
        if !self.open.is_empty() || !self.frames.is_empty() {
            let error = PodError::Build {
                message: format!(
                    "{} element(s) still open at the end of the document ({})",
                    self.open.len(),
                    describe_kinds(&self.open_kinds())
                ),
            };
            if self.options.strict {
                return Err(error);
            }
            tracing::warn!(error = %error, "Dropping statements of unclosed elements");
            self.diagnostics.add(error.to_diagnostic(None));
            while let Some(frame) = self.frames.pop() {
                let parent = self.current();
                frame.buffer.transfer_all_content(parent);
            }
        }
        tracing::debug!(actions = self.root.count_actions(), "Template built");
        Ok(Template::new(
            self.root,
            self.options.dialect,
            self.diagnostics.into_diagnostics(),
        ))
    }
}
