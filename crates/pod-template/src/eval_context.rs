/*
 * eval_context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Evaluation context for template rendering.
//!
//! This module provides [`EvalContext`], which is threaded through buffers
//! and actions while rendering to support:
//!
//! 1. **Diagnostics**: Collect the errors rendered inline in non-strict mode
//! 2. **State tracking**: Table rows and cells written so far, and nested
//!    template depth for recursion protection
//! 3. **Configuration**: Strict mode, where the first error stops rendering

use crate::context::{PodContext, PodValue};
use crate::dialect::{Dialect, DialectKind};
use crate::element::ElementKind;
use crate::error::{EvaluationError, PodError, PodResult};
use crate::evaluator::{ExprError, ExpressionEvaluator};
use crate::sink::Sink;
use crate::tables::TableTracker;
use crate::template::{RenderOptions, Template};
use pod_error_reporting::{DiagnosticKind, DiagnosticMessage, SourceInfo};

/// Collector for diagnostic messages produced while building or rendering.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<DiagnosticMessage>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    pub fn add(&mut self, diagnostic: DiagnosticMessage) {
        self.diagnostics.push(diagnostic);
    }

    /// Check if any errors were collected (warnings don't count).
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Error)
    }

    pub fn diagnostics(&self) -> &[DiagnosticMessage] {
        &self.diagnostics
    }

    /// Consume the collector and return the diagnostics in the order they
    /// were reported.
    pub fn into_diagnostics(self) -> Vec<DiagnosticMessage> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// State threaded through a render.
pub struct EvalContext<'a> {
    /// Variable bindings, mutated by loops and `with` statements.
    pub context: &'a mut PodContext,

    pub evaluator: &'a dyn ExpressionEvaluator,

    /// Dialect of the template being rendered.
    pub dialect: DialectKind,

    pub diagnostics: DiagnosticCollector,

    pub tables: TableTracker,

    /// Current nested template depth.
    pub template_depth: usize,

    pub max_template_depth: usize,

    /// Strict mode: the first error stops rendering.
    pub strict_mode: bool,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        context: &'a mut PodContext,
        evaluator: &'a dyn ExpressionEvaluator,
        options: &RenderOptions,
    ) -> Self {
        Self {
            context,
            evaluator,
            dialect: DialectKind::default(),
            diagnostics: DiagnosticCollector::new(),
            tables: TableTracker::new(),
            template_depth: 0,
            max_template_depth: options.max_template_depth,
            strict_mode: options.strict,
        }
    }

    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn markup(&self) -> &'static dyn Dialect {
        self.dialect.dialect()
    }

    /// Evaluate expression source against the current bindings.
    pub fn eval_source(&self, source: &str) -> Result<PodValue, ExprError> {
        self.evaluator.evaluate(source, &*self.context)
    }

    /// Report an error raised while rendering.
    ///
    /// In strict mode, and for fatal errors, the error is returned and
    /// rendering stops. Otherwise an error note is written in place of the
    /// failed content and rendering continues.
    pub fn recover(
        &mut self,
        sink: &mut dyn Sink,
        error: PodError,
        location: Option<&SourceInfo>,
    ) -> PodResult<()> {
        if self.strict_mode || error.is_fatal() {
            return Err(error);
        }
        let diagnostic = error.to_diagnostic(location);
        tracing::warn!(code = error.code(), error = %error, "Rendering error replaced by a note");
        sink.write_str(&self.markup().error_note(&diagnostic))?;
        self.diagnostics.add(diagnostic);
        Ok(())
    }

    /// Write an empty cell that the template itself does not contain.
    pub fn write_empty_cell(&mut self, sink: &mut dyn Sink) -> PodResult<()> {
        sink.write_str(&self.markup().empty_element(ElementKind::Cell))?;
        self.tables.note_cell();
        Ok(())
    }

    /// Close the current row and open a new one.
    pub fn write_row_break(&mut self, sink: &mut dyn Sink) -> PodResult<()> {
        let markup = self.markup();
        sink.write_str(&markup.close_tag(ElementKind::Row))?;
        sink.write_str(&markup.open_tag(ElementKind::Row))?;
        self.tables.start_new_row();
        Ok(())
    }

    /// Render a template found in the context, with the current bindings.
    pub fn render_nested(&mut self, template: &Template) -> PodResult<String> {
        if self.template_depth >= self.max_template_depth {
            return Err(EvaluationError::Recursion {
                max_depth: self.max_template_depth,
            }
            .into());
        }
        let outer_dialect = std::mem::replace(&mut self.dialect, template.dialect());
        let outer_tables = std::mem::take(&mut self.tables);
        self.template_depth += 1;
        tracing::debug!(depth = self.template_depth, "Rendering nested template");

        let mut output = String::new();
        let result = template.root().evaluate(&mut output, self);

        self.template_depth -= 1;
        self.tables = outer_tables;
        self.dialect = outer_dialect;
        result.map(|()| output)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn into_diagnostics(self) -> Vec<DiagnosticMessage> {
        self.diagnostics.into_diagnostics()
    }
}
