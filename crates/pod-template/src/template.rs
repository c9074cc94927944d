/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled templates and rendering.

use crate::buffer::Buffer;
use crate::builder::{BuildOptions, TemplateBuilder};
use crate::context::PodContext;
use crate::dialect::DialectKind;
use crate::error::PodResult;
use crate::eval_context::EvalContext;
use crate::evaluator::{DefaultEvaluator, ExpressionEvaluator};
use crate::sink::Sink;
use pod_error_reporting::DiagnosticMessage;
use serde::{Deserialize, Serialize};

/// Options controlling a render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Stop at the first error instead of rendering an error note.
    pub strict: bool,
    /// How deeply templates found in the context may nest.
    pub max_template_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_template_depth: 50,
        }
    }
}

impl RenderOptions {
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_max_template_depth(mut self, depth: usize) -> Self {
        self.max_template_depth = depth;
        self
    }
}

/// A compiled document template.
#[derive(Debug)]
pub struct Template {
    root: Buffer,
    dialect: DialectKind,
    diagnostics: Vec<DiagnosticMessage>,
}

impl Template {
    /// Start building a template from document events.
    pub fn builder(options: BuildOptions) -> TemplateBuilder {
        TemplateBuilder::new(options)
    }

    pub(crate) fn new(
        root: Buffer,
        dialect: DialectKind,
        diagnostics: Vec<DiagnosticMessage>,
    ) -> Self {
        Self {
            root,
            dialect,
            diagnostics,
        }
    }

    pub fn root(&self) -> &Buffer {
        &self.root
    }

    pub fn dialect(&self) -> DialectKind {
        self.dialect
    }

    /// Errors found while building, each already written into the template
    /// as an error note.
    pub fn build_diagnostics(&self) -> &[DiagnosticMessage] {
        &self.diagnostics
    }

    /// Render with the built-in expression language and default options.
    ///
    /// Errors are rendered inline; use [`Template::render_with`] to get
    /// their diagnostics.
    pub fn render(&self, context: &mut PodContext) -> PodResult<String> {
        let evaluator = DefaultEvaluator::new();
        self.render_with(context, &evaluator, &RenderOptions::default())
            .map(|(output, _)| output)
    }

    /// Render into a string, returning the output and the diagnostics of
    /// errors rendered inline.
    pub fn render_with(
        &self,
        context: &mut PodContext,
        evaluator: &dyn ExpressionEvaluator,
        options: &RenderOptions,
    ) -> PodResult<(String, Vec<DiagnosticMessage>)> {
        let mut output = String::new();
        let diagnostics = self.render_into(&mut output, context, evaluator, options)?;
        Ok((output, diagnostics))
    }

    /// Render into `sink`.
    ///
    /// In strict mode the first error is returned; whatever was written
    /// before it stays in the sink.
    pub fn render_into(
        &self,
        sink: &mut dyn Sink,
        context: &mut PodContext,
        evaluator: &dyn ExpressionEvaluator,
        options: &RenderOptions,
    ) -> PodResult<Vec<DiagnosticMessage>> {
        tracing::debug!(
            dialect = ?self.dialect,
            strict = options.strict,
            "Rendering template"
        );
        let mut env = EvalContext::new(context, evaluator, options).with_dialect(self.dialect);
        self.root.reset_memos();
        self.root.evaluate(sink, &mut env)?;
        if env.has_errors() {
            tracing::debug!(
                count = env.diagnostics.diagnostics().len(),
                "Rendered with errors"
            );
        }
        Ok(env.into_diagnostics())
    }

    /// Write the template back as markup, with statements as notes and
    /// fields as fields.
    pub fn reproduce(&self) -> PodResult<String> {
        let mut output = String::new();
        self.root.reproduce(&mut output, self.dialect.dialect())?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_options_from_json() {
        let options: RenderOptions = serde_json::from_str(r#"{"strict": true}"#).unwrap();
        assert_eq!(
            options,
            RenderOptions {
                strict: true,
                max_template_depth: 50
            }
        );
    }

    #[test]
    fn test_reproduce_round_trips_markup() {
        let mut b = Template::builder(BuildOptions {
            dialect: DialectKind::Html,
            ..BuildOptions::default()
        });
        b.start_element(ElementKind::Paragraph, "<p>");
        b.write("Hi ");
        b.add_expression("name", None).unwrap();
        b.add_statement("do text if show", None).unwrap();
        b.end_element("</p>").unwrap();
        let template = b.finish().unwrap();
        assert_eq!(
            template.reproduce().unwrap(),
            "<p><pod:note>do text if show</pod:note>Hi <pod:expr>name</pod:expr></p>"
        );
    }
}
