/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression fields.
//!
//! A field's source text has the form `[:]main[||fallback]`:
//!
//! - a leading `:` disables escaping of the result
//! - `||` separates an optional fallback, evaluated when `main` fails
//!
//! A field may also carry a meta-condition. When that condition is false
//! the field is not evaluated at all and its raw source is written back,
//! so the template can be rendered again later.
//!
//! Fields inside table cells are looked at twice per render: once by the
//! cell's attribute group (to pick the value type) and once to produce the
//! text. [`Expression::peek`] evaluates and remembers the value, and the
//! following [`Expression::evaluate`] consumes it instead of running the
//! expression a second time.

use crate::context::PodValue;
use crate::error::{EvaluationError, PodError, PodResult};
use crate::eval_context::EvalContext;
use crate::evaluator::ExprError;
use pod_error_reporting::SourceInfo;
use std::cell::RefCell;

#[derive(Debug, Default)]
enum MemoState {
    #[default]
    Fresh,
    Peeked(PodValue),
}

/// The text an evaluated field produces.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOutput {
    pub text: String,
    /// Whether `text` must be escaped before being written.
    pub escape: bool,
}

#[derive(Debug)]
pub struct Expression {
    source: String,
    main: String,
    fallback: Option<String>,
    escape: bool,
    meta_condition: Option<String>,
    location: Option<SourceInfo>,
    state: RefCell<MemoState>,
}

impl Clone for Expression {
    /// Clones start fresh: a peeked value belongs to one render pass.
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            main: self.main.clone(),
            fallback: self.fallback.clone(),
            escape: self.escape,
            meta_condition: self.meta_condition.clone(),
            location: self.location.clone(),
            state: RefCell::new(MemoState::Fresh),
        }
    }
}

impl Expression {
    /// Parse field source text.
    pub fn parse(source: &str) -> Self {
        let trimmed = source.trim();
        let (escape, body) = match trimmed.strip_prefix(':') {
            Some(rest) => (false, rest),
            None => (true, trimmed),
        };
        let (main, fallback) = match split_fallback(body) {
            Some((main, fallback)) => (main.trim(), Some(fallback.trim().to_string())),
            None => (body.trim(), None),
        };
        Self {
            source: source.to_string(),
            main: main.to_string(),
            fallback,
            escape,
            meta_condition: None,
            location: None,
            state: RefCell::new(MemoState::Fresh),
        }
    }

    pub fn with_meta_condition(mut self, condition: impl Into<String>) -> Self {
        self.meta_condition = Some(condition.into());
        self
    }

    pub fn with_location(mut self, location: Option<SourceInfo>) -> Self {
        self.location = location;
        self
    }

    /// The raw source text, as written in the document.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub fn escapes(&self) -> bool {
        self.escape
    }

    pub fn meta_condition(&self) -> Option<&str> {
        self.meta_condition.as_deref()
    }

    pub fn location(&self) -> Option<&SourceInfo> {
        self.location.as_ref()
    }

    /// The expressions that must parse for this field to be valid.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.main.as_str())
            .chain(self.fallback.as_deref())
            .chain(self.meta_condition.as_deref())
    }

    /// Whether a peeked value is waiting to be consumed.
    pub fn is_peeked(&self) -> bool {
        matches!(*self.state.borrow(), MemoState::Peeked(_))
    }

    /// Drop any peeked value.
    pub fn reset(&self) {
        self.state.replace(MemoState::Fresh);
    }

    /// Evaluate and remember the value for the next [`Expression::value`]
    /// or [`Expression::evaluate`]. Peeking twice evaluates once.
    ///
    /// A false meta-condition yields the raw source as a string and
    /// remembers nothing.
    pub fn peek(&self, env: &mut EvalContext<'_>) -> PodResult<PodValue> {
        if let MemoState::Peeked(value) = &*self.state.borrow() {
            return Ok(value.clone());
        }
        if !self.meta_condition_holds(env)? {
            return Ok(PodValue::Str(self.source.clone()));
        }
        let value = self.compute(env)?;
        self.state.replace(MemoState::Peeked(value.clone()));
        Ok(value)
    }

    /// The field's value, consuming a peeked value if there is one.
    pub fn value(&self, env: &mut EvalContext<'_>) -> PodResult<PodValue> {
        match self.state.replace(MemoState::Fresh) {
            MemoState::Peeked(value) => Ok(value),
            MemoState::Fresh => self.compute(env),
        }
    }

    /// Produce the text for this field.
    ///
    /// A false meta-condition writes the field back as template markup
    /// without evaluating anything. A nested template is rendered against the
    /// current context and is never escaped.
    pub fn evaluate(&self, env: &mut EvalContext<'_>) -> PodResult<FieldOutput> {
        if !self.meta_condition_holds(env)? {
            self.reset();
            return Ok(FieldOutput {
                text: env.markup().expression_field(&self.source),
                escape: false,
            });
        }
        let value = self.value(env)?;
        self.render_value(value, env)
    }

    /// Turn a value of this expression into text.
    pub fn render_value(&self, value: PodValue, env: &mut EvalContext<'_>) -> PodResult<FieldOutput> {
        match value {
            PodValue::Template(template) => Ok(FieldOutput {
                text: env.render_nested(&template)?,
                escape: false,
            }),
            value => Ok(FieldOutput {
                text: value.render(),
                escape: self.escape,
            }),
        }
    }

    fn meta_condition_holds(&self, env: &mut EvalContext<'_>) -> PodResult<bool> {
        match &self.meta_condition {
            Some(condition) => Ok(self.run(condition, env)?.is_truthy()),
            None => Ok(true),
        }
    }

    fn compute(&self, env: &mut EvalContext<'_>) -> PodResult<PodValue> {
        match env.eval_source(&self.main) {
            Ok(value) => Ok(value),
            Err(ExprError::Abort(message)) => Err(PodError::Aborted { message }),
            Err(ExprError::Failed(message)) => match &self.fallback {
                Some(fallback) => {
                    tracing::trace!(
                        main = %self.main,
                        error = %message,
                        "Field failed, using fallback"
                    );
                    self.run(fallback, env)
                }
                None => Err(EvaluationError::Expression {
                    expression: self.main.clone(),
                    message,
                }
                .into()),
            },
        }
    }

    fn run(&self, source: &str, env: &mut EvalContext<'_>) -> PodResult<PodValue> {
        env.eval_source(source).map_err(|e| match e {
            ExprError::Abort(message) => PodError::Aborted { message },
            ExprError::Failed(message) => EvaluationError::Expression {
                expression: source.to_string(),
                message,
            }
            .into(),
        })
    }
}

/// Split at the first `||` outside string literals.
fn split_fallback(body: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev_pipe = false;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                prev_pipe = false;
            }
            '|' if prev_pipe => return Some((&body[..i - 1], &body[i + 1..])),
            '|' => prev_pipe = true,
            _ => prev_pipe = false,
        }
    }
    None
}
