/*
 * action.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Actions: what a statement does to the part of the document it targets.
//!
//! A statement such as `do row for item in items` becomes an [`Action`]
//! attached to the buffer holding the targeted row. Statements with several
//! lines become a chain: each action runs the next one as its body, and the
//! last one renders the buffer.

use crate::buffer::{Buffer, EvaluateOptions};
use crate::context::{PodContext, PodValue};
use crate::element::ElementKind;
use crate::error::{EvaluationError, ParsingError, PodResult};
use crate::eval_context::EvalContext;
use crate::expression::Expression;
use crate::locator::ElementLocator;
use crate::sink::Sink;
use indexmap::IndexMap;
use pod_error_reporting::SourceInfo;

/// Name of the variable holding loop status, keyed by loop variable.
pub const LOOP_VARIABLE: &str = "loop";

/// Where the content an action renders comes from.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// The template's own content.
    Buffer,
    /// The result of an expression. With `keep_wrapper` (`from+`) the
    /// result replaces the target's content but its tags are kept.
    From {
        expression: Expression,
        keep_wrapper: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Buffer,
    From,
}

/// One `with` binding. Global bindings outlive the statement.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub global: bool,
    pub value: Expression,
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    If {
        condition: Expression,
    },
    /// Renders when the paired `if` did not. Holds a copy of that `if`'s
    /// condition, evaluated again.
    Else {
        condition: Expression,
        if_name: Option<String>,
    },
    For {
        variables: Vec<String>,
        iterable: Expression,
    },
    Variables {
        bindings: Vec<Binding>,
    },
    /// Only renders its source.
    Null,
    /// Renders when the condition holds; otherwise writes the target back
    /// unchanged, statement included.
    MetaIf {
        condition: Expression,
    },
}

impl ActionKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            ActionKind::If { .. } => "if",
            ActionKind::Else { .. } => "else",
            ActionKind::For { .. } => "for",
            ActionKind::Variables { .. } => "with",
            ActionKind::Null => "null",
            ActionKind::MetaIf { .. } => "meta-if",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    /// Name given with `if ... as name`.
    pub name: Option<String>,
    pub target: ElementKind,
    /// Minus operator: render the target's content without the target.
    pub remove_target: bool,
    pub source: ContentSource,
    pub sub_action: Option<Box<Action>>,
    /// The full statement text.
    pub statement: String,
    pub location: Option<SourceInfo>,
}

/// Overrides for [`Action::evaluate_buffer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluateBufferOptions {
    pub forced_source: Option<SourceKind>,
    /// Render the target with its tags even though the minus operator was
    /// used, because the target could not be removed.
    pub ignore_remove_target: bool,
}

impl Action {
    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn location(&self) -> Option<&SourceInfo> {
        self.location.as_ref()
    }

    /// The actions of this chain, starting with this one.
    pub fn chain(&self) -> impl Iterator<Item = &Action> {
        std::iter::successors(Some(self), |action| action.sub_action.as_deref())
    }

    /// Run this action on `buffer`.
    pub fn execute(
        &self,
        buffer: &Buffer,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
    ) -> PodResult<()> {
        tracing::trace!(
            action = self.kind.keyword(),
            target = %self.target,
            "Executing action"
        );
        let mut options = EvaluateBufferOptions::default();
        if self.remove_target {
            if let Err(error) = ElementLocator::new(buffer).content_range() {
                env.recover(sink, error.into(), self.location())?;
                options.ignore_remove_target = true;
            }
        }

        match &self.kind {
            ActionKind::If { condition } => match condition.value(env) {
                Ok(value) => self.branch(value.is_truthy(), buffer, sink, env, options),
                Err(error) => env.recover(sink, error, self.location()),
            },
            ActionKind::Else { condition, .. } => match condition.value(env) {
                Ok(value) => self.branch(!value.is_truthy(), buffer, sink, env, options),
                Err(error) => env.recover(sink, error, self.location()),
            },
            ActionKind::For {
                variables,
                iterable,
            } => self.execute_for(variables, iterable, buffer, sink, env, options),
            ActionKind::Variables { bindings } => {
                self.execute_variables(bindings, buffer, sink, env, options)
            }
            ActionKind::Null => match self.source {
                ContentSource::From { .. } => self.evaluate_buffer(buffer, sink, env, options),
                ContentSource::Buffer => {
                    let error = ParsingError::MissingFromClause {
                        statement: self.statement.clone(),
                    };
                    env.recover(sink, error.into(), self.location())
                }
            },
            ActionKind::MetaIf { condition } => match condition.value(env) {
                Ok(value) if value.is_truthy() => self.proceed(buffer, sink, env, options),
                Ok(_) => buffer.reproduce(sink, env.markup()),
                Err(error) => env.recover(sink, error, self.location()),
            },
        }
    }

    fn branch(
        &self,
        condition: bool,
        buffer: &Buffer,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
        options: EvaluateBufferOptions,
    ) -> PodResult<()> {
        if condition {
            self.proceed(buffer, sink, env, options)
        } else if self.target == ElementKind::Cell {
            // Keep the row's cell count.
            env.write_empty_cell(sink)
        } else {
            Ok(())
        }
    }

    /// Run the next action of the chain, or render the buffer.
    fn proceed(
        &self,
        buffer: &Buffer,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
        options: EvaluateBufferOptions,
    ) -> PodResult<()> {
        match &self.sub_action {
            Some(next) => next.execute(buffer, sink, env),
            None => self.evaluate_buffer(buffer, sink, env, options),
        }
    }

    /// Render the content this action produces: the buffer, or the result
    /// of its `from` expression.
    ///
    /// A `from` expression evaluating to `None` falls back to the buffer.
    pub fn evaluate_buffer(
        &self,
        buffer: &Buffer,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
        options: EvaluateBufferOptions,
    ) -> PodResult<()> {
        let source = options.forced_source.unwrap_or(match self.source {
            ContentSource::Buffer => SourceKind::Buffer,
            ContentSource::From { .. } => SourceKind::From,
        });

        if let (
            ContentSource::From {
                expression,
                keep_wrapper,
            },
            SourceKind::From,
        ) = (&self.source, source)
        {
            let value = match expression.value(env) {
                Ok(PodValue::None) => {
                    let forced = EvaluateBufferOptions {
                        forced_source: Some(SourceKind::Buffer),
                        ..options
                    };
                    return self.evaluate_buffer(buffer, sink, env, forced);
                }
                Ok(value) => value,
                Err(error) => return env.recover(sink, error, self.location()),
            };
            let output = match expression.render_value(value, env) {
                Ok(output) => output,
                Err(error) => return env.recover(sink, error, self.location()),
            };
            let text = if output.escape {
                env.markup().escape(&output.text)
            } else {
                output.text
            };
            if !keep_wrapper {
                return Ok(sink.write_str(&text)?);
            }
            let (open, close) = match ElementLocator::new(buffer).wrapper() {
                Ok(ranges) => ranges,
                Err(error) => return env.recover(sink, error.into(), self.location()),
            };
            buffer.evaluate_range(open, sink, env, false)?;
            sink.write_str(&text)?;
            return buffer.evaluate_range(close, sink, env, false);
        }

        let strip = self.remove_target && !options.ignore_remove_target;
        buffer.evaluate_with(
            sink,
            env,
            EvaluateOptions {
                include_sub_elements: true,
                strip_outer_element: strip,
            },
        )
    }

    fn execute_for(
        &self,
        variables: &[String],
        iterable: &Expression,
        buffer: &Buffer,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
        options: EvaluateBufferOptions,
    ) -> PodResult<()> {
        let items: Vec<PodValue> = match iterable.value(env) {
            Ok(PodValue::List(items)) => items,
            Ok(PodValue::Map(map)) => map.into_keys().map(PodValue::Str).collect(),
            Ok(PodValue::Str(text)) => text.chars().map(|c| PodValue::Str(c.into())).collect(),
            Ok(other) => {
                let error = EvaluationError::NotIterable {
                    expression: iterable.main().to_string(),
                    type_name: other.type_name(),
                };
                return env.recover(sink, error.into(), self.location());
            }
            Err(error) => return env.recover(sink, error, self.location()),
        };
        tracing::debug!(
            variables = ?variables,
            length = items.len(),
            target = %self.target,
            "Repeating"
        );

        let saved: Vec<(String, Option<PodValue>)> = variables
            .iter()
            .map(|name| (name.clone(), env.context.get(name).cloned()))
            .collect();
        let saved_loop = env.context.get(LOOP_VARIABLE).cloned();

        let result = self.iterate(items, variables, saved_loop.as_ref(), buffer, sink, env, options);

        for (name, previous) in saved.into_iter().rev() {
            env.context.restore(&name, previous);
        }
        env.context.restore(LOOP_VARIABLE, saved_loop);
        result
    }

    fn iterate(
        &self,
        items: Vec<PodValue>,
        variables: &[String],
        outer_loop: Option<&PodValue>,
        buffer: &Buffer,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
        options: EvaluateBufferOptions,
    ) -> PodResult<()> {
        let length = items.len();
        let balance_cells = self.target == ElementKind::Cell
            && env.tables.current().is_some_and(|table| table.columns > 0);

        for (index, item) in items.into_iter().enumerate() {
            if balance_cells && env.tables.current().is_some_and(|table| table.row_is_full()) {
                env.write_row_break(sink)?;
            }
            if let Err(error) = bind_loop_variables(env.context, variables, item) {
                env.recover(sink, error.into(), self.location())?;
                continue;
            }

            let mut status = match outer_loop {
                Some(PodValue::Map(map)) => map.clone(),
                _ => IndexMap::new(),
            };
            for name in variables {
                status.insert(name.clone(), loop_status(index, length));
            }
            env.context.insert(LOOP_VARIABLE, PodValue::Map(status));

            buffer.reset_memos();
            self.proceed(buffer, sink, env, options)?;
        }

        if balance_cells {
            let missing = env.tables.current().map_or(0, |table| table.missing_cells());
            for _ in 0..missing {
                env.write_empty_cell(sink)?;
            }
        }
        Ok(())
    }

    fn execute_variables(
        &self,
        bindings: &[Binding],
        buffer: &Buffer,
        sink: &mut dyn Sink,
        env: &mut EvalContext<'_>,
        options: EvaluateBufferOptions,
    ) -> PodResult<()> {
        let mut saved: Vec<(&str, Option<PodValue>)> = Vec::new();
        for binding in bindings {
            match binding.value.value(env) {
                Ok(value) => {
                    let previous = env.context.insert(binding.name.clone(), value);
                    if !binding.global {
                        saved.push((&binding.name, previous));
                    }
                }
                Err(error) => {
                    restore_bindings(env.context, saved);
                    return env.recover(sink, error, self.location());
                }
            }
        }
        let result = self.proceed(buffer, sink, env, options);
        restore_bindings(env.context, saved);
        result
    }
}

fn restore_bindings(context: &mut PodContext, saved: Vec<(&str, Option<PodValue>)>) {
    for (name, previous) in saved.into_iter().rev() {
        context.restore(name, previous);
    }
}

fn bind_loop_variables(
    context: &mut PodContext,
    variables: &[String],
    item: PodValue,
) -> Result<(), EvaluationError> {
    if let [name] = variables {
        context.insert(name.clone(), item);
        return Ok(());
    }
    match item {
        PodValue::List(values) if values.len() == variables.len() => {
            for (name, value) in variables.iter().zip(values) {
                context.insert(name.clone(), value);
            }
            Ok(())
        }
        PodValue::List(values) => Err(EvaluationError::Unpack {
            expected: variables.len(),
            found: format!("a list of {} values", values.len()),
        }),
        other => Err(EvaluationError::Unpack {
            expected: variables.len(),
            found: other.type_name().to_string(),
        }),
    }
}

fn loop_status(index: usize, length: usize) -> PodValue {
    let position = i64::try_from(index).unwrap_or(i64::MAX);
    PodValue::map([
        ("index", PodValue::Int(position)),
        ("isFirst", PodValue::Bool(index == 0)),
        ("isLast", PodValue::Bool(index + 1 == length)),
        ("isOdd", PodValue::Bool(index % 2 == 1)),
        ("isEven", PodValue::Bool(index % 2 == 0)),
        (
            "length",
            PodValue::Int(i64::try_from(length).unwrap_or(i64::MAX)),
        ),
    ])
}
