/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression evaluation.
//!
//! Expressions appear in fields (`client.name`), in statement commands
//! (`if total > 0`, `for item in items`) and in `from` clauses. The engine
//! only talks to them through [`ExpressionEvaluator`], so a host can plug in
//! its own language. [`DefaultEvaluator`] implements a small Python-like
//! language: literals, names, field access, indexing, calls, arithmetic,
//! comparisons, `and`/`or`/`not`, membership and conditional expressions.

pub mod ast;
pub mod builtins;
pub mod interpreter;
pub mod lexer;
pub mod parser;

use crate::context::{PodContext, PodValue};
use ast::Expr;
use builtins::FunctionRegistry;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Failure reported by an [`ExpressionEvaluator`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The expression could not be evaluated. Fallbacks apply.
    #[error("{0}")]
    Failed(String),

    /// The expression asked to stop rendering altogether.
    #[error("{0}")]
    Abort(String),
}

/// Evaluates expression source text against a context.
pub trait ExpressionEvaluator {
    fn evaluate(&self, source: &str, context: &PodContext) -> Result<PodValue, ExprError>;

    /// Check that `source` is well-formed without evaluating it.
    ///
    /// Called while building a template so malformed expressions are
    /// reported against their statement. The default accepts everything.
    fn check(&self, _source: &str) -> Result<(), String> {
        Ok(())
    }
}

/// The built-in expression language.
///
/// Parsed expressions are cached by source text, so a field inside a loop is
/// parsed once.
#[derive(Debug)]
pub struct DefaultEvaluator {
    functions: FunctionRegistry,
    cache: RefCell<HashMap<String, Rc<Expr>>>,
}

impl DefaultEvaluator {
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::with_builtins(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Register a host function, replacing any built-in of the same name.
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        function: impl Fn(&[PodValue]) -> Result<PodValue, ExprError> + 'static,
    ) -> Self {
        self.functions.register(name, function);
        self
    }

    fn compile(&self, source: &str) -> Result<Rc<Expr>, ExprError> {
        if let Some(expr) = self.cache.borrow().get(source) {
            return Ok(Rc::clone(expr));
        }
        let expr = Rc::new(parser::parse(source.trim()).map_err(ExprError::Failed)?);
        tracing::trace!(source = source, "Compiled expression");
        self.cache
            .borrow_mut()
            .insert(source.to_string(), Rc::clone(&expr));
        Ok(expr)
    }
}

impl Default for DefaultEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEvaluator for DefaultEvaluator {
    fn evaluate(&self, source: &str, context: &PodContext) -> Result<PodValue, ExprError> {
        let expr = self.compile(source)?;
        interpreter::eval(&expr, context, &self.functions)
    }

    fn check(&self, source: &str) -> Result<(), String> {
        parser::parse(source.trim()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_uses_context() {
        let evaluator = DefaultEvaluator::new();
        let mut ctx = PodContext::new();
        ctx.insert("price", 10);
        ctx.insert("qty", 3);
        assert_eq!(
            evaluator.evaluate("price * qty", &ctx),
            Ok(PodValue::Int(30))
        );
    }

    #[test]
    fn test_cache_is_reused() {
        let evaluator = DefaultEvaluator::new();
        let ctx = PodContext::new();
        evaluator.evaluate("1 + 1", &ctx).unwrap();
        evaluator.evaluate("1 + 1", &ctx).unwrap();
        assert_eq!(evaluator.cache.borrow().len(), 1);
    }

    #[test]
    fn test_host_function() {
        let evaluator = DefaultEvaluator::new().with_function("twice", |args| match args {
            [PodValue::Int(i)] => Ok(PodValue::Int(i * 2)),
            _ => Err(ExprError::Failed("twice() takes one integer".into())),
        });
        assert_eq!(
            evaluator.evaluate("twice(21)", &PodContext::new()),
            Ok(PodValue::Int(42))
        );
    }

    #[test]
    fn test_check_reports_syntax_errors() {
        let evaluator = DefaultEvaluator::new();
        assert!(evaluator.check("a.b").is_ok());
        assert!(evaluator.check("a +").is_err());
    }
}
