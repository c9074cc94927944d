/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for statement parsing, template building and rendering.
//!
//! Every error converts into a [`DiagnosticMessage`] carrying a stable
//! `P-*` code. In non-strict mode that diagnostic is what gets rendered
//! inline into the output document.

use crate::element::{ElementKind, ElementKindError, describe_kinds};
use pod_error_reporting::{DiagnosticMessage, DiagnosticMessageBuilder, SourceInfo};
use thiserror::Error;

/// A statement found in a note could not be turned into an action.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParsingError {
    #[error("Malformed statement `{statement}`: {message}")]
    Syntax { statement: String, message: String },

    #[error("No open `{kind}` encloses the statement (open elements: {})", describe_kinds(.present))]
    TargetNotFound {
        kind: ElementKind,
        present: Vec<ElementKind>,
    },

    #[error("The minus operator cannot be applied to `{kind}`")]
    IllegalMinus { kind: ElementKind },

    #[error("{}", dangling_else_message(.name))]
    DanglingElse { name: Option<String> },

    #[error("`else` may only appear on the first line of a statement: `{line}`")]
    AmbiguousElse { line: String },

    #[error("Statement `{statement}` has neither a command nor a `from` clause")]
    MissingFromClause { statement: String },

    #[error(transparent)]
    UnknownKind(#[from] ElementKindError),

    #[error("Invalid expression `{expression}`: {message}")]
    Expression { expression: String, message: String },
}

fn dangling_else_message(name: &Option<String>) -> String {
    match name {
        Some(name) => format!("No `if` named `{name}` is waiting for an `else`"),
        None => "No preceding `if` is waiting for an `else`".to_string(),
    }
}

/// An expression or action failed while rendering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("Error evaluating `{expression}`: {message}")]
    Expression { expression: String, message: String },

    #[error("`{expression}` is not iterable (it is {type_name})")]
    NotIterable {
        expression: String,
        type_name: &'static str,
    },

    #[error("Cannot unpack {found} into {expected} loop variables")]
    Unpack { expected: usize, found: String },

    #[error("Nested templates exceed the maximum depth of {max_depth}")]
    Recursion { max_depth: usize },
}

/// The document shape does not allow what a statement asked for.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralConstraintError {
    #[error("Cannot remove `{kind}`: it must contain exactly one `{deepest}`, found {found}")]
    NotSingle {
        kind: ElementKind,
        deepest: ElementKind,
        found: usize,
    },

    #[error("Cannot remove `{kind}`: the element is not closed inside its part")]
    Unclosed { kind: ElementKind },

    #[error("The minus operator cannot be applied to `{kind}`")]
    NotRemovable { kind: ElementKind },

    #[error("The statement's target element is missing from its part")]
    NoTarget,
}

/// Errors that can occur while building or rendering a template.
#[derive(Debug, Error)]
pub enum PodError {
    #[error(transparent)]
    Parsing(#[from] ParsingError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Structure(#[from] StructuralConstraintError),

    #[error(transparent)]
    ElementKind(#[from] ElementKindError),

    /// Raised from a template expression through `abort(...)`.
    #[error("Rendering aborted: {message}")]
    Aborted { message: String },

    /// The document events fed to the builder were not balanced.
    #[error("Unbalanced document events: {message}")]
    Build { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for template operations.
pub type PodResult<T> = Result<T, PodError>;

impl ParsingError {
    pub fn code(&self) -> &'static str {
        match self {
            ParsingError::Syntax { .. } => "P-1-1",
            ParsingError::TargetNotFound { .. } => "P-1-2",
            ParsingError::IllegalMinus { .. } => "P-1-3",
            ParsingError::DanglingElse { .. } => "P-1-4",
            ParsingError::AmbiguousElse { .. } => "P-1-5",
            ParsingError::MissingFromClause { .. } => "P-1-6",
            ParsingError::UnknownKind(_) => "P-1-7",
            ParsingError::Expression { .. } => "P-1-8",
        }
    }

    fn hint(&self) -> Option<String> {
        match self {
            ParsingError::TargetNotFound { kind, .. } => Some(format!(
                "Is the note placed inside the `{kind}` it refers to?"
            )),
            ParsingError::IllegalMinus { .. } => {
                Some("Only `section-` and `table-` can remove their wrapper?".to_string())
            }
            ParsingError::DanglingElse { name: Some(_) } => {
                Some("Did you name the `if` with `as <name>`?".to_string())
            }
            ParsingError::MissingFromClause { .. } => {
                Some("Add a command such as `if` or `for`, or a `from` clause?".to_string())
            }
            _ => None,
        }
    }
}

impl EvaluationError {
    pub fn code(&self) -> &'static str {
        match self {
            EvaluationError::Expression { .. } => "P-2-1",
            EvaluationError::NotIterable { .. } => "P-2-2",
            EvaluationError::Unpack { .. } => "P-2-3",
            EvaluationError::Recursion { .. } => "P-2-4",
        }
    }
}

impl PodError {
    /// The catalog code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            PodError::Parsing(e) => e.code(),
            PodError::ElementKind(_) => "P-1-7",
            PodError::Evaluation(e) => e.code(),
            PodError::Aborted { .. } => "P-2-5",
            PodError::Structure(_) => "P-3-1",
            PodError::Build { .. } => "P-4-1",
            PodError::Io(_) => "P-0-1",
        }
    }

    /// Whether this error always stops rendering, even in non-strict mode.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PodError::Aborted { .. } | PodError::Io(_))
    }

    /// Convert to a diagnostic, attaching `location` when known.
    pub fn to_diagnostic(&self, location: Option<&SourceInfo>) -> DiagnosticMessage {
        let code = self.code();
        let title = pod_error_reporting::get_error_info(code)
            .map(|info| info.title.clone())
            .unwrap_or_else(|| "Template Error".to_string());

        let mut builder = DiagnosticMessageBuilder::error(title)
            .with_code(code)
            .problem(self.to_string())
            .with_optional_location(location.cloned());

        if let PodError::Parsing(e) = self {
            if let Some(hint) = e.hint() {
                builder = builder.add_hint(hint);
            }
        }
        if let PodError::Structure(StructuralConstraintError::NotSingle { deepest, .. }) = self {
            builder = builder.add_hint(format!(
                "Wrap the repeated content in a single `{deepest}`?"
            ));
        }
        builder.build()
    }
}
