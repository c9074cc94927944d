/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Document template engine for POD.
//!
//! Templates are ordinary office or web documents. Authors put expressions
//! in fields and control statements in notes (comments):
//!
//! - Fields: `client.name`, `:raw_html`, `total || 'n/a'`
//! - Conditionals: `do text if client.vip`, then `do text else`
//! - Loops: `do row for item in items`, `do cell for month in months`
//! - Variables: `do section with total = sum(items)`
//! - Replacement: `do text from greeting`, `do cell from+ value`
//! - Removal of the target wrapper: `do section- if x`, `do table- ...`
//! - Deferred rendering: `do text meta-if final`
//!
//! # Architecture
//!
//! The engine does not read any document format itself. A reader (such as
//! the `pod-xml` crate) walks the document and feeds a [`TemplateBuilder`]
//! with events. The builder compiles them into a tree of [`Buffer`]s, some
//! of which carry an [`Action`]. Rendering walks that tree against a
//! [`PodContext`], evaluating expressions through an
//! [`ExpressionEvaluator`].
//!
//! # Example
//!
//! ```ignore
//! use pod_template::{BuildOptions, DialectKind, ElementKind, PodContext, Template};
//!
//! let mut builder = Template::builder(BuildOptions {
//!     dialect: DialectKind::Html,
//!     ..BuildOptions::default()
//! });
//! builder.start_element(ElementKind::Paragraph, "<p>");
//! builder.write("Hello ");
//! builder.add_expression("name", None)?;
//! builder.end_element("</p>")?;
//! let template = builder.finish()?;
//!
//! let mut ctx = PodContext::new();
//! ctx.insert("name", "Ada");
//! assert_eq!(template.render(&mut ctx)?, "<p>Hello Ada</p>");
//! ```

pub mod action;
pub mod buffer;
pub mod builder;
pub mod context;
pub mod dialect;
pub mod element;
pub mod error;
pub mod eval_context;
pub mod evaluator;
pub mod expression;
pub mod locator;
pub mod sink;
pub mod statement;
pub mod tables;
pub mod template;

// Re-export main types at crate root
pub use action::{Action, ActionKind, Binding, ContentSource, EvaluateBufferOptions, SourceKind};
pub use buffer::{Buffer, ElementId, ElementMark, Entry, EvaluateOptions};
pub use builder::{BuildOptions, TemplateBuilder};
pub use context::{PodContext, PodValue};
pub use dialect::{Dialect, DialectKind, HtmlDialect, OdfDialect};
pub use element::{ElementKind, ElementKindError};
pub use error::{EvaluationError, ParsingError, PodError, PodResult, StructuralConstraintError};
pub use eval_context::{DiagnosticCollector, EvalContext};
pub use evaluator::{DefaultEvaluator, ExprError, ExpressionEvaluator};
pub use expression::{Expression, FieldOutput};
pub use locator::ElementLocator;
pub use sink::{IoSink, Sink};
pub use statement::{ParserSession, StatementPlan, parse_statement};
pub use template::{RenderOptions, Template};
