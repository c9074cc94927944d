//! Error reporting and diagnostic messages for the POD template engine.
//!
//! A template is built from a document and then rendered against a context.
//! Both phases can fail locally (a bad statement in one note, an expression
//! that raises for one row) without the whole document being lost, so
//! problems are described as [`DiagnosticMessage`] values that can be
//! collected, rendered inline into the output document, printed as text or
//! serialized as JSON.
//!
//! - [`DiagnosticMessage`]: code, title, problem, details, hints and location
//! - [`DiagnosticMessageBuilder`]: the recommended way to create messages
//! - [`catalog`]: stable error codes (`P-<subsystem>-<number>`) and their documentation
//! - [`SourceInfo`]: where in the template document a problem was found
//!
//! # Example
//!
//! ```
//! use pod_error_reporting::{DiagnosticMessageBuilder, SourceInfo};
//!
//! let template = "<p>do text if</p>";
//! let error = DiagnosticMessageBuilder::error("Malformed Statement")
//!     .with_code("P-1-1")
//!     .problem("`if` requires an expression")
//!     .with_location(SourceInfo::from_offsets(template, 3, 13))
//!     .build();
//!
//! assert!(error.summary().starts_with("[P-1-1] Malformed Statement"));
//! ```

pub mod builder;
pub mod catalog;
pub mod diagnostic;
pub mod location;

pub use builder::DiagnosticMessageBuilder;
pub use catalog::{ERROR_CATALOG, ErrorCodeInfo, Subsystem, get_docs_url, get_error_info, get_subsystem};
pub use diagnostic::{Detail, DiagnosticKind, DiagnosticMessage};
pub use location::{Location, Range, SourceFile, SourceInfo, offset_to_location};
