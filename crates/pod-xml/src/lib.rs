//! Reading POD templates from XML documents.
//!
//! This crate walks an OpenDocument `content.xml` or an XHTML page with
//! quick-xml and compiles it into a [`pod_template::Template`]:
//!
//! - Notes (`office:annotation`, `pod:note`) starting with `do` become
//!   statements. Other notes are copied through untouched.
//! - Fields (`text:text-input`, `pod:expr`) become expressions.
//! - Paragraphs, titles, sections, tables, rows and cells are reported as
//!   structural elements so statements can target them.
//! - Column declarations give each table its column count.
//!
//! Everything else is copied through byte for byte, so a template with no
//! statements and no fields renders to its own source.
//!
//! # Example
//!
//! ```ignore
//! use pod_template::{DialectKind, PodContext};
//! use pod_xml::{XmlTemplateOptions, compile};
//!
//! let options = XmlTemplateOptions::for_dialect(DialectKind::Html);
//! let template = compile("<p>Hi <pod:expr>name</pod:expr></p>", &options)?;
//! let mut ctx = PodContext::new();
//! ctx.insert("name", "Ada");
//! assert_eq!(template.render(&mut ctx)?, "<p>Hi Ada</p>");
//! ```

pub mod error;
mod walker;

pub use error::{Error, Result};

use pod_template::{BuildOptions, DialectKind, Template};
use serde::{Deserialize, Serialize};

/// Options for [`compile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlTemplateOptions {
    pub build: BuildOptions,
    /// Name shown in diagnostics pointing into the document.
    pub document_name: Option<String>,
}

impl XmlTemplateOptions {
    pub fn for_dialect(dialect: DialectKind) -> Self {
        Self {
            build: BuildOptions::default().with_dialect(dialect),
            document_name: None,
        }
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.build.strict = strict;
        self
    }
}

/// Compile the XML document `source` into a template.
///
/// Malformed XML is always an error. Malformed statements and expressions
/// are errors in strict mode; otherwise they are written into the template
/// as error notes and listed in [`Template::build_diagnostics`].
pub fn compile(source: &str, options: &XmlTemplateOptions) -> Result<Template> {
    tracing::debug!(
        dialect = ?options.build.dialect,
        bytes = source.len(),
        "Compiling XML template"
    );
    walker::XmlWalker::new(source, options).walk()
}
