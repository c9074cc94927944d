/*
 * dialect.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Markup dialects.
//!
//! The engine copies document markup through untouched, but a few things
//! have to be written fresh: escaped field values, rows and cells added
//! while balancing tables, inline error notes, and the notes and fields
//! written back when part of a template is reproduced. A [`Dialect`] knows
//! how those look in a given markup language.

use crate::context::PodValue;
use crate::element::ElementKind;
use pod_error_reporting::DiagnosticMessage;
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait Dialect: fmt::Debug {
    /// Tag name used for `kind`.
    fn tag_name(&self, kind: ElementKind) -> &'static str;

    /// The element kind a tag name stands for, if any.
    fn kind_for_tag(&self, tag: &str) -> Option<ElementKind> {
        ElementKind::ALL
            .into_iter()
            .find(|kind| self.tag_name(*kind) == tag)
    }

    /// Escape text for inclusion in element content.
    fn escape(&self, text: &str) -> String {
        escape_xml(text)
    }

    fn open_tag(&self, kind: ElementKind) -> String {
        format!("<{}>", self.tag_name(kind))
    }

    fn close_tag(&self, kind: ElementKind) -> String {
        format!("</{}>", self.tag_name(kind))
    }

    fn empty_element(&self, kind: ElementKind) -> String {
        format!("<{}/>", self.tag_name(kind))
    }

    /// Markup shown in place of content that failed to render.
    fn error_note(&self, diagnostic: &DiagnosticMessage) -> String;

    /// A note holding statement text, as the author would have written it.
    fn statement_note(&self, statement: &str) -> String;

    /// A field holding expression source text.
    fn expression_field(&self, source: &str) -> String;

    /// Attributes declaring the type of a cell's value.
    fn value_type_attributes(&self, value: &PodValue) -> String;

    /// Element holding statements.
    fn note_tag(&self) -> &'static str;

    /// Element inside a note whose text forms one statement line, if notes
    /// are split into paragraphs.
    fn note_line_tag(&self) -> Option<&'static str>;

    /// Element holding expression source text.
    fn field_tag(&self) -> &'static str;

    /// Element declaring table columns, and the attribute repeating it.
    fn column_tag(&self) -> (&'static str, &'static str);
}

/// Which built-in dialect a template is written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// OpenDocument text (`content.xml` of an `.odt` file).
    #[default]
    Odf,
    /// HTML or XHTML, with `pod:note` and `pod:expr` elements.
    Html,
}

impl DialectKind {
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            DialectKind::Odf => &OdfDialect,
            DialectKind::Html => &HtmlDialect,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OdfDialect;

impl Dialect for OdfDialect {
    fn tag_name(&self, kind: ElementKind) -> &'static str {
        match kind {
            ElementKind::Paragraph => "text:p",
            ElementKind::Title => "text:h",
            ElementKind::Section => "text:section",
            ElementKind::Table => "table:table",
            ElementKind::Row => "table:table-row",
            ElementKind::Cell => "table:table-cell",
        }
    }

    fn error_note(&self, diagnostic: &DiagnosticMessage) -> String {
        format!(
            "<office:annotation><dc:creator>POD</dc:creator><text:p>{}</text:p></office:annotation>",
            self.escape(&diagnostic.summary())
        )
    }

    fn statement_note(&self, statement: &str) -> String {
        let lines: String = statement
            .lines()
            .map(|line| format!("<text:p>{}</text:p>", self.escape(line)))
            .collect();
        format!("<office:annotation>{lines}</office:annotation>")
    }

    fn expression_field(&self, source: &str) -> String {
        format!(
            "<text:text-input text:description=\"\">{}</text:text-input>",
            self.escape(source)
        )
    }

    fn value_type_attributes(&self, value: &PodValue) -> String {
        match value {
            PodValue::Int(_) | PodValue::Float(_) => format!(
                " office:value-type=\"float\" office:value=\"{}\"",
                value.render()
            ),
            PodValue::Bool(b) => format!(
                " office:value-type=\"boolean\" office:boolean-value=\"{b}\""
            ),
            _ => " office:value-type=\"string\"".to_string(),
        }
    }

    fn note_tag(&self) -> &'static str {
        "office:annotation"
    }

    fn note_line_tag(&self) -> Option<&'static str> {
        Some("text:p")
    }

    fn field_tag(&self) -> &'static str {
        "text:text-input"
    }

    fn column_tag(&self) -> (&'static str, &'static str) {
        ("table:table-column", "table:number-columns-repeated")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDialect;

impl Dialect for HtmlDialect {
    fn tag_name(&self, kind: ElementKind) -> &'static str {
        match kind {
            ElementKind::Paragraph => "p",
            ElementKind::Title => "h1",
            ElementKind::Section => "section",
            ElementKind::Table => "table",
            ElementKind::Row => "tr",
            ElementKind::Cell => "td",
        }
    }

    fn kind_for_tag(&self, tag: &str) -> Option<ElementKind> {
        match tag {
            "p" => Some(ElementKind::Paragraph),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some(ElementKind::Title),
            "section" | "div" => Some(ElementKind::Section),
            "table" => Some(ElementKind::Table),
            "tr" => Some(ElementKind::Row),
            "td" | "th" => Some(ElementKind::Cell),
            _ => None,
        }
    }

    fn error_note(&self, diagnostic: &DiagnosticMessage) -> String {
        format!(
            "<span class=\"pod-error\">{}</span>",
            self.escape(&diagnostic.summary())
        )
    }

    fn statement_note(&self, statement: &str) -> String {
        format!("<pod:note>{}</pod:note>", self.escape(statement))
    }

    fn expression_field(&self, source: &str) -> String {
        format!("<pod:expr>{}</pod:expr>", self.escape(source))
    }

    fn value_type_attributes(&self, value: &PodValue) -> String {
        if value.is_numeric() {
            " data-pod-type=\"number\"".to_string()
        } else {
            String::new()
        }
    }

    fn note_tag(&self) -> &'static str {
        "pod:note"
    }

    fn note_line_tag(&self) -> Option<&'static str> {
        None
    }

    fn field_tag(&self) -> &'static str {
        "pod:expr"
    }

    fn column_tag(&self) -> (&'static str, &'static str) {
        ("col", "span")
    }
}

/// Escape the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_error_reporting::DiagnosticMessageBuilder;

    #[test]
    fn test_escape() {
        assert_eq!(escape_xml("a < b & 'c'"), "a &lt; b &amp; &apos;c&apos;");
    }

    #[test]
    fn test_kind_for_tag_round_trips() {
        for dialect in [DialectKind::Odf.dialect(), DialectKind::Html.dialect()] {
            for kind in ElementKind::ALL {
                assert_eq!(dialect.kind_for_tag(dialect.tag_name(kind)), Some(kind));
            }
        }
        assert_eq!(
            DialectKind::Html.dialect().kind_for_tag("th"),
            Some(ElementKind::Cell)
        );
        assert_eq!(DialectKind::Odf.dialect().kind_for_tag("text:span"), None);
    }

    #[test]
    fn test_odf_value_types() {
        let odf = OdfDialect;
        assert_eq!(
            odf.value_type_attributes(&PodValue::Float(2.5)),
            " office:value-type=\"float\" office:value=\"2.5\""
        );
        assert_eq!(
            odf.value_type_attributes(&PodValue::Bool(true)),
            " office:value-type=\"boolean\" office:boolean-value=\"true\""
        );
        assert_eq!(
            odf.value_type_attributes(&"x".into()),
            " office:value-type=\"string\""
        );
    }

    #[test]
    fn test_odf_statement_note_splits_lines() {
        assert_eq!(
            OdfDialect.statement_note("do row for x in xs\nfrom x"),
            "<office:annotation><text:p>do row for x in xs</text:p><text:p>from x</text:p></office:annotation>"
        );
    }

    #[test]
    fn test_error_notes_are_escaped() {
        let diagnostic = DiagnosticMessageBuilder::error("Expression Failed")
            .with_code("P-2-1")
            .problem("a < b")
            .build();
        assert_eq!(
            HtmlDialect.error_note(&diagnostic),
            "<span class=\"pod-error\">[P-2-1] Expression Failed: a &lt; b</span>"
        );
    }
}
