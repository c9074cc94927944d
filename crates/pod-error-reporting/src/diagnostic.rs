//! Diagnostic messages.
//!
//! A [`DiagnosticMessage`] describes one problem found while building or
//! rendering a template. It has three renderings:
//!
//! - [`DiagnosticMessage::summary`]: a single line, written into the output
//!   document as an error note
//! - [`DiagnosticMessage::to_text`]: several lines for a terminal, with an
//!   annotated excerpt of the template when its source is at hand
//! - [`DiagnosticMessage::to_json`]: the serde representation

use crate::location::{SourceFile, SourceInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// The statement or field did not produce its content.
    Error,
    /// Rendering went on as expected, but something looks wrong.
    Warning,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::Error => "Error",
            DiagnosticKind::Warning => "Warning",
        })
    }
}

/// Supporting information: the statement text, the offending value, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub text: String,
    /// Where the detail points, when it is not the message's own location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    /// Catalog code, `P-<subsystem>-<number>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub title: String,
    pub kind: DiagnosticKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Detail>,
    /// Suggestions for the template author, phrased as questions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceInfo>,
}

impl DiagnosticMessage {
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            code: None,
            title: title.into(),
            kind,
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            location: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }

    /// Documentation page for this message's code.
    ///
    /// ```
    /// use pod_error_reporting::DiagnosticMessageBuilder;
    ///
    /// let msg = DiagnosticMessageBuilder::error("Internal Error")
    ///     .with_code("P-0-1")
    ///     .build();
    /// assert!(msg.docs_url().is_some());
    /// ```
    pub fn docs_url(&self) -> Option<&str> {
        self.code.as_deref().and_then(crate::catalog::get_docs_url)
    }

    /// One line, `[P-2-1] Title: problem (name:row:column)`.
    pub fn summary(&self) -> String {
        let mut line = match &self.code {
            Some(code) => format!("[{code}] {}", self.title),
            None => self.title.clone(),
        };
        if let Some(problem) = &self.problem {
            let _ = write!(line, ": {problem}");
        }
        if let Some(location) = &self.location {
            let _ = write!(line, " ({})", location.describe());
        }
        line
    }

    /// Render for a terminal.
    ///
    /// ```
    /// use pod_error_reporting::DiagnosticMessageBuilder;
    ///
    /// let msg = DiagnosticMessageBuilder::error("Dangling Else")
    ///     .problem("No `if` precedes this `else`")
    ///     .add_hint("Add `do text if ...` to the previous paragraph?")
    ///     .build();
    /// let text = msg.to_text(None);
    /// assert!(text.starts_with("Error: Dangling Else"));
    /// ```
    pub fn to_text(&self, source: Option<&SourceFile>) -> String {
        let excerpt = self
            .location
            .as_ref()
            .zip(source)
            .and_then(|(location, source)| self.excerpt(location, source));

        let mut out = String::new();
        match &excerpt {
            Some(excerpt) => out.push_str(excerpt),
            None => {
                let _ = match &self.code {
                    Some(code) => writeln!(out, "{} [{code}]: {}", self.kind, self.title),
                    None => writeln!(out, "{}: {}", self.kind, self.title),
                };
                if let Some(problem) = &self.problem {
                    let _ = writeln!(out, "{problem}");
                }
            }
        }
        for detail in &self.details {
            // Located details are labels of the excerpt.
            if excerpt.is_none() || detail.location.is_none() {
                let _ = writeln!(out, "- {}", detail.text);
            }
        }
        for hint in &self.hints {
            let _ = writeln!(out, "? {hint}");
        }
        out
    }

    /// ```
    /// use pod_error_reporting::DiagnosticMessageBuilder;
    ///
    /// let json = DiagnosticMessageBuilder::warning("Unused Else").build().to_json();
    /// assert_eq!(json["kind"], "warning");
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn excerpt(&self, location: &SourceInfo, source: &SourceFile) -> Option<String> {
        use ariadne::{Color, Config, Label, Report, ReportKind, Source};

        let len = source.content.len();
        let span = |info: &SourceInfo| {
            (info.start_offset() <= len).then(|| info.start_offset()..info.end_offset().min(len))
        };
        let main = span(location)?;
        let (kind, color) = match self.kind {
            DiagnosticKind::Error => (ReportKind::Error, Color::Red),
            DiagnosticKind::Warning => (ReportKind::Warning, Color::Yellow),
        };
        let name = source.name.clone();
        let heading = match &self.code {
            Some(code) => format!("[{code}] {}", self.title),
            None => self.title.clone(),
        };

        let mut report = Report::build(kind, name.clone(), main.start)
            .with_config(Config::default().with_color(false))
            .with_message(heading)
            .with_label(
                Label::new((name.clone(), main))
                    .with_message(self.problem.as_deref().unwrap_or(&self.title))
                    .with_color(color),
            );
        for detail in &self.details {
            if let Some(range) = detail.location.as_ref().and_then(span) {
                report = report.with_label(
                    Label::new((name.clone(), range))
                        .with_message(&detail.text)
                        .with_color(Color::Blue),
                );
            }
        }

        let mut bytes = Vec::new();
        report
            .finish()
            .write((name, Source::from(source.content.as_str())), &mut bytes)
            .ok()?;
        String::from_utf8(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiagnosticMessageBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_to_text_plain_with_code() {
        let msg = DiagnosticMessageBuilder::error("Target Not Found")
            .with_code("P-1-2")
            .problem("No open `cell` encloses this statement")
            .add_detail("Open elements here: paragraph, table")
            .add_hint("Move the note inside a table cell?")
            .build();

        insta::assert_snapshot!(msg.to_text(None), @r"
        Error [P-1-2]: Target Not Found
        No open `cell` encloses this statement
        - Open elements here: paragraph, table
        ? Move the note inside a table cell?
        ");
    }

    #[test]
    fn test_summary_includes_location() {
        let location = SourceInfo::from_offsets("<p>\n<note/>", 4, 11).with_name("a.xml");
        let msg = DiagnosticMessageBuilder::error("Dangling Else")
            .with_code("P-1-4")
            .problem("no if to pair with")
            .with_location(location)
            .build();

        assert_eq!(
            msg.summary(),
            "[P-1-4] Dangling Else: no if to pair with (a.xml:2:1)"
        );
    }

    #[test]
    fn test_summary_without_code_or_location() {
        let msg = DiagnosticMessageBuilder::warning("Odd").build();
        assert_eq!(msg.summary(), "Odd");
        assert!(!msg.is_error());
    }

    #[test]
    fn test_to_text_with_source_uses_excerpt() {
        let source = SourceFile::new("t.xml", "<p>do text if x</p>");
        let msg = DiagnosticMessageBuilder::error("Invalid Expression")
            .with_code("P-1-8")
            .with_location(SourceInfo::from_offsets(&source.content, 3, 16))
            .build();

        let text = msg.to_text(Some(&source));
        assert!(text.contains("[P-1-8] Invalid Expression"));
        assert!(text.contains("t.xml"));
    }

    #[test]
    fn test_json_skips_empty_parts() {
        let msg = DiagnosticMessageBuilder::warning("Recovered")
            .add_detail("first")
            .add_hint("try again?")
            .build();
        let json = msg.to_json();
        assert_eq!(json["kind"], "warning");
        assert_eq!(json["details"][0]["text"], "first");
        assert_eq!(json["hints"][0], "try again?");
        assert!(json.get("code").is_none());
        assert!(json.get("location").is_none());
    }
}
