//! Builder API for diagnostic messages.
//!
//! ```
//! use pod_error_reporting::DiagnosticMessageBuilder;
//!
//! let error = DiagnosticMessageBuilder::error("Not Iterable")
//!     .with_code("P-2-2")
//!     .problem("`data.rows` evaluated to an integer")
//!     .add_detail("Statement: `do row for r in data.rows`")
//!     .add_hint("Pass a list to the for statement?")
//!     .build();
//!
//! assert_eq!(error.code.as_deref(), Some("P-2-2"));
//! assert_eq!(error.details.len(), 1);
//! ```

use crate::diagnostic::{Detail, DiagnosticKind, DiagnosticMessage};
use crate::location::SourceInfo;

/// Incrementally builds a [`DiagnosticMessage`].
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    message: DiagnosticMessage,
}

impl DiagnosticMessageBuilder {
    pub fn error(title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage::new(DiagnosticKind::Error, title),
        }
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage::new(DiagnosticKind::Warning, title),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.message.code = Some(code.into());
        self
    }

    /// What went wrong.
    pub fn problem(mut self, problem: impl Into<String>) -> Self {
        self.message.problem = Some(problem.into());
        self
    }

    pub fn add_detail(mut self, text: impl Into<String>) -> Self {
        self.message.details.push(Detail {
            text: text.into(),
            location: None,
        });
        self
    }

    /// A detail pointing at its own place in the document.
    pub fn add_detail_at(mut self, text: impl Into<String>, location: SourceInfo) -> Self {
        self.message.details.push(Detail {
            text: text.into(),
            location: Some(location),
        });
        self
    }

    /// Add a hint, phrased as a question.
    pub fn add_hint(mut self, hint: impl Into<String>) -> Self {
        self.message.hints.push(hint.into());
        self
    }

    pub fn with_location(mut self, location: SourceInfo) -> Self {
        self.message.location = Some(location);
        self
    }

    pub fn with_optional_location(mut self, location: Option<SourceInfo>) -> Self {
        self.message.location = location;
        self
    }

    pub fn build(self) -> DiagnosticMessage {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_kinds() {
        assert!(DiagnosticMessageBuilder::error("e").build().is_error());
        assert_eq!(
            DiagnosticMessageBuilder::warning("w").build().kind,
            DiagnosticKind::Warning
        );
    }

    #[test]
    fn test_details_are_kept_in_order() {
        let location = SourceInfo::from_offsets("abc", 1, 2);
        let msg = DiagnosticMessageBuilder::error("e")
            .add_detail("a")
            .add_detail_at("b", location.clone())
            .build();
        let texts: Vec<_> = msg.details.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(msg.details[1].location, Some(location));
    }

    #[test]
    fn test_optional_location_none_clears() {
        let msg = DiagnosticMessageBuilder::error("e")
            .with_location(SourceInfo::from_offsets("x", 0, 1))
            .with_optional_location(None)
            .build();
        assert!(msg.location.is_none());
    }
}
