//! Error types for compiling XML documents into templates.

use pod_error_reporting::{DiagnosticMessage, DiagnosticMessageBuilder, SourceInfo};
use pod_template::PodError;
use thiserror::Error;

/// Result type alias for pod-xml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling a document.
#[derive(Debug, Error)]
pub enum Error {
    /// XML syntax error from quick-xml.
    #[error("XML syntax error: {message}{}", .position.map(|p| format!(" at byte {p}")).unwrap_or_default())]
    XmlSyntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },

    /// The document ended inside an element.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof {
        expected: String,
        location: Option<SourceInfo>,
    },

    /// An end tag does not match the element it closes.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEndTag {
        expected: String,
        found: String,
        location: Option<SourceInfo>,
    },

    /// The template builder rejected the document.
    #[error(transparent)]
    Template(#[from] PodError),
}

impl Error {
    /// Convert this error to a DiagnosticMessage with the appropriate P-9-* error code.
    pub fn to_diagnostic(&self) -> DiagnosticMessage {
        match self {
            Error::XmlSyntax { message, position } => {
                let mut builder = DiagnosticMessageBuilder::error("XML Syntax Error")
                    .with_code("P-9-1")
                    .problem(message.clone());

                if let Some(pos) = position {
                    builder = builder.add_detail(format!("Error at byte offset {pos}"));
                }

                builder.build()
            }

            Error::UnexpectedEof { expected, location } => {
                DiagnosticMessageBuilder::error("Unexpected End of XML Input")
                    .with_code("P-9-2")
                    .problem(format!(
                        "The document ended unexpectedly; expected {expected}"
                    ))
                    .with_optional_location(location.clone())
                    .build()
            }

            Error::MismatchedEndTag {
                expected,
                found,
                location,
            } => DiagnosticMessageBuilder::error("Mismatched XML End Tag")
                .with_code("P-9-3")
                .problem(format!(
                    "End tag </{found}> does not match start tag <{expected}>"
                ))
                .add_detail(format!("Expected: </{expected}>"))
                .add_detail(format!("Found: </{found}>"))
                .add_hint("Check that all opening tags have matching closing tags?")
                .with_optional_location(location.clone())
                .build(),

            Error::Template(error) => error.to_diagnostic(None),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlSyntax {
            message: err.to_string(),
            position: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_diagnostic() {
        let err = Error::XmlSyntax {
            message: "bad".into(),
            position: Some(4),
        };
        assert_eq!(err.to_string(), "XML syntax error: bad at byte 4");
        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.code.as_deref(), Some("P-9-1"));
    }

    #[test]
    fn test_template_errors_keep_their_code() {
        let err = Error::from(PodError::Build {
            message: "x".into(),
        });
        assert_eq!(err.to_diagnostic().code.as_deref(), Some("P-4-1"));
    }
}
