//! Stable error codes.
//!
//! Every diagnostic the engine produces carries a code `P-<group>-<n>` whose
//! title and documentation page live in `error_catalog.json`. The group
//! tells which [`Subsystem`] raised it.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Internal,
    /// Reading statements out of notes.
    Statement,
    /// Running actions and expressions.
    Evaluation,
    /// Document structure around a statement's target.
    Structure,
    /// Events fed to the template builder.
    Build,
    /// The XML reader.
    Xml,
}

impl Subsystem {
    /// The `<group>` part of this subsystem's codes.
    pub fn group(self) -> u8 {
        match self {
            Subsystem::Internal => 0,
            Subsystem::Statement => 1,
            Subsystem::Evaluation => 2,
            Subsystem::Structure => 3,
            Subsystem::Build => 4,
            Subsystem::Xml => 9,
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subsystem::Internal => "internal",
            Subsystem::Statement => "statement",
            Subsystem::Evaluation => "evaluation",
            Subsystem::Structure => "structure",
            Subsystem::Build => "build",
            Subsystem::Xml => "xml",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    pub subsystem: Subsystem,
    pub title: String,
    /// Generic wording, used when the error itself says nothing more.
    pub message_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
    pub since_version: String,
}

/// The catalog, parsed on first use.
///
/// # Panics
///
/// Panics on first use if the embedded catalog is not valid JSON.
pub static ERROR_CATALOG: Lazy<HashMap<String, ErrorCodeInfo>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../error_catalog.json"))
        .expect("error_catalog.json is valid")
});

/// ```
/// use pod_error_reporting::catalog::get_error_info;
///
/// assert_eq!(get_error_info("P-1-4").unwrap().title, "Dangling Else");
/// ```
pub fn get_error_info(code: &str) -> Option<&'static ErrorCodeInfo> {
    ERROR_CATALOG.get(code)
}

pub fn get_docs_url(code: &str) -> Option<&'static str> {
    get_error_info(code)?.docs_url.as_deref()
}

/// ```
/// use pod_error_reporting::catalog::{Subsystem, get_subsystem};
///
/// assert_eq!(get_subsystem("P-2-1"), Some(Subsystem::Evaluation));
/// ```
pub fn get_subsystem(code: &str) -> Option<Subsystem> {
    get_error_info(code).map(|info| info.subsystem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_exists() {
        let info = get_error_info("P-0-1").unwrap();
        assert_eq!(info.subsystem, Subsystem::Internal);
        assert_eq!(info.title, "Internal Error");
        assert!(info.docs_url.is_some());
    }

    #[test]
    fn test_codes_are_grouped_by_subsystem() {
        assert!(!ERROR_CATALOG.is_empty());
        for (code, info) in ERROR_CATALOG.iter() {
            let prefix = format!("P-{}-", info.subsystem.group());
            assert!(code.starts_with(&prefix), "{code} is not in {}", info.subsystem);
        }
    }

    #[test]
    fn test_unknown_code() {
        assert!(get_error_info("P-99-99").is_none());
        assert!(get_docs_url("P-99-99").is_none());
    }
}
