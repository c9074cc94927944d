/*
 * element.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Structural element kinds.
//!
//! A directive always targets one structural element of the document: a
//! paragraph, a title, a section, a table, a row or a cell. This module holds
//! the static metadata the engine needs about them: the name used in
//! statements, which kinds may nest directly inside which, and which
//! descendant must be located when a statement asks to remove the element's
//! own wrapper (the minus operator).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A structural element kind that statements can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Paragraph,
    Title,
    Section,
    Table,
    Row,
    Cell,
}

/// Requested an element kind that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown element kind `{name}` (expected one of: text, title, section, table, row, cell)")]
pub struct ElementKindError {
    pub name: String,
}

impl ElementKind {
    pub const ALL: [ElementKind; 6] = [
        ElementKind::Paragraph,
        ElementKind::Title,
        ElementKind::Section,
        ElementKind::Table,
        ElementKind::Row,
        ElementKind::Cell,
    ];

    /// The name used for this kind in statements (`do <name> ...`).
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Paragraph => "text",
            ElementKind::Title => "title",
            ElementKind::Section => "section",
            ElementKind::Table => "table",
            ElementKind::Row => "row",
            ElementKind::Cell => "cell",
        }
    }

    /// Look up a kind by its statement name. `paragraph` is accepted as an
    /// alias of `text`.
    pub fn from_name(name: &str) -> Result<Self, ElementKindError> {
        match name {
            "text" | "paragraph" => Ok(ElementKind::Paragraph),
            "title" => Ok(ElementKind::Title),
            "section" => Ok(ElementKind::Section),
            "table" => Ok(ElementKind::Table),
            "row" => Ok(ElementKind::Row),
            "cell" => Ok(ElementKind::Cell),
            other => Err(ElementKindError {
                name: other.to_string(),
            }),
        }
    }

    /// Kinds that may nest directly inside this one.
    pub fn allowed_child_kinds(self) -> &'static [ElementKind] {
        match self {
            ElementKind::Paragraph | ElementKind::Title => &[],
            ElementKind::Section => &[
                ElementKind::Paragraph,
                ElementKind::Title,
                ElementKind::Section,
                ElementKind::Table,
            ],
            ElementKind::Table => &[ElementKind::Row],
            ElementKind::Row => &[ElementKind::Cell],
            ElementKind::Cell => &[
                ElementKind::Paragraph,
                ElementKind::Title,
                ElementKind::Section,
                ElementKind::Table,
            ],
        }
    }

    /// Whether `child` may nest directly inside this kind.
    pub fn allows_child(self, child: ElementKind) -> bool {
        self.allowed_child_kinds().contains(&child)
    }

    /// The innermost descendant whose tags delimit the content kept when
    /// this element is removed with the minus operator.
    ///
    /// Removing a section drops the section's own tags. Removing a table
    /// drops everything up to and including its single cell's open tag, and
    /// everything from that cell's close tag on.
    pub fn deepest_removable(self) -> Option<ElementKind> {
        match self {
            ElementKind::Section => Some(ElementKind::Section),
            ElementKind::Table => Some(ElementKind::Cell),
            _ => None,
        }
    }

    /// Whether the minus operator may be applied to this kind.
    pub fn is_removable(self) -> bool {
        self.deepest_removable().is_some()
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementKind {
    type Err = ElementKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Render a list of kinds as `text, table`, or `none` when empty.
pub(crate) fn describe_kinds(kinds: &[ElementKind]) -> String {
    if kinds.is_empty() {
        return "none".to_string();
    }
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join(", ")
}
