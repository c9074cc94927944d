/*
 * statement.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Statement parsing.
//!
//! A statement is the text of a note. Its first line names the element it
//! targets and, optionally, a command or a `from` clause:
//!
//! ```text
//! do <target>[-] [<command> | from[+] <expression>]
//! ```
//!
//! Further lines each hold another command, or at most one `from` clause.
//! Commands are:
//!
//! - `if <expr> [as <name>]`
//! - `else [<name>]` (first line only)
//! - `for <var>[, <var>...] in <expr>`
//! - `with [@]<name> = <expr>[; ...]`
//! - `meta-if <expr>`
//!
//! Parsing happens in two steps. [`parse_statement`] turns text into a
//! [`StatementPlan`] without looking at anything else. A [`ParserSession`],
//! which lives for the whole document, then resolves the plan into an
//! [`Action`], pairing each `else` with its `if`.

use crate::action::{Action, ActionKind, Binding, ContentSource};
use crate::element::ElementKind;
use crate::error::ParsingError;
use crate::evaluator::ExpressionEvaluator;
use crate::expression::Expression;
use once_cell::sync::Lazy;
use pod_error_reporting::SourceInfo;
use regex::Regex;
use std::collections::HashMap;

static MAIN_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^do\s+([A-Za-z_]+)(-)?(?:\s+(.*))?$").expect("valid statement pattern")
});
static NAMED_IF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*\S)\s+as\s+([A-Za-z_][A-Za-z0-9_]*)$").expect("valid named if pattern")
});
static FOR_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(?:\s*,\s*[A-Za-z_][A-Za-z0-9_]*)*)\s+in\s+(.+)$")
        .expect("valid for pattern")
});
static BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(@)?([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$").expect("valid binding pattern")
});
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// A parsed command, before expressions are compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    If {
        condition: String,
        name: Option<String>,
    },
    Else {
        name: Option<String>,
    },
    For {
        variables: Vec<String>,
        iterable: String,
    },
    With {
        bindings: Vec<(String, bool, String)>,
    },
    MetaIf {
        condition: String,
    },
}

/// A `from` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromClause {
    pub expression: String,
    pub keep_wrapper: bool,
}

/// A statement's structure, independent of the rest of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPlan {
    pub text: String,
    pub target: ElementKind,
    pub remove_target: bool,
    /// In chain order: the first line's command first.
    pub commands: Vec<Command>,
    pub from: Option<FromClause>,
}

enum Clause {
    Command(Command),
    From(FromClause),
}

/// Parse statement text.
///
/// With a `checker`, every expression in the statement must pass its
/// [`ExpressionEvaluator::check`].
pub fn parse_statement(
    text: &str,
    checker: Option<&dyn ExpressionEvaluator>,
) -> Result<StatementPlan, ParsingError> {
    let syntax = |message: &str| ParsingError::Syntax {
        statement: text.trim().to_string(),
        message: message.to_string(),
    };
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let first = lines.next().ok_or_else(|| syntax("the statement is empty"))?;
    let captures = MAIN_LINE
        .captures(first)
        .ok_or_else(|| syntax("expected `do <element>`"))?;

    let target = ElementKind::from_name(&captures[1])?;
    let remove_target = captures.get(2).is_some();
    if remove_target && !target.is_removable() {
        return Err(ParsingError::IllegalMinus { kind: target });
    }

    let mut commands = Vec::new();
    let mut from = None;
    let rest = captures.get(3).map(|m| m.as_str().trim()).unwrap_or("");
    let clauses = std::iter::once((true, rest))
        .filter(|(_, line)| !line.is_empty())
        .chain(lines.map(|line| (false, line)));
    for (on_first_line, line) in clauses {
        if from.is_some() {
            return Err(syntax("nothing may follow a `from` clause"));
        }
        match parse_clause(line, &syntax)? {
            Clause::Command(Command::Else { .. }) if !on_first_line => {
                return Err(ParsingError::AmbiguousElse {
                    line: line.to_string(),
                });
            }
            Clause::Command(command) => commands.push(command),
            Clause::From(clause) => from = Some(clause),
        }
    }

    if commands.is_empty() && from.is_none() {
        return Err(ParsingError::MissingFromClause {
            statement: text.trim().to_string(),
        });
    }

    let plan = StatementPlan {
        text: text.trim().to_string(),
        target,
        remove_target,
        commands,
        from,
    };
    if let Some(checker) = checker {
        plan.check_expressions(checker)?;
    }
    Ok(plan)
}

fn parse_clause(
    line: &str,
    syntax: &dyn Fn(&str) -> ParsingError,
) -> Result<Clause, ParsingError> {
    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    };
    let require = |what: &str| {
        if rest.is_empty() {
            Err(syntax(&format!("`{keyword}` needs {what}")))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match keyword {
        "if" => {
            let body = require("a condition")?;
            match NAMED_IF.captures(&body) {
                Some(c) => Command::If {
                    condition: c[1].to_string(),
                    name: Some(c[2].to_string()),
                },
                None => Command::If {
                    condition: body,
                    name: None,
                },
            }
        }
        "else" => match rest {
            "" => Command::Else { name: None },
            name if IDENTIFIER.is_match(name) => Command::Else {
                name: Some(name.to_string()),
            },
            _ => return Err(syntax("`else` takes at most the name of an `if`")),
        },
        "for" => {
            let body = require("`<variable> in <expression>`")?;
            let c = FOR_HEAD
                .captures(&body)
                .ok_or_else(|| syntax("expected `for <variable> in <expression>`"))?;
            Command::For {
                variables: c[1].split(',').map(|v| v.trim().to_string()).collect(),
                iterable: c[2].trim().to_string(),
            }
        }
        "with" => {
            let body = require("at least one `<name> = <expression>`")?;
            let bindings = split_outside_quotes(&body, ';')
                .into_iter()
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| parse_binding(part, syntax))
                .collect::<Result<Vec<_>, _>>()?;
            Command::With { bindings }
        }
        "meta-if" => Command::MetaIf {
            condition: require("a condition")?,
        },
        "from" | "from+" => {
            return Ok(Clause::From(FromClause {
                expression: require("an expression")?,
                keep_wrapper: keyword == "from+",
            }));
        }
        other => return Err(syntax(&format!("unknown command `{other}`"))),
    };
    Ok(Clause::Command(command))
}

fn parse_binding(
    part: &str,
    syntax: &dyn Fn(&str) -> ParsingError,
) -> Result<(String, bool, String), ParsingError> {
    let c = BINDING
        .captures(part)
        .ok_or_else(|| syntax(&format!("expected `<name> = <expression>`, found `{part}`")))?;
    let value = c[3].trim();
    // `a == b` is a comparison, not a binding.
    if value.starts_with('=') {
        return Err(syntax(&format!("expected `<name> = <expression>`, found `{part}`")));
    }
    Ok((c[2].to_string(), c.get(1).is_some(), value.to_string()))
}

/// Split on `separator` where it is not inside a string literal.
fn split_outside_quotes(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == separator => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

impl StatementPlan {
    /// Every expression source in the statement.
    pub fn expressions(&self) -> Vec<&str> {
        let mut sources = Vec::new();
        for command in &self.commands {
            match command {
                Command::If { condition, .. } | Command::MetaIf { condition } => {
                    sources.push(condition.as_str());
                }
                Command::For { iterable, .. } => sources.push(iterable.as_str()),
                Command::With { bindings } => {
                    sources.extend(bindings.iter().map(|(_, _, value)| value.as_str()));
                }
                Command::Else { .. } => {}
            }
        }
        if let Some(from) = &self.from {
            sources.push(from.expression.as_str());
        }
        sources
    }

    fn check_expressions(&self, checker: &dyn ExpressionEvaluator) -> Result<(), ParsingError> {
        for source in self.expressions() {
            let expression = Expression::parse(source);
            for part in expression.parts() {
                checker
                    .check(part)
                    .map_err(|message| ParsingError::Expression {
                        expression: part.to_string(),
                        message,
                    })?;
            }
        }
        Ok(())
    }
}

/// Document-wide parsing state: the `if` actions still waiting for an
/// `else`.
#[derive(Debug, Default)]
pub struct ParserSession {
    open_ifs: Vec<Expression>,
    named_ifs: HashMap<String, Expression>,
}

impl ParserSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a plan into an action chain.
    ///
    /// An unnamed `else` pairs with the most recent unnamed `if` not yet
    /// paired; a named one with the `if` of that name.
    pub fn resolve(
        &mut self,
        plan: StatementPlan,
        location: Option<SourceInfo>,
    ) -> Result<Action, ParsingError> {
        let StatementPlan {
            text,
            target,
            remove_target,
            commands,
            from,
        } = plan;

        let mut kinds: Vec<(ActionKind, Option<String>)> = Vec::new();
        let mut new_ifs: Vec<(Option<String>, Expression)> = Vec::new();
        for command in commands {
            let kind = match command {
                Command::If { condition, name } => {
                    let condition = Expression::parse(&condition);
                    new_ifs.push((name.clone(), condition.clone()));
                    kinds.push((ActionKind::If { condition }, name));
                    continue;
                }
                Command::Else { name } => {
                    let paired = match &name {
                        Some(name) => self.named_ifs.remove(name),
                        None => self.open_ifs.pop(),
                    };
                    let condition = paired.ok_or_else(|| ParsingError::DanglingElse {
                        name: name.clone(),
                    })?;
                    ActionKind::Else {
                        condition,
                        if_name: name,
                    }
                }
                Command::For {
                    variables,
                    iterable,
                } => ActionKind::For {
                    variables,
                    iterable: Expression::parse(&iterable),
                },
                Command::With { bindings } => ActionKind::Variables {
                    bindings: bindings
                        .into_iter()
                        .map(|(name, global, value)| Binding {
                            name,
                            global,
                            value: Expression::parse(&value),
                        })
                        .collect(),
                },
                Command::MetaIf { condition } => ActionKind::MetaIf {
                    condition: Expression::parse(&condition),
                },
            };
            kinds.push((kind, None));
        }
        if kinds.is_empty() {
            kinds.push((ActionKind::Null, None));
        }

        for (name, condition) in new_ifs {
            match name {
                Some(name) => {
                    self.named_ifs.insert(name, condition);
                }
                None => self.open_ifs.push(condition),
            }
        }

        let source = match from {
            Some(clause) => ContentSource::From {
                expression: Expression::parse(&clause.expression).with_location(location.clone()),
                keep_wrapper: clause.keep_wrapper,
            },
            None => ContentSource::Buffer,
        };

        let last = kinds.len() - 1;
        let mut source = Some(source);
        let mut next: Option<Box<Action>> = None;
        for (index, (kind, name)) in kinds.into_iter().enumerate().rev() {
            let is_last = index == last;
            let action = Action {
                kind,
                name,
                target,
                remove_target: is_last && remove_target,
                source: if is_last {
                    source.take().unwrap_or(ContentSource::Buffer)
                } else {
                    ContentSource::Buffer
                },
                sub_action: next.take(),
                statement: text.clone(),
                location: location.clone(),
            };
            next = Some(Box::new(action));
        }

        match next {
            Some(action) => Ok(*action),
            None => Err(ParsingError::MissingFromClause { statement: text }),
        }
    }
}
