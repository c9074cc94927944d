/*
 * interpreter.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tree-walking interpreter for parsed expressions.

use super::ExprError;
use super::ast::{BinaryOp, Expr, UnaryOp};
use super::builtins::FunctionRegistry;
use crate::context::{PodContext, PodValue};
use std::cmp::Ordering;

pub fn eval(
    expr: &Expr,
    context: &PodContext,
    functions: &FunctionRegistry,
) -> Result<PodValue, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, context, functions))
            .collect::<Result<Vec<_>, _>>()
            .map(PodValue::List),
        Expr::Name(name) => context
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::Failed(format!("name '{name}' is not defined"))),
        Expr::Attribute(target, field) => {
            let target = eval(target, context, functions)?;
            match &target {
                PodValue::Map(m) => m.get(field).cloned().ok_or_else(|| {
                    ExprError::Failed(format!("map has no field '{field}'"))
                }),
                other => Err(ExprError::Failed(format!(
                    "{} has no field '{field}'",
                    other.type_name()
                ))),
            }
        }
        Expr::Index(target, index) => {
            let target = eval(target, context, functions)?;
            let index = eval(index, context, functions)?;
            index_value(&target, &index)
        }
        Expr::Call(name, args) => {
            let function = functions
                .get(name)
                .ok_or_else(|| ExprError::Failed(format!("unknown function '{name}'")))?;
            let args = args
                .iter()
                .map(|arg| eval(arg, context, functions))
                .collect::<Result<Vec<_>, _>>()?;
            function(&args)
        }
        Expr::Unary(op, operand) => {
            let value = eval(operand, context, functions)?;
            match (op, value) {
                (UnaryOp::Not, value) => Ok(PodValue::Bool(!value.is_truthy())),
                (UnaryOp::Neg, PodValue::Int(i)) => i
                    .checked_neg()
                    .map(PodValue::Int)
                    .ok_or_else(|| ExprError::Failed("integer overflow".to_string())),
                (UnaryOp::Neg, PodValue::Float(f)) => Ok(PodValue::Float(-f)),
                (UnaryOp::Neg, other) => Err(ExprError::Failed(format!(
                    "bad operand for unary -: {}",
                    other.type_name()
                ))),
            }
        }
        Expr::Binary(left, BinaryOp::And, right) => {
            let left = eval(left, context, functions)?;
            if left.is_truthy() {
                eval(right, context, functions)
            } else {
                Ok(left)
            }
        }
        Expr::Binary(left, BinaryOp::Or, right) => {
            let left = eval(left, context, functions)?;
            if left.is_truthy() {
                Ok(left)
            } else {
                eval(right, context, functions)
            }
        }
        Expr::Binary(left, op, right) => {
            let left = eval(left, context, functions)?;
            let right = eval(right, context, functions)?;
            binary(*op, &left, &right)
        }
        Expr::Conditional {
            then,
            condition,
            otherwise,
        } => {
            if eval(condition, context, functions)?.is_truthy() {
                eval(then, context, functions)
            } else {
                eval(otherwise, context, functions)
            }
        }
    }
}

fn index_value(target: &PodValue, index: &PodValue) -> Result<PodValue, ExprError> {
    match (target, index) {
        (PodValue::List(items), PodValue::Int(i)) => resolve_index(*i, items.len())
            .and_then(|i| items.get(i).cloned())
            .ok_or_else(|| ExprError::Failed(format!("list index {i} out of range"))),
        (PodValue::Str(s), PodValue::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(*i, chars.len())
                .map(|i| PodValue::Str(chars[i].to_string()))
                .ok_or_else(|| ExprError::Failed(format!("string index {i} out of range")))
        }
        (PodValue::Map(m), PodValue::Str(key)) => m
            .get(key)
            .cloned()
            .ok_or_else(|| ExprError::Failed(format!("key '{key}' not found"))),
        (target, index) => Err(ExprError::Failed(format!(
            "cannot index {} with {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

/// Negative indexes count from the end.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

fn binary(op: BinaryOp, left: &PodValue, right: &PodValue) -> Result<PodValue, ExprError> {
    let unsupported = || {
        ExprError::Failed(format!(
            "unsupported operand types for {}: {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
    };
    match op {
        BinaryOp::Eq => Ok(PodValue::Bool(left == right)),
        BinaryOp::NotEq => Ok(PodValue::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            let ordering = compare(left, right).ok_or_else(unsupported)?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Lte => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(PodValue::Bool(result))
        }
        BinaryOp::In | BinaryOp::NotIn => {
            let found = match right {
                PodValue::List(items) => items.contains(left),
                PodValue::Map(m) => left.as_str().is_some_and(|key| m.contains_key(key)),
                PodValue::Str(haystack) => match left {
                    PodValue::Str(needle) => haystack.contains(needle.as_str()),
                    _ => return Err(unsupported()),
                },
                _ => return Err(unsupported()),
            };
            Ok(PodValue::Bool(found == (op == BinaryOp::In)))
        }
        BinaryOp::Is | BinaryOp::IsNot => {
            let same = match (left, right) {
                (PodValue::None, PodValue::None) => true,
                (PodValue::Bool(a), PodValue::Bool(b)) => a == b,
                (PodValue::Template(_), PodValue::Template(_)) => left == right,
                _ => false,
            };
            Ok(PodValue::Bool(same == (op == BinaryOp::Is)))
        }
        BinaryOp::Add => match (left, right) {
            (PodValue::Int(a), PodValue::Int(b)) => checked(a.checked_add(*b)),
            (PodValue::Str(a), PodValue::Str(b)) => Ok(PodValue::Str(format!("{a}{b}"))),
            (PodValue::List(a), PodValue::List(b)) => {
                Ok(PodValue::List(a.iter().chain(b).cloned().collect()))
            }
            _ => float_op(left, right, |a, b| a + b).ok_or_else(unsupported),
        },
        BinaryOp::Sub => match (left, right) {
            (PodValue::Int(a), PodValue::Int(b)) => checked(a.checked_sub(*b)),
            _ => float_op(left, right, |a, b| a - b).ok_or_else(unsupported),
        },
        BinaryOp::Mul => match (left, right) {
            (PodValue::Int(a), PodValue::Int(b)) => checked(a.checked_mul(*b)),
            (PodValue::Str(s), PodValue::Int(n)) | (PodValue::Int(n), PodValue::Str(s)) => {
                repeat(s, *n)
            }
            _ => float_op(left, right, |a, b| a * b).ok_or_else(unsupported),
        },
        BinaryOp::Div => {
            if right.as_f64() == Some(0.0) {
                return Err(ExprError::Failed("division by zero".to_string()));
            }
            float_op(left, right, |a, b| a / b).ok_or_else(unsupported)
        }
        BinaryOp::Mod => match (left, right) {
            (PodValue::Int(_), PodValue::Int(0)) => {
                Err(ExprError::Failed("modulo by zero".to_string()))
            }
            (PodValue::Int(a), PodValue::Int(b)) => checked(floor_rem(*a, *b)),
            _ => float_op(left, right, |a, b| ((a % b) + b) % b).ok_or_else(unsupported),
        },
        BinaryOp::And | BinaryOp::Or => Err(unsupported()),
    }
}

/// Remainder taking the sign of the divisor.
fn floor_rem(a: i64, b: i64) -> Option<i64> {
    if b == -1 {
        return Some(0);
    }
    let r = a.checked_rem(b)?;
    if r != 0 && (r < 0) != (b < 0) {
        r.checked_add(b)
    } else {
        Some(r)
    }
}

/// Longest string `'ab' * n` may produce, in bytes.
const MAX_REPEAT_BYTES: usize = 1 << 24;

fn repeat(text: &str, times: i64) -> Result<PodValue, ExprError> {
    let times = usize::try_from(times).unwrap_or(0);
    match text.len().checked_mul(times) {
        Some(len) if len <= MAX_REPEAT_BYTES => Ok(PodValue::Str(text.repeat(times))),
        _ => Err(ExprError::Failed("repeated string is too large".to_string())),
    }
}

fn checked(result: Option<i64>) -> Result<PodValue, ExprError> {
    result
        .map(PodValue::Int)
        .ok_or_else(|| ExprError::Failed("integer overflow".to_string()))
}

fn float_op(left: &PodValue, right: &PodValue, f: impl Fn(f64, f64) -> f64) -> Option<PodValue> {
    Some(PodValue::Float(f(left.as_f64()?, right.as_f64()?)))
}

fn compare(left: &PodValue, right: &PodValue) -> Option<Ordering> {
    match (left, right) {
        (PodValue::Int(a), PodValue::Int(b)) => Some(a.cmp(b)),
        (PodValue::Str(a), PodValue::Str(b)) => Some(a.cmp(b)),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    }
}
