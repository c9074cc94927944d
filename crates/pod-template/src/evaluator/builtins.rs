/*
 * builtins.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Functions callable from expressions.

use super::ExprError;
use crate::context::PodValue;
use std::collections::HashMap;
use std::rc::Rc;

/// Most items `range()` produces.
const MAX_RANGE_LEN: i64 = 1 << 20;

/// A function callable from expressions.
pub type PodFunction = Rc<dyn Fn(&[PodValue]) -> Result<PodValue, ExprError>>;

/// Named functions available to the interpreter.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, PodFunction>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl FunctionRegistry {
    /// A registry holding the built-in functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register("len", builtin_len);
        registry.register("str", |args| {
            let [value] = expect_args::<1>("str", args)?;
            Ok(PodValue::Str(value.render()))
        });
        registry.register("int", builtin_int);
        registry.register("float", builtin_float);
        registry.register("bool", |args| {
            let [value] = expect_args::<1>("bool", args)?;
            Ok(PodValue::Bool(value.is_truthy()))
        });
        registry.register("range", builtin_range);
        registry.register("items", |args| {
            let [value] = expect_args::<1>("items", args)?;
            match &value {
                PodValue::Map(m) => Ok(PodValue::List(
                    m.iter()
                        .map(|(k, v)| PodValue::List(vec![PodValue::Str(k.clone()), v.clone()]))
                        .collect(),
                )),
                other => Err(type_error("items", "a map", other)),
            }
        });
        registry.register("upper", |args| {
            let [value] = expect_args::<1>("upper", args)?;
            Ok(PodValue::Str(value.render().to_uppercase()))
        });
        registry.register("lower", |args| {
            let [value] = expect_args::<1>("lower", args)?;
            Ok(PodValue::Str(value.render().to_lowercase()))
        });
        registry.register("join", |args| {
            let [items, separator] = expect_args::<2>("join", args)?;
            match &items {
                PodValue::List(items) => Ok(PodValue::Str(
                    items
                        .iter()
                        .map(PodValue::render)
                        .collect::<Vec<_>>()
                        .join(&separator.render()),
                )),
                other => Err(type_error("join", "a list", other)),
            }
        });
        registry.register("abort", |args| {
            let message = args.first().map(PodValue::render).unwrap_or_default();
            Err(ExprError::Abort(message))
        });
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&[PodValue]) -> Result<PodValue, ExprError> + 'static,
    ) {
        self.functions.insert(name.into(), Rc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&PodFunction> {
        self.functions.get(name)
    }
}

fn expect_args<const N: usize>(name: &str, args: &[PodValue]) -> Result<[PodValue; N], ExprError> {
    <[PodValue; N]>::try_from(args.to_vec()).map_err(|_| {
        ExprError::Failed(format!(
            "{name}() takes {N} argument(s) ({} given)",
            args.len()
        ))
    })
}

fn type_error(name: &str, expected: &str, found: &PodValue) -> ExprError {
    ExprError::Failed(format!(
        "{name}() expects {expected}, got {}",
        found.type_name()
    ))
}

fn builtin_len(args: &[PodValue]) -> Result<PodValue, ExprError> {
    let [value] = expect_args::<1>("len", args)?;
    let len = match &value {
        PodValue::Str(s) => s.chars().count(),
        PodValue::List(items) => items.len(),
        PodValue::Map(m) => m.len(),
        other => return Err(type_error("len", "a string, list or map", other)),
    };
    Ok(PodValue::Int(len as i64))
}

fn builtin_int(args: &[PodValue]) -> Result<PodValue, ExprError> {
    let [value] = expect_args::<1>("int", args)?;
    match &value {
        PodValue::Int(i) => Ok(PodValue::Int(*i)),
        PodValue::Float(f) => Ok(PodValue::Int(f.trunc() as i64)),
        PodValue::Bool(b) => Ok(PodValue::Int(i64::from(*b))),
        PodValue::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(PodValue::Int)
            .map_err(|_| ExprError::Failed(format!("invalid literal for int(): '{s}'"))),
        other => Err(type_error("int", "a number or string", other)),
    }
}

fn builtin_float(args: &[PodValue]) -> Result<PodValue, ExprError> {
    let [value] = expect_args::<1>("float", args)?;
    match &value {
        PodValue::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(PodValue::Float)
            .map_err(|_| ExprError::Failed(format!("could not convert string to float: '{s}'"))),
        PodValue::Bool(b) => Ok(PodValue::Float(if *b { 1.0 } else { 0.0 })),
        other => other
            .as_f64()
            .map(PodValue::Float)
            .ok_or_else(|| type_error("float", "a number or string", other)),
    }
}

fn builtin_range(args: &[PodValue]) -> Result<PodValue, ExprError> {
    let bounds: Vec<i64> = args
        .iter()
        .map(|a| match a {
            PodValue::Int(i) => Ok(*i),
            other => Err(type_error("range", "integers", other)),
        })
        .collect::<Result<_, _>>()?;
    let (start, stop) = match bounds.as_slice() {
        [stop] => (0, *stop),
        [start, stop] => (*start, *stop),
        _ => {
            return Err(ExprError::Failed(format!(
                "range() takes 1 or 2 arguments ({} given)",
                args.len()
            )));
        }
    };
    if stop.saturating_sub(start) > MAX_RANGE_LEN {
        return Err(ExprError::Failed(format!(
            "range() is limited to {MAX_RANGE_LEN} items"
        )));
    }
    Ok(PodValue::List((start..stop).map(PodValue::Int).collect()))
}
