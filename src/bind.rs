//! Raw arguments → bound arguments
//!
//! Validates a call's raw tokens against a route's `args`, folds alternate
//! names into canonical ones, consumes positionals and runs preprocessing.
//! Command-line tokens and programmatic call arguments go through the same
//! parser: programmatic tokens naming a declared argument are first marked
//! as `--name` options.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;

use crate::builder::route_help;
use crate::error::BindError;
use crate::input::{RealStdin, StdinReader};
use crate::preprocess;
use crate::spec::{ArgSpec, Positional, RouteSpec};

/// Validated name/value pairs, in declaration order.
pub type BoundArgs = Vec<(String, Value)>;

/// Where the raw tokens came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    /// Process arguments; named arguments are already `--name` tokens.
    CommandLine,
    /// A library call; bare tokens equal to a declared name are options.
    Programmatic,
}

/// Outcome of a successful bind.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// The route declares no `args`; the raw tokens are returned untouched.
    PassThrough(Vec<Value>),
    Bound(BoundArgs),
}

/// Binds raw arguments against route declarations.
#[derive(Clone)]
pub struct Binder {
    stdin: Arc<dyn StdinReader>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binder").finish_non_exhaustive()
    }
}

impl Binder {
    /// A binder reading `-` arguments from the real stdin.
    pub fn new() -> Self {
        Self {
            stdin: Arc::new(RealStdin),
        }
    }

    /// A binder reading `-` arguments from `reader`.
    pub fn with_stdin(reader: impl StdinReader + 'static) -> Self {
        Self {
            stdin: Arc::new(reader),
        }
    }

    pub(crate) fn with_shared_stdin(stdin: Arc<dyn StdinReader>) -> Self {
        Self { stdin }
    }

    /// Bind `raw` against `route`'s argument specification.
    ///
    /// All-or-nothing: the first failure aborts the whole bind.
    pub fn bind(
        &self,
        route: &RouteSpec,
        raw: Vec<Value>,
        style: CallStyle,
    ) -> Result<Binding, BindError> {
        let Some(specs) = route.args() else {
            return Ok(Binding::PassThrough(raw));
        };

        let tokens = match style {
            CallStyle::CommandLine => raw,
            CallStyle::Programmatic => mark_named(specs, raw),
        };

        let (mut values, leftover) =
            parse_named(specs, tokens).map_err(|name| BindError::MissingValue {
                name,
                help: route_help(route),
            })?;
        let leftover = consume_positional(specs, &mut values, leftover);

        if let Some(missing) = specs
            .iter()
            .find(|s| s.required && !values.contains_key(&s.name))
        {
            return Err(BindError::MissingRequiredArgument {
                name: missing.name.clone(),
                help: route_help(route),
            });
        }

        if !leftover.is_empty() {
            return Err(BindError::UnknownArgument {
                tokens: leftover.iter().map(token_text).collect(),
                help: route_help(route),
            });
        }

        for spec in specs {
            if let Some(default) = &spec.default {
                values
                    .entry(spec.name.clone())
                    .or_insert_with(|| Value::String(default.clone()));
            }
        }

        for spec in specs {
            let Some(transform) = spec.preprocess else {
                continue;
            };
            if let Some(value) = values.remove(&spec.name) {
                let value = preprocess::apply(transform, value, self.stdin.as_ref()).map_err(
                    |source| BindError::PreprocessFailure {
                        name: spec.name.clone(),
                        help: route_help(route),
                        source,
                    },
                )?;
                values.insert(spec.name.clone(), value);
            }
        }

        let bound: BoundArgs = specs
            .iter()
            .filter_map(|s| values.remove(&s.name).map(|v| (s.name.clone(), v)))
            .collect();
        tracing::debug!(route = %route.name, ?bound, "bound arguments");
        Ok(Binding::Bound(bound))
    }
}

fn find_spec<'a>(specs: &'a [ArgSpec], name: &str) -> Option<&'a ArgSpec> {
    specs.iter().find(|s| s.answers_to(name))
}

/// Recognise `--name`, `-name` and `--name=value` for a declared argument.
fn parse_option<'a>(specs: &'a [ArgSpec], token: &str) -> Option<(&'a ArgSpec, Option<String>)> {
    let body = token
        .strip_prefix("--")
        .or_else(|| token.strip_prefix('-'))?;
    if body.is_empty() {
        return None;
    }
    let (name, inline) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value.to_owned())),
        None => (body, None),
    };
    find_spec(specs, name).map(|spec| (spec, inline))
}

/// Prefix programmatic tokens naming a declared argument with `--`, skipping
/// the value token of string-typed arguments.
fn mark_named(specs: &[ArgSpec], raw: Vec<Value>) -> Vec<Value> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.into_iter();

    while let Some(token) = iter.next() {
        let Some(text) = token.as_str() else {
            out.push(token);
            continue;
        };
        if text == "--" {
            out.push(token);
            out.extend(iter);
            break;
        }

        let takes_value = if let Some((spec, inline)) = parse_option(specs, text) {
            !spec.is_flag() && inline.is_none()
        } else if let Some(spec) = find_spec(specs, text) {
            let marked = Value::String(format!("--{text}"));
            out.push(marked);
            if !spec.is_flag() {
                out.extend(iter.next());
            }
            continue;
        } else {
            false
        };

        out.push(token);
        if takes_value {
            out.extend(iter.next());
        }
    }

    out
}

/// Pull recognised options out of the token stream. Everything else is
/// returned, in order, for positional consumption. `Err` names a
/// string-typed argument left without a value.
fn parse_named(
    specs: &[ArgSpec],
    tokens: Vec<Value>,
) -> Result<(HashMap<String, Value>, Vec<Value>), String> {
    let mut values = HashMap::new();
    let mut leftover = Vec::new();
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        if token.as_str() == Some("--") {
            leftover.extend(iter);
            break;
        }
        let Some((spec, inline)) = token.as_str().and_then(|t| parse_option(specs, t)) else {
            leftover.push(token);
            continue;
        };

        let value = if spec.is_flag() {
            if inline.is_some() {
                leftover.push(token);
                continue;
            }
            Value::Bool(true)
        } else {
            match inline {
                Some(v) => Value::String(v),
                None => iter.next().ok_or_else(|| spec.name.clone())?,
            }
        };
        values.insert(spec.name.clone(), value);
    }

    Ok((values, leftover))
}

/// Hand unconsumed tokens to positional specs in declaration order.
fn consume_positional(
    specs: &[ArgSpec],
    values: &mut HashMap<String, Value>,
    leftover: Vec<Value>,
) -> Vec<Value> {
    let mut remaining = VecDeque::from(leftover);

    for spec in specs {
        if values.contains_key(&spec.name) {
            continue;
        }
        match spec.positional {
            Some(Positional::One) => {
                if let Some(token) = remaining.pop_front() {
                    values.insert(spec.name.clone(), token);
                }
            }
            Some(Positional::Many) => {
                if !remaining.is_empty() {
                    values.insert(spec.name.clone(), Value::Array(remaining.drain(..).collect()));
                }
            }
            None => {}
        }
    }

    remaining.into()
}

fn token_text(token: &Value) -> String {
    match token {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert command-line tokens into raw binder input.
pub fn cli_tokens<I, S>(tokens: I) -> Vec<Value>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tokens.into_iter().map(|t| Value::String(t.into())).collect()
}
