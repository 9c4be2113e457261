// This file is part of helena-rs, a Tcl-inspired scripting language.
// Copyright (C) 2026 the helena-rs developers
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Runtime values
//!
//! Every piece of data a script manipulates is a [`Value`]: a tagged sum of
//! the primitive variants (nil, booleans, integers, numbers, strings), the
//! aggregates (lists, ordered dictionaries, tuples), script bodies, qualified
//! references, command handles, and host-defined [custom](CustomValue)
//! values.
//!
//! Aggregate payloads are shared behind [`Rc`], so cloning a value never
//! copies its content and script bodies share the underlying AST. Mutation
//! always produces new values.
//!
//! Each variant advertises its capabilities through the coercion and
//! selection methods: [`as_string`](Value::as_string),
//! [`select_index`](Value::select_index), [`select_key`](Value::select_key),
//! and [`select_rules`](Value::select_rules). Unsupported operations return a
//! [`ValueError`] with a stable message phrase.
//!
//! Equality is value-based and numeric across variants: an integer equals a
//! number or a string when they denote the same numeric value.
//!
//! ```
//! # use helena_core::value::Value;
//! assert_eq!(Value::Integer(56), Value::from("56.0"));
//! assert_ne!(Value::Integer(56), Value::from("56x"));
//! ```

use crate::command::CommandHandle;
use crate::process::Continuation;
use crate::selector::Selector;
use helena_syntax::syntax::Script;
use indexmap::IndexMap;
use itertools::Itertools as _;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Errors from value coercion and selection
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ValueError {
    /// The value has no string coercion.
    #[error("value has no string representation")]
    NoStringRepresentation,
    /// The value does not denote a number.
    #[error("invalid number \"{0}\"")]
    InvalidNumber(String),
    /// The value does not denote a boolean.
    #[error("invalid boolean \"{0}\"")]
    InvalidBoolean(String),
    /// The value does not denote a list.
    #[error("invalid list")]
    InvalidList,
    /// An index selector fell outside the value's bounds.
    #[error("index out of range \"{0}\"")]
    IndexOutOfRange(String),
    /// A key selector named a key the dictionary does not have.
    #[error("unknown key \"{0}\"")]
    UnknownKey(String),
    /// The value supports none of the requested selectors.
    #[error("value is not selectable")]
    NotSelectable,
}

/// Script body value
///
/// Wraps a parsed [`Script`] together with the raw source slice it came from,
/// when one exists. Blocks parsed from source carry their raw text, which is
/// the value's string representation; synthesized scripts have none.
#[derive(Clone, Debug)]
pub struct ScriptValue {
    /// Parsed script
    pub script: Rc<Script>,
    /// Raw source slice the script was parsed from
    pub source: Option<Rc<str>>,
}

impl ScriptValue {
    /// Wraps a script without source text.
    #[must_use]
    pub fn new(script: Rc<Script>) -> Self {
        ScriptValue { script, source: None }
    }

    /// Wraps a script together with its raw source slice.
    #[must_use]
    pub fn with_source(script: Rc<Script>, source: &str) -> Self {
        ScriptValue { script, source: Some(source.into()) }
    }
}

impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        self.script == other.script
    }
}

/// Reference value: a source plus a chain of selectors
///
/// A qualified value does not hold the data it refers to; it names a
/// location. Selecting on it appends to the chain instead of drilling, which
/// keeps the value addressable by commands that assign through it.
#[derive(Clone, Debug, PartialEq)]
pub struct QualifiedValue {
    /// Value naming the source
    pub source: Value,
    /// Selectors applied to the source, in order
    pub selectors: Vec<Selector>,
}

impl QualifiedValue {
    /// Creates a qualified value with no selectors.
    #[must_use]
    pub fn new(source: Value) -> Self {
        QualifiedValue { source, selectors: Vec::new() }
    }

    /// Returns a new qualified value with one more selector.
    #[must_use]
    pub fn with_selector(&self, selector: Selector) -> Self {
        let mut selectors = self.selectors.clone();
        selectors.push(selector);
        QualifiedValue { source: self.source.clone(), selectors }
    }
}

/// Host extension point for opaque values
///
/// A custom value carries host data through scripts. Its identity is the
/// implementing type; two custom values are equal only when they are the same
/// allocation.
pub trait CustomValue: fmt::Debug {
    /// Name of the custom value type
    fn type_name(&self) -> &str;

    /// Optional string coercion
    fn to_string_value(&self) -> Option<String> {
        None
    }

    /// Optional rules-based selection
    fn select_rules(&self, rules: &[Value]) -> Result<Value, ValueError> {
        let _ = rules;
        Err(ValueError::NotSelectable)
    }
}

/// Runtime value
#[derive(Clone, Debug)]
pub enum Value {
    /// Absence of a value
    Nil,
    /// Boolean
    Boolean(bool),
    /// Signed integer
    Integer(i64),
    /// Floating-point number
    Number(f64),
    /// Immutable string
    String(Rc<str>),
    /// Ordered sequence of values
    List(Rc<Vec<Value>>),
    /// Ordered mapping from string keys to values
    Dict(Rc<IndexMap<String, Value>>),
    /// Fixed grouping of values, spliced when leading a sentence
    Tuple(Rc<Vec<Value>>),
    /// Script body
    Script(Rc<ScriptValue>),
    /// Reference to a location
    Qualified(Rc<QualifiedValue>),
    /// Handle to a command
    Command(CommandHandle),
    /// Host-defined value
    Custom(Rc<dyn CustomValue>),
    /// Evaluator instruction; produced by commands, consumed by the
    /// trampoline, and never observable from scripts
    Continuation(Rc<Continuation>),
}

impl Value {
    /// Creates a list value.
    #[must_use]
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    /// Creates a tuple value.
    #[must_use]
    pub fn tuple<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::Tuple(Rc::new(items.into_iter().collect()))
    }

    /// Creates a dictionary value.
    #[must_use]
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Dict(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Coerces the value to a string.
    ///
    /// Nil, aggregates, commands, and custom values without a string form
    /// fail with [`ValueError::NoStringRepresentation`].
    pub fn as_string(&self) -> Result<String, ValueError> {
        match self {
            Value::Boolean(b) => Ok(b.to_string()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(s.to_string()),
            Value::Script(script) => match &script.source {
                Some(source) => Ok(source.to_string()),
                None => Err(ValueError::NoStringRepresentation),
            },
            Value::Custom(custom) => custom
                .to_string_value()
                .ok_or(ValueError::NoStringRepresentation),
            _ => Err(ValueError::NoStringRepresentation),
        }
    }

    /// Coerces the value to an integer.
    pub fn as_integer(&self) -> Result<i64, ValueError> {
        match self {
            Value::Integer(i) => Ok(*i),
            Value::Number(n) => integral(*n).ok_or_else(|| self.number_error()),
            Value::String(s) => {
                if let Ok(i) = s.parse::<i64>() {
                    return Ok(i);
                }
                s.parse::<f64>()
                    .ok()
                    .and_then(integral)
                    .ok_or_else(|| self.number_error())
            }
            _ => Err(self.number_error()),
        }
    }

    /// Coerces the value to a floating-point number.
    pub fn as_number(&self) -> Result<f64, ValueError> {
        match self {
            Value::Integer(i) => Ok(*i as f64),
            Value::Number(n) => Ok(*n),
            Value::String(s) => s.parse().map_err(|_| self.number_error()),
            _ => Err(self.number_error()),
        }
    }

    /// Coerces the value to a boolean.
    pub fn as_boolean(&self) -> Result<bool, ValueError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::String(s) => match &**s {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(ValueError::InvalidBoolean(other.to_string())),
            },
            _ => Err(ValueError::InvalidBoolean(self.to_string())),
        }
    }

    /// Borrows the elements of a list or tuple.
    pub fn elements(&self) -> Result<&[Value], ValueError> {
        match self {
            Value::List(items) | Value::Tuple(items) => Ok(items),
            _ => Err(ValueError::InvalidList),
        }
    }

    /// Selects an element by index.
    ///
    /// Lists, tuples, and strings are indexable; selecting on a qualified
    /// value appends the selector instead.
    pub fn select_index(&self, index: &Value) -> Result<Value, ValueError> {
        if let Value::Qualified(qualified) = self {
            let selector = Selector::Index(index.clone());
            return Ok(Value::Qualified(Rc::new(qualified.with_selector(selector))));
        }
        let i = index.as_integer()?;
        let out_of_range = || ValueError::IndexOutOfRange(i.to_string());
        let i = usize::try_from(i).map_err(|_| out_of_range())?;
        match self {
            Value::List(items) | Value::Tuple(items) => {
                items.get(i).cloned().ok_or_else(out_of_range)
            }
            Value::String(s) => s
                .chars()
                .nth(i)
                .map(|c| Value::from(c.to_string()))
                .ok_or_else(out_of_range),
            _ => Err(ValueError::NotSelectable),
        }
    }

    /// Selects an entry by key.
    ///
    /// Dictionaries are keyable; the key may be any string-coercible value.
    /// Selecting on a qualified value appends the selector instead.
    pub fn select_key(&self, key: &Value) -> Result<Value, ValueError> {
        if let Value::Qualified(qualified) = self {
            let selector = Selector::Keys(vec![key.clone()]);
            return Ok(Value::Qualified(Rc::new(qualified.with_selector(selector))));
        }
        let name = key.as_string()?;
        match self {
            Value::Dict(map) => map
                .get(&name)
                .cloned()
                .ok_or(ValueError::UnknownKey(name)),
            _ => Err(ValueError::NotSelectable),
        }
    }

    /// Selects through host-defined rules.
    ///
    /// Only custom values implement rules; selecting on a qualified value
    /// appends the selector instead.
    pub fn select_rules(&self, rules: &[Value]) -> Result<Value, ValueError> {
        match self {
            Value::Qualified(qualified) => {
                let selector = Selector::Rules(rules.to_vec());
                Ok(Value::Qualified(Rc::new(qualified.with_selector(selector))))
            }
            Value::Custom(custom) => custom.select_rules(rules),
            _ => Err(ValueError::NotSelectable),
        }
    }

    fn number_error(&self) -> ValueError {
        ValueError::InvalidNumber(self.to_string())
    }
}

/// Converts a float to an integer when it is integral.
fn integral(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64).then_some(n as i64)
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// Value-based equality
///
/// Numeric variants compare by numeric value, including strings that denote
/// numbers. Aggregates compare elementwise; dictionaries by key set. Command,
/// custom, and continuation values compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (Integer(a), Number(b)) | (Number(b), Integer(a)) => *a as f64 == *b,
            (String(a), String(b)) => a == b,
            (Integer(a), String(s)) | (String(s), Integer(a)) => {
                s.parse::<f64>().is_ok_and(|v| v == *a as f64)
            }
            (Number(a), String(s)) | (String(s), Number(a)) => {
                s.parse::<f64>().is_ok_and(|v| v == *a)
            }
            (Boolean(a), String(s)) | (String(s), Boolean(a)) => {
                s.parse::<bool>().is_ok_and(|v| v == *a)
            }
            (List(a), List(b)) => a == b,
            (Tuple(a), Tuple(b)) => a == b,
            (Dict(a), Dict(b)) => a == b,
            (Script(a), Script(b)) => a == b,
            (Qualified(a), Qualified(b)) => a == b,
            (Command(a), Command(b)) => a == b,
            (Custom(a), Custom(b)) => Rc::ptr_eq(a, b),
            (Continuation(a), Continuation(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Human-readable rendering, used by error messages
///
/// Values with a string coercion render as that string; other variants
/// render a stable approximation. This is not a re-parseable form.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Boolean(b) => b.fmt(f),
            Value::Integer(i) => i.fmt(f),
            Value::Number(n) => n.fmt(f),
            Value::String(s) => s.fmt(f),
            Value::List(items) => write!(f, "{}", items.iter().format(" ")),
            Value::Dict(map) => write!(
                f,
                "{}",
                map.iter()
                    .format_with(" ", |(k, v), f| f(&format_args!("{k} {v}")))
            ),
            Value::Tuple(items) => write!(f, "({})", items.iter().format(" ")),
            Value::Script(script) => match &script.source {
                Some(source) => source.fmt(f),
                None => Ok(()),
            },
            Value::Qualified(qualified) => {
                qualified.source.fmt(f)?;
                for selector in &qualified.selectors {
                    selector.fmt(f)?;
                }
                Ok(())
            }
            Value::Command(_) => f.write_str("<command>"),
            Value::Custom(custom) => write!(f, "<{}>", custom.type_name()),
            Value::Continuation(_) => f.write_str("<continuation>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn string_coercions() {
        assert_eq!(Value::from("abc").as_string().unwrap(), "abc");
        assert_eq!(Value::Integer(-5).as_string().unwrap(), "-5");
        assert_eq!(Value::Boolean(true).as_string().unwrap(), "true");
        assert_matches!(
            Value::Nil.as_string(),
            Err(ValueError::NoStringRepresentation)
        );
        assert_matches!(
            Value::list([]).as_string(),
            Err(ValueError::NoStringRepresentation)
        );
    }

    #[test]
    fn integer_coercions() {
        assert_eq!(Value::from("42").as_integer().unwrap(), 42);
        assert_eq!(Value::from("42.0").as_integer().unwrap(), 42);
        assert_eq!(Value::Number(3.0).as_integer().unwrap(), 3);
        assert_matches!(
            Value::from("x").as_integer(),
            Err(ValueError::InvalidNumber(s)) => assert_eq!(s, "x")
        );
        assert_matches!(
            Value::Number(1.5).as_integer(),
            Err(ValueError::InvalidNumber(_))
        );
    }

    #[test]
    fn boolean_coercions() {
        assert_eq!(Value::from("true").as_boolean().unwrap(), true);
        assert_eq!(Value::from("false").as_boolean().unwrap(), false);
        assert_matches!(
            Value::from("yes").as_boolean(),
            Err(ValueError::InvalidBoolean(s)) => assert_eq!(s, "yes")
        );
    }

    #[test]
    fn numeric_equality_across_variants() {
        assert_eq!(Value::Integer(56), Value::Number(56.0));
        assert_eq!(Value::Integer(56), Value::from("56.0"));
        assert_eq!(Value::Number(0.5), Value::from(".5"));
        assert_ne!(Value::Integer(56), Value::from("57"));
        assert_ne!(Value::Integer(56), Value::Nil);
    }

    #[test]
    fn aggregate_equality() {
        assert_eq!(
            Value::list([Value::Integer(1), Value::from("a")]),
            Value::list([Value::Integer(1), Value::from("a")])
        );
        assert_ne!(
            Value::list([Value::Integer(1)]),
            Value::tuple([Value::Integer(1)])
        );
        let a = Value::dict([("x", Value::Integer(1)), ("y", Value::Integer(2))]);
        let b = Value::dict([("y", Value::Integer(2)), ("x", Value::Integer(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn index_selection() {
        let list = Value::list([Value::from("a"), Value::from("b")]);
        assert_eq!(list.select_index(&Value::Integer(1)).unwrap(), Value::from("b"));
        assert_eq!(
            list.select_index(&Value::from("0")).unwrap(),
            Value::from("a")
        );
        assert_matches!(
            list.select_index(&Value::Integer(2)),
            Err(ValueError::IndexOutOfRange(s)) => assert_eq!(s, "2")
        );
        let s = Value::from("héllo");
        assert_eq!(s.select_index(&Value::Integer(1)).unwrap(), Value::from("é"));
        assert_matches!(
            Value::Integer(1).select_index(&Value::Integer(0)),
            Err(ValueError::NotSelectable)
        );
    }

    #[test]
    fn key_selection() {
        let dict = Value::dict([("k", Value::from("v"))]);
        assert_eq!(dict.select_key(&Value::from("k")).unwrap(), Value::from("v"));
        assert_matches!(
            dict.select_key(&Value::from("missing")),
            Err(ValueError::UnknownKey(k)) => assert_eq!(k, "missing")
        );
    }

    #[test]
    fn qualified_selection_appends() {
        let qualified = Value::Qualified(Rc::new(QualifiedValue::new(Value::from("x"))));
        let selected = qualified
            .select_index(&Value::Integer(1))
            .unwrap()
            .select_key(&Value::from("k"))
            .unwrap();
        assert_matches!(&selected, Value::Qualified(q) => {
            assert_eq!(q.source, Value::from("x"));
            assert_eq!(q.selectors.len(), 2);
            assert_eq!(q.selectors[0], Selector::Index(Value::Integer(1)));
        });
    }

    #[test]
    fn custom_values_compare_by_identity() {
        #[derive(Debug)]
        struct Marker;
        impl CustomValue for Marker {
            fn type_name(&self) -> &str {
                "marker"
            }
        }
        let a = Rc::new(Marker);
        assert_eq!(Value::Custom(a.clone()), Value::Custom(a.clone()));
        assert_ne!(Value::Custom(a), Value::Custom(Rc::new(Marker)));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Nil.to_string(), "");
        assert_eq!(
            Value::tuple([Value::from("a"), Value::Integer(2)]).to_string(),
            "(a 2)"
        );
        assert_eq!(
            Value::list([Value::from("a"), Value::from("b")]).to_string(),
            "a b"
        );
        assert_eq!(
            Value::dict([("k", Value::from("v"))]).to_string(),
            "k v"
        );
    }
}
