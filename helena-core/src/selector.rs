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

//! Selectors
//!
//! A selector picks a part out of a value: an index into an indexable value,
//! a chain of keys into nested dictionaries, or host-defined rules applied to
//! a custom value. Selectors apply in declaration order.
//!
//! Applying any selector to a [qualified](crate::value::QualifiedValue) value
//! appends to its chain instead of drilling into data.

use crate::value::{Value, ValueError};
use itertools::Itertools as _;
use std::fmt;
use std::rc::Rc;

/// Part-of-value selector
#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    /// Element selection by integer index, `[…]`
    Index(Value),
    /// Entry selection by a chain of keys, `(…)`
    Keys(Vec<Value>),
    /// Host-defined selection rules, `{…}`
    Rules(Vec<Value>),
}

impl Selector {
    /// Applies this selector to a source value.
    pub fn apply(&self, source: &Value) -> Result<Value, ValueError> {
        if let Value::Qualified(qualified) = source {
            return Ok(Value::Qualified(Rc::new(
                qualified.with_selector(self.clone()),
            )));
        }
        match self {
            Selector::Index(index) => source.select_index(index),
            Selector::Keys(keys) => keys
                .iter()
                .try_fold(source.clone(), |value, key| value.select_key(key)),
            Selector::Rules(rules) => source.select_rules(rules),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(index) => write!(f, "[{index}]"),
            Selector::Keys(keys) => write!(f, "({})", keys.iter().format(" ")),
            Selector::Rules(rules) => write!(f, "{{{}}}", rules.iter().format(" ")),
        }
    }
}
