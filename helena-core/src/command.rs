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

//! Commands
//!
//! A command is the unit of behavior a sentence invokes. The core defines no
//! commands of its own; dialects and hosts register implementations of the
//! [`Command`] trait in a [`Scope`](crate::scope::Scope) and the evaluator
//! calls them with the fully evaluated sentence values, command name first.
//!
//! Commands are shared as [`CommandHandle`]s: reference-counted trait
//! objects compared by identity. A handle can itself travel inside a
//! [`Value`](crate::value::Value), which is how values end up wrapping
//! commands that own values; the reference counting breaks the would-be
//! ownership cycle.

use crate::result::Outcome;
use crate::scope::Scope;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Options for the command help protocol
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HelpOptions {
    /// Text to print before the usage proper
    pub prefix: Option<String>,
    /// Number of leading arguments to omit from the usage
    pub skip: usize,
}

/// Unit of behavior invoked by a sentence
pub trait Command {
    /// Executes the command.
    ///
    /// `args` holds the fully evaluated sentence values, command name first.
    /// The returned outcome may carry any result code; returning a
    /// [continuation](crate::process::Continuation) value instructs the
    /// evaluator to run another program instead of producing a value
    /// directly.
    fn execute(&self, args: &[Value], scope: &Scope) -> Outcome;

    /// Continues the command after a suspension it produced.
    ///
    /// `result` carries the value staged by
    /// [`Process::yield_back`](crate::process::Process::yield_back) (or the
    /// yielded value when none was staged) together with the data attached to
    /// the yield outcome. The return value is treated exactly like a fresh
    /// [`execute`](Self::execute) result.
    ///
    /// The default implementation completes with the delivered result.
    fn resume(&self, result: Outcome, scope: &Scope) -> Outcome {
        let _ = scope;
        result
    }

    /// Describes how to call the command.
    ///
    /// The default implementation reports that no help is available.
    fn help(&self, args: &[Value], options: &HelpOptions) -> Outcome {
        let _ = (args, options);
        Outcome::error("no help available")
    }
}

/// Shared, identity-compared command reference
#[derive(Clone)]
pub struct CommandHandle(Rc<dyn Command>);

impl CommandHandle {
    /// Wraps a command implementation.
    #[must_use]
    pub fn new<C: Command + 'static>(command: C) -> Self {
        CommandHandle(Rc::new(command))
    }

    /// Wraps an already shared command.
    #[must_use]
    pub fn from_rc(command: Rc<dyn Command>) -> Self {
        CommandHandle(command)
    }

    /// Borrows the underlying command.
    #[must_use]
    pub fn command(&self) -> &Rc<dyn Command> {
        &self.0
    }
}

impl PartialEq for CommandHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandHandle").finish()
    }
}

/// Builds the conventional wrong-argument-count error.
///
/// The message quotes the expected call shape, e.g.
/// `wrong # args: should be "cmd name value"`.
#[must_use]
pub fn arity_error(usage: &str) -> Outcome {
    Outcome::error(format!("wrong # args: should be \"{usage}\""))
}

/// Checks an argument count against inclusive bounds.
///
/// `max` of `None` allows any number of trailing arguments.
pub fn check_arity(
    args: &[Value],
    usage: &str,
    min: usize,
    max: Option<usize>,
) -> Result<(), Outcome> {
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
        Err(arity_error(usage))
    } else {
        Ok(())
    }
}
