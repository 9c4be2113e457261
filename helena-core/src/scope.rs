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

//! Scopes
//!
//! A [`Scope`] is a named environment owning three tables: variables,
//! write-once constants, and commands. Scopes form a chain through an
//! immutable parent reference, but the chain only resolves *commands*:
//! variables and constants are strictly local, so a child scope never sees
//! (or mutates) its parent's data.
//!
//! A scope is a cheap handle (`Rc` inside); cloning it aliases the same
//! tables. Commands receive the calling scope by reference and may capture a
//! clone, which is how continuations carry their evaluation environment.
//!
//! The scope also owns the [`Compiler`] that turns scripts into programs,
//! and constructs [`Process`]es to run them; see
//! [`execute_script`](Scope::execute_script) for the common path.

use crate::command::{Command, CommandHandle};
use crate::compiler::{CompileError, Compiler, Program};
use crate::process::{Process, ProcessOptions};
use crate::result::Outcome;
use crate::value::Value;
use helena_syntax::syntax::Script;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Errors from scope operations
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ScopeError {
    /// A command name value has no string coercion.
    #[error("invalid command name")]
    InvalidCommandName,
    /// No command is registered under the name.
    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),
    /// The value cannot be resolved to a command.
    #[error("cannot resolve command \"{0}\"")]
    CannotResolveCommand(String),
    /// No variable or constant has the name.
    #[error("cannot get \"{0}\": no such variable")]
    NoSuchVariable(String),
    /// The name is already bound to a constant.
    #[error("cannot redefine constant \"{0}\"")]
    ConstantRedefinition(String),
    /// A variable name value has no string coercion.
    #[error("invalid variable name")]
    InvalidVariableName,
}

impl From<ScopeError> for Outcome {
    fn from(error: ScopeError) -> Outcome {
        Outcome::error(error.to_string())
    }
}

/// Configuration flags owned by a scope
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScopeOptions {
    /// Whether ASTs parsed on behalf of this scope carry positions, and
    /// whether error stack entries record call site positions
    pub capture_positions: bool,
    /// Whether error outcomes collect an error stack
    pub capture_error_stack: bool,
}

impl ScopeOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether positions are captured.
    #[must_use]
    pub fn capture_positions(mut self, capture: bool) -> Self {
        self.capture_positions = capture;
        self
    }

    /// Sets whether error stacks are captured.
    #[must_use]
    pub fn capture_error_stack(mut self, capture: bool) -> Self {
        self.capture_error_stack = capture;
        self
    }
}

#[derive(Debug)]
struct ScopeData {
    parent: Option<Scope>,
    variables: RefCell<HashMap<String, Value>>,
    constants: RefCell<HashMap<String, Value>>,
    commands: RefCell<HashMap<String, CommandHandle>>,
    compiler: Compiler,
    options: ScopeOptions,
}

/// Named environment owning variables, constants, and commands
#[derive(Clone, Debug)]
pub struct Scope {
    data: Rc<ScopeData>,
}

impl Scope {
    /// Creates a root scope.
    #[must_use]
    pub fn new_root(options: ScopeOptions) -> Self {
        Scope {
            data: Rc::new(ScopeData {
                parent: None,
                variables: RefCell::new(HashMap::new()),
                constants: RefCell::new(HashMap::new()),
                commands: RefCell::new(HashMap::new()),
                compiler: Compiler::new(),
                options,
            }),
        }
    }

    /// Creates a child scope.
    ///
    /// The child starts with empty tables and inherits the parent's options.
    /// It resolves its parent's commands through the chain but never its
    /// variables or constants.
    #[must_use]
    pub fn new_child(&self) -> Self {
        Scope {
            data: Rc::new(ScopeData {
                parent: Some(self.clone()),
                variables: RefCell::new(HashMap::new()),
                constants: RefCell::new(HashMap::new()),
                commands: RefCell::new(HashMap::new()),
                compiler: Compiler::new(),
                options: self.data.options,
            }),
        }
    }

    /// Returns the scope's configuration flags.
    #[must_use]
    pub fn options(&self) -> ScopeOptions {
        self.data.options
    }

    /// Returns true if both handles alias the same scope.
    #[must_use]
    pub fn is_same(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    // Variables

    /// Sets a variable.
    ///
    /// Fails when the name is bound to a constant; the constant keeps its
    /// value.
    pub fn set_variable<N: Into<String>>(
        &self,
        name: N,
        value: Value,
    ) -> Result<(), ScopeError> {
        let name = name.into();
        if self.data.constants.borrow().contains_key(&name) {
            return Err(ScopeError::ConstantRedefinition(name));
        }
        self.data.variables.borrow_mut().insert(name, value);
        Ok(())
    }

    /// Defines a write-once constant.
    ///
    /// Fails when the name is already bound to a constant; the constant
    /// keeps its value.
    pub fn define_constant<N: Into<String>>(
        &self,
        name: N,
        value: Value,
    ) -> Result<(), ScopeError> {
        let name = name.into();
        if self.data.constants.borrow().contains_key(&name) {
            return Err(ScopeError::ConstantRedefinition(name));
        }
        self.data.variables.borrow_mut().remove(&name);
        self.data.constants.borrow_mut().insert(name, value);
        Ok(())
    }

    /// Looks a variable or constant up, locally only.
    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.data.constants.borrow().get(name) {
            return Some(value.clone());
        }
        self.data.variables.borrow().get(name).cloned()
    }

    /// Looks a variable or constant up, failing when there is none.
    pub fn resolve_variable(&self, name: &str) -> Result<Value, ScopeError> {
        self.get_variable(name)
            .ok_or_else(|| ScopeError::NoSuchVariable(name.to_string()))
    }

    /// Resolves a substitution source value.
    ///
    /// A string-coercible value names one variable; a tuple resolves each of
    /// its elements in turn.
    pub fn resolve_value(&self, name: &Value) -> Result<Value, ScopeError> {
        if let Value::Tuple(names) = name {
            let values = names
                .iter()
                .map(|name| self.resolve_value(name))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::tuple(values));
        }
        match name.as_string() {
            Ok(name) => self.resolve_variable(&name),
            Err(_) => Err(ScopeError::InvalidVariableName),
        }
    }

    // Commands

    /// Registers a command under a name given as a value.
    ///
    /// Fails when the name value has no string coercion.
    pub fn register_command<C: Command + 'static>(
        &self,
        name: &Value,
        command: C,
    ) -> Result<(), ScopeError> {
        let name = name
            .as_string()
            .map_err(|_| ScopeError::InvalidCommandName)?;
        self.register_named_command(name, command);
        Ok(())
    }

    /// Registers a command under a string name.
    ///
    /// An existing command under the same name is replaced.
    pub fn register_named_command<N: Into<String>, C: Command + 'static>(
        &self,
        name: N,
        command: C,
    ) {
        self.data
            .commands
            .borrow_mut()
            .insert(name.into(), CommandHandle::new(command));
    }

    /// Registers an already shared command under a string name.
    pub fn register_command_handle<N: Into<String>>(&self, name: N, command: CommandHandle) {
        self.data.commands.borrow_mut().insert(name.into(), command);
    }

    /// Returns true if this scope itself defines the command.
    #[must_use]
    pub fn has_local_command(&self, name: &str) -> bool {
        self.data.commands.borrow().contains_key(name)
    }

    /// Returns the names of the commands this scope itself defines.
    #[must_use]
    pub fn get_local_commands(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.data.commands.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Looks a command up through the parent chain.
    #[must_use]
    pub fn lookup_command(&self, name: &str) -> Option<CommandHandle> {
        if let Some(command) = self.data.commands.borrow().get(name) {
            return Some(command.clone());
        }
        self.data.parent.as_ref()?.lookup_command(name)
    }

    /// Resolves a value to a command.
    ///
    /// Command values resolve to themselves; string-coercible values resolve
    /// by name through the parent chain. A name that denotes a number and is
    /// not shadowed by a registered command resolves to a command returning
    /// that number, which is what makes numeric sentences (`[1]`, index
    /// selectors, infix dialects) self-evaluate.
    pub fn resolve_command(&self, value: &Value) -> Result<CommandHandle, ScopeError> {
        match value {
            Value::Command(handle) => Ok(handle.clone()),
            Value::Qualified(_) => {
                Err(ScopeError::CannotResolveCommand(value.to_string()))
            }
            _ => match value.as_string() {
                Ok(name) => {
                    if let Some(command) = self.lookup_command(&name) {
                        return Ok(command);
                    }
                    if let Some(number) = number_value(&name) {
                        return Ok(CommandHandle::new(NumberCommand { value: number }));
                    }
                    Err(ScopeError::UnknownCommand(name))
                }
                Err(_) => Err(ScopeError::InvalidCommandName),
            },
        }
    }

    // Execution

    /// Compiles a script into a program.
    pub fn compile(&self, script: &Script) -> Result<Program, CompileError> {
        self.data.compiler.compile(script)
    }

    /// Creates a process that will run a compiled program in this scope.
    #[must_use]
    pub fn prepare_process(&self, program: Rc<Program>) -> Process {
        let options =
            ProcessOptions::new().capture_error_stack(self.data.options.capture_error_stack);
        Process::new(self.clone(), program, options)
    }

    /// Compiles a script and creates a process for it.
    pub fn prepare_script(&self, script: &Script) -> Result<Process, CompileError> {
        Ok(self.prepare_process(Rc::new(self.compile(script)?)))
    }

    /// Compiles and runs a script to completion or first suspension.
    #[must_use]
    pub fn execute_script(&self, script: &Script) -> Outcome {
        match self.prepare_script(script) {
            Ok(mut process) => process.run(),
            Err(error) => Outcome::error(error.to_string()),
        }
    }
}

/// Parses a command name as a number value.
fn number_value(name: &str) -> Option<Value> {
    if let Ok(i) = name.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    name.parse::<f64>().ok().map(Value::Number)
}

/// Self-evaluating number command
///
/// Numbers have no subcommands in the core; dialects shadow this resolution
/// to add them.
struct NumberCommand {
    value: Value,
}

impl Command for NumberCommand {
    fn execute(&self, args: &[Value], _scope: &Scope) -> Outcome {
        match args.len() {
            0 | 1 => Outcome::ok(self.value.clone()),
            _ => match args[1].as_string() {
                Ok(subcommand) => {
                    Outcome::error(format!("unknown subcommand \"{subcommand}\""))
                }
                Err(_) => Outcome::error("invalid subcommand name"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct Nop;
    impl Command for Nop {
        fn execute(&self, _args: &[Value], _scope: &Scope) -> Outcome {
            Outcome::ok(Value::Nil)
        }
    }

    #[test]
    fn variables_are_local_to_their_scope() {
        let root = Scope::new_root(ScopeOptions::default());
        root.set_variable("x", Value::Integer(1)).unwrap();
        assert_eq!(root.get_variable("x"), Some(Value::Integer(1)));

        let child = root.new_child();
        assert_eq!(child.get_variable("x"), None);
        assert_matches!(
            child.resolve_variable("x"),
            Err(ScopeError::NoSuchVariable(name)) => assert_eq!(name, "x")
        );

        // The child's assignments never reach the parent.
        child.set_variable("x", Value::Integer(2)).unwrap();
        assert_eq!(root.get_variable("x"), Some(Value::Integer(1)));
    }

    #[test]
    fn constants_are_write_once() {
        let scope = Scope::new_root(ScopeOptions::default());
        scope.define_constant("c", Value::Integer(1)).unwrap();
        assert_matches!(
            scope.define_constant("c", Value::Integer(2)),
            Err(ScopeError::ConstantRedefinition(_))
        );
        assert_matches!(
            scope.set_variable("c", Value::Integer(2)),
            Err(ScopeError::ConstantRedefinition(_))
        );
        assert_eq!(scope.get_variable("c"), Some(Value::Integer(1)));
    }

    #[test]
    fn commands_resolve_through_the_parent_chain() {
        let root = Scope::new_root(ScopeOptions::default());
        root.register_named_command("cmd", Nop);
        let child = root.new_child();

        assert!(root.has_local_command("cmd"));
        assert!(!child.has_local_command("cmd"));
        assert!(child.lookup_command("cmd").is_some());
        assert_eq!(root.get_local_commands(), ["cmd"]);
        assert_eq!(child.get_local_commands(), Vec::<String>::new());
    }

    #[test]
    fn command_resolution_errors() {
        let scope = Scope::new_root(ScopeOptions::default());
        assert_matches!(
            scope.resolve_command(&Value::from("missing")),
            Err(ScopeError::UnknownCommand(name)) => assert_eq!(name, "missing")
        );
        assert_matches!(
            scope.resolve_command(&Value::Nil),
            Err(ScopeError::InvalidCommandName)
        );
        let error: Outcome = ScopeError::UnknownCommand("x".to_string()).into();
        assert_eq!(error.value, Value::from("unknown command \"x\""));
    }

    #[test]
    fn numeric_names_self_evaluate() {
        let scope = Scope::new_root(ScopeOptions::default());
        let command = scope.resolve_command(&Value::from("42")).unwrap();
        let outcome = command.command().execute(&[Value::from("42")], &scope);
        assert_eq!(outcome.value, Value::Integer(42));

        let command = scope.resolve_command(&Value::from("1.5")).unwrap();
        let outcome = command.command().execute(&[Value::from("1.5")], &scope);
        assert_eq!(outcome.value, Value::Number(1.5));

        let command = scope.resolve_command(&Value::from("42")).unwrap();
        let outcome = command
            .command()
            .execute(&[Value::from("42"), Value::from("frob")], &scope);
        assert!(outcome.is_error());
        assert_eq!(outcome.value, Value::from("unknown subcommand \"frob\""));
    }

    #[test]
    fn registered_commands_shadow_numeric_names() {
        struct Tagged;
        impl Command for Tagged {
            fn execute(&self, _args: &[Value], _scope: &Scope) -> Outcome {
                Outcome::ok(Value::from("shadowed"))
            }
        }
        let scope = Scope::new_root(ScopeOptions::default());
        scope.register_named_command("42", Tagged);
        let command = scope.resolve_command(&Value::from("42")).unwrap();
        let outcome = command.command().execute(&[Value::from("42")], &scope);
        assert_eq!(outcome.value, Value::from("shadowed"));
    }

    #[test]
    fn command_values_resolve_to_themselves() {
        let scope = Scope::new_root(ScopeOptions::default());
        let handle = CommandHandle::new(Nop);
        let value = Value::Command(handle.clone());
        assert_eq!(scope.resolve_command(&value).unwrap(), handle);
    }

    #[test]
    fn resolve_value_maps_tuples() {
        let scope = Scope::new_root(ScopeOptions::default());
        scope.set_variable("a", Value::Integer(1)).unwrap();
        scope.set_variable("b", Value::Integer(2)).unwrap();
        let names = Value::tuple([Value::from("a"), Value::from("b")]);
        assert_eq!(
            scope.resolve_value(&names).unwrap(),
            Value::tuple([Value::Integer(1), Value::Integer(2)])
        );
    }

    #[test]
    fn child_scopes_inherit_options() {
        let options = ScopeOptions::new().capture_error_stack(true);
        let root = Scope::new_root(options);
        assert_eq!(root.new_child().options(), options);
    }
}
