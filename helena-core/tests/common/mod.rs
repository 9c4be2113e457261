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

//! Minimal command set standing in for an external dialect.
//!
//! The core ships no commands; these few give the integration tests a
//! surface to drive the evaluator with. They deliberately stay small: just
//! enough to exercise invocation, continuations, scoping, and result codes.

use helena_core::command::{check_arity, Command};
use helena_core::process::Continuation;
use helena_core::result::Outcome;
use helena_core::scope::{Scope, ScopeOptions};
use helena_core::value::Value;
use std::rc::Rc;

/// `idem value`: returns its argument unchanged.
pub struct Idem;

impl Command for Idem {
    fn execute(&self, args: &[Value], _scope: &Scope) -> Outcome {
        if let Err(error) = check_arity(args, "idem value", 2, Some(2)) {
            return error;
        }
        Outcome::ok(args[1].clone())
    }
}

/// `+ number ...`: sums its integer arguments.
pub struct Add;

impl Command for Add {
    fn execute(&self, args: &[Value], _scope: &Scope) -> Outcome {
        let mut sum = 0;
        for arg in &args[1..] {
            match arg.as_integer() {
                Ok(i) => sum += i,
                Err(error) => return Outcome::error(error.to_string()),
            }
        }
        Outcome::ok(Value::Integer(sum))
    }
}

/// `error message`: fails with the given message.
pub struct Fail;

impl Command for Fail {
    fn execute(&self, args: &[Value], _scope: &Scope) -> Outcome {
        match args.get(1).map(Value::as_string) {
            Some(Ok(message)) => Outcome::error(message),
            _ => Outcome::error("error"),
        }
    }
}

/// `yield ?value?`: suspends the process.
pub struct Yield;

impl Command for Yield {
    fn execute(&self, args: &[Value], _scope: &Scope) -> Outcome {
        Outcome::yield_value(args.get(1).cloned().unwrap_or(Value::Nil))
    }
}

/// `return ?value?`: interrupts the current body.
pub struct Return;

impl Command for Return {
    fn execute(&self, args: &[Value], _scope: &Scope) -> Outcome {
        Outcome::return_value(args.get(1).cloned().unwrap_or(Value::Nil))
    }
}

/// `break` / `continue`: loop control codes.
pub struct Break;

impl Command for Break {
    fn execute(&self, _args: &[Value], _scope: &Scope) -> Outcome {
        Outcome::break_signal()
    }
}

/// Command defined by `macro`: runs its body in the calling scope and lets
/// every result code pass through.
struct MacroCommand {
    body: Rc<helena_core::compiler::Program>,
}

impl Command for MacroCommand {
    fn execute(&self, _args: &[Value], scope: &Scope) -> Outcome {
        Outcome::ok(Continuation::new(scope.clone(), Rc::clone(&self.body)).into_value())
    }
}

/// `macro name params body`: registers a body-running command.
///
/// The parameter list is accepted for shape but not bound; the tests only
/// need zero-argument bodies.
pub struct Macro;

impl Command for Macro {
    fn execute(&self, args: &[Value], scope: &Scope) -> Outcome {
        if let Err(error) = check_arity(args, "macro name params body", 4, Some(4)) {
            return error;
        }
        let body = match &args[3] {
            Value::Script(script) => Rc::clone(&script.script),
            _ => return Outcome::error("body must be a script"),
        };
        let program = match scope.compile(&body) {
            Ok(program) => Rc::new(program),
            Err(error) => return Outcome::error(error.to_string()),
        };
        match args[1].as_string() {
            Ok(name) => {
                scope.register_named_command(name, MacroCommand { body: program });
                Outcome::ok(Value::Nil)
            }
            Err(_) => Outcome::error("invalid command name"),
        }
    }
}

/// Command defined by `proc`: runs its body in a child of the defining
/// scope and handles the body's result codes.
struct ProcCommand {
    parent: Scope,
    body: Rc<helena_core::compiler::Program>,
}

impl Command for ProcCommand {
    fn execute(&self, _args: &[Value], _scope: &Scope) -> Outcome {
        let scope = self.parent.new_child();
        let continuation =
            Continuation::with_callback(scope, Rc::clone(&self.body), |result| {
                use helena_core::result::ResultCode;
                match result.code {
                    ResultCode::Return => Outcome::ok(result.value),
                    ResultCode::Break => Outcome::error("unexpected break"),
                    ResultCode::Continue => Outcome::error("unexpected continue"),
                    _ => result,
                }
            });
        Outcome::ok(continuation.into_value())
    }
}

/// `proc name params body`: registers a scoped, code-handling command.
pub struct Proc;

impl Command for Proc {
    fn execute(&self, args: &[Value], scope: &Scope) -> Outcome {
        if let Err(error) = check_arity(args, "proc name params body", 4, Some(4)) {
            return error;
        }
        let body = match &args[3] {
            Value::Script(script) => Rc::clone(&script.script),
            _ => return Outcome::error("body must be a script"),
        };
        let program = match scope.compile(&body) {
            Ok(program) => Rc::new(program),
            Err(error) => return Outcome::error(error.to_string()),
        };
        match args[1].as_string() {
            Ok(name) => {
                scope.register_named_command(
                    name,
                    ProcCommand { parent: scope.clone(), body: program },
                );
                Outcome::ok(Value::Nil)
            }
            Err(_) => Outcome::error("invalid command name"),
        }
    }
}

/// Creates a scope with the whole test command set registered.
pub fn test_scope(options: ScopeOptions) -> Scope {
    let scope = Scope::new_root(options);
    scope.register_named_command("idem", Idem);
    scope.register_named_command("+", Add);
    scope.register_named_command("error", Fail);
    scope.register_named_command("yield", Yield);
    scope.register_named_command("return", Return);
    scope.register_named_command("break", Break);
    scope.register_named_command("macro", Macro);
    scope.register_named_command("proc", Proc);
    scope
}
