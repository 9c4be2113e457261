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

//! Helena execution core.
//!
//! This crate evaluates scripts parsed by
//! [`helena-syntax`](helena_syntax): it defines the runtime
//! [value](value::Value) universe, the uniform [result](result::Outcome)
//! record every command produces, [scopes](scope::Scope) owning variables,
//! constants, and [commands](command::Command), the
//! [compiler](compiler::Compiler) lowering scripts to linear programs, and
//! the trampoline [evaluator](process::Process) with first-class
//! continuations and cooperative yield/resume.
//!
//! The crate ships no commands of its own; dialects register their commands
//! in a scope and the evaluator invokes them uniformly.
//!
//! ```
//! use helena_core::command::Command;
//! use helena_core::result::Outcome;
//! use helena_core::scope::{Scope, ScopeOptions};
//! use helena_core::value::Value;
//! use helena_syntax::syntax::Script;
//!
//! struct Sum;
//! impl Command for Sum {
//!     fn execute(&self, args: &[Value], _scope: &Scope) -> Outcome {
//!         let mut sum = 0;
//!         for arg in &args[1..] {
//!             match arg.as_integer() {
//!                 Ok(i) => sum += i,
//!                 Err(error) => return Outcome::error(error.to_string()),
//!             }
//!         }
//!         Outcome::ok(Value::Integer(sum))
//!     }
//! }
//!
//! let scope = Scope::new_root(ScopeOptions::default());
//! scope.register_named_command("+", Sum);
//! let script: Script = "(+ 1 2 3) 4".parse().unwrap();
//! let outcome = scope.execute_script(&script);
//! assert_eq!(outcome.value, Value::Integer(10));
//! ```

pub mod command;
pub mod compiler;
pub mod process;
pub mod result;
pub mod scope;
pub mod selector;
pub mod value;

#[doc(no_inline)]
pub use crate::command::Command;
#[doc(no_inline)]
pub use crate::process::Process;
#[doc(no_inline)]
pub use crate::result::{Outcome, ResultCode};
#[doc(no_inline)]
pub use crate::scope::{Scope, ScopeOptions};
#[doc(no_inline)]
pub use crate::value::Value;
