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

//! Evaluator processes
//!
//! A [`Process`] runs a compiled [`Program`] against a
//! [`Scope`](crate::scope::Scope). Execution is a trampoline around an
//! [`ExecutionStack`] of [`ProcessContext`]s: when a command returns a
//! [`Continuation`], the evaluator pushes (or, for a tailcall, replaces) a
//! context instead of recursing, so interpreted recursion costs a constant
//! amount of host stack per frame.
//!
//! ## Result-code propagation
//!
//! A context that finishes hands its result to its completion callback, when
//! it has one; frames without a callback are intermediate and pass non-OK
//! codes through untouched. The callback is where a dialect command decides
//! what a code means in its frame: a procedure maps `Return` to `Ok`, a loop
//! eats `Break` and `Continue`. `Error` is never swallowed by the evaluator
//! itself, and `Break`/`Continue` reaching the top level turn into errors.
//!
//! ## Suspension
//!
//! `Yield` freezes the whole stack and surfaces the yield outcome to the
//! host, which may stage a reply with [`Process::yield_back`] and call
//! [`run`](Process::run) again. The yielding command's
//! [`resume`](crate::command::Command::resume) method receives the staged
//! value together with the data the command attached to its yield, and its
//! return value is handled exactly like a fresh `execute` result. A
//! suspended process is an ordinary value: it can be stepped further or
//! simply dropped.

use crate::command::CommandHandle;
use crate::compiler::{OpCode, Program};
use crate::result::{
    ErrorStack, ErrorStackEntry, Outcome, ResultCode, ResultData,
};
use crate::scope::Scope;
use crate::selector::Selector;
use crate::value::Value;
use helena_syntax::source::Position;
use std::fmt;
use std::rc::Rc;

/// Completion callback of a continuation
pub type Callback = Rc<dyn Fn(Outcome) -> Outcome>;

/// Instruction to the evaluator to run another program
///
/// Commands return continuations (wrapped in
/// [`Value::Continuation`]) instead of evaluating sub-programs themselves.
/// An `Ok` outcome carrying a continuation pushes a new context; a `Return`
/// outcome carrying one replaces the current context (a tailcall). The
/// optional callback sees the sub-program's result and may transform it.
pub struct Continuation {
    scope: Scope,
    program: Rc<Program>,
    callback: Option<Callback>,
}

impl Continuation {
    /// Creates a continuation without a callback.
    #[must_use]
    pub fn new(scope: Scope, program: Rc<Program>) -> Self {
        Continuation { scope, program, callback: None }
    }

    /// Creates a continuation with a completion callback.
    #[must_use]
    pub fn with_callback<F>(scope: Scope, program: Rc<Program>, callback: F) -> Self
    where
        F: Fn(Outcome) -> Outcome + 'static,
    {
        Continuation {
            scope,
            program,
            callback: Some(Rc::new(callback)),
        }
    }

    /// Wraps the continuation into a value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Continuation(Rc::new(self))
    }

    /// Returns the scope the continuation runs in.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Returns the program the continuation runs.
    #[must_use]
    pub fn program(&self) -> &Rc<Program> {
        &self.program
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("program", &self.program)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

/// Execution position within a program
///
/// The operand stack holds the values words have produced; frame marks
/// delimit the open frames. The state is inert between
/// [`Process::run`] calls, which is what makes suspension possible.
#[derive(Debug)]
pub struct ProcessState {
    pc: usize,
    operands: Vec<Value>,
    frames: Vec<usize>,
    last_result: Outcome,
    /// Values and position of the sentence currently being invoked, kept for
    /// error stack capture.
    current_frame: Option<(Vec<Value>, Option<Position>)>,
}

impl ProcessState {
    fn new() -> Self {
        ProcessState {
            pc: 0,
            operands: Vec::new(),
            frames: Vec::new(),
            last_result: Outcome::ok(Value::Nil),
            current_frame: None,
        }
    }

    fn push(&mut self, value: Value) {
        self.operands.push(value);
    }

    fn pop(&mut self) -> Value {
        self.operands
            .pop()
            .expect("malformed program: operand stack underflow")
    }

    fn close_frame(&mut self) -> Vec<Value> {
        let mark = self
            .frames
            .pop()
            .expect("malformed program: no open frame");
        self.operands.split_off(mark)
    }
}

/// One entry of the execution stack: a scope, a program, and the state of
/// its execution
pub struct ProcessContext {
    scope: Scope,
    program: Rc<Program>,
    state: ProcessState,
    callback: Option<Callback>,
    pending_command: Option<CommandHandle>,
    pending_data: Option<ResultData>,
}

impl fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessContext")
            .field("state", &self.state)
            .field("callback", &self.callback.is_some())
            .field("pending_command", &self.pending_command)
            .finish_non_exhaustive()
    }
}

impl ProcessContext {
    fn new(scope: Scope, program: Rc<Program>) -> Self {
        ProcessContext {
            scope,
            program,
            state: ProcessState::new(),
            callback: None,
            pending_command: None,
            pending_data: None,
        }
    }

    fn for_continuation(continuation: &Continuation) -> Self {
        ProcessContext {
            scope: continuation.scope.clone(),
            program: Rc::clone(&continuation.program),
            state: ProcessState::new(),
            callback: continuation.callback.clone(),
            pending_command: None,
            pending_data: None,
        }
    }

    /// Runs opcodes until the program ends or something interrupts it.
    fn step(&mut self) -> Step {
        let program = Rc::clone(&self.program);
        loop {
            let Some(opcode) = program.opcodes.get(self.state.pc) else {
                return Step::Done(self.state.last_result.clone());
            };
            self.state.pc += 1;
            match opcode {
                OpCode::PushConstant(index) => {
                    let value = program.constants[*index].clone();
                    self.state.push(value);
                }
                OpCode::PushNil => self.state.push(Value::Nil),
                OpCode::OpenFrame => {
                    // A top-level frame starts a new sentence.
                    if self.state.frames.is_empty() {
                        self.state.current_frame = None;
                    }
                    let mark = self.state.operands.len();
                    self.state.frames.push(mark);
                }
                OpCode::CloseFrameAsTuple => {
                    let values = self.state.close_frame();
                    self.state.push(Value::tuple(values));
                }
                OpCode::CloseFrameAsList => {
                    let values = self.state.close_frame();
                    self.state.push(Value::list(values));
                }
                OpCode::CloseFrameAsString | OpCode::JoinStrings => {
                    let values = self.state.close_frame();
                    let mut joined = String::new();
                    for value in &values {
                        match value.as_string() {
                            Ok(part) => joined.push_str(&part),
                            Err(error) => {
                                return Step::Abort(Outcome::error(error.to_string()))
                            }
                        }
                    }
                    self.state.push(Value::from(joined));
                }
                OpCode::SelectIndex => {
                    let index = self.state.pop();
                    if let Some(step) = self.select(Selector::Index(index)) {
                        return step;
                    }
                }
                OpCode::SelectKeys => {
                    let keys = self.state.pop();
                    let keys = match keys.elements() {
                        Ok(keys) => keys.to_vec(),
                        Err(error) => {
                            return Step::Abort(Outcome::error(error.to_string()))
                        }
                    };
                    if let Some(step) = self.select(Selector::Keys(keys)) {
                        return step;
                    }
                }
                OpCode::SelectRules => {
                    let rules = self.state.pop();
                    let rules = match rules.elements() {
                        Ok(rules) => rules.to_vec(),
                        Err(error) => {
                            return Step::Abort(Outcome::error(error.to_string()))
                        }
                    };
                    if let Some(step) = self.select(Selector::Rules(rules)) {
                        return step;
                    }
                }
                OpCode::EvaluateSentence { position } => {
                    if let Some(step) = self.evaluate_sentence(*position) {
                        return step;
                    }
                }
                OpCode::SubstituteResult => {
                    let value = self.state.last_result.value.clone();
                    self.state.push(value);
                }
                OpCode::ExpandValue => {
                    let value = self.state.pop();
                    match value.elements() {
                        Ok(elements) => {
                            let elements = elements.to_vec();
                            self.state.operands.extend(elements);
                        }
                        Err(error) => {
                            return Step::Abort(Outcome::error(error.to_string()))
                        }
                    }
                }
                OpCode::MakeScript(index) => {
                    self.state
                        .push(Value::Script(Rc::clone(&program.scripts[*index])));
                }
                OpCode::ResolveValue => {
                    let name = self.state.pop();
                    match self.scope.resolve_value(&name) {
                        Ok(value) => self.state.push(value),
                        Err(error) => return Step::Abort(error.into()),
                    }
                }
            }
        }
    }

    fn select(&mut self, selector: Selector) -> Option<Step> {
        let source = self.state.pop();
        match selector.apply(&source) {
            Ok(value) => {
                self.state.push(value);
                None
            }
            Err(error) => Some(Step::Abort(Outcome::error(error.to_string()))),
        }
    }

    fn evaluate_sentence(&mut self, position: Option<Position>) -> Option<Step> {
        let Value::List(items) = self.state.pop() else {
            panic!("malformed program: evaluating without an argument frame");
        };
        let mut args: Vec<Value> = (*items).clone();

        // Leading tuple auto-expansion: splice tuple heads into the
        // argument list.
        while matches!(args.first(), Some(Value::Tuple(_))) {
            let Value::Tuple(head) = args.remove(0) else {
                unreachable!();
            };
            args.splice(0..0, head.iter().cloned());
        }

        if args.is_empty() {
            self.state.last_result = Outcome::ok(Value::Nil);
            return None;
        }

        self.state.current_frame = Some((args.clone(), position));
        let command = match self.scope.resolve_command(&args[0]) {
            Ok(command) => command,
            Err(error) => return Some(Step::Abort(error.into())),
        };
        let result = command.command().execute(&args, &self.scope);
        accept_command_result(&mut self.state, result, &command)
    }
}

/// What a context step asks the trampoline to do next
enum Step {
    /// The program ran to completion.
    Done(Outcome),
    /// A non-OK result interrupts the program.
    Abort(Outcome),
    /// Push a new context.
    Push(Rc<Continuation>),
    /// Replace the current context (tailcall).
    Replace(Rc<Continuation>),
    /// Freeze the stack and surface the result to the host.
    Yield {
        result: Outcome,
        command: Option<CommandHandle>,
    },
}

/// Routes a command (or resume) result into the trampoline.
fn accept_command_result(
    state: &mut ProcessState,
    result: Outcome,
    command: &CommandHandle,
) -> Option<Step> {
    match result.code {
        ResultCode::Ok => {
            if let Value::Continuation(continuation) = &result.value {
                return Some(Step::Push(Rc::clone(continuation)));
            }
            state.last_result = result;
            None
        }
        ResultCode::Return => {
            if let Value::Continuation(continuation) = &result.value {
                return Some(Step::Replace(Rc::clone(continuation)));
            }
            Some(Step::Abort(result))
        }
        ResultCode::Yield => Some(Step::Yield {
            result,
            command: Some(command.clone()),
        }),
        _ => Some(Step::Abort(result)),
    }
}

/// Stack of process contexts
///
/// The depth is bounded only by the host; interpreted recursion grows this
/// stack, never the host call stack.
#[derive(Debug, Default)]
pub struct ExecutionStack {
    contexts: Vec<ProcessContext>,
}

impl ExecutionStack {
    /// Number of contexts on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.contexts.len()
    }

    fn push(&mut self, context: ProcessContext) {
        self.contexts.push(context);
    }

    fn pop(&mut self) -> Option<ProcessContext> {
        self.contexts.pop()
    }

    fn last_mut(&mut self) -> Option<&mut ProcessContext> {
        self.contexts.last_mut()
    }

    fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Configuration of a process
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProcessOptions {
    /// Whether error outcomes collect an error stack
    pub capture_error_stack: bool,
}

impl ProcessOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether error stacks are captured.
    #[must_use]
    pub fn capture_error_stack(mut self, capture: bool) -> Self {
        self.capture_error_stack = capture;
        self
    }
}

/// Suspendable, resumable execution of a program
pub struct Process {
    stack: ExecutionStack,
    options: ProcessOptions,
    staged: Option<Value>,
    yielded: Option<Value>,
    suspended: bool,
    done: Option<Outcome>,
}

impl Process {
    /// Creates a process that will run a program in a scope.
    #[must_use]
    pub fn new(scope: Scope, program: Rc<Program>, options: ProcessOptions) -> Self {
        let mut stack = ExecutionStack::default();
        stack.push(ProcessContext::new(scope, program));
        Process {
            stack,
            options,
            staged: None,
            yielded: None,
            suspended: false,
            done: None,
        }
    }

    /// Returns true once the process has produced its final result.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.done.is_some()
    }

    /// Current depth of the execution stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Stages a value for the suspended frame.
    ///
    /// The staged value replaces the next sub-result the frame consumes when
    /// the process resumes.
    pub fn yield_back(&mut self, value: Value) {
        self.staged = Some(value);
    }

    /// Runs until completion or the next suspension.
    ///
    /// A finished process keeps returning its final result.
    pub fn run(&mut self) -> Outcome {
        if let Some(done) = &self.done {
            return done.clone();
        }

        let mut pending = self.resume_step();
        loop {
            let step = match pending.take() {
                Some(step) => step,
                None => match self.stack.last_mut() {
                    Some(context) => context.step(),
                    None => {
                        let result = Outcome::ok(Value::Nil);
                        self.done = Some(result.clone());
                        return result;
                    }
                },
            };
            match step {
                Step::Done(result) | Step::Abort(result) => {
                    if let Some(final_result) = self.unwind(result) {
                        return final_result;
                    }
                }
                Step::Push(continuation) => {
                    self.stack
                        .push(ProcessContext::for_continuation(&continuation));
                }
                Step::Replace(continuation) => {
                    let mut context = ProcessContext::for_continuation(&continuation);
                    if let Some(top) = self.stack.last_mut() {
                        // The replaced frame's handler stays in the chain.
                        context.callback =
                            compose_callbacks(context.callback.take(), top.callback.take());
                        *top = context;
                    } else {
                        self.stack.push(context);
                    }
                }
                Step::Yield { result, command } => {
                    if let Some(top) = self.stack.last_mut() {
                        top.pending_command = command;
                        top.pending_data = result.data.clone();
                    }
                    self.yielded = Some(result.value.clone());
                    self.suspended = true;
                    return result;
                }
            }
        }
    }

    /// Restarts a suspended process by delivering the staged value.
    fn resume_step(&mut self) -> Option<Step> {
        if !self.suspended {
            return None;
        }
        self.suspended = false;
        let value = self
            .staged
            .take()
            .or_else(|| self.yielded.take())
            .unwrap_or(Value::Nil);
        self.yielded = None;
        let context = self.stack.last_mut()?;
        match context.pending_command.take() {
            Some(command) => {
                let input = Outcome {
                    code: ResultCode::Ok,
                    value,
                    data: context.pending_data.take(),
                };
                let result = command.command().resume(input, &context.scope);
                accept_command_result(&mut context.state, result, &command)
            }
            None => {
                context.state.last_result = Outcome::ok(value);
                None
            }
        }
    }

    /// Pops finished or interrupted contexts, applying callbacks, until a
    /// context can continue or the stack empties.
    ///
    /// Returns the outcome to surface to the host, or `None` when execution
    /// continues in a parent context.
    fn unwind(&mut self, mut result: Outcome) -> Option<Outcome> {
        loop {
            let Some(context) = self.stack.pop() else {
                self.done = Some(result.clone());
                return Some(result);
            };
            if result.code == ResultCode::Error && self.options.capture_error_stack {
                if let Some((frame, position)) = context.state.current_frame.clone() {
                    push_error_frame(&mut result, frame, position);
                }
            }
            if let Some(callback) = &context.callback {
                result = callback(result);
            }
            match result.code {
                ResultCode::Ok => match self.stack.last_mut() {
                    Some(parent) => {
                        parent.state.last_result = result;
                        return None;
                    }
                    None => {
                        self.done = Some(result.clone());
                        return Some(result);
                    }
                },
                ResultCode::Yield => {
                    // A callback suspended; resumption feeds the parent's
                    // next sub-result.
                    self.yielded = Some(result.value.clone());
                    self.suspended = !self.stack.is_empty();
                    if self.stack.is_empty() {
                        self.done = Some(result.clone());
                    }
                    return Some(result);
                }
                _ => {
                    if self.stack.is_empty() {
                        let result = at_top_level(result);
                        self.done = Some(result.clone());
                        return Some(result);
                    }
                }
            }
        }
    }
}

/// Converts codes that may not escape to the host.
fn at_top_level(result: Outcome) -> Outcome {
    match result.code {
        ResultCode::Break => Outcome::error("unexpected break"),
        ResultCode::Continue => Outcome::error("unexpected continue"),
        _ => result,
    }
}

/// Appends a call frame to the outcome's error stack.
///
/// Opaque command data is left alone; capture only ever creates or extends
/// an error stack.
fn push_error_frame(result: &mut Outcome, frame: Vec<Value>, position: Option<Position>) {
    match &mut result.data {
        Some(ResultData::ErrorStack(stack)) => {
            stack.push(ErrorStackEntry { frame, position });
        }
        Some(ResultData::Custom(_)) => {}
        None => {
            let mut stack = ErrorStack::default();
            stack.push(ErrorStackEntry { frame, position });
            result.data = Some(ResultData::ErrorStack(stack));
        }
    }
}

/// Chains two callbacks, innermost first.
fn compose_callbacks(inner: Option<Callback>, outer: Option<Callback>) -> Option<Callback> {
    match (inner, outer) {
        (None, callback) | (callback, None) => callback,
        (Some(inner), Some(outer)) => Some(Rc::new(move |result| outer(inner(result)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::scope::ScopeOptions;
    use crate::value::ValueError;
    use assert_matches::assert_matches;
    use helena_syntax::syntax::Script;

    struct Idem;
    impl Command for Idem {
        fn execute(&self, args: &[Value], _scope: &Scope) -> Outcome {
            Outcome::ok(args.get(1).cloned().unwrap_or(Value::Nil))
        }
    }

    fn scope_with_idem() -> Scope {
        let scope = Scope::new_root(ScopeOptions::default());
        scope.register_named_command("idem", Idem);
        scope
    }

    fn run(scope: &Scope, source: &str) -> Outcome {
        let script: Script = source.parse().unwrap();
        scope.execute_script(&script)
    }

    #[test]
    fn empty_program_produces_nil() {
        let scope = scope_with_idem();
        let outcome = run(&scope, "");
        assert_eq!(outcome.code, ResultCode::Ok);
        assert_eq!(outcome.value, Value::Nil);
    }

    #[test]
    fn last_sentence_wins() {
        let scope = scope_with_idem();
        let outcome = run(&scope, "idem a; idem b");
        assert_eq!(outcome.code, ResultCode::Ok);
        assert_eq!(outcome.value, Value::from("b"));
    }

    #[test]
    fn expressions_substitute_results() {
        let scope = scope_with_idem();
        let outcome = run(&scope, "idem a[idem b]c");
        assert_eq!(outcome.value, Value::from("abc"));
    }

    #[test]
    fn substitutions_resolve_variables() {
        let scope = scope_with_idem();
        scope.set_variable("x", Value::from("val")).unwrap();
        assert_eq!(run(&scope, "idem $x").value, Value::from("val"));

        // Double resolution follows the indirection.
        scope.set_variable("name", Value::from("x")).unwrap();
        assert_eq!(run(&scope, "idem $$name").value, Value::from("val"));
    }

    #[test]
    fn substitution_with_selectors() {
        let scope = scope_with_idem();
        let list = Value::list([Value::from("a"), Value::from("b")]);
        scope.set_variable("l", list).unwrap();
        assert_eq!(run(&scope, "idem $l[1]").value, Value::from("b"));

        let dict = Value::dict([("k", Value::from("v"))]);
        scope.set_variable("d", dict).unwrap();
        assert_eq!(run(&scope, "idem $d(k)").value, Value::from("v"));
    }

    #[test]
    fn expansion_splices_arguments() {
        let scope = scope_with_idem();
        scope
            .set_variable("args", Value::tuple([Value::from("idem"), Value::from("x")]))
            .unwrap();
        assert_eq!(run(&scope, "$*args").value, Value::from("x"));
    }

    #[test]
    fn unknown_command_errors() {
        let scope = scope_with_idem();
        let outcome = run(&scope, "nothing");
        assert!(outcome.is_error());
        assert_eq!(outcome.value, Value::from("unknown command \"nothing\""));
    }

    #[test]
    fn unknown_variable_errors() {
        let scope = scope_with_idem();
        let outcome = run(&scope, "idem $missing");
        assert!(outcome.is_error());
        assert_eq!(
            outcome.value,
            Value::from("cannot get \"missing\": no such variable")
        );
    }

    #[test]
    fn invalid_expansion_errors() {
        let scope = scope_with_idem();
        scope.set_variable("x", Value::Integer(1)).unwrap();
        let outcome = run(&scope, "idem $*x");
        assert!(outcome.is_error());
        assert_eq!(
            outcome.value,
            Value::from(ValueError::InvalidList.to_string())
        );
    }

    #[test]
    fn finished_processes_repeat_their_result() {
        let scope = scope_with_idem();
        let script: Script = "idem done".parse().unwrap();
        let mut process = scope.prepare_script(&script).unwrap();
        assert!(!process.finished());
        let first = process.run();
        assert!(process.finished());
        let second = process.run();
        assert_eq!(first.value, second.value);
    }

    #[test]
    fn blocks_evaluate_to_script_values() {
        let scope = scope_with_idem();
        let outcome = run(&scope, "idem {a b}");
        assert_matches!(outcome.value, Value::Script(script) => {
            assert_eq!(script.source.as_deref(), Some("a b"));
            assert_eq!(script.script.sentences.len(), 1);
        });
    }

    #[test]
    fn here_strings_evaluate_to_strings() {
        let scope = scope_with_idem();
        let outcome = run(&scope, "idem \"\"\"verbatim $x\"\"\"");
        assert_eq!(outcome.value, Value::from("verbatim $x"));
    }
}
