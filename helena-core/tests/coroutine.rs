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

//! Cooperative suspension: yield, yield_back, and command resumption.

mod common;

use common::test_scope;
use helena_core::command::Command;
use helena_core::process::Process;
use helena_core::result::{Outcome, ResultCode, ResultData};
use helena_core::scope::{Scope, ScopeOptions};
use helena_core::value::Value;
use helena_syntax::syntax::Script;
use std::rc::Rc;

fn prepare(scope: &Scope, source: &str) -> Process {
    let script: Script = source.parse().unwrap();
    scope.prepare_script(&script).unwrap()
}

#[test]
fn yield_suspends_and_run_resumes() {
    let scope = test_scope(ScopeOptions::default());
    scope.execute_script(&"macro cmd {} {yield val1; idem val2}".parse().unwrap());

    let mut process = prepare(&scope, "cmd");
    let first = process.run();
    assert_eq!(first.code, ResultCode::Yield);
    assert_eq!(first.value, Value::from("val1"));
    assert!(!process.finished());

    let second = process.run();
    assert_eq!(second.code, ResultCode::Ok);
    assert_eq!(second.value, Value::from("val2"));
    assert!(process.finished());
}

#[test]
fn yield_back_stages_the_next_sub_result() {
    let scope = test_scope(ScopeOptions::default());
    scope.execute_script(&"macro cmd {} {idem [yield ignored]}".parse().unwrap());

    let mut process = prepare(&scope, "cmd");
    let first = process.run();
    assert_eq!(first.code, ResultCode::Yield);
    assert_eq!(first.value, Value::from("ignored"));

    process.yield_back(Value::from("staged"));
    let second = process.run();
    assert_eq!(second.code, ResultCode::Ok);
    assert_eq!(second.value, Value::from("staged"));
}

#[test]
fn resume_without_staged_value_keeps_the_yielded_one() {
    let scope = test_scope(ScopeOptions::default());
    scope.execute_script(&"macro cmd {} {idem [yield kept]}".parse().unwrap());

    let mut process = prepare(&scope, "cmd");
    process.run();
    let outcome = process.run();
    assert_eq!(outcome.value, Value::from("kept"));
}

#[test]
fn yield_resume_fidelity_matches_inlined_values() {
    // `run; yield_back(V'); run` on a script yielding V is the same as
    // evaluating the script with the values inlined.
    let scope = test_scope(ScopeOptions::default());
    scope.execute_script(&"macro cmd {} {+ 1 [yield 0]}".parse().unwrap());

    let mut process = prepare(&scope, "cmd");
    process.run();
    process.yield_back(Value::Integer(41));
    let resumed = process.run();

    let inlined = scope.execute_script(&"+ 1 41".parse().unwrap());
    assert_eq!(resumed.code, inlined.code);
    assert_eq!(resumed.value, inlined.value);
}

#[test]
fn commands_thread_state_through_suspensions() {
    /// Yields twice, carrying a step counter in the result data.
    struct TwoStep;

    impl Command for TwoStep {
        fn execute(&self, _args: &[Value], _scope: &Scope) -> Outcome {
            Outcome::yield_value(Value::from("first"))
                .with_data(ResultData::Custom(Rc::new(1u32)))
        }

        fn resume(&self, result: Outcome, _scope: &Scope) -> Outcome {
            let step = match &result.data {
                Some(ResultData::Custom(data)) => {
                    data.downcast_ref::<u32>().copied().unwrap_or(0)
                }
                _ => 0,
            };
            match step {
                1 => Outcome::yield_value(Value::from("second"))
                    .with_data(ResultData::Custom(Rc::new(2u32))),
                _ => Outcome::ok(result.value),
            }
        }
    }

    let scope = test_scope(ScopeOptions::default());
    scope.register_named_command("twostep", TwoStep);

    let mut process = prepare(&scope, "twostep");
    assert_eq!(process.run().value, Value::from("first"));
    assert_eq!(process.run().value, Value::from("second"));

    process.yield_back(Value::from("reply"));
    let outcome = process.run();
    assert_eq!(outcome.code, ResultCode::Ok);
    assert_eq!(outcome.value, Value::from("reply"));
    assert!(process.finished());
}

#[test]
fn yields_bubble_through_nested_continuations() {
    let scope = test_scope(ScopeOptions::default());
    scope.execute_script(&"macro inner {} {yield deep}".parse().unwrap());
    scope.execute_script(&"macro outer {} {inner; idem after}".parse().unwrap());

    let mut process = prepare(&scope, "outer");
    let first = process.run();
    assert_eq!(first.code, ResultCode::Yield);
    assert_eq!(first.value, Value::from("deep"));
    // Two continuation contexts on top of the root are frozen.
    assert_eq!(process.depth(), 3);

    let second = process.run();
    assert_eq!(second.code, ResultCode::Ok);
    assert_eq!(second.value, Value::from("after"));
}

#[test]
fn suspended_processes_can_be_dropped() {
    let scope = test_scope(ScopeOptions::default());
    scope.execute_script(&"macro cmd {} {yield pending}".parse().unwrap());
    let mut process = prepare(&scope, "cmd");
    assert_eq!(process.run().code, ResultCode::Yield);
    drop(process);
    // The scope stays usable after abandoning the process.
    let outcome = scope.execute_script(&"idem ok".parse().unwrap());
    assert_eq!(outcome.value, Value::from("ok"));
}

#[test]
fn each_process_owns_its_execution_state() {
    let scope = test_scope(ScopeOptions::default());
    scope.execute_script(&"macro cmd {} {idem [yield v]}".parse().unwrap());

    let mut a = prepare(&scope, "cmd");
    let mut b = prepare(&scope, "cmd");
    a.run();
    b.run();
    a.yield_back(Value::from("a"));
    b.yield_back(Value::from("b"));
    assert_eq!(a.run().value, Value::from("a"));
    assert_eq!(b.run().value, Value::from("b"));
}
