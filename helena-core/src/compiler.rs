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

//! Script compiler
//!
//! The compiler lowers a [`Script`] into a [`Program`]: a linear opcode
//! sequence with inlined constant and script pools. Compilation is a pure
//! function of the AST, so the same script always produces the same program.
//!
//! Each sentence opens an operand frame, pushes one value per word, closes
//! the frame as a list, and evaluates it as a command invocation. How a word
//! produces its value depends on its [`WordType`]:
//!
//! - a root word pushes its single morpheme's value;
//! - a compound word joins its parts into a string;
//! - a substitution resolves its source once per `$` marker and applies its
//!   selectors in order;
//! - a qualified word pushes a [qualified](crate::value::QualifiedValue)
//!   reference and appends its selectors to it;
//! - comment words compile to nothing;
//! - invalid words fail compilation.

use crate::value::{QualifiedValue, ScriptValue, Value};
use helena_syntax::source::Position;
use helena_syntax::syntax::{Morpheme, MorphemeKind, Script, Word, WordType};
use std::rc::Rc;
use thiserror::Error;

/// Errors from compilation
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum CompileError {
    /// A word's morpheme pattern fits no word type.
    #[error("invalid word structure")]
    InvalidWordStructure,
}

/// Program instruction
///
/// Operand-stack effects are relative to the current frame; frames nest with
/// sub-evaluation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OpCode {
    /// Push a value from the constant pool.
    PushConstant(usize),
    /// Push nil.
    PushNil,
    /// Mark the start of a new operand frame.
    OpenFrame,
    /// Close the frame into a tuple value.
    CloseFrameAsTuple,
    /// Close the frame into a string by joining the coerced parts.
    CloseFrameAsString,
    /// Close the frame into a list value.
    CloseFrameAsList,
    /// Pop an index and a source; push the selected element.
    SelectIndex,
    /// Pop a key tuple and a source; push the entry the keys drill to.
    SelectKeys,
    /// Pop a rule tuple and a source; push the rules-selected value.
    SelectRules,
    /// Pop an argument list and invoke its head as a command.
    EvaluateSentence {
        /// Source position of the sentence, for error stacks
        position: Option<Position>,
    },
    /// Push the value of the last sentence result.
    SubstituteResult,
    /// Close the frame into a string; alias of `CloseFrameAsString` emitted
    /// for interpolated strings.
    JoinStrings,
    /// Pop a value and splice its elements into the current frame.
    ExpandValue,
    /// Push a fresh script value from the script pool.
    MakeScript(usize),
    /// Pop a name (or name tuple) and push the resolved variable value(s).
    ResolveValue,
}

/// Compiled form of a script
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    /// Instructions
    pub opcodes: Vec<OpCode>,
    /// Constant pool
    pub constants: Vec<Value>,
    /// Script pool for [`OpCode::MakeScript`]
    pub scripts: Vec<Rc<ScriptValue>>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, opcode: OpCode) {
        self.opcodes.push(opcode);
    }

    fn emit_constant(&mut self, value: Value) {
        self.constants.push(value);
        self.emit(OpCode::PushConstant(self.constants.len() - 1));
    }

    fn emit_script(&mut self, script: ScriptValue) {
        self.scripts.push(Rc::new(script));
        self.emit(OpCode::MakeScript(self.scripts.len() - 1));
    }
}

/// Script-to-program translator
///
/// The compiler holds no state between compilations; it lives in the
/// [`Scope`](crate::scope::Scope) that owns it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Compiler;

impl Compiler {
    /// Creates a compiler.
    #[must_use]
    pub fn new() -> Self {
        Compiler
    }

    /// Compiles a script into a program.
    pub fn compile(&self, script: &Script) -> Result<Program, CompileError> {
        let mut program = Program::new();
        self.compile_script(&mut program, script)?;
        Ok(program)
    }

    fn compile_script(
        &self,
        program: &mut Program,
        script: &Script,
    ) -> Result<(), CompileError> {
        for sentence in &script.sentences {
            let words: Vec<&Word> = sentence
                .words
                .iter()
                .filter(|word| word.word_type() != WordType::Ignored)
                .collect();
            if words.is_empty() {
                continue;
            }
            program.emit(OpCode::OpenFrame);
            for word in words {
                self.compile_word(program, word)?;
            }
            program.emit(OpCode::CloseFrameAsList);
            program.emit(OpCode::EvaluateSentence { position: sentence.position });
        }
        Ok(())
    }

    fn compile_word(&self, program: &mut Program, word: &Word) -> Result<(), CompileError> {
        match word.word_type() {
            WordType::Root => self.compile_root(program, &word.morphemes[0]),
            WordType::Compound => self.compile_parts(program, &word.morphemes),
            WordType::Substitution => {
                self.compile_substitution(program, &word.morphemes, true)
            }
            WordType::Qualified => self.compile_qualified(program, &word.morphemes),
            WordType::Ignored => Ok(()),
            WordType::Invalid => Err(CompileError::InvalidWordStructure),
        }
    }

    fn compile_root(
        &self,
        program: &mut Program,
        morpheme: &Morpheme,
    ) -> Result<(), CompileError> {
        match &morpheme.kind {
            MorphemeKind::Literal(text) => {
                program.emit_constant(Value::from(text.as_str()));
                Ok(())
            }
            MorphemeKind::Tuple(subscript) => self.compile_tuple(program, subscript),
            MorphemeKind::Block { subscript, raw_text } => {
                program.emit_script(ScriptValue::with_source(
                    Rc::new(subscript.clone()),
                    raw_text,
                ));
                Ok(())
            }
            MorphemeKind::Expression(subscript) => {
                self.compile_expression(program, subscript)
            }
            MorphemeKind::String(parts) => {
                program.emit(OpCode::OpenFrame);
                self.compile_string_parts(program, parts)?;
                program.emit(OpCode::JoinStrings);
                Ok(())
            }
            MorphemeKind::HereString { text, .. }
            | MorphemeKind::TaggedString { text, .. } => {
                program.emit_constant(Value::from(text.as_str()));
                Ok(())
            }
            _ => Err(CompileError::InvalidWordStructure),
        }
    }

    /// Compiles a tuple word into frame-building opcodes.
    fn compile_tuple(
        &self,
        program: &mut Program,
        subscript: &Script,
    ) -> Result<(), CompileError> {
        program.emit(OpCode::OpenFrame);
        for sentence in &subscript.sentences {
            for word in &sentence.words {
                if word.word_type() == WordType::Ignored {
                    continue;
                }
                self.compile_word(program, word)?;
            }
        }
        program.emit(OpCode::CloseFrameAsTuple);
        Ok(())
    }

    /// Compiles an expression: its sentences evaluate in place and the final
    /// result is substituted as a value.
    fn compile_expression(
        &self,
        program: &mut Program,
        subscript: &Script,
    ) -> Result<(), CompileError> {
        if subscript.sentences.is_empty() {
            program.emit(OpCode::PushNil);
            return Ok(());
        }
        self.compile_script(program, subscript)?;
        program.emit(OpCode::SubstituteResult);
        Ok(())
    }

    /// Compiles compound word morphemes or string parts into a string join.
    ///
    /// Expansion markers have no frame of their own to splice into here, so
    /// the flag is ignored and the value joins in place.
    fn compile_parts(
        &self,
        program: &mut Program,
        morphemes: &[Morpheme],
    ) -> Result<(), CompileError> {
        program.emit(OpCode::OpenFrame);
        self.compile_string_parts(program, morphemes)?;
        program.emit(OpCode::CloseFrameAsString);
        Ok(())
    }

    fn compile_string_parts(
        &self,
        program: &mut Program,
        morphemes: &[Morpheme],
    ) -> Result<(), CompileError> {
        let mut i = 0;
        while i < morphemes.len() {
            match &morphemes[i].kind {
                MorphemeKind::Literal(text) => {
                    program.emit_constant(Value::from(text.as_str()));
                    i += 1;
                }
                MorphemeKind::Expression(subscript) => {
                    self.compile_expression(program, subscript)?;
                    i += 1;
                }
                MorphemeKind::SubstituteNext { .. } => {
                    let len = substitution_group_len(&morphemes[i..]);
                    self.compile_substitution(program, &morphemes[i..i + len], false)?;
                    i += len;
                }
                _ => return Err(CompileError::InvalidWordStructure),
            }
        }
        Ok(())
    }

    /// Compiles a substitution: source, resolutions, then selectors.
    ///
    /// `expand` enables the expansion marker; it only applies at word level,
    /// where an enclosing frame exists to splice into.
    fn compile_substitution(
        &self,
        program: &mut Program,
        morphemes: &[Morpheme],
        expand: bool,
    ) -> Result<(), CompileError> {
        let markers = morphemes
            .iter()
            .take_while(|m| matches!(m.kind, MorphemeKind::SubstituteNext { .. }))
            .count();
        let expansion = expand
            && matches!(
                morphemes[0].kind,
                MorphemeKind::SubstituteNext { expansion: true }
            );
        let Some(source) = morphemes.get(markers) else {
            return Err(CompileError::InvalidWordStructure);
        };

        let mut resolutions = markers;
        match &source.kind {
            MorphemeKind::Literal(name) => {
                program.emit_constant(Value::from(name.as_str()));
            }
            MorphemeKind::Block { raw_text, .. } => {
                program.emit_constant(Value::from(raw_text.as_str()));
            }
            MorphemeKind::Tuple(subscript) => self.compile_tuple(program, subscript)?,
            MorphemeKind::Expression(subscript) => {
                // The expression supplies a value, not a name.
                self.compile_expression(program, subscript)?;
                resolutions -= 1;
            }
            _ => return Err(CompileError::InvalidWordStructure),
        }
        for _ in 0..resolutions {
            program.emit(OpCode::ResolveValue);
        }

        self.compile_selectors(program, &morphemes[markers + 1..])?;
        if expansion {
            program.emit(OpCode::ExpandValue);
        }
        Ok(())
    }

    fn compile_qualified(
        &self,
        program: &mut Program,
        morphemes: &[Morpheme],
    ) -> Result<(), CompileError> {
        let source = match &morphemes[0].kind {
            MorphemeKind::Literal(name) => Value::from(name.as_str()),
            MorphemeKind::Block { raw_text, .. } => Value::from(raw_text.as_str()),
            MorphemeKind::Tuple(subscript) => {
                // Qualified sources are addresses; tuple roots must be
                // static names.
                let mut names = Vec::new();
                for sentence in &subscript.sentences {
                    for word in &sentence.words {
                        match word.morphemes.as_slice() {
                            [Morpheme { kind: MorphemeKind::Literal(name), .. }] => {
                                names.push(Value::from(name.as_str()));
                            }
                            _ => return Err(CompileError::InvalidWordStructure),
                        }
                    }
                }
                Value::tuple(names)
            }
            _ => return Err(CompileError::InvalidWordStructure),
        };
        program.emit_constant(Value::Qualified(Rc::new(QualifiedValue::new(source))));
        self.compile_selectors(program, &morphemes[1..])
    }

    fn compile_selectors(
        &self,
        program: &mut Program,
        morphemes: &[Morpheme],
    ) -> Result<(), CompileError> {
        for morpheme in morphemes {
            match &morpheme.kind {
                MorphemeKind::Expression(subscript) => {
                    self.compile_expression(program, subscript)?;
                    program.emit(OpCode::SelectIndex);
                }
                MorphemeKind::Tuple(subscript) => {
                    self.compile_tuple(program, subscript)?;
                    program.emit(OpCode::SelectKeys);
                }
                MorphemeKind::Block { subscript, .. } => {
                    self.compile_tuple(program, subscript)?;
                    program.emit(OpCode::SelectRules);
                }
                _ => return Err(CompileError::InvalidWordStructure),
            }
        }
        Ok(())
    }
}

/// Length of the substitution group starting at a marker: the marker run,
/// its source, and any selectors.
fn substitution_group_len(morphemes: &[Morpheme]) -> usize {
    use MorphemeKind::*;
    let mut i = morphemes
        .iter()
        .take_while(|m| matches!(m.kind, SubstituteNext { .. }))
        .count();
    if i < morphemes.len()
        && matches!(
            morphemes[i].kind,
            Literal(_) | Tuple(_) | Block { .. } | Expression(_)
        )
    {
        i += 1;
        while i < morphemes.len()
            && matches!(morphemes[i].kind, Tuple(_) | Block { .. } | Expression(_))
        {
            i += 1;
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use helena_syntax::parser::{ParseOptions, Parser};
    use helena_syntax::tokenizer::tokenize;

    fn compile(source: &str) -> Program {
        let script = source.parse().unwrap();
        Compiler::new().compile(&script).unwrap()
    }

    #[test]
    fn simple_sentence() {
        let program = compile("cmd arg");
        assert_eq!(
            program.opcodes,
            [
                OpCode::OpenFrame,
                OpCode::PushConstant(0),
                OpCode::PushConstant(1),
                OpCode::CloseFrameAsList,
                OpCode::EvaluateSentence { position: None },
            ]
        );
        assert_eq!(program.constants, [Value::from("cmd"), Value::from("arg")]);
    }

    #[test]
    fn comment_only_sentences_compile_to_nothing() {
        let program = compile("# note\n#{ also }#\n");
        assert_eq!(program.opcodes, []);
    }

    #[test]
    fn substitution_resolves_once_per_marker() {
        let program = compile("cmd $$x");
        let resolves = program
            .opcodes
            .iter()
            .filter(|op| **op == OpCode::ResolveValue)
            .count();
        assert_eq!(resolves, 2);
    }

    #[test]
    fn expression_source_skips_one_resolution() {
        let program = compile("cmd $[e]");
        let resolves = program
            .opcodes
            .iter()
            .filter(|op| **op == OpCode::ResolveValue)
            .count();
        assert_eq!(resolves, 0);
        assert!(program.opcodes.contains(&OpCode::SubstituteResult));
    }

    #[test]
    fn selectors_compile_in_order() {
        let program = compile("cmd $x[1](k){r}");
        let selects: Vec<&OpCode> = program
            .opcodes
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    OpCode::SelectIndex | OpCode::SelectKeys | OpCode::SelectRules
                )
            })
            .collect();
        assert_eq!(
            selects,
            [&OpCode::SelectIndex, &OpCode::SelectKeys, &OpCode::SelectRules]
        );
    }

    #[test]
    fn expansion_emits_expand_value() {
        let program = compile("cmd $*args");
        assert!(program.opcodes.contains(&OpCode::ExpandValue));
    }

    #[test]
    fn expansion_is_ignored_inside_strings() {
        let program = compile("cmd \"a $*x b\"");
        assert!(!program.opcodes.contains(&OpCode::ExpandValue));
        assert!(program.opcodes.contains(&OpCode::JoinStrings));
    }

    #[test]
    fn blocks_enter_the_script_pool() {
        let program = compile("cmd {a b}");
        assert_eq!(program.scripts.len(), 1);
        assert_eq!(program.scripts[0].source.as_deref(), Some("a b"));
        assert!(program.opcodes.contains(&OpCode::MakeScript(0)));
    }

    #[test]
    fn qualified_words_push_references() {
        let program = compile("cmd x[0]");
        let qualified = program
            .constants
            .iter()
            .find(|value| matches!(value, Value::Qualified(_)));
        assert!(qualified.is_some());
        assert!(program.opcodes.contains(&OpCode::SelectIndex));
    }

    #[test]
    fn invalid_words_fail_compilation() {
        let script = "cmd [e]{b}".parse().unwrap();
        assert_eq!(
            Compiler::new().compile(&script),
            Err(CompileError::InvalidWordStructure)
        );
    }

    #[test]
    fn compilation_is_deterministic() {
        let source = "cmd $x[1] \"a $y\" {block}; other (t u)";
        assert_eq!(compile(source), compile(source));
    }

    #[test]
    fn sentence_positions_reach_the_program() {
        let mut parser = Parser::with_options(ParseOptions::new().capture_positions(true));
        let script = parser.parse(tokenize("a\nb")).unwrap();
        let program = Compiler::new().compile(&script).unwrap();
        let positions: Vec<Option<Position>> = program
            .opcodes
            .iter()
            .filter_map(|op| match op {
                OpCode::EvaluateSentence { position } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].unwrap().line, 0);
        assert_eq!(positions[1].unwrap().line, 1);
    }
}
