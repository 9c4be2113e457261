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

//! Script language syntax
//!
//! This module contains types that represent abstract syntax trees (ASTs) of
//! Helena scripts.
//!
//! ## Syntactic elements
//!
//! The AST type that represents a whole script is [`Script`], a vector of
//! [`Sentence`]s. A sentence is the unit of command invocation: a sequence of
//! [`Word`]s where the first word names the command and the rest are its
//! arguments. A word is a sequence of [`Morpheme`]s, the smallest tagged AST
//! units: literals, tuples, blocks, expressions, strings, comments, and
//! substitution markers.
//!
//! ## Classification
//!
//! A word does not carry its syntactic role explicitly; the role is derived
//! from the morpheme pattern by [`Word::word_type`], which returns a
//! [`WordType`]. Invalid combinations parse fine but classify as
//! [`WordType::Invalid`] and are rejected at compile time.
//!
//! ## Parsing and displaying
//!
//! `Script` implements [`FromStr`](std::str::FromStr), so you can get an AST
//! out of source code by calling `parse` on a `&str`. ASTs constructed this
//! way carry no positions; to include them, drive a
//! [parser](crate::parser::Parser) with position capture enabled. Most AST
//! types support [`Display`](std::fmt::Display), producing equivalent (not
//! byte-identical) source code.
//!
//! ```
//! use helena_syntax::syntax::{Script, WordType};
//! let script: Script = "cmd $x[1]; other".parse().unwrap();
//! assert_eq!(script.sentences.len(), 2);
//! assert_eq!(script.sentences[0].words[1].word_type(), WordType::Substitution);
//! ```

use crate::source::Position;

mod impl_display;

/// Smallest tagged AST unit within a word
///
/// The payload lives in [`MorphemeKind`]; this node adds the optional source
/// position attached when position capture is enabled.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Morpheme {
    /// Content of this morpheme
    pub kind: MorphemeKind,
    /// Position of the first character of this morpheme
    pub position: Option<Position>,
}

impl Morpheme {
    /// Creates a morpheme without a position.
    #[must_use]
    pub fn new(kind: MorphemeKind) -> Self {
        Morpheme { kind, position: None }
    }
}

/// Morpheme payload
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MorphemeKind {
    /// Run of literal text, escapes already decoded
    Literal(String),
    /// Parenthesized word sequence, `(…)`
    Tuple(Script),
    /// Braced script, `{…}`
    ///
    /// The block keeps both the parsed subscript and the raw source slice
    /// between the braces, with continuation sequences collapsed to a single
    /// space. The raw text is the string representation of the block value.
    Block {
        /// Parsed content of the block
        subscript: Script,
        /// Literal slice between the braces, normalized for continuations
        raw_text: String,
    },
    /// Bracketed script evaluated in place, `[…]`
    Expression(Script),
    /// Interpolated string, `"…"`
    ///
    /// Parts are a constrained subset of morphemes: literals, expressions,
    /// substitution markers, and the tuples/blocks belonging to a
    /// substitution.
    String(Vec<Morpheme>),
    /// Verbatim string delimited by three or more double quotes
    HereString {
        /// Text between the delimiters
        text: String,
        /// Number of quotes in the delimiter
        delim_length: usize,
    },
    /// Verbatim multi-line string delimited by `""TAG … TAG""`
    TaggedString {
        /// Collected body, dedented by the closing line's indent
        text: String,
        /// Tag naming the delimiter
        tag: String,
    },
    /// Comment running to the end of the line
    LineComment {
        /// Text after the delimiter
        text: String,
        /// Number of `#` characters in the delimiter
        delim_length: usize,
    },
    /// Nestable delimited comment, `#{…}#`
    BlockComment {
        /// Text between the delimiters
        text: String,
        /// Number of `#` characters in the delimiters
        delim_length: usize,
    },
    /// Substitution marker, `$` or `$*`
    SubstituteNext {
        /// Whether the resolved value expands into the surrounding frame
        expansion: bool,
    },
}

impl MorphemeKind {
    /// Returns the marker text of a substitution morpheme.
    ///
    /// # Panics
    ///
    /// If `self` is not `SubstituteNext`.
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            MorphemeKind::SubstituteNext { expansion: false } => "$",
            MorphemeKind::SubstituteNext { expansion: true } => "$*",
            _ => panic!("not a substitution marker: {self:?}"),
        }
    }

    /// Returns true for morphemes that can stand alone as a word.
    #[must_use]
    fn is_root(&self) -> bool {
        use MorphemeKind::*;
        matches!(
            self,
            Literal(_)
                | Tuple(_)
                | Block { .. }
                | Expression(_)
                | String(_)
                | HereString { .. }
                | TaggedString { .. }
        )
    }

    /// Returns true for morphemes that can be the source of a substitution.
    #[must_use]
    fn is_source(&self) -> bool {
        use MorphemeKind::*;
        matches!(self, Literal(_) | Tuple(_) | Block { .. } | Expression(_))
    }

    /// Returns true for morphemes that act as selectors after a source.
    #[must_use]
    fn is_selector(&self) -> bool {
        use MorphemeKind::*;
        matches!(self, Tuple(_) | Block { .. } | Expression(_))
    }
}

/// Ordered sequence of morphemes; the unit of value production
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Word {
    /// Morphemes that constitute the word
    pub morphemes: Vec<Morpheme>,
    /// Position of the first character of the word
    pub position: Option<Position>,
}

/// Ordered sequence of words; the unit of command invocation
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sentence {
    /// Words that constitute the sentence
    pub words: Vec<Word>,
    /// Position of the first character of the sentence
    pub position: Option<Position>,
}

/// Ordered sequence of sentences; a program fragment
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Script {
    /// Sentences that constitute the script
    pub sentences: Vec<Sentence>,
    /// Position of the first character of the script
    pub position: Option<Position>,
}

/// Syntactic role of a word, derived from its morpheme pattern
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WordType {
    /// Single root-capable morpheme
    Root,
    /// Concatenation of literals, expressions, and substitution groups
    Compound,
    /// Substitution markers followed by a source and optional selectors
    Substitution,
    /// Literal, tuple, or block root followed by selectors only
    Qualified,
    /// Single comment
    Ignored,
    /// Anything else; rejected by the compiler
    Invalid,
}

impl Word {
    /// Classifies this word by its morpheme pattern.
    ///
    /// Classification is a single pass over the morpheme vector; it does not
    /// look into subscripts.
    #[must_use]
    pub fn word_type(&self) -> WordType {
        use MorphemeKind::*;
        let morphemes = &self.morphemes;
        match morphemes.len() {
            0 => WordType::Invalid,
            1 => match &morphemes[0].kind {
                kind if kind.is_root() => WordType::Root,
                LineComment { .. } | BlockComment { .. } => WordType::Ignored,
                _ => WordType::Invalid,
            },
            _ => classify_multi(morphemes),
        }
    }
}

/// Classifies a word of two or more morphemes.
fn classify_multi(morphemes: &[Morpheme]) -> WordType {
    use MorphemeKind::*;

    // Qualified: literal/tuple/block root, then selectors only.
    let qualified_root =
        matches!(&morphemes[0].kind, Literal(_) | Tuple(_) | Block { .. });
    if qualified_root && morphemes[1..].iter().all(|m| m.kind.is_selector()) {
        return WordType::Qualified;
    }

    // Substitution: marker run, then a source, then selectors only.
    let markers = morphemes
        .iter()
        .take_while(|m| matches!(m.kind, SubstituteNext { .. }))
        .count();
    if markers > 0 {
        if let Some(source) = morphemes.get(markers) {
            if source.kind.is_source()
                && morphemes[markers + 1..].iter().all(|m| m.kind.is_selector())
            {
                return WordType::Substitution;
            }
        }
    }

    // Compound: literals, expressions, and substitution groups; tuples and
    // blocks only as part of a substitution group.
    let mut i = 0;
    while i < morphemes.len() {
        match &morphemes[i].kind {
            Literal(_) | Expression(_) => i += 1,
            SubstituteNext { .. } => {
                while i < morphemes.len()
                    && matches!(morphemes[i].kind, SubstituteNext { .. })
                {
                    i += 1;
                }
                match morphemes.get(i) {
                    Some(source) if source.kind.is_source() => i += 1,
                    _ => return WordType::Invalid,
                }
                while i < morphemes.len() && morphemes[i].kind.is_selector() {
                    i += 1;
                }
            }
            _ => return WordType::Invalid,
        }
    }
    WordType::Compound
}

impl Script {
    /// Creates an empty script without a position.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
