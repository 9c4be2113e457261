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

//! Syntax parser for the script language
//!
//! The parser is a non-recursive machine: it consumes one token at a time and
//! keeps the nesting structure on an explicit stack of contexts, so that
//! arbitrarily deep scripts never consume host call stack. Each context owns
//! the partial AST node it is building; closing a context turns it into a
//! morpheme appended to the enclosing context.
//!
//! ## One-shot use
//!
//! ```
//! use helena_syntax::parser::parse_tokens;
//! use helena_syntax::tokenizer::tokenize;
//! let script = parse_tokens(tokenize("a b; c")).unwrap();
//! assert_eq!(script.sentences.len(), 2);
//! ```
//!
//! ## Incremental use
//!
//! A line-by-line host feeds tokens as they arrive and calls
//! [`close_stream`](Parser::close_stream) when the input source is
//! exhausted. A [recoverable](ParseError::is_recoverable) error at that point
//! means the script is merely incomplete and more input may complete it; any
//! error reported by [`feed`](Parser::feed) is structural and fatal.
//!
//! After `close_stream` or an error, the parser is ready for a new unit; call
//! [`begin`](Parser::begin) to discard any partial state explicitly.

mod error;

pub use self::error::{ParseError, ParseErrorKind};

use crate::source::Position;
use crate::syntax::{Morpheme, MorphemeKind, Script, Sentence, Word};
use crate::tokenizer::{tokenize, Token, TokenKind};

/// Set of parameters controlling the parser
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ParseOptions {
    /// Whether to attach a [`Position`] to every script, sentence, word, and
    /// morpheme
    pub capture_positions: bool,
}

impl ParseOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether positions are attached to AST nodes.
    #[must_use]
    pub fn capture_positions(mut self, capture: bool) -> Self {
        self.capture_positions = capture;
        self
    }
}

/// Substitution state of a word or string context
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum SubstitutionMode {
    /// Not inside a substitution
    #[default]
    None,
    /// A `$` marker waits for its source morpheme
    ExpectSource,
    /// The source is in place; selectors may follow
    ExpectSelector,
}

/// What a word context is the body of
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum WordContextKind {
    /// Top-level script
    Script,
    /// `(…)`
    Tuple,
    /// `{…}`
    Block,
    /// `[…]`
    Expression,
}

/// Context building a script out of sentences and words
#[derive(Debug)]
struct WordContext {
    kind: WordContextKind,
    opening: Position,
    script: Script,
    sentence: Option<Sentence>,
    word: Option<Word>,
    substitution: SubstitutionMode,
    raw: String,
}

impl WordContext {
    fn new(kind: WordContextKind, opening: Position, capture: bool) -> Self {
        WordContext {
            kind,
            opening,
            script: Script {
                sentences: Vec::new(),
                position: capture.then_some(opening),
            },
            sentence: None,
            word: None,
            substitution: SubstitutionMode::None,
            raw: String::new(),
        }
    }

    fn word_started(&self) -> bool {
        self.word.is_some()
    }

    fn add_morpheme(&mut self, kind: MorphemeKind, position: Position, capture: bool) {
        let word = self.word.get_or_insert_with(|| Word {
            morphemes: Vec::new(),
            position: capture.then_some(position),
        });
        add_to(
            &mut word.morphemes,
            &mut self.substitution,
            kind,
            capture.then_some(position),
        );
    }

    fn add_literal(&mut self, text: &str, position: Position, capture: bool) {
        let word = self.word.get_or_insert_with(|| Word {
            morphemes: Vec::new(),
            position: capture.then_some(position),
        });
        add_literal(
            &mut word.morphemes,
            &mut self.substitution,
            text,
            capture.then_some(position),
        );
    }

    fn close_word(&mut self) {
        if let Some(mut word) = self.word.take() {
            end_substitution(&mut word.morphemes, &mut self.substitution);
            let sentence = self.sentence.get_or_insert_with(|| Sentence {
                words: Vec::new(),
                position: word.position,
            });
            sentence.words.push(word);
        }
    }

    fn close_sentence(&mut self) {
        self.close_word();
        if let Some(sentence) = self.sentence.take() {
            self.script.sentences.push(sentence);
        }
    }
}

/// Context building an interpolated string
#[derive(Debug)]
struct StringContext {
    opening: Position,
    parts: Vec<Morpheme>,
    substitution: SubstitutionMode,
    raw: String,
}

impl StringContext {
    fn add_morpheme(&mut self, kind: MorphemeKind, position: Position, capture: bool) {
        add_to(
            &mut self.parts,
            &mut self.substitution,
            kind,
            capture.then_some(position),
        );
    }

    fn add_literal(&mut self, text: &str, position: Position, capture: bool) {
        add_literal(
            &mut self.parts,
            &mut self.substitution,
            text,
            capture.then_some(position),
        );
    }
}

/// Context collecting a verbatim here-string
#[derive(Debug)]
struct HereStringContext {
    opening: Position,
    delim_length: usize,
    text: String,
}

/// Body state of a tagged string context
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TaggedStringState {
    /// Discarding the remainder of the opening line
    SkipLine,
    /// Collecting body lines
    Body,
}

/// Context collecting a verbatim tagged string
#[derive(Debug)]
struct TaggedStringContext {
    opening: Position,
    tag: String,
    state: TaggedStringState,
    lines: Vec<String>,
    line: String,
    raw: String,
}

/// Context collecting a line comment
#[derive(Debug)]
struct LineCommentContext {
    opening: Position,
    delim_length: usize,
    text: String,
}

/// Close/nest detection state of a block comment context
#[derive(Debug, Default)]
enum BlockCommentPending {
    #[default]
    None,
    /// A comment run of delimiter length; an open brace would nest
    Comment(String),
    /// A close brace; a comment run of delimiter length would unnest
    Close,
}

/// Context collecting a nestable block comment
#[derive(Debug)]
struct BlockCommentContext {
    opening: Position,
    delim_length: usize,
    text: String,
    nesting: usize,
    pending: BlockCommentPending,
}

/// Parsing context
#[derive(Debug)]
enum Context {
    Word(WordContext),
    String(StringContext),
    HereString(HereStringContext),
    TaggedString(TaggedStringContext),
    LineComment(LineCommentContext),
    BlockComment(BlockCommentContext),
}

impl Context {
    /// Raw source text collected so far, without the delimiters.
    fn raw_text(&self) -> &str {
        match self {
            Context::Word(c) => &c.raw,
            Context::String(c) => &c.raw,
            Context::HereString(c) => &c.text,
            Context::TaggedString(c) => &c.raw,
            Context::LineComment(c) => &c.text,
            Context::BlockComment(c) => &c.text,
        }
    }

    fn raw_text_mut(&mut self) -> &mut String {
        match self {
            Context::Word(c) => &mut c.raw,
            Context::String(c) => &mut c.raw,
            Context::HereString(c) => &mut c.text,
            Context::TaggedString(c) => &mut c.raw,
            Context::LineComment(c) => &mut c.text,
            Context::BlockComment(c) => &mut c.text,
        }
    }
}

/// Decision deferred until the next token arrives
#[derive(Debug)]
enum Pending {
    /// A comment run at a word boundary; an open brace would make it a block
    /// comment delimiter
    Comment { position: Position, sequence: String },
    /// A `""` delimiter; a text token would make it a tagged string opener
    TagCandidate { position: Position },
}

/// Explicit-stack script parser
///
/// See the [module documentation](self) for usage.
#[derive(Debug)]
pub struct Parser {
    options: ParseOptions,
    stack: Vec<Context>,
    pending: Option<Pending>,
    last_token: Option<(TokenKind, Position)>,
}

/// Result of parsing
pub type Result<T> = std::result::Result<T, ParseError>;

impl Parser {
    /// Creates a parser with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    /// Creates a parser with the given options.
    #[must_use]
    pub fn with_options(options: ParseOptions) -> Self {
        let mut parser = Parser {
            options,
            stack: Vec::new(),
            pending: None,
            last_token: None,
        };
        parser.begin();
        parser
    }

    /// Starts parsing a new unit, discarding any partial state.
    pub fn begin(&mut self) {
        let capture = self.options.capture_positions;
        self.stack = vec![Context::Word(WordContext::new(
            WordContextKind::Script,
            Position::default(),
            capture,
        ))];
        self.pending = None;
        self.last_token = None;
    }

    /// Parses a complete token stream.
    ///
    /// Equivalent to [`begin`](Self::begin), [`feed`](Self::feed) for every
    /// token, and [`close_stream`](Self::close_stream).
    pub fn parse<I: IntoIterator<Item = Token>>(&mut self, tokens: I) -> Result<Script> {
        self.begin();
        for token in tokens {
            self.feed(token)?;
        }
        self.close_stream()
    }

    /// Consumes one token.
    ///
    /// Errors reported here are structural; the parser must be
    /// [restarted](Self::begin) afterwards.
    pub fn feed(&mut self, token: Token) -> Result<()> {
        self.last_token = Some((token.kind, token.position));

        if let Some(pending) = self.pending.take() {
            match pending {
                Pending::Comment { position, sequence } => {
                    let delim_length = sequence.chars().count();
                    if token.kind == TokenKind::OpenBlock {
                        let opener = sequence + &token.sequence;
                        self.push_context(
                            &opener,
                            Context::BlockComment(BlockCommentContext {
                                opening: position,
                                delim_length,
                                text: String::new(),
                                nesting: 0,
                                pending: BlockCommentPending::None,
                            }),
                        );
                        return Ok(());
                    }
                    self.push_context(
                        &sequence,
                        Context::LineComment(LineCommentContext {
                            opening: position,
                            delim_length,
                            text: String::new(),
                        }),
                    );
                    // The token belongs to the comment; fall through.
                }
                Pending::TagCandidate { position } => {
                    if token.kind == TokenKind::Text {
                        let mut context = TaggedStringContext {
                            opening: position,
                            tag: token.literal,
                            state: TaggedStringState::SkipLine,
                            lines: Vec::new(),
                            line: String::new(),
                            raw: String::new(),
                        };
                        context.raw.push_str(&token.sequence);
                        self.push_context("\"\"", Context::TaggedString(context));
                        return Ok(());
                    }
                    // The `""` was an empty string; fall through.
                    self.top_raw().push_str("\"\"");
                    self.add_morpheme(MorphemeKind::String(Vec::new()), position);
                }
            }
        }

        self.dispatch(token)
    }

    /// Ends the token stream and returns the parsed script.
    ///
    /// A [recoverable](ParseError::is_recoverable) error means the input was
    /// merely incomplete: some context is still open, or the stream ended on
    /// a line continuation. The parser is reset either way.
    pub fn close_stream(&mut self) -> Result<Script> {
        let result = self.finish();
        let last_token = self.last_token;
        self.begin();
        let script = result?;
        if let Some((TokenKind::Continuation, position)) = last_token {
            return Err(ParseError { kind: ParseErrorKind::ContinuedLine, position });
        }
        Ok(script)
    }

    fn finish(&mut self) -> Result<Script> {
        if let Some(pending) = self.pending.take() {
            match pending {
                Pending::Comment { position, sequence } => {
                    let delim_length = sequence.chars().count();
                    self.top_raw().push_str(&sequence);
                    self.add_morpheme(
                        MorphemeKind::LineComment { text: String::new(), delim_length },
                        position,
                    );
                }
                Pending::TagCandidate { position } => {
                    self.top_raw().push_str("\"\"");
                    self.add_morpheme(MorphemeKind::String(Vec::new()), position);
                }
            }
        }

        // A line comment runs to the end of the input.
        if let Some(Context::LineComment(_)) = self.stack.last() {
            self.close_line_comment();
        }

        if self.stack.len() > 1 {
            let (kind, position) = match self.stack.last().unwrap() {
                Context::Word(c) => {
                    let kind = match c.kind {
                        WordContextKind::Tuple => ParseErrorKind::UnmatchedLeftParenthesis,
                        WordContextKind::Block => ParseErrorKind::UnmatchedLeftBrace,
                        WordContextKind::Expression => ParseErrorKind::UnmatchedLeftBracket,
                        WordContextKind::Script => unreachable!("nested script context"),
                    };
                    (kind, c.opening)
                }
                Context::String(c) => (ParseErrorKind::UnmatchedStringDelimiter, c.opening),
                Context::HereString(c) => {
                    (ParseErrorKind::UnmatchedHereStringDelimiter, c.opening)
                }
                Context::TaggedString(c) => {
                    (ParseErrorKind::UnmatchedTaggedStringDelimiter, c.opening)
                }
                Context::LineComment(c) => {
                    (ParseErrorKind::UnexpectedCommentDelimiter, c.opening)
                }
                Context::BlockComment(c) => {
                    (ParseErrorKind::UnmatchedBlockCommentDelimiter, c.opening)
                }
            };
            return Err(ParseError { kind, position });
        }

        let Some(Context::Word(mut root)) = self.stack.pop() else {
            unreachable!("root context is always a script context");
        };
        root.close_sentence();
        Ok(root.script)
    }

    fn top_raw(&mut self) -> &mut String {
        self.stack.last_mut().unwrap().raw_text_mut()
    }

    fn push_context(&mut self, opener: &str, context: Context) {
        self.top_raw().push_str(opener);
        self.stack.push(context);
    }

    fn pop_context(&mut self, closer: &str) -> Context {
        let context = self.stack.pop().unwrap();
        let raw = self.top_raw();
        raw.push_str(context.raw_text());
        raw.push_str(closer);
        context
    }

    fn add_morpheme(&mut self, kind: MorphemeKind, position: Position) {
        let capture = self.options.capture_positions;
        match self.stack.last_mut().unwrap() {
            Context::Word(c) => c.add_morpheme(kind, position, capture),
            Context::String(c) => c.add_morpheme(kind, position, capture),
            _ => unreachable!("morphemes only belong to word and string contexts"),
        }
    }

    fn dispatch(&mut self, token: Token) -> Result<()> {
        match self.stack.last().unwrap() {
            Context::Word(_) => self.parse_word(token),
            Context::String(_) => self.parse_string(token),
            Context::HereString(_) => self.parse_here_string(token),
            Context::TaggedString(_) => self.parse_tagged_string(token),
            Context::LineComment(_) => self.parse_line_comment(token),
            Context::BlockComment(_) => self.parse_block_comment(token),
        }
    }

    /// Handles a token in a script, tuple, block, or expression context.
    fn parse_word(&mut self, token: Token) -> Result<()> {
        use TokenKind::*;

        let capture = self.options.capture_positions;
        let position = token.position;
        let Some(Context::Word(context)) = self.stack.last_mut() else {
            unreachable!("parse_word requires a word context");
        };

        // A completed string form must end the word.
        let after_string = context.word.as_ref().is_some_and(|word| {
            matches!(
                word.morphemes.last().map(|m| &m.kind),
                Some(
                    MorphemeKind::String(_)
                        | MorphemeKind::HereString { .. }
                        | MorphemeKind::TaggedString { .. }
                )
            )
        });
        let separates = matches!(
            token.kind,
            Whitespace | Continuation | Newline | Semicolon | CloseTuple | CloseBlock
                | CloseExpression
        );
        if after_string && !separates {
            return Err(ParseError {
                kind: ParseErrorKind::ExtraCharactersAfterStringDelimiter,
                position,
            });
        }

        match token.kind {
            Whitespace => {
                context.close_word();
                context.raw.push_str(&token.sequence);
            }
            Continuation => {
                context.close_word();
                context.raw.push(' ');
            }
            Newline | Semicolon => {
                context.close_sentence();
                context.raw.push_str(&token.sequence);
            }
            Text | Escape => {
                context.raw.push_str(&token.sequence);
                context.add_literal(&token.literal, position, capture);
            }
            Asterisk => {
                context.raw.push_str(&token.sequence);
                let upgraded = context.substitution == SubstitutionMode::ExpectSource
                    && context
                        .word
                        .as_mut()
                        .is_some_and(|word| flag_expansion(&mut word.morphemes));
                if !upgraded {
                    context.add_literal("*", position, capture);
                }
            }
            Dollar => {
                context.raw.push_str(&token.sequence);
                context.add_morpheme(
                    MorphemeKind::SubstituteNext { expansion: false },
                    position,
                    capture,
                );
            }
            OpenTuple => self.open_word_context(WordContextKind::Tuple, token),
            OpenBlock => self.open_word_context(WordContextKind::Block, token),
            OpenExpression => self.open_word_context(WordContextKind::Expression, token),
            CloseTuple => return self.close_word_context(WordContextKind::Tuple, position),
            CloseBlock => return self.close_word_context(WordContextKind::Block, position),
            CloseExpression => {
                return self.close_word_context(WordContextKind::Expression, position)
            }
            StringDelimiter => {
                if context.word_started() {
                    return Err(ParseError {
                        kind: ParseErrorKind::UnexpectedStringDelimiter,
                        position,
                    });
                }
                match token.delimiter_length() {
                    1 => self.push_context(
                        "\"",
                        Context::String(StringContext {
                            opening: position,
                            parts: Vec::new(),
                            substitution: SubstitutionMode::None,
                            raw: String::new(),
                        }),
                    ),
                    2 => self.pending = Some(Pending::TagCandidate { position }),
                    delim_length => self.push_context(
                        &token.sequence,
                        Context::HereString(HereStringContext {
                            opening: position,
                            delim_length,
                            text: String::new(),
                        }),
                    ),
                }
            }
            Comment => {
                if context.word_started() {
                    return Err(ParseError {
                        kind: ParseErrorKind::UnexpectedCommentDelimiter,
                        position,
                    });
                }
                self.pending = Some(Pending::Comment {
                    position,
                    sequence: token.sequence,
                });
            }
        }
        Ok(())
    }

    fn open_word_context(&mut self, kind: WordContextKind, token: Token) {
        let capture = self.options.capture_positions;
        self.push_context(
            &token.sequence,
            Context::Word(WordContext::new(kind, token.position, capture)),
        );
    }

    fn close_word_context(&mut self, kind: WordContextKind, position: Position) -> Result<()> {
        let Some(Context::Word(top)) = self.stack.last() else {
            unreachable!("close_word_context requires a word context");
        };
        if top.kind != kind {
            let error = match top.kind {
                WordContextKind::Script => match kind {
                    WordContextKind::Tuple => ParseErrorKind::UnmatchedRightParenthesis,
                    WordContextKind::Block => ParseErrorKind::UnmatchedRightBrace,
                    _ => ParseErrorKind::UnmatchedRightBracket,
                },
                _ => match kind {
                    WordContextKind::Tuple => ParseErrorKind::MismatchedRightParenthesis,
                    WordContextKind::Block => ParseErrorKind::MismatchedRightBrace,
                    _ => ParseErrorKind::MismatchedRightBracket,
                },
            };
            return Err(ParseError { kind: error, position });
        }

        let closer = match kind {
            WordContextKind::Tuple => ")",
            WordContextKind::Block => "}",
            WordContextKind::Expression => "]",
            WordContextKind::Script => unreachable!(),
        };
        let Context::Word(mut context) = self.pop_context(closer) else {
            unreachable!();
        };
        context.close_sentence();
        let morpheme = match kind {
            WordContextKind::Tuple => MorphemeKind::Tuple(context.script),
            WordContextKind::Block => MorphemeKind::Block {
                subscript: context.script,
                raw_text: context.raw,
            },
            WordContextKind::Expression => MorphemeKind::Expression(context.script),
            WordContextKind::Script => unreachable!(),
        };
        self.add_morpheme(morpheme, context.opening);
        Ok(())
    }

    /// Handles a token in a string context.
    fn parse_string(&mut self, token: Token) -> Result<()> {
        use TokenKind::*;

        let capture = self.options.capture_positions;
        let position = token.position;
        let Some(Context::String(context)) = self.stack.last_mut() else {
            unreachable!("parse_string requires a string context");
        };

        match token.kind {
            Text | Escape | Continuation => {
                context.raw.push_str(&token.sequence);
                context.add_literal(&token.literal, position, capture);
            }
            Whitespace | Newline | Semicolon | Comment | CloseTuple | CloseBlock
            | CloseExpression => {
                context.raw.push_str(&token.sequence);
                context.add_literal(&token.sequence, position, capture);
            }
            Asterisk => {
                context.raw.push_str(&token.sequence);
                let upgraded = context.substitution == SubstitutionMode::ExpectSource
                    && flag_expansion(&mut context.parts);
                if !upgraded {
                    context.add_literal("*", position, capture);
                }
            }
            Dollar => {
                context.raw.push_str(&token.sequence);
                context.add_morpheme(
                    MorphemeKind::SubstituteNext { expansion: false },
                    position,
                    capture,
                );
            }
            OpenExpression => self.open_word_context(WordContextKind::Expression, token),
            OpenTuple => {
                if context.substitution == SubstitutionMode::None {
                    context.raw.push_str(&token.sequence);
                    context.add_literal("(", position, capture);
                } else {
                    self.open_word_context(WordContextKind::Tuple, token);
                }
            }
            OpenBlock => {
                if context.substitution == SubstitutionMode::None {
                    context.raw.push_str(&token.sequence);
                    context.add_literal("{", position, capture);
                } else {
                    self.open_word_context(WordContextKind::Block, token);
                }
            }
            StringDelimiter => {
                if token.delimiter_length() != 1 {
                    return Err(ParseError {
                        kind: ParseErrorKind::UnexpectedStringDelimiter,
                        position,
                    });
                }
                let Context::String(mut context) = self.pop_context("\"") else {
                    unreachable!();
                };
                end_substitution(&mut context.parts, &mut context.substitution);
                self.add_morpheme(MorphemeKind::String(context.parts), context.opening);
            }
        }
        Ok(())
    }

    /// Handles a token in a here-string context.
    fn parse_here_string(&mut self, token: Token) -> Result<()> {
        let Some(Context::HereString(context)) = self.stack.last_mut() else {
            unreachable!("parse_here_string requires a here-string context");
        };
        if token.kind == TokenKind::StringDelimiter
            && token.delimiter_length() == context.delim_length
        {
            let delim_length = context.delim_length;
            let opening = context.opening;
            let Context::HereString(context) = self.pop_context(&token.sequence) else {
                unreachable!();
            };
            self.add_morpheme(
                MorphemeKind::HereString { text: context.text, delim_length },
                opening,
            );
        } else {
            context.text.push_str(&token.sequence);
        }
        Ok(())
    }

    /// Handles a token in a tagged string context.
    fn parse_tagged_string(&mut self, token: Token) -> Result<()> {
        let Some(Context::TaggedString(context)) = self.stack.last_mut() else {
            unreachable!("parse_tagged_string requires a tagged string context");
        };
        match context.state {
            TaggedStringState::SkipLine => {
                context.raw.push_str(&token.sequence);
                if token.kind == TokenKind::Newline {
                    context.state = TaggedStringState::Body;
                }
            }
            TaggedStringState::Body => {
                let closes = token.kind == TokenKind::StringDelimiter
                    && token.delimiter_length() == 2
                    && context.line.trim_start() == context.tag;
                if closes {
                    let opening = context.opening;
                    let Context::TaggedString(context) = self.pop_context("\"\"") else {
                        unreachable!();
                    };
                    let prefix = &context.line[..context.line.len() - context.tag.len()];
                    let mut text = String::new();
                    for line in &context.lines {
                        text.push_str(line.strip_prefix(prefix).unwrap_or(line));
                        text.push('\n');
                    }
                    self.add_morpheme(
                        MorphemeKind::TaggedString { text, tag: context.tag },
                        opening,
                    );
                } else {
                    context.raw.push_str(&token.sequence);
                    if token.kind == TokenKind::Newline {
                        context.lines.push(std::mem::take(&mut context.line));
                    } else {
                        context.line.push_str(&token.sequence);
                    }
                }
            }
        }
        Ok(())
    }

    /// Handles a token in a line comment context.
    fn parse_line_comment(&mut self, token: Token) -> Result<()> {
        let Some(Context::LineComment(context)) = self.stack.last_mut() else {
            unreachable!("parse_line_comment requires a line comment context");
        };
        if token.kind == TokenKind::Newline {
            self.close_line_comment();
            // The newline also terminates the enclosing sentence.
            self.dispatch(token)
        } else {
            context.text.push_str(&token.sequence);
            Ok(())
        }
    }

    fn close_line_comment(&mut self) {
        let Context::LineComment(context) = self.pop_context("") else {
            unreachable!("close_line_comment requires a line comment context");
        };
        self.add_morpheme(
            MorphemeKind::LineComment {
                text: context.text,
                delim_length: context.delim_length,
            },
            context.opening,
        );
    }

    /// Handles a token in a block comment context.
    fn parse_block_comment(&mut self, token: Token) -> Result<()> {
        let Some(Context::BlockComment(context)) = self.stack.last_mut() else {
            unreachable!("parse_block_comment requires a block comment context");
        };

        match std::mem::take(&mut context.pending) {
            BlockCommentPending::None => {}
            BlockCommentPending::Comment(sequence) => {
                if token.kind == TokenKind::OpenBlock {
                    context.nesting += 1;
                    context.text.push_str(&sequence);
                    context.text.push('{');
                    return Ok(());
                }
                context.text.push_str(&sequence);
            }
            BlockCommentPending::Close => {
                if token.kind == TokenKind::Comment
                    && token.delimiter_length() == context.delim_length
                {
                    if context.nesting == 0 {
                        let closer = format!("}}{}", token.sequence);
                        let opening = context.opening;
                        let delim_length = context.delim_length;
                        let Context::BlockComment(context) = self.pop_context(&closer)
                        else {
                            unreachable!();
                        };
                        self.add_morpheme(
                            MorphemeKind::BlockComment { text: context.text, delim_length },
                            opening,
                        );
                        return Ok(());
                    }
                    context.nesting -= 1;
                    context.text.push('}');
                    context.text.push_str(&token.sequence);
                    return Ok(());
                }
                context.text.push('}');
            }
        }

        match token.kind {
            TokenKind::Comment if token.delimiter_length() == context.delim_length => {
                context.pending = BlockCommentPending::Comment(token.sequence);
            }
            TokenKind::CloseBlock => context.pending = BlockCommentPending::Close,
            _ => context.text.push_str(&token.sequence),
        }
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends a morpheme, tracking the substitution state machine.
fn add_to(
    morphemes: &mut Vec<Morpheme>,
    mode: &mut SubstitutionMode,
    kind: MorphemeKind,
    position: Option<Position>,
) {
    use MorphemeKind::*;
    match *mode {
        SubstitutionMode::ExpectSource => match kind {
            // Markers stack: `$$x` resolves twice.
            SubstituteNext { .. } => morphemes.push(Morpheme { kind, position }),
            Literal(_) | Tuple(_) | Block { .. } | Expression(_) => {
                morphemes.push(Morpheme { kind, position });
                *mode = SubstitutionMode::ExpectSelector;
            }
            _ => {
                end_substitution(morphemes, mode);
                morphemes.push(Morpheme { kind, position });
            }
        },
        SubstitutionMode::ExpectSelector => match kind {
            Tuple(_) | Block { .. } | Expression(_) => {
                morphemes.push(Morpheme { kind, position });
            }
            SubstituteNext { .. } => {
                *mode = SubstitutionMode::ExpectSource;
                morphemes.push(Morpheme { kind, position });
            }
            _ => {
                *mode = SubstitutionMode::None;
                morphemes.push(Morpheme { kind, position });
            }
        },
        SubstitutionMode::None => {
            if matches!(kind, SubstituteNext { .. }) {
                *mode = SubstitutionMode::ExpectSource;
            }
            morphemes.push(Morpheme { kind, position });
        }
    }
}

/// Appends literal text, merging with a preceding literal where possible.
fn add_literal(
    morphemes: &mut Vec<Morpheme>,
    mode: &mut SubstitutionMode,
    text: &str,
    position: Option<Position>,
) {
    match *mode {
        SubstitutionMode::ExpectSource => {
            // The literal is the substitution source; it must stay its own
            // morpheme.
            morphemes.push(Morpheme {
                kind: MorphemeKind::Literal(text.to_string()),
                position,
            });
            *mode = SubstitutionMode::ExpectSelector;
        }
        SubstitutionMode::ExpectSelector => {
            *mode = SubstitutionMode::None;
            morphemes.push(Morpheme {
                kind: MorphemeKind::Literal(text.to_string()),
                position,
            });
        }
        SubstitutionMode::None => match morphemes.last_mut() {
            Some(Morpheme { kind: MorphemeKind::Literal(existing), .. }) => {
                existing.push_str(text);
            }
            _ => morphemes.push(Morpheme {
                kind: MorphemeKind::Literal(text.to_string()),
                position,
            }),
        },
    }
}

/// Collapses stale substitution markers into literal text.
fn end_substitution(morphemes: &mut Vec<Morpheme>, mode: &mut SubstitutionMode) {
    if *mode == SubstitutionMode::ExpectSource {
        let mut text = String::new();
        let mut position = None;
        while let Some(Morpheme { kind: kind @ MorphemeKind::SubstituteNext { .. }, .. }) =
            morphemes.last()
        {
            text.insert_str(0, kind.marker());
            position = morphemes.pop().unwrap().position;
        }
        if !text.is_empty() {
            *mode = SubstitutionMode::None;
            add_literal(morphemes, mode, &text, position);
        }
    }
    *mode = SubstitutionMode::None;
}

/// Flags the trailing substitution marker for expansion.
///
/// The upgrade only applies to the first marker of a run: `$$*` keeps the
/// asterisk as ordinary text.
fn flag_expansion(morphemes: &mut [Morpheme]) -> bool {
    let n = morphemes.len();
    if n >= 2 && matches!(morphemes[n - 2].kind, MorphemeKind::SubstituteNext { .. }) {
        return false;
    }
    match morphemes.last_mut() {
        Some(Morpheme { kind: MorphemeKind::SubstituteNext { expansion }, .. })
            if !*expansion =>
        {
            *expansion = true;
            true
        }
        _ => false,
    }
}

/// Parses a complete token stream with default options.
pub fn parse_tokens<I: IntoIterator<Item = Token>>(tokens: I) -> Result<Script> {
    Parser::new().parse(tokens)
}

/// Conversion from source code
///
/// The result carries no positions; drive a [`Parser`] with
/// [`ParseOptions::capture_positions`] to include them.
impl std::str::FromStr for Script {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Script> {
        parse_tokens(tokenize(s))
    }
}
