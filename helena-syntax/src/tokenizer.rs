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

//! Character tokenizer
//!
//! The tokenizer turns a source string into a sequence of [`Token`]s in a
//! single pass. It never fails: every character of the source belongs to
//! exactly one token, so concatenating the [`sequence`](Token::sequence) of
//! every token reproduces the source verbatim.
//!
//! Escape sequences are decoded here, not in the parser: an escape token's
//! [`literal`](Token::literal) carries the decoded character while its
//! `sequence` keeps the raw source slice. Unrecognized escape sequences pass
//! through as the escaped character itself.
//!
//! ```
//! # use helena_syntax::tokenizer::{tokenize, TokenKind};
//! let tokens = tokenize("cmd arg; # done");
//! assert_eq!(tokens[0].kind, TokenKind::Text);
//! assert_eq!(tokens[0].sequence, "cmd");
//! let source: String = tokens.iter().map(|t| t.sequence.as_str()).collect();
//! assert_eq!(source, "cmd arg; # done");
//! ```

use crate::source::Position;
use std::iter::FusedIterator;
use std::str::Chars;

/// Classification of tokens
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TokenKind {
    /// Run of blank characters (space, tab, carriage return, form feed)
    Whitespace,
    /// Line feed
    Newline,
    /// Backslash-newline, including the following blank run
    Continuation,
    /// Run of ordinary characters
    Text,
    /// Backslash escape sequence
    Escape,
    /// Run of `#` characters
    Comment,
    /// `(`
    OpenTuple,
    /// `)`
    CloseTuple,
    /// `{`
    OpenBlock,
    /// `}`
    CloseBlock,
    /// `[`
    OpenExpression,
    /// `]`
    CloseExpression,
    /// Run of `"` characters
    StringDelimiter,
    /// `$`
    Dollar,
    /// `;`
    Semicolon,
    /// `*`
    Asterisk,
}

/// Result of lexical analysis produced by the [`Tokenizer`]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    /// Classification of this token
    pub kind: TokenKind,
    /// Position of the first character of this token
    pub position: Position,
    /// Raw source slice this token was produced from
    pub sequence: String,
    /// Decoded content of this token
    ///
    /// Equal to `sequence` except for escapes (decoded character) and
    /// continuations (a single space).
    pub literal: String,
}

impl Token {
    /// Number of characters in the raw sequence.
    ///
    /// Comment and string-delimiter runs are distinguished by their length;
    /// this is the accessor the parser uses for that.
    #[must_use]
    pub fn delimiter_length(&self) -> usize {
        self.sequence.chars().count()
    }
}

/// Returns true if the character is a blank character.
///
/// Blanks separate words without ending the sentence. The newline is not a
/// blank; it is a sentence terminator of its own.
#[must_use]
pub fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\x0c')
}

/// Returns true if the character terminates a text run.
fn is_special(c: char) -> bool {
    is_blank(c)
        || matches!(
            c,
            '\n' | '\\' | '#' | '(' | ')' | '{' | '}' | '[' | ']' | '"' | '$' | ';' | '*'
        )
}

/// Lexical analyzer
///
/// A tokenizer reads characters from a source string and groups them into
/// tokens. It has an internal one-character buffer so that no rule ever needs
/// to look behind by more than one character.
///
/// `Tokenizer` implements [`Iterator`]; collecting it is equivalent to
/// calling [`tokenize`].
#[derive(Clone, Debug)]
pub struct Tokenizer<'a> {
    chars: Chars<'a>,
    peeked: Option<char>,
    position: Position,
}

impl<'a> Tokenizer<'a> {
    /// Creates a tokenizer over the given source string.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Tokenizer {
            chars: source.chars(),
            peeked: None,
            position: Position::default(),
        }
    }

    /// Returns the next character without consuming it.
    fn peek_char(&mut self) -> Option<char> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    /// Consumes the next character, advancing the position.
    fn next_char(&mut self) -> Option<char> {
        let c = self.peeked.take().or_else(|| self.chars.next())?;
        self.position.advance(c);
        Some(c)
    }

    /// Consumes characters while the predicate holds, appending them to `out`.
    fn take_while<F: Fn(char) -> bool>(&mut self, out: &mut String, f: F) {
        while let Some(c) = self.peek_char() {
            if !f(c) {
                break;
            }
            self.next_char();
            out.push(c);
        }
    }

    /// Parses the next token.
    pub fn next_token(&mut self) -> Option<Token> {
        let position = self.position;
        let c = self.next_char()?;
        let mut sequence = String::new();
        sequence.push(c);

        let token = |kind, sequence: String| {
            let literal = sequence.clone();
            Token { kind, position, sequence, literal }
        };

        match c {
            _ if is_blank(c) => {
                self.take_while(&mut sequence, is_blank);
                Some(token(TokenKind::Whitespace, sequence))
            }
            '\n' => Some(token(TokenKind::Newline, sequence)),
            '\\' => Some(self.escape(position, sequence)),
            '#' => {
                self.take_while(&mut sequence, |c| c == '#');
                Some(token(TokenKind::Comment, sequence))
            }
            '(' => Some(token(TokenKind::OpenTuple, sequence)),
            ')' => Some(token(TokenKind::CloseTuple, sequence)),
            '{' => Some(token(TokenKind::OpenBlock, sequence)),
            '}' => Some(token(TokenKind::CloseBlock, sequence)),
            '[' => Some(token(TokenKind::OpenExpression, sequence)),
            ']' => Some(token(TokenKind::CloseExpression, sequence)),
            '"' => {
                self.take_while(&mut sequence, |c| c == '"');
                Some(token(TokenKind::StringDelimiter, sequence))
            }
            '$' => Some(token(TokenKind::Dollar, sequence)),
            ';' => Some(token(TokenKind::Semicolon, sequence)),
            '*' => Some(token(TokenKind::Asterisk, sequence)),
            _ => {
                self.take_while(&mut sequence, |c| !is_special(c));
                Some(token(TokenKind::Text, sequence))
            }
        }
    }

    /// Parses the remainder of an escape sequence.
    ///
    /// The backslash has already been consumed into `sequence`.
    fn escape(&mut self, position: Position, mut sequence: String) -> Token {
        let Some(c) = self.peek_char() else {
            // Trailing backslash stands for itself.
            return Token {
                kind: TokenKind::Text,
                position,
                literal: sequence.clone(),
                sequence,
            };
        };

        if c == '\n' {
            self.next_char();
            sequence.push(c);
            self.take_while(&mut sequence, is_blank);
            return Token {
                kind: TokenKind::Continuation,
                position,
                sequence,
                literal: " ".to_string(),
            };
        }

        let literal = match c {
            'a' => self.single(&mut sequence, '\x07'),
            'b' => self.single(&mut sequence, '\x08'),
            'f' => self.single(&mut sequence, '\x0c'),
            'n' => self.single(&mut sequence, '\n'),
            'r' => self.single(&mut sequence, '\r'),
            't' => self.single(&mut sequence, '\t'),
            'v' => self.single(&mut sequence, '\x0b'),
            '\\' => self.single(&mut sequence, '\\'),
            '0'..='7' => self.octal(&mut sequence),
            'x' => self.hex(&mut sequence, 2),
            'u' => self.hex(&mut sequence, 4),
            'U' => self.hex(&mut sequence, 8),
            _ => {
                // Unrecognized sequences pass the escaped character through.
                self.next_char();
                sequence.push(c);
                c.to_string()
            }
        };
        Token { kind: TokenKind::Escape, position, sequence, literal }
    }

    fn single(&mut self, sequence: &mut String, literal: char) -> String {
        let c = self.next_char().unwrap();
        sequence.push(c);
        literal.to_string()
    }

    /// Consumes up to three octal digits and decodes the code point.
    fn octal(&mut self, sequence: &mut String) -> String {
        let mut value = 0;
        let mut count = 0;
        while count < 3 {
            match self.peek_char() {
                Some(c @ '0'..='7') => {
                    self.next_char();
                    sequence.push(c);
                    value = value * 8 + c.to_digit(8).unwrap();
                    count += 1;
                }
                _ => break,
            }
        }
        code_point(value)
    }

    /// Consumes up to `max` hexadecimal digits after the marker character.
    ///
    /// Without any hexadecimal digit, the marker itself passes through as an
    /// unrecognized escape.
    fn hex(&mut self, sequence: &mut String, max: usize) -> String {
        let marker = self.next_char().unwrap();
        sequence.push(marker);
        let mut value = 0;
        let mut count = 0;
        while count < max {
            match self.peek_char() {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.next_char();
                    sequence.push(c);
                    value = value * 16 + c.to_digit(16).unwrap();
                    count += 1;
                }
                _ => break,
            }
        }
        if count == 0 {
            marker.to_string()
        } else {
            code_point(value)
        }
    }
}

/// Converts a decoded code point to its literal text.
fn code_point(value: u32) -> String {
    char::from_u32(value)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
        .to_string()
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

impl FusedIterator for Tokenizer<'_> {}

/// Tokenizes a whole source string.
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token> {
    Tokenizer::new(source).collect()
}
