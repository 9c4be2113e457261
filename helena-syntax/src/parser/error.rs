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

//! Definition of errors that happen in the parser

use crate::source::Position;
use thiserror::Error;

/// Types of syntax errors
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
#[error("{}", self.message())]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// A `(` lacks a closing `)`.
    UnmatchedLeftParenthesis,
    /// A `{` lacks a closing `}`.
    UnmatchedLeftBrace,
    /// A `[` lacks a closing `]`.
    UnmatchedLeftBracket,
    /// A `)` appears without a matching `(`.
    UnmatchedRightParenthesis,
    /// A `}` appears without a matching `{`.
    UnmatchedRightBrace,
    /// A `]` appears without a matching `[`.
    UnmatchedRightBracket,
    /// A `)` closes a context opened by another delimiter.
    MismatchedRightParenthesis,
    /// A `}` closes a context opened by another delimiter.
    MismatchedRightBrace,
    /// A `]` closes a context opened by another delimiter.
    MismatchedRightBracket,
    /// A string lacks its closing quote.
    UnmatchedStringDelimiter,
    /// A here-string lacks a closing delimiter of the same length.
    UnmatchedHereStringDelimiter,
    /// A tagged string lacks its closing tag line.
    UnmatchedTaggedStringDelimiter,
    /// A block comment lacks its closing delimiter.
    UnmatchedBlockCommentDelimiter,
    /// A completed string is followed by something other than a separator.
    ExtraCharactersAfterStringDelimiter,
    /// A comment delimiter appears inside a started word.
    UnexpectedCommentDelimiter,
    /// A string delimiter appears where a string cannot begin.
    UnexpectedStringDelimiter,
    /// The stream ends on a line continuation.
    ContinuedLine,
}

impl ParseErrorKind {
    /// Returns an error message describing the error.
    #[must_use]
    pub fn message(&self) -> &'static str {
        use ParseErrorKind::*;
        match self {
            UnmatchedLeftParenthesis => "unmatched left parenthesis",
            UnmatchedLeftBrace => "unmatched left brace",
            UnmatchedLeftBracket => "unmatched left bracket",
            UnmatchedRightParenthesis => "unmatched right parenthesis",
            UnmatchedRightBrace => "unmatched right brace",
            UnmatchedRightBracket => "unmatched right bracket",
            MismatchedRightParenthesis => "mismatched right parenthesis",
            MismatchedRightBrace => "mismatched right brace",
            MismatchedRightBracket => "mismatched right bracket",
            UnmatchedStringDelimiter => "unmatched string delimiter",
            UnmatchedHereStringDelimiter => "unmatched here-string delimiter",
            UnmatchedTaggedStringDelimiter => "unmatched tagged string delimiter",
            UnmatchedBlockCommentDelimiter => "unmatched block comment delimiter",
            ExtraCharactersAfterStringDelimiter => "extra characters after string delimiter",
            UnexpectedCommentDelimiter => "unexpected comment delimiter",
            UnexpectedStringDelimiter => "unexpected string delimiter",
            ContinuedLine => "continued line",
        }
    }

    /// Returns true if more input could turn the error into a valid script.
    ///
    /// Recoverable errors are the ones a line-by-line host treats as "keep
    /// reading": a context still open when the stream closes, or a stream
    /// ending on a line continuation. Errors raised while feeding tokens are
    /// structural and therefore fatal.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        use ParseErrorKind::*;
        matches!(
            self,
            UnmatchedLeftParenthesis
                | UnmatchedLeftBrace
                | UnmatchedLeftBracket
                | UnmatchedStringDelimiter
                | UnmatchedHereStringDelimiter
                | UnmatchedTaggedStringDelimiter
                | UnmatchedBlockCommentDelimiter
                | ContinuedLine
        )
    }
}

/// Parse error with source position
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("{kind}")]
pub struct ParseError {
    /// Type of the error
    pub kind: ParseErrorKind,
    /// Position the error was detected at
    ///
    /// For unmatched-left errors this is the position of the opening
    /// delimiter; otherwise it is the position of the offending token.
    pub position: Position,
}

impl ParseError {
    /// Shorthand for [`ParseErrorKind::is_recoverable`].
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}
