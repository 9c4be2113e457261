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

//! Script source code positions
//!
//! This module defines the [`Position`] type that locates a character in a
//! source string. Positions are computed by the
//! [tokenizer](crate::tokenizer::Tokenizer) and optionally propagated into
//! tokens, morphemes, and script/sentence/word nodes when position capture is
//! enabled in the [parser](crate::parser::Parser).

/// Location of a character in source code
///
/// All three fields are zero-based. The `index` counts characters from the
/// start of the source, not bytes, so multi-byte characters advance it by
/// one.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Position {
    /// Character offset from the start of the source
    pub index: usize,
    /// Line number, counting the lines before this position
    pub line: usize,
    /// Column number within the line
    pub column: usize,
}

impl Position {
    /// Advances the position past the given character.
    ///
    /// A newline moves the position to the start of the next line; any other
    /// character advances the column.
    pub fn advance(&mut self, c: char) {
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}
