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

use super::*;
use itertools::Itertools as _;
use std::fmt;

// The display forms reproduce equivalent source code, not the original
// bytes: separators are normalized and decoded escapes are printed as-is.

impl fmt::Display for Morpheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl fmt::Display for MorphemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MorphemeKind::*;
        match self {
            Literal(text) => text.fmt(f),
            Tuple(subscript) => write!(f, "({subscript})"),
            Block { raw_text, .. } => write!(f, "{{{raw_text}}}"),
            Expression(subscript) => write!(f, "[{subscript}]"),
            String(parts) => write!(f, "\"{}\"", parts.iter().format("")),
            HereString { text, delim_length } => {
                let delim = "\"".repeat(*delim_length);
                write!(f, "{delim}{text}{delim}")
            }
            TaggedString { text, tag } => write!(f, "\"\"{tag}\n{text}{tag}\"\""),
            LineComment { text, delim_length } => {
                write!(f, "{}{text}", "#".repeat(*delim_length))
            }
            BlockComment { text, delim_length } => {
                let delim = "#".repeat(*delim_length);
                write!(f, "{delim}{{{text}}}{delim}")
            }
            SubstituteNext { .. } => self.marker().fmt(f),
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.morphemes.iter().format(""))
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.words.iter().format(" "))
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sentences.iter().format("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(source: &str) -> String {
        source.parse::<Script>().unwrap().to_string()
    }

    #[test]
    fn simple_sentences() {
        assert_eq!(roundtrip("a b c"), "a b c");
        assert_eq!(roundtrip("a; b\nc"), "a; b; c");
    }

    #[test]
    fn nested_structures() {
        assert_eq!(roundtrip("cmd (a b) {c d} [e f]"), "cmd (a b) {c d} [e f]");
    }

    #[test]
    fn substitutions() {
        assert_eq!(roundtrip("$x[1](k)"), "$x[1](k)");
        assert_eq!(roundtrip("$*args"), "$*args");
    }

    #[test]
    fn strings() {
        assert_eq!(roundtrip("\"a $x b\""), "\"a $x b\"");
        assert_eq!(roundtrip("\"\"\"raw \"\" text\"\"\""), "\"\"\"raw \"\" text\"\"\"");
    }
}
