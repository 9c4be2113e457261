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

//! Helena language syntax and parser.
//!
//! This crate defines data types for constructing abstract syntax trees
//! (ASTs) of Helena scripts. See the [`syntax`] module for details.
//!
//! Source code turns into an AST in two stages. The [`tokenizer`] module
//! groups characters into tokens, resolving escape sequences and tracking
//! [positions](source::Position). The [`parser`] module assembles tokens into
//! scripts, sentences, words, and morphemes on an explicit context stack, so
//! that nesting depth never consumes host call stack.
//!
//! To parse source code into an AST, you can use the `parse` function on a
//! `&str`, which is enabled by the implementation of
//! [`FromStr`](std::str::FromStr) for [`Script`](syntax::Script). ASTs
//! constructed this way carry no source positions. To include positions,
//! drive a [`Parser`](parser::Parser) configured with
//! [`capture_positions`](parser::ParseOptions::capture_positions).
//!
//! The parser also supports incremental, line-by-line input for REPL-style
//! hosts; see [`parser::Parser::close_stream`] for how incomplete input is
//! told apart from syntax errors.

pub mod parser;
pub mod source;
pub mod syntax;
pub mod tokenizer;
