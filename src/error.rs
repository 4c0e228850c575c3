// Copyright 2016 The Fancy Regex Authors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Error types for lexing, parsing and traversal.
//!
//! Every error carries a byte offset into the pattern body. Parse errors also
//! carry a rendered snippet with a caret under the offending position, so
//! callers can report them without re-deriving positions.

use serde::Serialize;
use thiserror::Error;

/// Result type for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Result type for visitor traversals.
pub type VisitResult<T> = std::result::Result<T, VisitError>;

/// The category of a lexical error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LexErrorKind {
    /// A `\x{`, `\o{`, `\p{`, `\N{`, `\g{` or `\k<` without its terminator.
    UnterminatedEscape,
    /// The pattern ends in a lone backslash.
    TrailingBackslash,
    /// `(?#` without a closing `)`.
    UnterminatedComment,
    /// `(*` without a closing `)`.
    UnterminatedVerb,
    /// An escape whose payload is malformed, e.g. `\x{zz}`.
    MalformedEscape,
    /// An escape the selected dialect does not know.
    UnsupportedEscape,
    /// A code point outside the Unicode range or a surrogate.
    InvalidCodePoint,
    /// A callout `(?C` with a malformed argument.
    MalformedCallout,
    /// An escape that is not valid in this position, e.g. `\R` in a class.
    InvalidEscape,
    /// A number too large to represent or above a PCRE limit.
    NumberTooLarge,
    /// `(?` followed by something that starts no known construct.
    UnknownGroup,
    /// An inline flag letter that is not known.
    UnknownFlag,
    /// A `(*VERB)` that is not known or has a malformed argument.
    UnknownVerb,
    /// A malformed or overlong group name.
    InvalidName,
}

/// An error detected by the lexer without grammar context.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} at offset {offset}")]
pub struct LexError {
    /// Error category.
    pub kind: LexErrorKind,
    /// Human readable description.
    pub message: String,
    /// Byte offset into the pattern body.
    pub offset: usize,
}

impl LexError {
    pub(crate) fn new(kind: LexErrorKind, message: impl Into<String>, offset: usize) -> Self {
        LexError {
            kind,
            message: message.into(),
            offset,
        }
    }
}

/// The category of a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// The pattern string is empty or only whitespace.
    EmptyPattern,
    /// The delimiter is alphanumeric, a backslash or NUL.
    InvalidDelimiter,
    /// No closing delimiter was found.
    MissingDelimiter,
    /// Text after the closing delimiter is not a list of modifiers.
    UnknownModifier,
    /// `{min,max}` with `min > max`, or a class range running backwards.
    InvalidRange,
    /// A `[` without a matching `]`.
    UnclosedClass,
    /// A `(` without a matching `)` or a stray `)`.
    UnmatchedParen,
    /// A quantifier with nothing (or nothing repeatable) before it.
    NothingToRepeat,
    /// A backreference to a group number or name that does not exist.
    UnresolvedBackref,
    /// A subroutine call to a group that does not exist.
    UnresolvedSubroutine,
    /// Two groups share a name while duplicates are not allowed.
    DuplicateName,
    /// A malformed group name.
    InvalidGroupName,
    /// A lookbehind with no computable maximum length.
    UnboundedLookbehind,
    /// A lookbehind whose alternatives differ in length, for dialects without
    /// variable-length lookbehind.
    VariableLookbehind,
    /// A lookbehind longer than the configured maximum.
    LookbehindTooLong,
    /// A malformed conditional group.
    InvalidConditional,
    /// An escape that is not valid in this position.
    InvalidEscape,
    /// A group construct that is not recognized.
    InvalidGroup,
    /// A backtracking verb or start-of-pattern setting that is not known.
    UnknownVerb,
    /// An inline flag letter that is not known.
    UnknownFlag,
    /// Parenthesis nesting deeper than the configured limit.
    NestingTooDeep,
    /// A number too large to represent.
    NumberTooLarge,
    /// An error reported by the lexer.
    Lex(LexErrorKind),
}

/// An error produced while parsing a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    /// Error category.
    pub kind: ErrorKind,
    /// Human readable description.
    pub message: String,
    /// Byte offset into the pattern body.
    pub offset: usize,
    /// The body line containing the error with a caret under `offset`.
    pub snippet: String,
    /// A suggestion for fixing the pattern, when one is known.
    pub hint: Option<String>,
}

impl ParseError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>, body: &str, offset: usize) -> Self {
        ParseError {
            kind,
            message: message.into(),
            offset,
            snippet: render_snippet(body, offset),
            hint: None,
        }
    }

    pub(crate) fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Wrap a lexer error, rendering the snippet against `body`.
    ///
    /// Lexer faults that have a dedicated parse error category are mapped to
    /// it; the rest are wrapped in [`ErrorKind::Lex`].
    pub fn from_lex(err: LexError, body: &str) -> Self {
        let kind = match err.kind {
            LexErrorKind::InvalidEscape => ErrorKind::InvalidEscape,
            LexErrorKind::NumberTooLarge => ErrorKind::NumberTooLarge,
            LexErrorKind::UnknownGroup => ErrorKind::InvalidGroup,
            LexErrorKind::UnknownFlag => ErrorKind::UnknownFlag,
            LexErrorKind::UnknownVerb => ErrorKind::UnknownVerb,
            LexErrorKind::InvalidName => ErrorKind::InvalidGroupName,
            other => ErrorKind::Lex(other),
        };
        ParseError::new(kind, err.message, body, err.offset)
    }
}

/// An error raised during AST traversal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum VisitError {
    /// The traversal went deeper than its guard allows.
    #[error("traversal depth limit of {limit} exceeded at offset {offset}")]
    DepthExceeded {
        /// The configured limit.
        limit: usize,
        /// Start offset of the node that would have exceeded it.
        offset: usize,
    },
}

/// Render the line of `body` containing `offset` with a caret beneath it.
///
/// The caret column counts characters rather than bytes so it lines up in a
/// terminal even when the body contains multi-byte UTF-8.
pub fn render_snippet(body: &str, offset: usize) -> String {
    let mut offset = offset.min(body.len());
    while !body.is_char_boundary(offset) {
        offset -= 1;
    }
    let line_start = body[..offset].rfind('\n').map_or(0, |ix| ix + 1);
    let line_end = body[offset..].find('\n').map_or(body.len(), |ix| offset + ix);
    let column = body[line_start..offset].chars().count();
    let mut snippet = String::with_capacity(line_end - line_start + column + 2);
    snippet.push_str(&body[line_start..line_end]);
    snippet.push('\n');
    snippet.extend(std::iter::repeat(' ').take(column));
    snippet.push('^');
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_points_at_offset() {
        assert_eq!(render_snippet("[a-z", 0), "[a-z\n^");
        assert_eq!(render_snippet("(a)\\2", 3), "(a)\\2\n   ^");
    }

    #[test]
    fn snippet_counts_chars_not_bytes() {
        // 'é' is two bytes
        assert_eq!(render_snippet("é(", 2), "é(\n ^");
    }

    #[test]
    fn snippet_uses_containing_line() {
        let body = "a\n  b(\nc";
        assert_eq!(render_snippet(body, 5), "  b(\n   ^");
    }

    #[test]
    fn snippet_clamps_past_end() {
        assert_eq!(render_snippet("ab", 10), "ab\n  ^");
    }

    #[test]
    fn lex_errors_map_to_parse_kinds() {
        let err = ParseError::from_lex(LexError::new(LexErrorKind::InvalidName, "bad", 3), "(?<1>x)");
        assert_eq!(err.kind, ErrorKind::InvalidGroupName);
        let err = ParseError::from_lex(LexError::new(LexErrorKind::TrailingBackslash, "end", 1), "a\\");
        assert_eq!(err.kind, ErrorKind::Lex(LexErrorKind::TrailingBackslash));
    }

    #[test]
    fn display_includes_offset() {
        let err = ParseError::new(ErrorKind::UnclosedClass, "missing terminating ] for character class", "[a", 0)
            .with_hint("close the class with ]");
        assert_eq!(err.to_string(), "missing terminating ] for character class at offset 0");
        assert_eq!(err.hint.as_deref(), Some("close the class with ]"));
    }
}
