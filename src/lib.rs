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

/*!
A parser and structural analyzer for PCRE pattern literals.

This crate turns a pattern literal as written in PHP's `preg_*` functions,
delimiters and modifiers included, into a typed AST, and runs analyses over
that tree. The most important one detects patterns prone to catastrophic
backtracking (ReDoS) without ever compiling or running them.

# Example

```rust
use pcre_audit::Severity;

let regex = pcre_audit::parse("/^(a+)+$/").unwrap();
let analysis = pcre_audit::analyze_redos(&regex);
assert!(analysis.exceeds_threshold(Severity::Medium));
assert_eq!(analysis.hotspots[0].fragment, "(a+)+");

let safe = pcre_audit::analyze_pattern("/^[a-z]+$/i").unwrap();
assert_eq!(safe.severity, Severity::Safe);
```

Errors carry the offset into the body and a rendered snippet:

```rust
use pcre_audit::ErrorKind;

let err = pcre_audit::parse("/[a-z/").unwrap_err();
assert_eq!(err.kind, ErrorKind::UnclosedClass);
assert_eq!(err.offset, 0);
```

# Syntax

Everything PCRE2 accepts in a `preg_*` pattern is understood:

* Quantifiers `*`, `+`, `?`, `{m}`, `{m,}`, `{m,n}` and, from PCRE2 10.43,
  `{,n}`, each with lazy `?` or possessive `+` suffix
* Character classes with ranges, POSIX classes, shorthands, Unicode
  properties and, from PCRE2 10.45, `&&` and `--` set operations
* All group kinds: capturing, named, non-capturing, atomic, lookaround,
  branch reset and scoped modifiers
* Backreferences, subroutine calls and recursion in all their spellings
* Conditionals, including `(?(DEFINE)...)` and assertion conditions
* Backtracking control verbs, callouts and comments

The accepted syntax follows a [`Dialect`], chosen through [`Parser`].

# Traversal

Analyses are written as [`Visitor`]s, and rewrites as [`Fold`]s. The
[`width`] module computes match length bounds and the [`printer`] turns a
tree back into pattern text.
*/

pub mod ast;
pub mod charset;
pub mod config;
pub mod error;
pub mod flags;
pub mod lexer;
pub mod parse;
pub mod printer;
pub mod redos;
pub mod resolve;
pub mod visit;
pub mod width;

pub use crate::ast::{GroupKind, Node, QuantifierKind, Regex, Span, Warning, WarningKind};
pub use crate::config::{AnalyzerConfig, Dialect, ParserConfig, ScoreWeights};
pub use crate::error::{ErrorKind, LexError, LexErrorKind, ParseError, Result, VisitError, VisitResult};
pub use crate::parse::Parser;
pub use crate::printer::Printer;
pub use crate::redos::{
    Complexity, Hotspot, HotspotKind, ReDoSAnalysis, Recommendation, RedosAnalyzer, Severity,
};
pub use crate::visit::{DepthGuard, Fold, MakePossessive, Visitor, WrapAtomic};
pub use crate::width::Width;

/// Parse a pattern literal such as `/a+b/i` with the default configuration.
pub fn parse(pattern: &str) -> Result<Regex> {
    Parser::new().parse(pattern)
}

/// Parse a pattern body with modifiers given separately.
///
/// Use this when the delimiters were already stripped, for example by a
/// source scanner. `delimiter` is only recorded for printing.
pub fn parse_body(body: &str, modifiers: &str, delimiter: char) -> Result<Regex> {
    Parser::new().parse_body(body, modifiers, delimiter)
}

/// Analyze a parsed pattern for catastrophic backtracking.
pub fn analyze_redos(regex: &Regex) -> ReDoSAnalysis {
    redos::analyze(regex)
}

/// Parse a pattern literal and analyze it for catastrophic backtracking.
pub fn analyze_pattern(pattern: &str) -> Result<ReDoSAnalysis> {
    redos::analyze_pattern(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn public_types_are_thread_safe() {
        assert_send_sync::<Regex>();
        assert_send_sync::<Parser>();
        assert_send_sync::<ParseError>();
        assert_send_sync::<ReDoSAnalysis>();
        assert_send_sync::<RedosAnalyzer>();
    }

    #[test]
    fn body_and_literal_agree() {
        let literal = parse("#a(b|c)+#i").unwrap();
        let body = parse_body("a(b|c)+", "i", '#').unwrap();
        assert_eq!(literal.pattern, body.pattern);
        assert_eq!(literal.flags, body.flags);
    }
}
