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

//! Recursive descent parser from pattern literals to the AST.
//!
//! Parsing happens in three steps: the literal is split into delimiter, body
//! and modifiers; the body is tokenized; the tokens are parsed by
//! `parse_alternation` > `parse_sequence` > `parse_quantified_atom`, with
//! groups and classes recursing back into `parse_alternation`. Finally the
//! [`Resolver`] checks references and lookbehinds against the complete tree.

use tracing::debug;

use crate::ast::*;
use crate::config::{Dialect, ParserConfig};
use crate::error::{ErrorKind, LexErrorKind, ParseError, Result};
use crate::flags::*;
use crate::lexer::{self, ConditionToken, GroupOpen, Reference, Token, TokenKind};
use crate::resolve::Resolver;

const POSIX_CLASSES: &[&str] = &[
    "alnum", "alpha", "ascii", "blank", "cntrl", "digit", "graph", "lower", "print", "punct", "space",
    "upper", "word", "xdigit",
];

/// The closing delimiter matching `open`.
///
/// Bracket style delimiters close with their counterpart, every other
/// delimiter closes with itself.
pub fn closing_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}

/// A pattern literal split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimited<'p> {
    /// The opening delimiter.
    pub delimiter: char,
    /// The text between the delimiters.
    pub body: &'p str,
    /// The text after the closing delimiter.
    pub modifiers: &'p str,
}

/// Split a pattern literal such as `/a+/i` into delimiter, body and modifiers.
///
/// Offsets in errors returned from here refer to the literal, since no body
/// could be identified.
pub fn split_delimiters(pattern: &str) -> Result<Delimited<'_>> {
    let trimmed = pattern.trim_start();
    let lead = pattern.len() - trimmed.len();
    let delimiter = match trimmed.chars().next() {
        Some(c) => c,
        None => {
            return Err(ParseError::new(ErrorKind::EmptyPattern, "empty regular expression", pattern, 0));
        }
    };
    if delimiter.is_alphanumeric() || delimiter == '\\' || delimiter == '\0' {
        return Err(ParseError::new(
            ErrorKind::InvalidDelimiter,
            "delimiter must not be alphanumeric, backslash, or NUL",
            pattern,
            lead,
        )
        .with_hint("wrap the pattern in a delimiter such as / or #"));
    }
    let close = closing_delimiter(delimiter);
    let rest = &trimmed[delimiter.len_utf8()..];
    let mut depth = 0usize;
    let mut escaped = false;
    let mut end = None;
    for (ix, c) in rest.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == close && depth == 0 {
            end = Some(ix);
            break;
        } else if close != delimiter {
            if c == delimiter {
                depth += 1;
            } else if c == close {
                depth -= 1;
            }
        }
    }
    let end = match end {
        Some(end) => end,
        None => {
            return Err(ParseError::new(
                ErrorKind::MissingDelimiter,
                format!("no ending delimiter '{}' found", close),
                pattern,
                pattern.len(),
            )
            .with_hint(format!(
                "the closing delimiter is simply missing; end the pattern with '{}'",
                close
            )));
        }
    };
    let body = &rest[..end];
    let modifiers = &rest[end + close.len_utf8()..];
    if let Err((ix, c)) = parse_modifiers(modifiers) {
        let offset = lead + delimiter.len_utf8() + end + close.len_utf8() + ix;
        let err = ParseError::new(
            ErrorKind::UnknownModifier,
            format!("unknown modifier '{}'", c),
            pattern,
            offset,
        );
        let err = if close == delimiter {
            err.with_hint(format!(
                "the delimiter '{}' appears unescaped inside the pattern; escape it as \\{} or use a different delimiter",
                delimiter, delimiter
            ))
        } else {
            err
        };
        return Err(err);
    }
    Ok(Delimited {
        delimiter,
        body,
        modifiers,
    })
}

/// Configurable pattern parser.
///
/// ```
/// use pcre_audit::{config::Dialect, Parser};
///
/// let regex = Parser::new().dialect(Dialect::Pcre2_10_34).parse("/a+b/i").unwrap();
/// assert_eq!(regex.capture_count, 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    /// A parser with default settings.
    pub fn new() -> Parser {
        Parser::default()
    }

    /// A parser with the given settings.
    pub fn with_config(config: ParserConfig) -> Parser {
        Parser { config }
    }

    /// Target a specific PCRE release.
    pub fn dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.config.dialect = dialect;
        self
    }

    /// Limit parenthesis nesting.
    pub fn nest_limit(&mut self, limit: usize) -> &mut Self {
        self.config.nest_limit = limit;
        self
    }

    /// Limit the length of variable-length lookbehinds.
    pub fn max_lookbehind(&mut self, max: usize) -> &mut Self {
        self.config.max_lookbehind = max;
        self
    }

    /// Accept lookbehinds without a bounded length.
    pub fn allow_unbounded_lookbehind(&mut self, yes: bool) -> &mut Self {
        self.config.allow_unbounded_lookbehind = yes;
        self
    }

    /// The current settings.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a delimited pattern literal such as `/a+/i`.
    pub fn parse(&self, pattern: &str) -> Result<Regex> {
        let parts = split_delimiters(pattern)?;
        self.parse_body(parts.body, parts.modifiers, parts.delimiter)
    }

    /// Parse a pattern body with its modifier string and delimiter.
    pub fn parse_body(&self, body: &str, modifiers: &str, delimiter: char) -> Result<Regex> {
        let flags = parse_modifiers(modifiers).map_err(|(_, c)| {
            ParseError::new(
                ErrorKind::UnknownModifier,
                format!("unknown modifier '{}'", c),
                body,
                body.len(),
            )
        })?;
        let tokens = lexer::tokenize(body, modifiers, self.config.dialect)
            .map_err(|err| ParseError::from_lex(err, body))?;
        debug!(len = body.len(), tokens = tokens.len(), "parsing pattern body");

        let mut state = ParseState::new(body, tokens, flags, &self.config);
        let pattern = state.parse_alternation(false)?;
        let tail = state.peek();
        if tail.kind != TokenKind::Eof {
            return Err(state.error(ErrorKind::UnmatchedParen, "unmatched closing parenthesis", tail.start));
        }
        let regex = Regex {
            span: Span::new(0, body.len()),
            delimiter,
            flags,
            source: body.to_string(),
            pattern: Box::new(pattern),
            capture_count: state.capture_count,
            group_names: state.group_names,
            warnings: state.warnings,
        };
        Resolver::resolve(&regex, &self.config)?;
        Ok(regex)
    }
}

struct ParseState<'p, 'c> {
    body: &'p str,
    tokens: Vec<Token<'p>>,
    ix: usize,
    config: &'c ParserConfig,
    flags: u32,
    depth: usize,
    capture_count: u32,
    group_names: Vec<(String, u32)>,
    warnings: Vec<Warning>,
    seen_item: bool,
}

impl<'p, 'c> ParseState<'p, 'c> {
    fn new(body: &'p str, tokens: Vec<Token<'p>>, flags: u32, config: &'c ParserConfig) -> Self {
        ParseState {
            body,
            tokens,
            ix: 0,
            config,
            flags,
            depth: 0,
            capture_count: 0,
            group_names: Vec::new(),
            warnings: Vec::new(),
            seen_item: false,
        }
    }

    fn peek(&self) -> Token<'p> {
        // the token list always ends in Eof, which is never consumed
        self.tokens[self.ix.min(self.tokens.len() - 1)].clone()
    }

    fn next(&mut self) -> Token<'p> {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.ix += 1;
        }
        token
    }

    fn error(&self, kind: ErrorKind, message: impl Into<String>, offset: usize) -> ParseError {
        ParseError::new(kind, message, self.body, offset)
    }

    fn casei(&self) -> bool {
        self.flags & FLAG_CASEI != 0
    }

    fn warn(&mut self, kind: WarningKind, message: String, span: Span) {
        self.warnings.push(Warning { kind, message, span });
    }

    fn enter(&mut self, offset: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > self.config.nest_limit {
            return Err(self.error(
                ErrorKind::NestingTooDeep,
                format!("parentheses are too deeply nested (limit is {})", self.config.nest_limit),
                offset,
            ));
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    fn expect_close(&mut self, open: &Token<'p>) -> Result<Token<'p>> {
        let token = self.next();
        if token.kind != TokenKind::GroupClose {
            return Err(self
                .error(ErrorKind::UnmatchedParen, "missing closing parenthesis", open.start)
                .with_hint("close the group with )"));
        }
        Ok(token)
    }

    fn parse_alternation(&mut self, branch_reset: bool) -> Result<Node> {
        let start = self.peek().start;
        let base = self.capture_count;
        let mut highest = base;
        let mut branches = Vec::new();
        loop {
            branches.push(self.parse_sequence()?);
            highest = highest.max(self.capture_count);
            if self.peek().kind != TokenKind::Alternation {
                break;
            }
            self.next();
            if branch_reset {
                self.capture_count = base;
            }
        }
        if branch_reset {
            self.capture_count = highest;
        }
        if branches.len() == 1 {
            return Ok(branches.remove(0));
        }
        let end = branches.last().map_or(start, Node::end_position);
        Ok(Node::Alternation(Alternation {
            span: Span::new(start, end),
            branches,
        }))
    }

    fn parse_sequence(&mut self) -> Result<Node> {
        let start = self.peek().start;
        let mut items = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Alternation | TokenKind::GroupClose | TokenKind::Eof => break,
                _ => self.parse_quantified_atom(&mut items)?,
            }
        }
        match items.len() {
            0 => Ok(Node::Empty(Empty {
                span: Span::empty(start),
            })),
            1 => Ok(items.remove(0)),
            _ => {
                let span = Span::new(items[0].start_position(), items[items.len() - 1].end_position());
                Ok(Node::Sequence(Sequence { span, items }))
            }
        }
    }

    /// Parse one atom and any quantifiers after it, appending to `items`.
    ///
    /// Some tokens expand to several nodes (an octal escape followed by
    /// plain digits); all but the last are appended directly and only the
    /// last is subject to a following quantifier.
    fn parse_quantified_atom(&mut self, items: &mut Vec<Node>) -> Result<()> {
        let mut atom = self.parse_atom(items)?;
        let mut quantified = false;
        while let TokenKind::Quantifier { min, max, kind } = self.peek().kind {
            let token = self.next();
            let repeatable = match &atom {
                Node::Quantifier(_) => token.text.starts_with('{'),
                other => !matches!(
                    other,
                    Node::Empty(_)
                        | Node::Anchor(_)
                        | Node::InlineFlags(_)
                        | Node::Verb(_)
                        | Node::Callout(_)
                        | Node::Comment(_)
                        | Node::Define(_)
                ),
            };
            if !repeatable {
                return Err(self.error(
                    ErrorKind::NothingToRepeat,
                    "quantifier does not follow a repeatable item",
                    token.start,
                ));
            }
            if min > max {
                return Err(self.error(
                    ErrorKind::InvalidRange,
                    "numbers out of order in {} quantifier",
                    token.start,
                ));
            }
            let span = Span::new(atom.start_position(), token.end);
            atom = Node::Quantifier(Quantifier {
                span,
                target: Box::new(atom),
                min,
                max,
                kind,
            });
            quantified = true;
        }
        if quantified || !matches!(&atom, Node::Verb(v) if v.is_setting()) {
            self.seen_item = true;
        }
        items.push(atom);
        Ok(())
    }

    fn parse_atom(&mut self, items: &mut Vec<Node>) -> Result<Node> {
        let token = self.next();
        let span = Span::new(token.start, token.end);
        let node = match token.kind.clone() {
            TokenKind::Literal(value) => self.literal(span, value, LiteralForm::Verbatim),
            TokenKind::Escaped { value, form } => self.literal(span, value, form),
            TokenKind::NumericEscape(number) => self.parse_escape(&token, number, items)?,
            TokenKind::Shorthand { kind, negated } => Node::Shorthand(Shorthand { span, kind, negated }),
            TokenKind::Anchor(kind) => Node::Anchor(Anchor {
                span,
                kind,
                multiline: self.flags & FLAG_MULTI != 0,
            }),
            TokenKind::Dot => Node::Dot(Dot {
                span,
                dotall: self.flags & FLAG_DOTNL != 0,
            }),
            TokenKind::Quantifier { .. } => {
                return Err(self.error(
                    ErrorKind::NothingToRepeat,
                    "quantifier does not follow a repeatable item",
                    token.start,
                ));
            }
            TokenKind::GroupOpen(open) => self.parse_group(&token, open)?,
            TokenKind::InlineFlags(modifiers) => {
                self.check_modifiers(&modifiers, span);
                self.flags = modifiers.apply(self.flags);
                Node::InlineFlags(InlineFlags { span, modifiers })
            }
            TokenKind::ClassOpen { negated } => self.parse_class(&token, negated)?,
            TokenKind::Backref(reference) => Node::Backref(Backref {
                span,
                reference: self.group_ref(reference, ErrorKind::UnresolvedBackref, token.start)?,
                casei: self.casei(),
            }),
            TokenKind::Subroutine(reference) => Node::Subroutine(Subroutine {
                span,
                target: self.subroutine_target(reference, token.start)?,
            }),
            TokenKind::ConditionOpen(condition) => self.parse_conditional(&token, condition)?,
            TokenKind::Verb { name, arg } => {
                let verb = Verb { span, name, arg };
                if verb.is_setting() && self.seen_item {
                    self.warn(
                        WarningKind::MisplacedSetting,
                        format!("(*{}) has no effect after the start of the pattern", verb.name),
                        span,
                    );
                }
                Node::Verb(verb)
            }
            TokenKind::Comment(text) => Node::Comment(Comment { span, text }),
            TokenKind::Callout(arg) => Node::Callout(Callout { span, arg }),
            // class tokens are consumed by parse_class; alternation, close
            // and end are handled by the callers
            TokenKind::ClassClose => self.literal(span, ']', LiteralForm::Verbatim),
            TokenKind::ClassHyphen => self.literal(span, '-', LiteralForm::Verbatim),
            TokenKind::ClassIntersection
            | TokenKind::ClassSubtraction
            | TokenKind::PosixClass { .. }
            | TokenKind::Alternation
            | TokenKind::GroupClose
            | TokenKind::Eof => {
                return Err(self.error(ErrorKind::InvalidGroup, "unexpected token", token.start));
            }
        };
        Ok(node)
    }

    fn literal(&self, span: Span, value: char, form: LiteralForm) -> Node {
        Node::Literal(Literal {
            span,
            value,
            form,
            casei: self.casei(),
        })
    }

    /// `\N` outside a class: a backreference when fewer than ten, starting
    /// with 8 or 9, or when that many groups precede it; otherwise up to
    /// three octal digits followed by literal digits.
    fn parse_escape(&mut self, token: &Token<'p>, number: u32, items: &mut Vec<Node>) -> Result<Node> {
        if number == 0 {
            return Err(self
                .error(ErrorKind::UnresolvedBackref, "\\0 does not refer to a group", token.start)
                .with_hint("write a NUL character as \\x{0} or \\o{0}"));
        }
        let digits = &token.text[1..];
        let leading = digits.as_bytes().first().copied().unwrap_or(b'0');
        if number < 10 || leading == b'8' || leading == b'9' || number <= self.capture_count {
            return Ok(Node::Backref(Backref {
                span: Span::new(token.start, token.end),
                reference: GroupRef::Number(number),
                casei: self.casei(),
            }));
        }
        let octal_len = digits.bytes().take(3).take_while(|b| (b'0'..=b'7').contains(b)).count();
        let value = digits[..octal_len]
            .bytes()
            .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
        if value > 0xff && self.flags & FLAG_UNICODE == 0 {
            return Err(self.error(
                ErrorKind::Lex(LexErrorKind::InvalidCodePoint),
                "octal value is greater than \\377 in 8-bit non-UTF mode",
                token.start,
            ));
        }
        let octal_end = token.start + 1 + octal_len;
        let mut node = self.literal(
            Span::new(token.start, octal_end),
            char::from_u32(value).unwrap_or('\0'),
            LiteralForm::Octal,
        );
        for (ix, c) in digits[octal_len..].char_indices() {
            items.push(node);
            let at = octal_end + ix;
            node = self.literal(Span::new(at, at + 1), c, LiteralForm::Verbatim);
        }
        Ok(node)
    }

    fn group_ref(&self, reference: Reference, kind: ErrorKind, offset: usize) -> Result<GroupRef> {
        match reference {
            Reference::Number(number) => Ok(GroupRef::Number(number)),
            Reference::Name(name) => Ok(GroupRef::Name(name)),
            Reference::Relative(relative) => {
                let number = self.relative_number(relative, kind, offset)?;
                Ok(GroupRef::Relative {
                    offset: relative,
                    number,
                })
            }
        }
    }

    /// Resolve `-n` to the n-th most recently opened group and `+n` to the
    /// n-th group opened after this point.
    fn relative_number(&self, relative: i32, kind: ErrorKind, offset: usize) -> Result<u32> {
        let seen = i64::from(self.capture_count);
        let number = if relative < 0 {
            seen + 1 + i64::from(relative)
        } else {
            seen + i64::from(relative)
        };
        if relative == 0 || number < 1 || number > i64::from(u32::MAX) {
            return Err(self.error(
                kind,
                format!("relative reference {:+} does not denote a group", relative),
                offset,
            ));
        }
        Ok(number as u32)
    }

    fn subroutine_target(&self, reference: Reference, offset: usize) -> Result<SubroutineTarget> {
        Ok(match reference {
            Reference::Number(0) => SubroutineTarget::Recursive,
            Reference::Number(number) => SubroutineTarget::Group(number),
            Reference::Name(name) => SubroutineTarget::Named(name),
            Reference::Relative(relative) => SubroutineTarget::Relative {
                offset: relative,
                number: self.relative_number(relative, ErrorKind::UnresolvedSubroutine, offset)?,
            },
        })
    }

    fn check_modifiers(&mut self, modifiers: &FlagModifiers, span: Span) {
        let conflicting = modifiers.on & modifiers.off;
        if conflicting != 0 {
            self.warn(
                WarningKind::ConflictingFlag,
                format!(
                    "inline flags `{}` are both set and unset",
                    modifier_letters(conflicting)
                ),
                span,
            );
        }
        let redundant = modifiers.redundant_bits(self.flags) & !conflicting;
        if redundant != 0 {
            self.warn(
                WarningKind::RedundantFlag,
                format!("inline flags `{}` have no effect here", modifier_letters(redundant)),
                span,
            );
        }
    }

    fn register_name(&mut self, name: &str, number: u32, offset: usize) -> Result<()> {
        if let Some((_, existing)) = self.group_names.iter().find(|(group, _)| group == name) {
            if *existing == number {
                // the same group in another branch of a branch reset
                return Ok(());
            }
            if self.flags & FLAG_DUPNAMES == 0 {
                return Err(self
                    .error(
                        ErrorKind::DuplicateName,
                        format!("two named groups have the same name '{}'", name),
                        offset,
                    )
                    .with_hint("rename one of the groups or allow duplicates with (?J)"));
            }
        }
        if self
            .group_names
            .iter()
            .any(|(group, existing)| *existing == number && group != name)
        {
            return Err(self.error(
                ErrorKind::DuplicateName,
                format!("different names for groups of the same number {} are not allowed", number),
                offset,
            ));
        }
        self.group_names.push((name.to_string(), number));
        Ok(())
    }

    fn next_group_number(&mut self) -> u32 {
        self.capture_count += 1;
        self.capture_count
    }

    fn parse_group(&mut self, open_token: &Token<'p>, open: GroupOpen) -> Result<Node> {
        self.enter(open_token.start)?;
        let saved_flags = self.flags;
        let (kind, name, number) = match open {
            GroupOpen::Capturing if self.flags & FLAG_NO_AUTO_CAPTURE != 0 => (GroupKind::NonCapturing, None, None),
            GroupOpen::Capturing => (GroupKind::Capturing, None, Some(self.next_group_number())),
            GroupOpen::Named(name) => {
                let number = self.next_group_number();
                self.register_name(&name, number, open_token.start)?;
                (GroupKind::Named, Some(name), Some(number))
            }
            GroupOpen::NonCapturing => (GroupKind::NonCapturing, None, None),
            GroupOpen::Atomic => (GroupKind::Atomic, None, None),
            GroupOpen::Lookahead => (GroupKind::Lookahead, None, None),
            GroupOpen::NegativeLookahead => (GroupKind::NegativeLookahead, None, None),
            GroupOpen::Lookbehind => (GroupKind::Lookbehind, None, None),
            GroupOpen::NegativeLookbehind => (GroupKind::NegativeLookbehind, None, None),
            GroupOpen::NonAtomicLookahead => (GroupKind::NonAtomicLookahead, None, None),
            GroupOpen::NonAtomicLookbehind => (GroupKind::NonAtomicLookbehind, None, None),
            GroupOpen::BranchReset => (GroupKind::BranchReset, None, None),
            GroupOpen::Modifiers(modifiers) => {
                self.check_modifiers(&modifiers, Span::new(open_token.start, open_token.end));
                self.flags = modifiers.apply(self.flags);
                (GroupKind::Modifiers(modifiers), None, None)
            }
        };
        let body = self.parse_alternation(kind == GroupKind::BranchReset)?;
        let close = self.expect_close(open_token)?;
        self.flags = saved_flags;
        self.exit();
        Ok(Node::Group(Group {
            span: Span::new(open_token.start, close.end),
            kind,
            name,
            number,
            body: Box::new(body),
        }))
    }

    fn parse_conditional(&mut self, open_token: &Token<'p>, condition: ConditionToken) -> Result<Node> {
        self.enter(open_token.start)?;
        let saved_flags = self.flags;
        let offset = open_token.start;
        let condition = match condition {
            ConditionToken::Define => {
                let body = self.parse_alternation(false)?;
                if let Node::Alternation(alt) = &body {
                    return Err(self.error(
                        ErrorKind::InvalidConditional,
                        "DEFINE group contains more than one branch",
                        alt.span.start,
                    ));
                }
                let close = self.expect_close(open_token)?;
                self.flags = saved_flags;
                self.exit();
                return Ok(Node::Define(Define {
                    span: Span::new(offset, close.end),
                    body: Box::new(body),
                }));
            }
            ConditionToken::Assertion(open) => {
                let kind = match open {
                    GroupOpen::Lookahead => GroupKind::Lookahead,
                    GroupOpen::NegativeLookahead => GroupKind::NegativeLookahead,
                    GroupOpen::Lookbehind => GroupKind::Lookbehind,
                    GroupOpen::NegativeLookbehind => GroupKind::NegativeLookbehind,
                    GroupOpen::NonAtomicLookahead => GroupKind::NonAtomicLookahead,
                    GroupOpen::NonAtomicLookbehind => GroupKind::NonAtomicLookbehind,
                    _ => {
                        return Err(self.error(
                            ErrorKind::InvalidConditional,
                            "assertion expected after (?(",
                            offset,
                        ));
                    }
                };
                // the assertion's own parenthesis follows "(?"
                let start = offset + 2;
                self.enter(start)?;
                let body = self.parse_alternation(false)?;
                let close = self.expect_close(open_token)?;
                self.flags = saved_flags;
                self.exit();
                Condition::Assertion(Box::new(Node::Group(Group {
                    span: Span::new(start, close.end),
                    kind,
                    name: None,
                    number: None,
                    body: Box::new(body),
                })))
            }
            ConditionToken::Reference(reference) => {
                Condition::Group(self.group_ref(reference, ErrorKind::UnresolvedBackref, offset)?)
            }
            ConditionToken::Recursion => Condition::Recursion,
            ConditionToken::RecursionGroup(number) => Condition::RecursionGroup(number),
            ConditionToken::RecursionName(name) => Condition::RecursionName(name),
        };
        let yes = self.parse_sequence()?;
        let no = if self.peek().kind == TokenKind::Alternation {
            self.next();
            Some(Box::new(self.parse_sequence()?))
        } else {
            None
        };
        let next = self.peek();
        if next.kind == TokenKind::Alternation {
            return Err(self.error(
                ErrorKind::InvalidConditional,
                "conditional subpattern contains more than two branches",
                next.start,
            ));
        }
        let close = self.expect_close(open_token)?;
        self.flags = saved_flags;
        self.exit();
        Ok(Node::Conditional(Conditional {
            span: Span::new(offset, close.end),
            condition,
            yes: Box::new(yes),
            no,
        }))
    }

    fn parse_class(&mut self, open_token: &Token<'p>, negated: bool) -> Result<Node> {
        let casei = self.casei();
        let mut members: Vec<Node> = Vec::new();
        let mut lhs: Option<(Node, ClassOp)> = None;
        let close = loop {
            let token = self.next();
            match token.kind {
                TokenKind::ClassClose => break token,
                TokenKind::Eof => {
                    return Err(self
                        .error(
                            ErrorKind::UnclosedClass,
                            "missing terminating ] for character class",
                            open_token.start,
                        )
                        .with_hint("close the class with ] or escape the [ as \\["));
                }
                TokenKind::ClassIntersection | TokenKind::ClassSubtraction => {
                    let op = if token.kind == TokenKind::ClassIntersection {
                        ClassOp::Intersection
                    } else {
                        ClassOp::Subtraction
                    };
                    let operand = union_of(std::mem::take(&mut members), token.start);
                    lhs = Some((set_operation(lhs, operand), op));
                }
                _ => {
                    let member = self.parse_class_member(&token)?;
                    let is_range = self.peek().kind == TokenKind::ClassHyphen
                        && !matches!(
                            self.tokens.get(self.ix + 1).map(|t| &t.kind),
                            Some(TokenKind::ClassClose) | Some(TokenKind::Eof) | None
                        );
                    if is_range {
                        self.next();
                        let end_token = self.next();
                        let end = self.parse_class_member(&end_token)?;
                        members.push(self.make_range(member, end)?);
                    } else {
                        members.push(member);
                    }
                }
            }
        };
        let expr = set_operation(lhs, union_of(members, close.start));
        Ok(Node::CharClass(CharClass {
            span: Span::new(open_token.start, close.end),
            negated,
            casei,
            expr: Box::new(expr),
        }))
    }

    fn parse_class_member(&mut self, token: &Token<'p>) -> Result<Node> {
        let span = Span::new(token.start, token.end);
        let node = match token.kind.clone() {
            TokenKind::Literal(value) => self.literal(span, value, LiteralForm::Verbatim),
            TokenKind::Escaped { value, form } => self.literal(span, value, form),
            TokenKind::ClassHyphen => self.literal(span, '-', LiteralForm::Verbatim),
            TokenKind::Shorthand { kind, negated } => Node::Shorthand(Shorthand { span, kind, negated }),
            TokenKind::PosixClass { name, negated } => {
                if !POSIX_CLASSES.contains(&name.as_str()) {
                    return Err(self.error(
                        ErrorKind::InvalidEscape,
                        format!("unknown POSIX class name '{}'", name),
                        token.start,
                    ));
                }
                Node::PosixClass(PosixClass { span, name, negated })
            }
            TokenKind::ClassClose | TokenKind::Eof => {
                return Err(self.error(
                    ErrorKind::UnclosedClass,
                    "missing terminating ] for character class",
                    token.start,
                ));
            }
            _ => {
                return Err(self.error(
                    ErrorKind::InvalidEscape,
                    "unexpected item in character class",
                    token.start,
                ));
            }
        };
        Ok(node)
    }

    fn make_range(&self, start: Node, end: Node) -> Result<Node> {
        let span = start.span().cover(end.span());
        match (&start, &end) {
            (Node::Literal(a), Node::Literal(b)) => {
                if a.value > b.value {
                    return Err(self.error(
                        ErrorKind::InvalidRange,
                        "range out of order in character class",
                        span.start,
                    ));
                }
                Ok(Node::Range(Range {
                    span,
                    start: a.value,
                    end: b.value,
                }))
            }
            _ => Err(self.error(
                ErrorKind::InvalidRange,
                "invalid range in character class",
                span.start,
            )),
        }
    }
}

/// Apply a pending left-associative set operation to `rhs`.
fn set_operation(lhs: Option<(Node, ClassOp)>, rhs: Node) -> Node {
    match lhs {
        Some((lhs, op)) => Node::ClassOperation(ClassOperation {
            span: lhs.span().cover(rhs.span()),
            op,
            operands: vec![lhs, rhs],
        }),
        None => rhs,
    }
}

fn union_of(mut members: Vec<Node>, at: usize) -> Node {
    match members.len() {
        0 => Node::Empty(Empty { span: Span::empty(at) }),
        1 => members.remove(0),
        _ => {
            let span = members[0].span().cover(members[members.len() - 1].span());
            Node::ClassOperation(ClassOperation {
                span,
                op: ClassOp::Union,
                operands: members,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pattern: &str) -> Regex {
        Parser::new().parse(pattern).unwrap()
    }

    fn parse_err(pattern: &str) -> ParseError {
        Parser::new().parse(pattern).unwrap_err()
    }

    #[test]
    fn splits_delimiters() {
        let parts = split_delimiters("  #a/b#im").unwrap();
        assert_eq!(parts.delimiter, '#');
        assert_eq!(parts.body, "a/b");
        assert_eq!(parts.modifiers, "im");
    }

    #[test]
    fn bracket_delimiters_nest() {
        let parts = split_delimiters("{a{2}}x").unwrap();
        assert_eq!(parts.body, "a{2}");
        assert_eq!(parts.modifiers, "x");
        assert_eq!(closing_delimiter('<'), '>');
    }

    #[test]
    fn delimiter_errors() {
        assert_eq!(parse_err("").kind, ErrorKind::EmptyPattern);
        assert_eq!(parse_err("abc").kind, ErrorKind::InvalidDelimiter);
        let missing = parse_err("/abc");
        assert_eq!(missing.kind, ErrorKind::MissingDelimiter);
        assert!(missing.hint.unwrap().contains("simply missing"));
        let unescaped = parse_err("/a/b/");
        assert_eq!(unescaped.kind, ErrorKind::UnknownModifier);
        assert!(unescaped.hint.unwrap().contains("unescaped"));
    }

    #[test]
    fn sequence_with_quantifier() {
        let regex = parse("/a+b/");
        match regex.pattern.as_ref() {
            Node::Sequence(seq) => {
                assert_eq!(seq.items.len(), 2);
                match &seq.items[0] {
                    Node::Quantifier(q) => {
                        assert_eq!((q.min, q.max), (1, Quantifier::UNBOUNDED));
                        assert_eq!(q.span, Span::new(0, 2));
                    }
                    other => panic!("expected quantifier, got {:?}", other),
                }
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn capture_numbering() {
        let regex = parse("/(a)(?:b)(?<n>c)/");
        assert_eq!(regex.capture_count, 2);
        assert_eq!(regex.group_number("n"), Some(2));
    }

    #[test]
    fn branch_reset_numbering() {
        let regex = parse("/(?|(a)|(b)(c))(d)/");
        assert_eq!(regex.capture_count, 3);
        let regex = parse(r"/(?|(?<x>a)|(?<x>b))\k<x>/");
        assert_eq!(regex.capture_count, 1);
        assert_eq!(parse_err("/(?|(?<x>a)|(?<y>b))/").kind, ErrorKind::DuplicateName);
    }

    #[test]
    fn duplicate_names() {
        assert_eq!(parse_err("/(?<a>x)(?<a>y)/").kind, ErrorKind::DuplicateName);
        assert!(Parser::new().parse("/(?<a>x)|(?<a>y)/J").is_ok());
        assert!(Parser::new().parse("/(?J)(?<a>x)|(?<a>y)/").is_ok());
    }

    #[test]
    fn no_auto_capture() {
        let regex = parse("/(a)(?<b>c)/n");
        assert_eq!(regex.capture_count, 1);
        assert_eq!(regex.group_number("b"), Some(1));
    }

    #[test]
    fn numeric_escapes() {
        let regex = parse(r"/\12/");
        match regex.pattern.as_ref() {
            Node::Literal(lit) => {
                assert_eq!(lit.value, '\n');
                assert_eq!(lit.form, LiteralForm::Octal);
            }
            other => panic!("expected octal literal, got {:?}", other),
        }
        assert_eq!(parse_err(r"/\2(a)/").kind, ErrorKind::UnresolvedBackref);
        let regex = parse(r"/\18/");
        match regex.pattern.as_ref() {
            Node::Sequence(seq) => {
                assert_eq!(seq.items.len(), 2);
                assert_eq!(seq.items[1].span(), Span::new(2, 3));
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn relative_references() {
        let regex = parse(r"/(a)(b)\g{-2}/");
        match regex.pattern.as_ref() {
            Node::Sequence(seq) => match &seq.items[2] {
                Node::Backref(b) => {
                    assert_eq!(b.reference, GroupRef::Relative { offset: -2, number: 1 })
                }
                other => panic!("expected backref, got {:?}", other),
            },
            other => panic!("expected sequence, got {:?}", other),
        }
        assert_eq!(parse_err(r"/a\g{-1}/").kind, ErrorKind::UnresolvedBackref);
        assert_eq!(parse_err(r"/\g0/").kind, ErrorKind::UnresolvedBackref);
    }

    #[test]
    fn quantifier_errors() {
        assert_eq!(parse_err("/*a/").kind, ErrorKind::NothingToRepeat);
        assert_eq!(parse_err("/a{3,2}/").kind, ErrorKind::InvalidRange);
        assert_eq!(parse_err("/^*/").kind, ErrorKind::NothingToRepeat);
        assert!(Parser::new().parse("/a{2}{3}/").is_ok());
    }

    #[test]
    fn classes() {
        let regex = parse("/[^a-z_]/");
        match regex.pattern.as_ref() {
            Node::CharClass(class) => {
                assert!(class.negated);
                match class.expr.as_ref() {
                    Node::ClassOperation(op) => {
                        assert_eq!(op.op, ClassOp::Union);
                        assert_eq!(op.operands.len(), 2);
                    }
                    other => panic!("expected union, got {:?}", other),
                }
            }
            other => panic!("expected class, got {:?}", other),
        }
        assert_eq!(parse_err("/[z-a]/").kind, ErrorKind::InvalidRange);
        assert_eq!(parse_err(r"/[\d-z]/").kind, ErrorKind::InvalidRange);
        assert!(Parser::new().parse("/[a-]/").is_ok());
        assert_eq!(parse_err("/[[:bogus:]]/").kind, ErrorKind::InvalidEscape);
    }

    #[test]
    fn unclosed_class_points_at_bracket() {
        let err = parse_err("/ab[a-z/");
        assert_eq!(err.kind, ErrorKind::UnclosedClass);
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn class_set_operations() {
        let regex = Parser::new()
            .dialect(Dialect::Pcre2_10_45)
            .parse("/[a-z&&[:lower:]--q]/")
            .unwrap();
        match regex.pattern.as_ref() {
            Node::CharClass(class) => match class.expr.as_ref() {
                Node::ClassOperation(op) => {
                    assert_eq!(op.op, ClassOp::Subtraction);
                    assert!(matches!(&op.operands[0], Node::ClassOperation(inner) if inner.op == ClassOp::Intersection));
                }
                other => panic!("expected operation, got {:?}", other),
            },
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn parens() {
        assert_eq!(parse_err("/(a/").kind, ErrorKind::UnmatchedParen);
        assert_eq!(parse_err("/a)/").kind, ErrorKind::UnmatchedParen);
        assert_eq!(parse_err("/a)/").offset, 1);
    }

    #[test]
    fn nesting_limit() {
        let body = format!("/{}a{}/", "(".repeat(40), ")".repeat(40));
        let err = Parser::new().nest_limit(32).parse(&body).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NestingTooDeep);
        assert!(Parser::new().parse(&body).is_ok());
    }

    #[test]
    fn inline_flag_scope() {
        let regex = parse("/(?i:a)b(?i)c/");
        let casei: Vec<bool> = match regex.pattern.as_ref() {
            Node::Sequence(seq) => seq
                .items
                .iter()
                .filter_map(|item| match item {
                    Node::Literal(l) => Some(l.casei),
                    Node::Group(g) => match g.body.as_ref() {
                        Node::Literal(l) => Some(l.casei),
                        _ => None,
                    },
                    _ => None,
                })
                .collect(),
            other => panic!("expected sequence, got {:?}", other),
        };
        assert_eq!(casei, vec![true, false, true]);
    }

    #[test]
    fn redundant_flags_warn() {
        let regex = parse("/(?i)a/i");
        assert_eq!(regex.warnings.len(), 1);
        assert_eq!(regex.warnings[0].kind, WarningKind::RedundantFlag);
        let regex = parse("/a(*UTF)/");
        assert_eq!(regex.warnings[0].kind, WarningKind::MisplacedSetting);
        assert!(parse("/(*UTF)(*UCP)a/").warnings.is_empty());
    }

    #[test]
    fn conditionals() {
        let regex = parse("/(a)?(?(1)b|c)/");
        match regex.pattern.as_ref() {
            Node::Sequence(seq) => assert!(matches!(&seq.items[1], Node::Conditional(c) if c.no.is_some())),
            other => panic!("expected sequence, got {:?}", other),
        }
        assert_eq!(parse_err("/(a)(?(1)b|c|d)/").kind, ErrorKind::InvalidConditional);
        assert_eq!(parse_err("/(?(DEFINE)a|b)/").kind, ErrorKind::InvalidConditional);
        assert!(Parser::new().parse("/(?(?=a)ab|cd)/").is_ok());
        assert!(Parser::new().parse("/(?(DEFINE)(?<d>\\d+))(?&d)/").is_ok());
    }

    #[test]
    fn lookbehind_checks() {
        assert_eq!(parse_err("/(?<=a+)b/").kind, ErrorKind::UnboundedLookbehind);
        assert!(Parser::new().parse("/(?<=a|bc)d/").is_ok());
    }
}
