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

//! Flat tokenizer for pattern bodies.
//!
//! The lexer classifies runs of characters into positioned tokens. It keeps
//! only lexical state (inside a class, inside `\Q...\E`, whether extended
//! mode is skipping whitespace) and never validates pairing of brackets or
//! parentheses; an unbalanced `)` or an unterminated `[` is left for the
//! parser to report.
//!
//! Extended mode is tracked here rather than in the parser so that text
//! inside `#` comments is never tokenized. Each group opener saves the current
//! `x`/`xx` state and each `)` restores it; an unmatched `)` simply leaves
//! the state alone.

use serde::Serialize;

use crate::ast::{AnchorKind, CalloutArg, LiteralForm, QuantifierKind, ShorthandKind};
use crate::config::Dialect;
use crate::error::{LexError, LexErrorKind};
use crate::flags::{
    inline_flag, parse_modifiers, FlagModifiers, FLAG_IGNORE_SPACE, FLAG_IGNORE_SPACE_CLASS,
    FLAG_NO_AUTO_CAPTURE, FLAG_UNICODE,
};

type Result<T> = std::result::Result<T, LexError>;

/// Largest repetition count PCRE2 accepts in `{m,n}`.
pub const MAX_REPEAT: usize = 65535;

/// Longest group name PCRE2 accepts.
pub const MAX_NAME_LEN: usize = 32;

const EXTENDED_BITS: u32 = FLAG_IGNORE_SPACE | FLAG_IGNORE_SPACE_CLASS;

const VERBS: &[&str] = &["ACCEPT", "FAIL", "F", "COMMIT", "PRUNE", "SKIP", "THEN", "MARK"];

const SETTINGS: &[&str] = &[
    "UTF",
    "UTF8",
    "UCP",
    "CR",
    "LF",
    "CRLF",
    "ANYCRLF",
    "ANY",
    "NUL",
    "BSR_ANYCRLF",
    "BSR_UNICODE",
    "NO_AUTO_POSSESS",
    "NO_DOTSTAR_ANCHOR",
    "NO_JIT",
    "NO_START_OPT",
    "NOTEMPTY",
    "NOTEMPTY_ATSTART",
    "LIMIT_MATCH",
    "LIMIT_DEPTH",
    "LIMIT_RECURSION",
    "LIMIT_HEAP",
];

/// Whether `name` is a start-of-pattern setting such as `UTF` or `LIMIT_MATCH`.
pub fn is_start_setting(name: &str) -> bool {
    SETTINGS.contains(&name)
}

/// A token with its byte range in the pattern body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token<'p> {
    /// What was recognized.
    pub kind: TokenKind,
    /// The source text of the token.
    pub text: &'p str,
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

/// How a reference token names its group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Reference {
    /// `\2`, `\g{2}`, `(?2)`
    Number(u32),
    /// `\g{-1}`, `(?+1)`
    Relative(i32),
    /// `\k<name>`, `(?&name)`
    Name(String),
}

/// Group openers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GroupOpen {
    /// `(`
    Capturing,
    /// `(?:`
    NonCapturing,
    /// `(?<name>`, `(?'name'`, `(?P<name>`
    Named(String),
    /// `(?>`
    Atomic,
    /// `(?=`
    Lookahead,
    /// `(?!`
    NegativeLookahead,
    /// `(?<=`
    Lookbehind,
    /// `(?<!`
    NegativeLookbehind,
    /// `(*napla:`
    NonAtomicLookahead,
    /// `(*naplb:`
    NonAtomicLookbehind,
    /// `(?|`
    BranchReset,
    /// `(?i-s:`
    Modifiers(FlagModifiers),
}

/// The condition part of a conditional group opener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConditionToken {
    /// `(?(1)`, `(?(<name>)`, `(?('name')`, `(?(name)`
    Reference(Reference),
    /// `(?(R)`
    Recursion,
    /// `(?(R2)`
    RecursionGroup(u32),
    /// `(?(R&name)`
    RecursionName(String),
    /// `(?(DEFINE)`
    Define,
    /// `(?(?=`, `(?(?!`, `(?(?<=`, `(?(?<!`: opens the assertion too.
    Assertion(GroupOpen),
}

/// Token categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    /// A character written as itself.
    Literal(char),
    /// A character written as an escape or inside `\Q...\E`.
    Escaped {
        /// The decoded character.
        value: char,
        /// How it was written.
        form: LiteralForm,
    },
    /// `\` followed by digits outside a class; backreference or octal
    /// depending on how many groups precede it.
    NumericEscape(u32),
    /// `\d`, `\W`, `\p{L}`, ...
    Shorthand {
        /// Which class.
        kind: ShorthandKind,
        /// Whether negated.
        negated: bool,
    },
    /// `^`, `$`, `\b`, `\A`, ...
    Anchor(AnchorKind),
    /// `.`
    Dot,
    /// `*`, `+`, `?`, `{m,n}` with optional `?`/`+` suffix.
    Quantifier {
        /// Minimum repetitions.
        min: usize,
        /// Maximum repetitions, `usize::MAX` when unbounded.
        max: usize,
        /// Greediness as written.
        kind: QuantifierKind,
    },
    /// `|`
    Alternation,
    /// Any group opener.
    GroupOpen(GroupOpen),
    /// `)`
    GroupClose,
    /// `(?i)` without a body.
    InlineFlags(FlagModifiers),
    /// `[` or `[^`
    ClassOpen {
        /// Whether `[^`.
        negated: bool,
    },
    /// `]` closing a class.
    ClassClose,
    /// `-` inside a class; the parser decides range or literal.
    ClassHyphen,
    /// `&&` inside a class.
    ClassIntersection,
    /// `--` inside a class.
    ClassSubtraction,
    /// `[:alpha:]` inside a class.
    PosixClass {
        /// The class name.
        name: String,
        /// Whether `[:^alpha:]`.
        negated: bool,
    },
    /// `\g1`, `\g{-1}`, `\k<name>`, `(?P=name)`
    Backref(Reference),
    /// `(?R)`, `(?1)`, `(?&name)`, `\g<1>`
    Subroutine(Reference),
    /// `(?(...)` conditional opener.
    ConditionOpen(ConditionToken),
    /// `(*VERB)` or `(*VERB:arg)`
    Verb {
        /// Verb name.
        name: String,
        /// Argument, if any.
        arg: Option<String>,
    },
    /// `(?#...)`
    Comment(String),
    /// `(?C...)`
    Callout(CalloutArg),
    /// End of input.
    Eof,
}

/// Tokenize a pattern body.
///
/// `flags` is the modifier string that followed the closing delimiter; only
/// the letters relevant to lexing (`x`, `u`, `n`) are looked at and unknown
/// letters are ignored here, since the parser validates modifiers.
pub fn tokenize<'p>(body: &'p str, flags: &str, dialect: Dialect) -> Result<Vec<Token<'p>>> {
    let bits = flags
        .chars()
        .filter_map(|c| parse_modifiers(c.encode_utf8(&mut [0; 4])).ok())
        .fold(0, |acc, bit| acc | bit);
    Lexer::new(body, bits, dialect).run()
}

/// The lexer state.
pub struct Lexer<'p> {
    body: &'p str,
    pos: usize,
    dialect: Dialect,
    utf: bool,
    extended: u32,
    saved: Vec<u32>,
    in_class: bool,
    class_fresh: bool,
    quoting: bool,
    tokens: Vec<Token<'p>>,
}

impl<'p> Lexer<'p> {
    /// Create a lexer for `body` with the given modifier bits.
    pub fn new(body: &'p str, flags: u32, dialect: Dialect) -> Lexer<'p> {
        let utf = flags & FLAG_UNICODE != 0 || body.starts_with("(*UTF)") || body.starts_with("(*UTF8)");
        Lexer {
            body,
            pos: 0,
            dialect,
            utf,
            extended: flags & EXTENDED_BITS,
            saved: Vec::new(),
            in_class: false,
            class_fresh: false,
            quoting: false,
            tokens: Vec::new(),
        }
    }

    /// Consume the whole body.
    pub fn run(mut self) -> Result<Vec<Token<'p>>> {
        while self.pos < self.body.len() {
            let start = self.pos;
            let kind = if self.quoting {
                self.lex_quoted()
            } else if self.in_class {
                self.lex_class_item()?
            } else {
                self.lex_item()?
            };
            if let Some(kind) = kind {
                self.push(kind, start);
            }
        }
        let end = self.body.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            text: "",
            start: end,
            end,
        });
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        match &kind {
            TokenKind::GroupOpen(open) => {
                self.saved.push(self.extended);
                if let GroupOpen::Modifiers(modifiers) = open {
                    self.extended = modifiers.apply(self.extended) & EXTENDED_BITS;
                }
            }
            TokenKind::ConditionOpen(condition) => {
                self.saved.push(self.extended);
                if matches!(condition, ConditionToken::Assertion(_)) {
                    self.saved.push(self.extended);
                }
            }
            TokenKind::GroupClose => {
                if let Some(previous) = self.saved.pop() {
                    self.extended = previous;
                }
            }
            TokenKind::InlineFlags(modifiers) => {
                self.extended = modifiers.apply(self.extended) & EXTENDED_BITS;
            }
            _ => {}
        }
        self.tokens.push(Token {
            kind,
            text: &self.body[start..self.pos],
            start,
            end: self.pos,
        });
    }

    fn rest(&self) -> &'p str {
        &self.body[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn error<T>(&self, kind: LexErrorKind, message: impl Into<String>, offset: usize) -> Result<T> {
        Err(LexError::new(kind, message, offset))
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> &'p str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.body[start..self.pos]
    }

    fn read_number(&mut self, at: usize) -> Result<Option<u32>> {
        let digits = self.read_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Ok(None);
        }
        match digits.parse::<u32>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => self.error(LexErrorKind::NumberTooLarge, "number is too big", at),
        }
    }

    fn lex_quoted(&mut self) -> Option<TokenKind> {
        if self.eat_str("\\E") {
            self.quoting = false;
            return None;
        }
        let c = self.bump()?;
        if self.in_class {
            self.class_fresh = false;
        }
        Some(TokenKind::Escaped {
            value: c,
            form: LiteralForm::Quoted,
        })
    }

    fn lex_item(&mut self) -> Result<Option<TokenKind>> {
        let start = self.pos;
        let c = match self.bump() {
            Some(c) => c,
            None => return Ok(None),
        };
        if self.extended != 0 {
            if is_pattern_whitespace(c) {
                return Ok(None);
            }
            if c == '#' {
                self.read_while(|c| c != '\n');
                self.eat('\n');
                return Ok(None);
            }
        }
        let kind = match c {
            '\\' => return self.lex_escape(start, false),
            '(' => self.lex_paren(start)?,
            ')' => TokenKind::GroupClose,
            '|' => TokenKind::Alternation,
            '[' => {
                self.in_class = true;
                self.class_fresh = true;
                TokenKind::ClassOpen {
                    negated: self.eat('^'),
                }
            }
            '.' => TokenKind::Dot,
            '^' => TokenKind::Anchor(AnchorKind::Start),
            '$' => TokenKind::Anchor(AnchorKind::End),
            '*' => self.quantifier(0, usize::MAX),
            '+' => self.quantifier(1, usize::MAX),
            '?' => self.quantifier(0, 1),
            '{' => match self.lex_interval(start)? {
                Some((min, max)) => self.quantifier(min, max),
                None => TokenKind::Literal('{'),
            },
            c => TokenKind::Literal(c),
        };
        Ok(Some(kind))
    }

    fn quantifier(&mut self, min: usize, max: usize) -> TokenKind {
        let kind = if self.eat('?') {
            QuantifierKind::Lazy
        } else if self.eat('+') {
            QuantifierKind::Possessive
        } else {
            QuantifierKind::Greedy
        };
        TokenKind::Quantifier { min, max, kind }
    }

    /// Try to read `{n}`, `{n,}`, `{n,m}` or `{,m}` after the `{`.
    ///
    /// Anything else is not a quantifier, the position is restored and the
    /// `{` becomes a literal.
    fn lex_interval(&mut self, start: usize) -> Result<Option<(usize, usize)>> {
        let resume = self.pos;
        let spaces = self.dialect.supports_open_lower_bound();
        let skip = |lexer: &mut Self| {
            if spaces {
                lexer.read_while(|c| c == ' ' || c == '\t');
            }
        };
        skip(self);
        let min = self.read_repeat_count(start)?;
        skip(self);
        let result = if self.eat('}') {
            min.map(|n| (n, n))
        } else if self.eat(',') {
            skip(self);
            let max = self.read_repeat_count(start)?;
            skip(self);
            if !self.eat('}') {
                None
            } else {
                match (min, max) {
                    (Some(min), Some(max)) => Some((min, max)),
                    (Some(min), None) => Some((min, usize::MAX)),
                    (None, Some(max)) if self.dialect.supports_open_lower_bound() => Some((0, max)),
                    _ => None,
                }
            }
        } else {
            None
        };
        if result.is_none() {
            self.pos = resume;
        }
        Ok(result)
    }

    fn read_repeat_count(&mut self, start: usize) -> Result<Option<usize>> {
        let digits = self.read_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Ok(None);
        }
        match digits.parse::<usize>() {
            Ok(n) if n <= MAX_REPEAT => Ok(Some(n)),
            _ => self.error(
                LexErrorKind::NumberTooLarge,
                format!("number too big in {{}} quantifier (maximum is {})", MAX_REPEAT),
                start,
            ),
        }
    }

    fn lex_class_item(&mut self) -> Result<Option<TokenKind>> {
        let start = self.pos;
        let c = match self.bump() {
            Some(c) => c,
            None => return Ok(None),
        };
        if self.extended & FLAG_IGNORE_SPACE_CLASS != 0 && (c == ' ' || c == '\t') {
            return Ok(None);
        }
        let fresh = std::mem::replace(&mut self.class_fresh, false);
        let kind = match c {
            ']' if fresh => TokenKind::Literal(']'),
            ']' => {
                self.in_class = false;
                TokenKind::ClassClose
            }
            '\\' => return self.lex_escape(start, true),
            '[' => match self.lex_posix_class() {
                Some(kind) => kind,
                None => TokenKind::Literal('['),
            },
            '&' if self.dialect.supports_class_set_operations() && self.eat('&') => {
                TokenKind::ClassIntersection
            }
            '-' if self.dialect.supports_class_set_operations() && self.eat('-') => {
                TokenKind::ClassSubtraction
            }
            '-' => TokenKind::ClassHyphen,
            c => TokenKind::Literal(c),
        };
        Ok(Some(kind))
    }

    fn lex_posix_class(&mut self) -> Option<TokenKind> {
        let rest = self.rest();
        let inner = rest.strip_prefix(':')?;
        let close = inner.find(":]")?;
        let raw = &inner[..close];
        let (negated, name) = match raw.strip_prefix('^') {
            Some(name) => (true, name),
            None => (false, raw),
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase()) {
            return None;
        }
        self.pos += 1 + close + 2;
        Some(TokenKind::PosixClass {
            name: name.to_string(),
            negated,
        })
    }

    fn lex_escape(&mut self, start: usize, in_class: bool) -> Result<Option<TokenKind>> {
        let c = match self.bump() {
            Some(c) => c,
            None => {
                return self.error(LexErrorKind::TrailingBackslash, "\\ at end of pattern", start);
            }
        };
        let special = |value| TokenKind::Escaped {
            value,
            form: LiteralForm::Special,
        };
        let shorthand = |kind, negated| TokenKind::Shorthand { kind, negated };
        let kind = match c {
            'a' => special('\x07'),
            'e' => special('\x1b'),
            'f' => special('\x0c'),
            'n' => special('\n'),
            'r' => special('\r'),
            't' => special('\t'),
            'b' if in_class => special('\x08'),
            // a reference to group 0, rejected by the parser
            '0' if !in_class => TokenKind::NumericEscape(0),
            '0' => {
                let value = self.read_octal_digits(2);
                self.escaped(value, LiteralForm::Octal, start)?
            }
            '1'..='9' if in_class => self.lex_class_digit_escape(c, start)?,
            '1'..='9' => {
                self.pos -= 1;
                TokenKind::NumericEscape(self.read_number(start)?.unwrap_or(0))
            }
            'o' => self.lex_braced_octal(start)?,
            'x' => self.lex_hex(start)?,
            'c' => self.lex_control(start)?,
            'd' => shorthand(ShorthandKind::Digit, false),
            'D' => shorthand(ShorthandKind::Digit, true),
            'w' => shorthand(ShorthandKind::Word, false),
            'W' => shorthand(ShorthandKind::Word, true),
            's' => shorthand(ShorthandKind::Space, false),
            'S' => shorthand(ShorthandKind::Space, true),
            'h' => shorthand(ShorthandKind::HorizontalSpace, false),
            'H' => shorthand(ShorthandKind::HorizontalSpace, true),
            'v' => shorthand(ShorthandKind::VerticalSpace, false),
            'V' => shorthand(ShorthandKind::VerticalSpace, true),
            'p' | 'P' => self.lex_property(start, c == 'P')?,
            'N' if self.rest().starts_with("{U+") => self.lex_code_point(start)?,
            'Q' => {
                self.quoting = true;
                return Ok(None);
            }
            'E' => return Ok(None),
            'N' | 'B' | 'A' | 'z' | 'Z' | 'G' | 'K' | 'R' | 'X' | 'C' | 'g' | 'k' if in_class => {
                return self.error(
                    LexErrorKind::InvalidEscape,
                    format!("escape sequence \\{} is invalid in character class", c),
                    start,
                );
            }
            'N' => shorthand(ShorthandKind::NotNewline, false),
            'R' => shorthand(ShorthandKind::Newline, false),
            'X' => shorthand(ShorthandKind::Grapheme, false),
            'C' => shorthand(ShorthandKind::CodeUnit, false),
            'b' => TokenKind::Anchor(AnchorKind::WordBoundary),
            'B' => TokenKind::Anchor(AnchorKind::NotWordBoundary),
            'A' => TokenKind::Anchor(AnchorKind::StartText),
            'z' => TokenKind::Anchor(AnchorKind::EndText),
            'Z' => TokenKind::Anchor(AnchorKind::EndTextOptionalNewline),
            'G' => TokenKind::Anchor(AnchorKind::ContinueFromPreviousMatchEnd),
            'K' => TokenKind::Anchor(AnchorKind::KeepOut),
            'g' => self.lex_g_reference(start)?,
            'k' => self.lex_k_reference(start)?,
            c if c.is_ascii_alphanumeric() => {
                return self.error(
                    LexErrorKind::UnsupportedEscape,
                    format!("unrecognized character follows \\: '{}'", c),
                    start,
                );
            }
            c => TokenKind::Escaped {
                value: c,
                form: LiteralForm::Punctuation,
            },
        };
        Ok(Some(kind))
    }

    fn escaped(&self, value: u32, form: LiteralForm, start: usize) -> Result<TokenKind> {
        if !self.utf && value > 0xff {
            return self.error(
                LexErrorKind::InvalidCodePoint,
                "character code point value is too large outside UTF mode",
                start,
            );
        }
        match char::from_u32(value) {
            Some(value) => Ok(TokenKind::Escaped { value, form }),
            None => self.error(
                LexErrorKind::InvalidCodePoint,
                format!("invalid code point U+{:X}", value),
                start,
            ),
        }
    }

    fn read_octal_digits(&mut self, max: usize) -> u32 {
        let mut value = 0;
        for _ in 0..max {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(d) => {
                    value = value * 8 + d;
                    self.pos += 1;
                }
                None => break,
            }
        }
        value
    }

    fn lex_class_digit_escape(&mut self, first: char, start: usize) -> Result<TokenKind> {
        if first == '8' || first == '9' {
            return Ok(TokenKind::Escaped {
                value: first,
                form: LiteralForm::Punctuation,
            });
        }
        let value = first as u32 - '0' as u32;
        let value = value * 8u32.pow(self.count_octal(2) as u32) + self.read_octal_digits(2);
        self.escaped(value, LiteralForm::Octal, start)
    }

    fn count_octal(&self, max: usize) -> usize {
        self.rest()
            .chars()
            .take(max)
            .take_while(|c| c.is_digit(8))
            .count()
    }

    fn lex_braced_octal(&mut self, start: usize) -> Result<TokenKind> {
        let digits = self.read_braced(start, "\\o{")?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(8)) {
            return self.error(LexErrorKind::MalformedEscape, "non-octal character in \\o{}", start);
        }
        match u32::from_str_radix(digits, 8) {
            Ok(value) => self.escaped(value, LiteralForm::Octal, start),
            Err(_) => self.error(LexErrorKind::InvalidCodePoint, "octal value is too large", start),
        }
    }

    fn lex_hex(&mut self, start: usize) -> Result<TokenKind> {
        if self.peek() == Some('{') {
            let digits = self.read_braced(start, "\\x{")?;
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return self.error(LexErrorKind::MalformedEscape, "non-hex character in \\x{}", start);
            }
            return match u32::from_str_radix(digits, 16) {
                Ok(value) => self.escaped(value, LiteralForm::Hex, start),
                Err(_) => self.error(LexErrorKind::InvalidCodePoint, "hex value is too large", start),
            };
        }
        let mut value = 0;
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(d) => {
                    value = value * 16 + d;
                    self.pos += 1;
                }
                None => break,
            }
        }
        self.escaped(value, LiteralForm::Hex, start)
    }

    /// Read `{...}` and return the content; the `{` is at the current position.
    fn read_braced(&mut self, start: usize, what: &str) -> Result<&'p str> {
        self.eat('{');
        let content = self.read_while(|c| c != '}');
        if !self.eat('}') {
            return self.error(
                LexErrorKind::UnterminatedEscape,
                format!("missing closing }} for {}", what),
                start,
            );
        }
        Ok(content)
    }

    fn lex_control(&mut self, start: usize) -> Result<TokenKind> {
        match self.bump() {
            Some(c) if c.is_ascii() && !c.is_ascii_control() => {
                let value = (c.to_ascii_uppercase() as u32) ^ 0x40;
                self.escaped(value, LiteralForm::Control, start)
            }
            Some(_) => self.error(
                LexErrorKind::MalformedEscape,
                "\\c must be followed by a printable ASCII character",
                start,
            ),
            None => self.error(LexErrorKind::TrailingBackslash, "\\c at end of pattern", start),
        }
    }

    fn lex_code_point(&mut self, start: usize) -> Result<TokenKind> {
        if !self.dialect.supports_code_point_escape() || !self.utf {
            return self.error(
                LexErrorKind::UnsupportedEscape,
                "\\N{U+dddd} is supported only in UTF mode",
                start,
            );
        }
        let content = self.read_braced(start, "\\N{U+")?;
        let digits = &content[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return self.error(LexErrorKind::MalformedEscape, "non-hex character in \\N{U+}", start);
        }
        match u32::from_str_radix(digits, 16) {
            Ok(value) => self.escaped(value, LiteralForm::CodePoint, start),
            Err(_) => self.error(LexErrorKind::InvalidCodePoint, "code point is too large", start),
        }
    }

    fn lex_property(&mut self, start: usize, upper: bool) -> Result<TokenKind> {
        let name = if self.peek() == Some('{') {
            self.read_braced(start, "\\p{")?
        } else {
            let at = self.pos;
            match self.bump() {
                Some(c) if c.is_ascii_alphabetic() => &self.body[at..self.pos],
                _ => {
                    return self.error(
                        LexErrorKind::MalformedEscape,
                        "malformed \\P or \\p sequence",
                        start,
                    );
                }
            }
        };
        let (caret, name) = match name.strip_prefix('^') {
            Some(name) => (true, name),
            None => (false, name),
        };
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '&' | ':' | '=' | ' ' | '-'));
        if !valid {
            return self.error(
                LexErrorKind::MalformedEscape,
                format!("unknown property name '{}' after \\P or \\p", name),
                start,
            );
        }
        Ok(TokenKind::Shorthand {
            kind: ShorthandKind::Property(name.to_string()),
            negated: upper != caret,
        })
    }

    fn lex_g_reference(&mut self, start: usize) -> Result<TokenKind> {
        let malformed = |lexer: &Self| {
            lexer.error(
                LexErrorKind::MalformedEscape,
                "\\g is not followed by a braced, angle-bracketed, or quoted name/number or by a plain number",
                start,
            )
        };
        match self.peek() {
            Some('{') => {
                let content = self.read_braced(start, "\\g{")?;
                match parse_reference(content, false) {
                    Some(reference) => Ok(TokenKind::Backref(reference)),
                    None => malformed(self),
                }
            }
            Some(open @ ('<' | '\'')) => {
                self.pos += 1;
                let close = if open == '<' { '>' } else { '\'' };
                let content = self.read_while(|c| c != close);
                if !self.eat(close) {
                    return self.error(
                        LexErrorKind::UnterminatedEscape,
                        format!("missing closing {} for \\g subroutine call", close),
                        start,
                    );
                }
                match parse_reference(content, true) {
                    Some(reference) => Ok(TokenKind::Subroutine(reference)),
                    None => malformed(self),
                }
            }
            Some('-') if self.peek_nth(1).map_or(false, |c| c.is_ascii_digit()) => {
                self.pos += 1;
                let n = self.read_number(start)?.unwrap_or(0);
                Ok(TokenKind::Backref(Reference::Relative(-(n as i64).min(i32::MAX as i64) as i32)))
            }
            Some(c) if c.is_ascii_digit() => {
                let n = self.read_number(start)?.unwrap_or(0);
                Ok(TokenKind::Backref(Reference::Number(n)))
            }
            _ => malformed(self),
        }
    }

    fn lex_k_reference(&mut self, start: usize) -> Result<TokenKind> {
        let close = match self.peek() {
            Some('<') => '>',
            Some('\'') => '\'',
            Some('{') => '}',
            _ => {
                return self.error(
                    LexErrorKind::MalformedEscape,
                    "\\k is not followed by a braced, angle-bracketed, or quoted name",
                    start,
                );
            }
        };
        self.pos += 1;
        let name = self.read_while(|c| c != close);
        if !self.eat(close) {
            return self.error(
                LexErrorKind::UnterminatedEscape,
                format!("missing closing {} for \\k reference", close),
                start,
            );
        }
        self.check_name(name, start)?;
        Ok(TokenKind::Backref(Reference::Name(name.to_string())))
    }

    fn check_name(&self, name: &str, start: usize) -> Result<()> {
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .map_or(false, |c| c == '_' || c.is_alphabetic());
        if !valid_start || !chars.all(|c| c == '_' || c.is_alphanumeric()) {
            return self.error(
                LexErrorKind::InvalidName,
                format!("invalid group name '{}'", name),
                start,
            );
        }
        if name.chars().count() > MAX_NAME_LEN {
            return self.error(
                LexErrorKind::InvalidName,
                format!("group name '{}' is too long (maximum is {})", name, MAX_NAME_LEN),
                start,
            );
        }
        Ok(())
    }

    /// Read a name terminated by `close`, validating it.
    fn read_name(&mut self, close: char, start: usize) -> Result<String> {
        let name = self.read_while(|c| c != close && c != ')');
        if !self.eat(close) {
            return self.error(
                LexErrorKind::InvalidName,
                format!("group name must be terminated by {}", close),
                start,
            );
        }
        self.check_name(name, start)?;
        Ok(name.to_string())
    }

    fn lex_paren(&mut self, start: usize) -> Result<TokenKind> {
        if self.eat('*') {
            if let Some(kind) = self.lex_star_construct(start)? {
                return Ok(kind);
            }
            self.pos -= 1;
            return Ok(TokenKind::GroupOpen(GroupOpen::Capturing));
        }
        if !self.eat('?') {
            return Ok(TokenKind::GroupOpen(GroupOpen::Capturing));
        }
        let c = match self.peek() {
            Some(c) => c,
            None => {
                return self.error(LexErrorKind::UnknownGroup, "unrecognized character after (?", start);
            }
        };
        let kind = match c {
            '#' => {
                self.pos += 1;
                let text = self.read_while(|c| c != ')');
                if !self.eat(')') {
                    return self.error(
                        LexErrorKind::UnterminatedComment,
                        "missing ) after (?# comment",
                        start,
                    );
                }
                TokenKind::Comment(text.to_string())
            }
            ':' => self.open(1, GroupOpen::NonCapturing),
            '>' => self.open(1, GroupOpen::Atomic),
            '=' => self.open(1, GroupOpen::Lookahead),
            '!' => self.open(1, GroupOpen::NegativeLookahead),
            '|' => self.open(1, GroupOpen::BranchReset),
            '<' if self.peek_nth(1) == Some('=') => self.open(2, GroupOpen::Lookbehind),
            '<' if self.peek_nth(1) == Some('!') => self.open(2, GroupOpen::NegativeLookbehind),
            '<' => {
                self.pos += 1;
                TokenKind::GroupOpen(GroupOpen::Named(self.read_name('>', start)?))
            }
            '\'' => {
                self.pos += 1;
                TokenKind::GroupOpen(GroupOpen::Named(self.read_name('\'', start)?))
            }
            'P' => {
                self.pos += 1;
                match self.bump() {
                    Some('<') => TokenKind::GroupOpen(GroupOpen::Named(self.read_name('>', start)?)),
                    Some('=') => TokenKind::Backref(Reference::Name(self.read_name(')', start)?)),
                    Some('>') => TokenKind::Subroutine(Reference::Name(self.read_name(')', start)?)),
                    _ => {
                        return self.error(
                            LexErrorKind::UnknownGroup,
                            "unrecognized character after (?P",
                            start,
                        );
                    }
                }
            }
            '&' => {
                self.pos += 1;
                TokenKind::Subroutine(Reference::Name(self.read_name(')', start)?))
            }
            'R' if self.peek_nth(1) == Some(')') => {
                self.pos += 2;
                TokenKind::Subroutine(Reference::Number(0))
            }
            '0'..='9' | '+' => self.lex_numbered_call(start)?,
            '-' if self.peek_nth(1).map_or(false, |c| c.is_ascii_digit()) => {
                self.lex_numbered_call(start)?
            }
            '(' => {
                self.pos += 1;
                TokenKind::ConditionOpen(self.lex_condition(start)?)
            }
            'C' => {
                self.pos += 1;
                TokenKind::Callout(self.lex_callout(start)?)
            }
            _ => self.lex_flag_group(start)?,
        };
        Ok(kind)
    }

    fn open(&mut self, len: usize, open: GroupOpen) -> TokenKind {
        self.pos += len;
        TokenKind::GroupOpen(open)
    }

    fn lex_numbered_call(&mut self, start: usize) -> Result<TokenKind> {
        let sign = match self.peek() {
            Some('+') => 1,
            Some('-') => -1,
            _ => 0,
        };
        if sign != 0 {
            self.pos += 1;
        }
        let n = self.read_number(start)?;
        if !self.eat(')') || n.is_none() {
            return self.error(
                LexErrorKind::UnknownGroup,
                "(?R (recursive pattern call) must be followed by )",
                start,
            );
        }
        let n = n.unwrap_or(0);
        let reference = if sign == 0 {
            Reference::Number(n)
        } else {
            Reference::Relative(sign * n.min(i32::MAX as u32) as i32)
        };
        Ok(TokenKind::Subroutine(reference))
    }

    fn lex_condition(&mut self, start: usize) -> Result<ConditionToken> {
        if self.eat('?') {
            let open = if self.eat('=') {
                GroupOpen::Lookahead
            } else if self.eat('!') {
                GroupOpen::NegativeLookahead
            } else if self.eat_str("<=") {
                GroupOpen::Lookbehind
            } else if self.eat_str("<!") {
                GroupOpen::NegativeLookbehind
            } else {
                return self.error(
                    LexErrorKind::UnknownGroup,
                    "assertion expected after (?( or (?(?C)",
                    start,
                );
            };
            return Ok(ConditionToken::Assertion(open));
        }
        let malformed = |lexer: &Self| {
            lexer.error(
                LexErrorKind::UnknownGroup,
                "malformed number or name after (?(",
                start,
            )
        };
        let condition = match self.peek() {
            Some('<') => {
                self.pos += 1;
                ConditionToken::Reference(Reference::Name(self.read_name('>', start)?))
            }
            Some('\'') => {
                self.pos += 1;
                ConditionToken::Reference(Reference::Name(self.read_name('\'', start)?))
            }
            Some('+') | Some('-') | Some('0'..='9') => {
                let sign = match self.peek() {
                    Some('+') => 1,
                    Some('-') => -1,
                    _ => 0,
                };
                if sign != 0 {
                    self.pos += 1;
                }
                let n = match self.read_number(start)? {
                    Some(n) => n,
                    None => return malformed(self),
                };
                if sign == 0 {
                    ConditionToken::Reference(Reference::Number(n))
                } else {
                    ConditionToken::Reference(Reference::Relative(sign * n.min(i32::MAX as u32) as i32))
                }
            }
            Some('R') if self.peek_nth(1) == Some('&') => {
                self.pos += 2;
                let name = self.read_while(|c| c != ')');
                self.check_name(name, start)?;
                ConditionToken::RecursionName(name.to_string())
            }
            Some('R') if self.peek_nth(1).map_or(false, |c| c.is_ascii_digit()) => {
                self.pos += 1;
                ConditionToken::RecursionGroup(self.read_number(start)?.unwrap_or(0))
            }
            Some('R') if self.peek_nth(1) == Some(')') => {
                self.pos += 1;
                ConditionToken::Recursion
            }
            _ if self.rest().starts_with("DEFINE)") => {
                self.pos += "DEFINE".len();
                ConditionToken::Define
            }
            Some(c) if c == '_' || c.is_alphabetic() => {
                let name = self.read_while(|c| c == '_' || c.is_alphanumeric());
                self.check_name(name, start)?;
                ConditionToken::Reference(Reference::Name(name.to_string()))
            }
            _ => return malformed(self),
        };
        if !self.eat(')') {
            return malformed(self);
        }
        Ok(condition)
    }

    fn lex_callout(&mut self, start: usize) -> Result<CalloutArg> {
        let malformed = |lexer: &Self| {
            lexer.error(LexErrorKind::MalformedCallout, "malformed callout after (?C", start)
        };
        let arg = match self.peek() {
            Some(')') => CalloutArg::Number(0),
            Some(c) if c.is_ascii_digit() => match self.read_number(start)? {
                Some(n) if n <= 255 => CalloutArg::Number(n),
                _ => return malformed(self),
            },
            Some(open @ ('`' | '\'' | '"' | '^' | '%' | '#' | '$' | '{')) => {
                self.pos += 1;
                let close = if open == '{' { '}' } else { open };
                let mut text = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == close => {
                            if self.eat(close) {
                                text.push(close);
                            } else {
                                break;
                            }
                        }
                        Some(c) => text.push(c),
                        None => return malformed(self),
                    }
                }
                CalloutArg::Text(text)
            }
            _ => return malformed(self),
        };
        if !self.eat(')') {
            return malformed(self);
        }
        Ok(arg)
    }

    fn lex_flag_group(&mut self, start: usize) -> Result<TokenKind> {
        let mut modifiers = FlagModifiers::default();
        let mut negate = false;
        let mut first = true;
        loop {
            let at = self.pos;
            let c = match self.bump() {
                Some(c) => c,
                None => {
                    return self.error(LexErrorKind::UnknownGroup, "missing ) after (? flags", start);
                }
            };
            match c {
                ')' => return Ok(TokenKind::InlineFlags(modifiers)),
                ':' => return Ok(TokenKind::GroupOpen(GroupOpen::Modifiers(modifiers))),
                '^' if first && self.dialect.supports_caret_reset() => modifiers.reset = true,
                '-' if !negate && !modifiers.reset => negate = true,
                'x' if self.peek() == Some('x') => {
                    self.pos += 1;
                    let bits = FLAG_IGNORE_SPACE | FLAG_IGNORE_SPACE_CLASS;
                    if negate {
                        modifiers.off |= bits;
                    } else {
                        modifiers.on |= bits;
                    }
                }
                c => {
                    let bit = match inline_flag(c) {
                        Some(FLAG_NO_AUTO_CAPTURE) if !self.dialect.supports_no_auto_capture() => None,
                        Some(bit) => Some(bit),
                        None => None,
                    };
                    let bit = match bit {
                        Some(bit) => bit,
                        None if first => {
                            return self.error(
                                LexErrorKind::UnknownGroup,
                                format!("unrecognized character after (? or (?-: '{}'", c),
                                start,
                            );
                        }
                        None => {
                            return self.error(
                                LexErrorKind::UnknownFlag,
                                format!("unknown inline flag '{}'", c),
                                at,
                            );
                        }
                    };
                    // unsetting x also unsets xx
                    let bit = if bit == FLAG_IGNORE_SPACE && negate {
                        FLAG_IGNORE_SPACE | FLAG_IGNORE_SPACE_CLASS
                    } else {
                        bit
                    };
                    if negate {
                        modifiers.off |= bit;
                    } else {
                        modifiers.on |= bit;
                    }
                }
            }
            first = false;
        }
    }

    /// Lex what follows `(*`: a verb, a start-of-pattern setting or an
    /// alphabetic assertion. Returns `None` when `(*` is just a group
    /// followed by a star.
    fn lex_star_construct(&mut self, start: usize) -> Result<Option<TokenKind>> {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == ':' => {}
            _ => return Ok(None),
        }
        let name = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if self.peek() == Some(':') && name.chars().all(|c| !c.is_ascii_uppercase()) && !name.is_empty() {
            if let Some(open) = alpha_assertion(name) {
                if !self.dialect.supports_alpha_assertions() {
                    return self.error(
                        LexErrorKind::UnknownVerb,
                        format!("(*{}: is not supported by this PCRE version", name),
                        start,
                    );
                }
                self.pos += 1;
                return Ok(Some(TokenKind::GroupOpen(open)));
            }
        }
        let arg = if self.eat(':') || (name.starts_with("LIMIT_") && self.eat('=')) {
            Some(self.read_while(|c| c != ')').to_string())
        } else {
            None
        };
        if !self.eat(')') {
            return self.error(LexErrorKind::UnterminatedVerb, "missing ) after (*VERB", start);
        }
        let known = match name {
            "" | "MARK" => arg.as_deref().map_or(false, |a| !a.is_empty()),
            n if n.starts_with("LIMIT_") => {
                is_start_setting(n) && arg.as_deref().map_or(false, |a| a.parse::<u32>().is_ok())
            }
            n if is_start_setting(n) => arg.is_none(),
            n => VERBS.contains(&n),
        };
        if !known {
            return self.error(
                LexErrorKind::UnknownVerb,
                format!("(*VERB) not recognized or malformed: (*{})", name),
                start,
            );
        }
        Ok(Some(TokenKind::Verb {
            name: name.to_string(),
            arg,
        }))
    }
}

fn alpha_assertion(name: &str) -> Option<GroupOpen> {
    let open = match name {
        "pla" | "positive_lookahead" => GroupOpen::Lookahead,
        "nla" | "negative_lookahead" => GroupOpen::NegativeLookahead,
        "plb" | "positive_lookbehind" => GroupOpen::Lookbehind,
        "nlb" | "negative_lookbehind" => GroupOpen::NegativeLookbehind,
        "napla" | "non_atomic_positive_lookahead" => GroupOpen::NonAtomicLookahead,
        "naplb" | "non_atomic_positive_lookbehind" => GroupOpen::NonAtomicLookbehind,
        "atomic" | "asr" | "atomic_script_run" => GroupOpen::Atomic,
        "sr" | "script_run" => GroupOpen::NonCapturing,
        _ => return None,
    };
    Some(open)
}

/// Parse the content of `\g{...}` (backref) or `\g<...>` (subroutine).
fn parse_reference(content: &str, allow_plus: bool) -> Option<Reference> {
    if let Some(digits) = content.strip_prefix('-') {
        return digits
            .parse::<u32>()
            .ok()
            .map(|n| Reference::Relative(-(n.min(i32::MAX as u32) as i32)));
    }
    if let Some(digits) = content.strip_prefix('+') {
        if !allow_plus {
            return None;
        }
        return digits
            .parse::<u32>()
            .ok()
            .map(|n| Reference::Relative(n.min(i32::MAX as u32) as i32));
    }
    if content.chars().next().map_or(false, |c| c.is_ascii_digit()) {
        return content.parse::<u32>().ok().map(Reference::Number);
    }
    let mut chars = content.chars();
    let valid = chars.next().map_or(false, |c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric());
    if valid {
        Some(Reference::Name(content.to_string()))
    } else {
        None
    }
}

/// Characters skipped in extended mode.
fn is_pattern_whitespace(c: char) -> bool {
    matches!(
        c,
        ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r' | '\u{85}' | '\u{200e}' | '\u{200f}' | '\u{2028}' | '\u{2029}'
    )
}
